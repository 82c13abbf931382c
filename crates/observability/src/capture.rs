//! In-process capture of tracing events.
//!
//! [`EventCapture`] is a `tracing_subscriber` layer that records every event
//! it sees (level, message, fields as JSON). Installed as the thread-default
//! subscriber it lets tests assert on exactly which events an operation
//! emitted:
//!
//! ```ignore
//! let (capture, _guard) = EventCapture::install();
//! service.add(Some(&widget)).await?;
//! assert_eq!(capture.with_event_id(601).len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{Layer, Registry};

/// One recorded event.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(serde_json::Value::as_str)
    }

    pub fn event_id(&self) -> Option<i64> {
        self.field("event_id").and_then(serde_json::Value::as_i64)
    }
}

/// Shared, cloneable event recorder.
#[derive(Debug, Clone, Default)]
pub struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl EventCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh capture as the current thread's default subscriber.
    ///
    /// Events are recorded until the returned guard is dropped.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::new();
        let subscriber = Registry::default().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn with_event_id(&self, event_id: i64) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event_id() == Some(event_id))
            .collect()
    }

    /// Events that carry an `event_id` field.
    pub fn correlated(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event_id().is_some())
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl<S> Layer<S> for EventCapture
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let captured = CapturedEvent {
            level: *metadata.level(),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push(captured);
        }
    }
}

/// Visitor to extract fields as JSON
#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value_str = format!("{:?}", value);

        if field.name() == "message" {
            self.message = Some(value_str);
        } else {
            self.fields.insert(field.name().to_string(), json!(value_str));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), json!(value));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), json!(value));
    }
}
