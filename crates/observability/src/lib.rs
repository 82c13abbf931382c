//! Tracing setup and in-process event capture.

/// Initialize process-wide observability (tracing/logging) from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init_with(&ObservabilityConfig::from_env());
}

/// Subscriber configuration and initialization.
pub mod subscriber;

/// Event capture for asserting on emitted log events.
pub mod capture;

pub use capture::{CapturedEvent, EventCapture};
pub use subscriber::{init_with, LogFormat, ObservabilityConfig, UnknownLogFormat};
