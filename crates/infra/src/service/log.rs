//! Log correlation for business-service operations.
//!
//! Every outcome of every operation emits exactly one `tracing` event whose
//! `event_id` is the service's log base plus the operation's fixed offset.

use keystone_core::ServiceError;

/// Business-service operation, with its fixed log offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    RetrieveSingle,
    Modify,
    Remove,
    RetrieveMultiple,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Add,
        Operation::RetrieveSingle,
        Operation::Modify,
        Operation::Remove,
        Operation::RetrieveMultiple,
    ];

    pub fn offset(self) -> i64 {
        match self {
            Operation::Add => 1,
            Operation::RetrieveSingle => 2,
            Operation::Modify => 3,
            Operation::Remove => 4,
            Operation::RetrieveMultiple => 5,
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::RetrieveSingle => "retrieve_single",
            Operation::Modify => "modify",
            Operation::Remove => "remove",
            Operation::RetrieveMultiple => "retrieve_multiple",
        }
    }
}

/// Replace template delimiters in free text so log sinks never read them as
/// placeholders.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "[").replace('}', "]")
}

/// Per-service log correlation: base id plus entity name.
#[derive(Debug, Clone)]
pub struct ServiceLog {
    log_base_id: i64,
    entity: &'static str,
}

impl ServiceLog {
    pub fn new(log_base_id: i64, entity: &'static str) -> Self {
        Self { log_base_id, entity }
    }

    pub fn log_base_id(&self) -> i64 {
        self.log_base_id
    }

    pub fn event_id(&self, operation: Operation) -> i64 {
        self.log_base_id + operation.offset()
    }

    pub fn success(&self, operation: Operation, object_id: Option<&str>, detail: &str) {
        tracing::info!(
            event_id = self.event_id(operation),
            action = operation.action(),
            entity = self.entity,
            object_id,
            outcome = "success",
            "{}",
            escape_braces(detail)
        );
    }

    /// Emit the failure event for `err` and hand it back for propagation.
    pub fn failed(&self, operation: Operation, object_id: Option<&str>, err: ServiceError) -> ServiceError {
        tracing::error!(
            event_id = self.event_id(operation),
            action = operation.action(),
            entity = self.entity,
            object_id,
            outcome = "failure",
            error_code = err.code(),
            error = %escape_braces(&err.diagnostic_chain()),
            "{} {} failed",
            operation.action(),
            self.entity
        );
        err
    }
}
