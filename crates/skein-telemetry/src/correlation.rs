//! Operation correlation: trace/span IDs and the tag mapping that ties
//! request, dependency, and event entries to one logical operation.

use std::collections::BTreeMap;

use skein_types::tags;
use uuid::Uuid;

/// Generate an OpenTelemetry-compatible trace ID (32 hex characters).
pub fn generate_trace_id() -> String {
    let id = Uuid::new_v4();
    // A UUID without hyphens is exactly 32 hex chars (128 bits).
    id.as_simple().to_string()
}

/// Generate a span ID (16 hex characters).
pub fn generate_span_id() -> String {
    let id = Uuid::new_v4();
    // Take the first 16 hex chars (64 bits) for span IDs.
    id.as_simple().to_string()[..16].to_string()
}

/// Correlation data attached to a telemetry entry.
///
/// `operation_id` groups every entry produced while handling one inbound
/// call; `parent_id` points at the entry that caused this one.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation_id: String,
    pub parent_id: Option<String>,
    pub operation_name: Option<String>,
}

impl OperationContext {
    /// Start a new root operation.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            operation_id: generate_trace_id(),
            parent_id: None,
            operation_name: Some(name.into()),
        }
    }

    /// Continue an operation received from upstream (e.g. a request header).
    pub fn continued(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            parent_id: None,
            operation_name: None,
        }
    }

    /// A child context under this operation, parented to `parent_id`.
    pub fn child(&self, parent_id: impl Into<String>) -> Self {
        Self {
            operation_id: self.operation_id.clone(),
            parent_id: Some(parent_id.into()),
            operation_name: self.operation_name.clone(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Write this context into envelope tags.
    pub fn write_tags(&self, tags: &mut BTreeMap<String, String>) {
        tags.insert(tags::OPERATION_ID.to_string(), self.operation_id.clone());
        if let Some(parent) = &self.parent_id {
            tags.insert(tags::OPERATION_PARENT_ID.to_string(), parent.clone());
        }
        if let Some(name) = &self.operation_name {
            tags.insert(tags::OPERATION_NAME.to_string(), name.clone());
        }
    }

    /// Create a tracing span for work performed under this operation.
    pub fn span(&self, operation: &str) -> tracing::Span {
        let span_id = generate_span_id();
        tracing::info_span!(
            "operation",
            trace_id = %self.operation_id,
            span_id = %span_id,
            operation = %operation,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
