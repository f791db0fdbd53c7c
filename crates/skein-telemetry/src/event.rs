//! Custom event tracking.

use chrono::{DateTime, Utc};
use skein_types::{EventData, SCHEMA_VERSION};

use crate::context::TelemetryContext;
use crate::correlation::OperationContext;
use crate::validate::{require_name, TelemetryError};

/// Builder for a custom event entry.
#[derive(Debug, Clone)]
pub struct EventTelemetry {
    name: String,
    timestamp: Option<DateTime<Utc>>,
    context: TelemetryContext,
    operation: Option<OperationContext>,
}

impl EventTelemetry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
            context: TelemetryContext::new(),
            operation: None,
        }
    }

    /// When the event occurred; defaults to emission time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn with_context(mut self, context: TelemetryContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_property(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.context.set(key, value);
        self
    }

    pub fn with_measurement(mut self, key: impl AsRef<str>, value: f64) -> Self {
        self.context.measure(key, value);
        self
    }

    pub fn with_operation(mut self, operation: OperationContext) -> Self {
        self.operation = Some(operation);
        self
    }

    pub(crate) fn into_data(
        self,
        common: &TelemetryContext,
    ) -> Result<(EventData, Option<OperationContext>), TelemetryError> {
        require_name("event name", &self.name)?;
        let (properties, measurements) = self.context.merged_over(common).into_parts();
        let data = EventData {
            ver: SCHEMA_VERSION,
            name: self.name,
            properties,
            measurements,
        };
        Ok((data, self.operation))
    }
}
