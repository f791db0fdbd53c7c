//! Free-form key-value context attached to telemetry entries.

use serde::Serialize;
use skein_types::{Measurements, Properties};

use crate::validate::{require_finite, sanitize_key, truncate_value, TelemetryError};

/// Extra dimensions for a telemetry entry: string properties plus numeric
/// measurements.
///
/// Keys are sanitized and values trimmed to the schema limits on insertion,
/// so a context is always safe to serialize as-is. Entry-local context wins
/// over the client's common context on key collisions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetryContext {
    properties: Properties,
    measurements: Measurements,
}

impl TelemetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property insertion. Empty keys are ignored.
    pub fn with(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style measurement insertion. Non-finite values are ignored.
    pub fn with_measurement(mut self, key: impl AsRef<str>, value: f64) -> Self {
        self.measure(key, value);
        self
    }

    /// Insert a property, sanitizing the key and trimming the value.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        let key = sanitize_key(key.as_ref());
        if key.is_empty() {
            return;
        }
        self.properties.insert(key, truncate_value(value.as_ref()));
    }

    /// Record a numeric measurement.
    pub fn measure(&mut self, key: impl AsRef<str>, value: f64) {
        if require_finite(value).is_err() {
            return;
        }
        let key = sanitize_key(key.as_ref());
        if key.is_empty() {
            return;
        }
        self.measurements.insert(key, value);
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.measurements.is_empty()
    }

    /// Overlay this context on top of `common`: common entries fill gaps,
    /// entry-local values win collisions.
    pub fn merged_over(&self, common: &TelemetryContext) -> TelemetryContext {
        let mut merged = common.clone();
        merged
            .properties
            .extend(self.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
            .measurements
            .extend(self.measurements.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }

    /// Split into the payload-ready bags.
    pub fn into_parts(self) -> (Properties, Measurements) {
        (self.properties, self.measurements)
    }
}

/// Validation-aware construction for callers that want errors instead of the
/// silent sanitize/trim behavior.
impl TelemetryContext {
    pub fn try_set(
        &mut self,
        key: &str,
        value: impl AsRef<str>,
    ) -> Result<(), TelemetryError> {
        if key.trim().is_empty() {
            return Err(TelemetryError::Empty {
                field: "property key",
            });
        }
        self.set(key, value);
        Ok(())
    }
}
