//! Inbound request tracking.

use std::time::Duration;

use chrono::{DateTime, Utc};
use skein_types::{format_duration, RequestData, SCHEMA_VERSION};

use crate::context::TelemetryContext;
use crate::correlation::{generate_span_id, OperationContext};
use crate::validate::{normalize_code, require_name, TelemetryError};

/// Builder for a request entry.
///
/// The name convention is `"{METHOD} {path}"`. Success defaults from the
/// status code: anything below 400 succeeds, and 401 also counts as success
/// so auth challenges do not show up as server failures.
#[derive(Debug, Clone)]
pub struct RequestTelemetry {
    id: String,
    name: String,
    status: u16,
    duration: Duration,
    url: Option<String>,
    source: Option<String>,
    success: Option<bool>,
    timestamp: Option<DateTime<Utc>>,
    context: TelemetryContext,
    operation: Option<OperationContext>,
}

impl RequestTelemetry {
    pub fn new(method: &str, path: &str, status: u16, duration: Duration) -> Self {
        Self {
            id: generate_span_id(),
            name: format!("{} {}", method.to_ascii_uppercase(), path),
            status,
            duration,
            url: None,
            source: None,
            success: None,
            timestamp: None,
            context: TelemetryContext::new(),
            operation: None,
        }
    }

    /// Override the generated entry ID, e.g. with an upstream span ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Full request URL for the `url` payload field.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Caller identity (`source` payload field).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Override the status-derived success flag.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// When the request started; defaults to emission time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_context(mut self, context: TelemetryContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_operation(mut self, operation: OperationContext) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Effective success flag (explicit override, else derived from status).
    pub fn success(&self) -> bool {
        self.success
            .unwrap_or(self.status < 400 || self.status == 401)
    }

    pub(crate) fn into_data(
        self,
        common: &TelemetryContext,
    ) -> Result<(RequestData, Option<OperationContext>), TelemetryError> {
        require_name("request name", &self.name)?;
        let success = self.success();
        let (properties, measurements) = self.context.merged_over(common).into_parts();
        let data = RequestData {
            ver: SCHEMA_VERSION,
            id: self.id,
            name: self.name,
            duration: format_duration(self.duration),
            response_code: normalize_code(&self.status.to_string()),
            success,
            source: self.source,
            url: self.url,
            properties,
            measurements,
        };
        Ok((data, self.operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_convention() {
        let req = RequestTelemetry::new("get", "/orders/42", 200, Duration::from_millis(5));
        let (data, _) = req.into_data(&TelemetryContext::new()).unwrap();
        assert_eq!(data.name, "GET /orders/42");
        assert_eq!(data.response_code, "200");
        assert_eq!(data.duration, "00:00:00.0050000");
    }

    #[test]
    fn test_success_derived_from_status() {
        let ok = RequestTelemetry::new("GET", "/", 204, Duration::ZERO);
        assert!(ok.success());
        let client_err = RequestTelemetry::new("GET", "/", 404, Duration::ZERO);
        assert!(!client_err.success());
        let server_err = RequestTelemetry::new("GET", "/", 503, Duration::ZERO);
        assert!(!server_err.success());
    }

    #[test]
    fn test_auth_challenge_counts_as_success() {
        let challenged = RequestTelemetry::new("GET", "/admin", 401, Duration::ZERO);
        assert!(challenged.success());
        // 403 is a real denial, not a challenge.
        let denied = RequestTelemetry::new("GET", "/admin", 403, Duration::ZERO);
        assert!(!denied.success());
    }

    #[test]
    fn test_explicit_success_overrides_status() {
        let req = RequestTelemetry::new("GET", "/", 200, Duration::ZERO).with_success(false);
        assert!(!req.success());
    }

    #[test]
    fn test_generated_id_is_span_shaped() {
        let req = RequestTelemetry::new("GET", "/", 200, Duration::ZERO);
        assert_eq!(req.id().len(), 16);
        assert!(req.id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_url_and_source_fields() {
        let req = RequestTelemetry::new("POST", "/orders", 201, Duration::from_millis(30))
            .with_url("https://api.example.com/orders")
            .with_source("frontend");
        let (data, _) = req.into_data(&TelemetryContext::new()).unwrap();
        assert_eq!(data.url.as_deref(), Some("https://api.example.com/orders"));
        assert_eq!(data.source.as_deref(), Some("frontend"));
    }
}
