//! Telemetry client and output sinks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use skein_types::{
    tags, DataPoint, Envelope, MessageData, MetricData, SeverityLevel, TelemetryData,
    SCHEMA_VERSION,
};

use crate::context::TelemetryContext;
use crate::correlation::OperationContext;
use crate::dependency::DependencyTelemetry;
use crate::event::EventTelemetry;
use crate::request::RequestTelemetry;
use crate::validate::{require_finite, require_name, TelemetryError};

/// SDK identifier stamped on every envelope.
const SDK_VERSION: &str = concat!("skein:", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for assembled envelopes.
///
/// Sinks must not panic on emit; delivery beyond the process boundary is out
/// of scope for this crate.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, envelope: Envelope);

    /// Flush any buffered entries. Default is a no-op.
    fn flush(&self) {}
}

/// Sink that keeps envelopes in memory, in emission order. Intended for
/// tests and local inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Envelope>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all captured envelopes.
    pub fn take(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, envelope: Envelope) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(envelope);
    }
}

/// Default production sink: forwards each envelope as a structured
/// `tracing` event for the subscriber configured by [`crate::logging`].
#[derive(Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, envelope: Envelope) {
        let payload = serde_json::to_string(&envelope).unwrap_or_default();
        tracing::info!(
            target: "skein::telemetry",
            item = %envelope.name,
            base_type = %envelope.data.base_type,
            %payload,
            "telemetry item"
        );
    }
}

// ---------------------------------------------------------------------------
// Connection string
// ---------------------------------------------------------------------------

/// Parsed `InstrumentationKey=...;IngestionEndpoint=...` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub instrumentation_key: String,
    pub ingestion_endpoint: Option<String>,
}

impl ConnectionString {
    /// Parse a semicolon-delimited `Key=Value` connection string.
    ///
    /// Keys are case-insensitive; `InstrumentationKey` is required.
    pub fn parse(raw: &str) -> Result<Self, TelemetryError> {
        let mut instrumentation_key = None;
        let mut ingestion_endpoint = None;

        for pair in raw.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                TelemetryError::ConnectionString(format!("segment without '=': {pair:?}"))
            })?;
            match key.trim().to_ascii_lowercase().as_str() {
                "instrumentationkey" => instrumentation_key = Some(value.trim().to_string()),
                "ingestionendpoint" => {
                    ingestion_endpoint = Some(value.trim().trim_end_matches('/').to_string());
                }
                // Unknown segments (AADAudience, LiveEndpoint, ...) are allowed.
                _ => {}
            }
        }

        let instrumentation_key = instrumentation_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TelemetryError::ConnectionString("missing InstrumentationKey".to_string())
            })?;

        Ok(Self {
            instrumentation_key,
            ingestion_endpoint,
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Assembles telemetry entries into envelopes and hands them to a sink.
///
/// The client owns the instrumentation key, the role tags, and the common
/// context merged into every entry. It is cheap to share behind an `Arc`.
pub struct TelemetryClient {
    instrumentation_key: Option<String>,
    tags: BTreeMap<String, String>,
    common: TelemetryContext,
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryClient {
    /// Client without an instrumentation key, e.g. for local development.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(tags::INTERNAL_SDK_VERSION.to_string(), SDK_VERSION.to_string());
        Self {
            instrumentation_key: None,
            tags,
            common: TelemetryContext::new(),
            sink,
        }
    }

    /// Client configured from a backend connection string.
    pub fn from_connection_string(
        raw: &str,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self, TelemetryError> {
        let parsed = ConnectionString::parse(raw)?;
        let mut client = Self::new(sink);
        client.instrumentation_key = Some(parsed.instrumentation_key);
        Ok(client)
    }

    /// Logical role of the emitting service (`ai.cloud.role`).
    pub fn with_role_name(mut self, role: impl Into<String>) -> Self {
        self.tags.insert(tags::CLOUD_ROLE.to_string(), role.into());
        self
    }

    /// Host/instance identity (`ai.cloud.roleInstance`).
    pub fn with_role_instance(mut self, instance: impl Into<String>) -> Self {
        self.tags
            .insert(tags::CLOUD_ROLE_INSTANCE.to_string(), instance.into());
        self
    }

    /// Context merged into every entry this client emits.
    pub fn with_common_context(mut self, context: TelemetryContext) -> Self {
        self.common = context;
        self
    }

    pub fn common_context(&self) -> &TelemetryContext {
        &self.common
    }

    // -- Trackers -------------------------------------------------------------

    /// Record an inbound request.
    pub fn track_request(&self, request: RequestTelemetry) -> Result<(), TelemetryError> {
        let timestamp = request.timestamp();
        let (data, operation) = request.into_data(&self.common)?;
        self.emit_at(TelemetryData::Request(data), operation.as_ref(), timestamp);
        Ok(())
    }

    /// Record an outbound dependency call.
    pub fn track_dependency(&self, dependency: DependencyTelemetry) -> Result<(), TelemetryError> {
        let timestamp = dependency.timestamp();
        let (data, operation) = dependency.into_data(&self.common)?;
        self.emit_at(
            TelemetryData::RemoteDependency(data),
            operation.as_ref(),
            timestamp,
        );
        Ok(())
    }

    /// Record a custom event.
    pub fn track_event(&self, event: EventTelemetry) -> Result<(), TelemetryError> {
        let timestamp = event.timestamp();
        let (data, operation) = event.into_data(&self.common)?;
        self.emit_at(TelemetryData::Event(data), operation.as_ref(), timestamp);
        Ok(())
    }

    /// Record a single metric value.
    pub fn track_metric(
        &self,
        name: &str,
        value: f64,
        context: TelemetryContext,
    ) -> Result<(), TelemetryError> {
        require_name("metric name", name)?;
        require_finite(value)?;
        let (properties, _) = context.merged_over(&self.common).into_parts();
        let data = MetricData {
            ver: SCHEMA_VERSION,
            metrics: vec![DataPoint::single(name, value)],
            properties,
        };
        self.emit(TelemetryData::Metric(data), None);
        Ok(())
    }

    /// Record a pre-aggregated metric batch (see [`crate::metric`]).
    pub fn track_metric_batch(&self, batch: Vec<MetricData>) {
        for data in batch {
            self.emit(TelemetryData::Metric(data), None);
        }
    }

    /// Record a trace message.
    pub fn track_trace(
        &self,
        message: &str,
        severity: SeverityLevel,
        context: TelemetryContext,
    ) -> Result<(), TelemetryError> {
        require_name("trace message", message)?;
        let (properties, _) = context.merged_over(&self.common).into_parts();
        let data = MessageData {
            ver: SCHEMA_VERSION,
            message: message.to_string(),
            severity_level: Some(severity),
            properties,
        };
        self.emit(TelemetryData::Message(data), None);
        Ok(())
    }

    pub fn flush(&self) {
        self.sink.flush();
    }

    fn emit(&self, data: TelemetryData, operation: Option<&OperationContext>) {
        self.emit_at(data, operation, None);
    }

    fn emit_at(
        &self,
        data: TelemetryData,
        operation: Option<&OperationContext>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let mut envelope = match timestamp {
            Some(at) => Envelope::at(at, data),
            None => Envelope::new(data),
        };
        envelope.instrumentation_key = self.instrumentation_key.clone();
        envelope.tags = self.tags.clone();
        if let Some(op) = operation {
            op.write_tags(&mut envelope.tags);
        }
        self.sink.emit(envelope);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn memory_client() -> (Arc<MemorySink>, TelemetryClient) {
        let sink = Arc::new(MemorySink::new());
        let client = TelemetryClient::new(sink.clone()).with_role_name("checkout");
        (sink, client)
    }

    #[test]
    fn test_connection_string_parse() {
        let cs = ConnectionString::parse(
            "InstrumentationKey=abc-123;IngestionEndpoint=https://west.ingest.example.com/",
        )
        .unwrap();
        assert_eq!(cs.instrumentation_key, "abc-123");
        assert_eq!(
            cs.ingestion_endpoint.as_deref(),
            Some("https://west.ingest.example.com")
        );
    }

    #[test]
    fn test_connection_string_case_insensitive_keys() {
        let cs = ConnectionString::parse("instrumentationkey=k1;LiveEndpoint=ignored").unwrap();
        assert_eq!(cs.instrumentation_key, "k1");
        assert_eq!(cs.ingestion_endpoint, None);
    }

    #[test]
    fn test_connection_string_missing_key() {
        assert!(ConnectionString::parse("IngestionEndpoint=https://x").is_err());
        assert!(ConnectionString::parse("garbage").is_err());
        assert!(ConnectionString::parse("InstrumentationKey=").is_err());
    }

    #[test]
    fn test_client_stamps_key_and_tags() {
        let sink = Arc::new(MemorySink::new());
        let client = TelemetryClient::from_connection_string(
            "InstrumentationKey=abc-123",
            sink.clone(),
        )
        .unwrap()
        .with_role_name("checkout")
        .with_role_instance("pod-7");

        client
            .track_event(EventTelemetry::new("cache_warmed"))
            .unwrap();

        let entries = sink.take();
        assert_eq!(entries.len(), 1);
        let env = &entries[0];
        assert_eq!(env.instrumentation_key.as_deref(), Some("abc-123"));
        assert_eq!(env.tags["ai.cloud.role"], "checkout");
        assert_eq!(env.tags["ai.cloud.roleInstance"], "pod-7");
        assert!(env.tags["ai.internal.sdkVersion"].starts_with("skein:"));
    }

    #[test]
    fn test_common_context_merged_into_entries() {
        let (sink, client) = memory_client();
        let client = client
            .with_common_context(TelemetryContext::new().with("env", "prod"));

        client
            .track_event(EventTelemetry::new("checkout_started").with_context(
                TelemetryContext::new().with("tenant", "contoso"),
            ))
            .unwrap();

        let entries = sink.take();
        match &entries[0].data.base_data {
            TelemetryData::Event(e) => {
                assert_eq!(e.properties["env"], "prod");
                assert_eq!(e.properties["tenant"], "contoso");
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_track_metric_single_value() {
        let (sink, client) = memory_client();
        client
            .track_metric("queue_depth", 17.0, TelemetryContext::new())
            .unwrap();

        let entries = sink.take();
        assert_eq!(entries[0].name, "Telemetry.Metric");
        match &entries[0].data.base_data {
            TelemetryData::Metric(m) => {
                assert_eq!(m.metrics.len(), 1);
                assert_eq!(m.metrics[0].name, "queue_depth");
                assert_eq!(m.metrics[0].value, 17.0);
                assert_eq!(m.metrics[0].count, None);
            }
            other => panic!("expected metric, got {other:?}"),
        }
    }

    #[test]
    fn test_track_metric_rejects_nan() {
        let (sink, client) = memory_client();
        assert!(client
            .track_metric("rate", f64::NAN, TelemetryContext::new())
            .is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_track_trace_severity() {
        let (sink, client) = memory_client();
        client
            .track_trace(
                "retry budget exhausted",
                SeverityLevel::Warning,
                TelemetryContext::new(),
            )
            .unwrap();

        match &sink.take()[0].data.base_data {
            TelemetryData::Message(m) => {
                assert_eq!(m.message, "retry budget exhausted");
                assert_eq!(m.severity_level, Some(SeverityLevel::Warning));
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_operation_tags_on_request() {
        let (sink, client) = memory_client();
        let op = OperationContext::root("GET /orders");
        client
            .track_request(
                RequestTelemetry::new("GET", "/orders", 200, Duration::from_millis(12))
                    .with_operation(op.clone()),
            )
            .unwrap();

        let env = &sink.take()[0];
        assert_eq!(env.tags["ai.operation.id"], op.operation_id);
        assert_eq!(env.tags["ai.operation.name"], "GET /orders");
    }

    #[test]
    fn test_explicit_timestamp_stamped_on_envelope() {
        use chrono::TimeZone;
        let (sink, client) = memory_client();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        client
            .track_event(EventTelemetry::new("batch_replayed").with_timestamp(at))
            .unwrap();
        assert_eq!(sink.take()[0].time, "2025-06-01T08:00:00.000000Z");
    }

    #[test]
    fn test_memory_sink_preserves_order() {
        let (sink, client) = memory_client();
        for name in ["first", "second", "third"] {
            client.track_event(EventTelemetry::new(name)).unwrap();
        }
        let names: Vec<String> = sink
            .take()
            .into_iter()
            .map(|e| match e.data.base_data {
                TelemetryData::Event(ev) => ev.name,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, ["first", "second", "third"]);
    }
}
