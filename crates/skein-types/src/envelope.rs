//! Envelope and payload types matching the backend ingestion schema.
//!
//! Every telemetry item is an [`Envelope`] carrying an item name, an RFC 3339
//! timestamp, the instrumentation key, context tags, and a typed payload in
//! `data.baseData` with the payload's schema name in `data.baseType`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known context tag keys recognized by the backend.
pub mod tags {
    /// Correlation ID shared by every item belonging to one operation.
    pub const OPERATION_ID: &str = "ai.operation.id";
    /// ID of the parent item within the operation.
    pub const OPERATION_PARENT_ID: &str = "ai.operation.parentId";
    /// Human-readable operation name (e.g. `GET /orders/{id}`).
    pub const OPERATION_NAME: &str = "ai.operation.name";
    /// Logical role of the emitting service.
    pub const CLOUD_ROLE: &str = "ai.cloud.role";
    /// Instance (host/pod) of the emitting service.
    pub const CLOUD_ROLE_INSTANCE: &str = "ai.cloud.roleInstance";
    /// SDK identifier stamped on every item.
    pub const INTERNAL_SDK_VERSION: &str = "ai.internal.sdkVersion";
}

/// Schema version stamped into every payload's `ver` field.
pub const SCHEMA_VERSION: i32 = 2;

/// String map used for custom properties on payloads.
pub type Properties = BTreeMap<String, String>;
/// Numeric map used for custom measurements on payloads.
pub type Measurements = BTreeMap<String, f64>;

/// Top-level telemetry item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub ver: i32,
    /// Item name, e.g. `Telemetry.Request`.
    pub name: String,
    /// RFC 3339 UTC timestamp with sub-second precision.
    pub time: String,
    #[serde(rename = "sampleRate", default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    #[serde(rename = "iKey", default, skip_serializing_if = "Option::is_none")]
    pub instrumentation_key: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub data: Data,
}

impl Envelope {
    /// Wrap a payload in an envelope stamped with the current UTC time.
    pub fn new(data: TelemetryData) -> Self {
        Self::at(Utc::now(), data)
    }

    /// Wrap a payload in an envelope with an explicit timestamp.
    pub fn at(time: DateTime<Utc>, data: TelemetryData) -> Self {
        Self {
            ver: 1,
            name: data.item_name().to_string(),
            time: format_timestamp(time),
            sample_rate: None,
            instrumentation_key: None,
            tags: BTreeMap::new(),
            data: Data {
                base_type: data.base_type().to_string(),
                base_data: data,
            },
        }
    }

    pub fn with_instrumentation_key(mut self, key: impl Into<String>) -> Self {
        self.instrumentation_key = Some(key.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Format a timestamp the way the ingestion endpoint expects it.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Payload wrapper pairing the schema name with the payload itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    #[serde(rename = "baseType")]
    pub base_type: String,
    #[serde(rename = "baseData")]
    pub base_data: TelemetryData,
}

/// The five payload shapes the backend accepts.
///
/// Untagged on the wire; the `baseType` field on [`Data`] names the variant.
/// Deserialization relies on required fields disambiguating the variants
/// (`responseCode` for requests, `type` for dependencies, `metrics` for
/// metric batches, `message` for traces), so the order below matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryData {
    Request(RequestData),
    RemoteDependency(RemoteDependencyData),
    Metric(MetricData),
    Message(MessageData),
    Event(EventData),
}

impl TelemetryData {
    /// Envelope item name for this payload.
    pub fn item_name(&self) -> &'static str {
        match self {
            Self::Request(_) => "Telemetry.Request",
            Self::RemoteDependency(_) => "Telemetry.RemoteDependency",
            Self::Metric(_) => "Telemetry.Metric",
            Self::Message(_) => "Telemetry.Message",
            Self::Event(_) => "Telemetry.Event",
        }
    }

    /// Schema name stored in `data.baseType`.
    pub fn base_type(&self) -> &'static str {
        match self {
            Self::Request(_) => "RequestData",
            Self::RemoteDependency(_) => "RemoteDependencyData",
            Self::Metric(_) => "MetricData",
            Self::Message(_) => "MessageData",
            Self::Event(_) => "EventData",
        }
    }
}

/// Inbound request record: one per call processed by the instrumented app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestData {
    pub ver: i32,
    pub id: String,
    pub name: String,
    /// Elapsed time in `d.hh:mm:ss.fffffff` form.
    pub duration: String,
    pub response_code: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measurements: Measurements,
}

/// Outbound dependency record: one per call the instrumented app makes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDependencyData {
    pub ver: i32,
    pub name: String,
    pub id: String,
    /// Dependency type string, e.g. `HTTP`, `SQL`, `Azure Service Bus`.
    #[serde(rename = "type")]
    pub dependency_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Command/URL detail for the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measurements: Measurements,
}

/// Custom event record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub ver: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measurements: Measurements,
}

/// Metric batch: one or more data points plus shared dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricData {
    pub ver: i32,
    pub metrics: Vec<DataPoint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

/// A single metric value or pre-aggregated series.
///
/// For single measurements only `name` and `value` are set. Aggregated
/// points also carry `count`, `min`, `max`, and `stdDev`, with `value`
/// holding the sum over the aggregation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ns: Option<String>,
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

impl DataPoint {
    /// A plain single-value measurement.
    pub fn single(name: impl Into<String>, value: f64) -> Self {
        Self {
            ns: None,
            name: name.into(),
            value,
            count: None,
            min: None,
            max: None,
            std_dev: None,
        }
    }
}

/// Trace/log message record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub ver: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_level: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Properties,
}

/// Severity of a trace message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityLevel {
    Verbose,
    Information,
    Warning,
    Error,
    Critical,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> TelemetryData {
        TelemetryData::Event(EventData {
            ver: SCHEMA_VERSION,
            name: "cache_warmed".to_string(),
            properties: BTreeMap::new(),
            measurements: BTreeMap::new(),
        })
    }

    #[test]
    fn test_envelope_names_follow_payload() {
        let env = Envelope::new(sample_event());
        assert_eq!(env.name, "Telemetry.Event");
        assert_eq!(env.data.base_type, "EventData");
    }

    #[test]
    fn test_envelope_serializes_backend_field_names() {
        let time = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 45).unwrap();
        let env = Envelope::at(time, sample_event())
            .with_instrumentation_key("abc-123")
            .with_tag(tags::CLOUD_ROLE, "checkout");

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["iKey"], "abc-123");
        assert_eq!(json["time"], "2025-03-01T12:30:45.000000Z");
        assert_eq!(json["tags"]["ai.cloud.role"], "checkout");
        assert_eq!(json["data"]["baseType"], "EventData");
        assert_eq!(json["data"]["baseData"]["name"], "cache_warmed");
    }

    #[test]
    fn test_request_data_camel_case() {
        let data = RequestData {
            ver: SCHEMA_VERSION,
            id: "abcd1234abcd1234".to_string(),
            name: "GET /orders".to_string(),
            duration: "00:00:00.2500000".to_string(),
            response_code: "200".to_string(),
            success: true,
            source: None,
            url: Some("https://api.example.com/orders".to_string()),
            properties: BTreeMap::new(),
            measurements: BTreeMap::new(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["responseCode"], "200");
        assert_eq!(json["url"], "https://api.example.com/orders");
        // Empty bags are omitted entirely.
        assert!(json.get("properties").is_none());
    }

    #[test]
    fn test_dependency_type_field_rename() {
        let data = RemoteDependencyData {
            ver: SCHEMA_VERSION,
            name: "orders-db | orders".to_string(),
            id: "1234abcd1234abcd".to_string(),
            dependency_type: "SQL".to_string(),
            target: Some("orders-db | orders".to_string()),
            data: Some("SELECT 1".to_string()),
            duration: "00:00:00.0100000".to_string(),
            result_code: Some("0".to_string()),
            success: true,
            properties: BTreeMap::new(),
            measurements: BTreeMap::new(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "SQL");
        assert_eq!(json["resultCode"], "0");
    }

    #[test]
    fn test_untagged_payload_round_trip() {
        let env = Envelope::new(TelemetryData::Request(RequestData {
            ver: SCHEMA_VERSION,
            id: "abcd1234abcd1234".to_string(),
            name: "GET /".to_string(),
            duration: "00:00:00.0010000".to_string(),
            response_code: "200".to_string(),
            success: true,
            source: None,
            url: None,
            properties: BTreeMap::new(),
            measurements: BTreeMap::new(),
        }));
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.data.base_data, TelemetryData::Request(_)));
        assert_eq!(back.data.base_type, "RequestData");
    }

    #[test]
    fn test_severity_serializes_as_name() {
        let data = MessageData {
            ver: SCHEMA_VERSION,
            message: "disk pressure".to_string(),
            severity_level: Some(SeverityLevel::Warning),
            properties: BTreeMap::new(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["severityLevel"], "Warning");
    }
}
