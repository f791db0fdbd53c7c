//! Wire-schema types for skein telemetry.
//!
//! This crate provides the serde type definitions for the log-analytics
//! envelope format: one [`Envelope`] per telemetry item, wrapping a typed
//! payload (request, remote dependency, custom event, metric, or trace
//! message). Field names serialize to the backend's expected schema
//! (`iKey`, `baseType`, `baseData`, camelCase payload fields).
//!
//! Behavior lives in `skein-telemetry`; this crate stays pure data plus the
//! duration/timestamp string conventions the schema requires.

pub mod duration;
pub mod envelope;

pub use duration::format_duration;
pub use envelope::{
    format_timestamp, tags, Data, DataPoint, Envelope, EventData, Measurements, MessageData,
    MetricData, Properties, RemoteDependencyData, RequestData, SeverityLevel, TelemetryData,
    SCHEMA_VERSION,
};
