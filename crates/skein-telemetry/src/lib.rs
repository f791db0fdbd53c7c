//! Telemetry helpers for shipping structured entries to a log-analytics
//! pipeline.
//!
//! This crate packages domain parameters (HTTP requests, SQL / Service Bus /
//! Event Hubs calls, custom events, metrics) into the envelope schema defined
//! by `skein-types`, with the argument validation and string conventions the
//! backend expects. It integrates with the `tracing` ecosystem for output.
//!
//! Key components:
//! - **Client**: [`TelemetryClient`] assembles envelopes and hands them to a
//!   pluggable [`TelemetrySink`]
//! - **Trackers**: builders for request, dependency, event, metric, and
//!   trace entries with per-domain target/name conventions
//! - **Metrics**: thread-safe pre-aggregation into metric envelopes
//! - **Middleware**: axum middleware for automatic request tracking and
//!   request-ID correlation
//! - **Logging**: human-readable and JSON output via `tracing-subscriber`

pub mod client;
pub mod context;
pub mod correlation;
pub mod dependency;
pub mod event;
pub mod logging;
pub mod metric;
pub mod middleware;
pub mod request;
pub mod validate;

pub use client::{ConnectionString, MemorySink, TelemetryClient, TelemetrySink, TracingSink};
pub use context::TelemetryContext;
pub use correlation::{generate_span_id, generate_trace_id, OperationContext};
pub use dependency::{DependencyKind, DependencyTelemetry};
pub use event::EventTelemetry;
pub use metric::{global_aggregator, Labels, MetricAggregator};
pub use request::RequestTelemetry;
pub use validate::TelemetryError;
