//! Outbound dependency tracking with per-domain target conventions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use skein_types::{format_duration, RemoteDependencyData, SCHEMA_VERSION};

use crate::context::TelemetryContext;
use crate::correlation::{generate_span_id, OperationContext};
use crate::validate::{normalize_code, require_name, TelemetryError};

/// Kind of outbound call, mapped to the backend's dependency type strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyKind {
    Http,
    Sql,
    ServiceBus,
    EventHubs,
    InProc,
    Custom(String),
}

impl DependencyKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Http => "HTTP",
            Self::Sql => "SQL",
            Self::ServiceBus => "Azure Service Bus",
            Self::EventHubs => "Azure Event Hubs",
            Self::InProc => "InProc",
            Self::Custom(kind) => kind,
        }
    }
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for a dependency entry.
///
/// The domain constructors bake in the target/data string conventions the
/// backend's application map expects; [`DependencyTelemetry::new`] is the
/// escape hatch for anything else.
#[derive(Debug, Clone)]
pub struct DependencyTelemetry {
    id: String,
    name: String,
    kind: DependencyKind,
    target: Option<String>,
    data: Option<String>,
    result_code: Option<String>,
    success: Option<bool>,
    duration: Duration,
    timestamp: Option<DateTime<Utc>>,
    context: TelemetryContext,
    operation: Option<OperationContext>,
}

impl DependencyTelemetry {
    pub fn new(kind: DependencyKind, name: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: generate_span_id(),
            name: name.into(),
            kind,
            target: None,
            data: None,
            result_code: None,
            success: None,
            duration,
            timestamp: None,
            context: TelemetryContext::new(),
            operation: None,
        }
    }

    /// An outbound HTTP call. Target is `host[:port]`, data the full URL,
    /// result code the response status.
    pub fn http(method: &str, url: &str, status: u16, duration: Duration) -> Self {
        let (host, path) = split_url(url);
        Self::new(
            DependencyKind::Http,
            format!("{} {}", method.to_ascii_uppercase(), path),
            duration,
        )
        .with_target(host)
        .with_data(url)
        .with_result_code(status.to_string())
        .with_success(status < 400)
    }

    /// A SQL call. Target convention is `"server | database"`, data the
    /// command text.
    pub fn sql(server: &str, database: &str, command: &str, duration: Duration) -> Self {
        let target = format!("{server} | {database}");
        Self::new(DependencyKind::Sql, target.clone(), duration)
            .with_target(target)
            .with_data(command)
    }

    /// A Service Bus send/receive. `namespace` may be the bare namespace
    /// name or a full host; `entity` is the queue or topic.
    pub fn service_bus(
        namespace: &str,
        entity: &str,
        operation: &str,
        duration: Duration,
    ) -> Self {
        Self::new(DependencyKind::ServiceBus, operation, duration)
            .with_target(messaging_target(namespace, entity))
    }

    /// An Event Hubs send/receive; `hub` is the event hub name.
    pub fn event_hubs(namespace: &str, hub: &str, operation: &str, duration: Duration) -> Self {
        Self::new(DependencyKind::EventHubs, operation, duration)
            .with_target(messaging_target(namespace, hub))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_result_code(mut self, code: impl Into<String>) -> Self {
        self.result_code = Some(normalize_code(&code.into()));
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// When the call started; defaults to emission time.
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

    /// Effective success flag: explicit override, else derived from a
    /// numeric result code (< 400), else true.
    pub fn success(&self) -> bool {
        if let Some(success) = self.success {
            return success;
        }
        match self.result_code.as_deref().map(str::parse::<u32>) {
            Some(Ok(code)) => code < 400,
            _ => true,
        }
    }

    pub(crate) fn into_data(
        self,
        common: &TelemetryContext,
    ) -> Result<(RemoteDependencyData, Option<OperationContext>), TelemetryError> {
        require_name("dependency name", &self.name)?;
        let success = self.success();
        let (properties, measurements) = self.context.merged_over(common).into_parts();
        let data = RemoteDependencyData {
            ver: SCHEMA_VERSION,
            name: self.name,
            id: self.id,
            dependency_type: self.kind.as_str().to_string(),
            target: self.target,
            data: self.data,
            duration: format_duration(self.duration),
            result_code: self.result_code,
            success,
            properties,
            measurements,
        };
        Ok((data, self.operation))
    }
}

/// Messaging target convention: `{namespace-host}/{entity}`. A bare
/// namespace gets the standard host suffix appended.
fn messaging_target(namespace: &str, entity: &str) -> String {
    let host = namespace.trim_end_matches('/');
    if host.contains('.') {
        format!("{host}/{entity}")
    } else {
        format!("{host}.servicebus.windows.net/{entity}")
    }
}

/// Split a URL into `host[:port]` and path, without a URL-parsing crate.
/// Falls back to the whole string as host when there is no path.
fn split_url(url: &str) -> (String, String) {
    let rest = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    match rest.split_once('/') {
        Some((host, path_and_query)) => {
            let path = path_and_query
                .split_once('?')
                .map(|(p, _)| p)
                .unwrap_or(path_and_query);
            (host.to_string(), format!("/{path}"))
        }
        None => (rest.to_string(), "/".to_string()),
    }
}
