//! Argument guards shared by the trackers.
//!
//! Required names error out; oversize property values are trimmed in place
//! rather than rejected, so a single long value never drops a whole entry.

use thiserror::Error;

/// Maximum length of request/dependency/event/metric names.
pub const MAX_NAME_LEN: usize = 512;
/// Maximum length of a property or measurement key.
pub const MAX_KEY_LEN: usize = 150;
/// Maximum length of a property value; longer values are truncated.
pub const MAX_VALUE_LEN: usize = 8192;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("metric value must be finite, got {0}")]
    NonFiniteMetric(f64),

    #[error("invalid connection string: {0}")]
    ConnectionString(String),
}

/// Validate a required name field: non-empty and within the schema limit.
pub fn require_name(field: &'static str, value: &str) -> Result<(), TelemetryError> {
    if value.trim().is_empty() {
        return Err(TelemetryError::Empty { field });
    }
    let len = value.chars().count();
    if len > MAX_NAME_LEN {
        return Err(TelemetryError::TooLong {
            field,
            max: MAX_NAME_LEN,
            len,
        });
    }
    Ok(())
}

/// Validate a metric value.
pub fn require_finite(value: f64) -> Result<(), TelemetryError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TelemetryError::NonFiniteMetric(value))
    }
}

/// Replace characters the backend rejects in property keys with `_`,
/// trimming to the key limit.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .take(MAX_KEY_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '.' | '/' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Truncate a property value to the schema limit on a char boundary.
pub fn truncate_value(value: &str) -> String {
    value.chars().take(MAX_VALUE_LEN).collect()
}

/// Response/result codes must be non-empty; unknown outcomes report `"0"`.
pub fn normalize_code(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
