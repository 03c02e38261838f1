//! Payload validation into [`DeviceReading`].

use serde_json::{Map, Value};
use thiserror::Error;

use super::DeviceReading;

/// Field names of the reading wire shape.
pub mod field {
    /// The device identity field.
    pub const DEVICE_NAME: &str = "device_name";
    /// The designated metric-value field.
    pub const METRIC: &str = "cpu";
    /// The timestamp field.
    pub const TIMESTAMP: &str = "timestamp";
}

/// Reasons a payload is rejected.
///
/// Every variant is local to one message: the message is dropped and
/// processing continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload is not a key/value mapping.
    #[error("Payload is not a mapping (got {found})")]
    NotAMapping {
        /// JSON type name of the payload
        found: &'static str,
    },

    /// A required field is absent.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but cannot be coerced to its expected type.
    #[error("Invalid value for {field}: {reason}")]
    TypeCoercion {
        /// Name of the offending field
        field: &'static str,
        /// Why coercion failed
        reason: String,
    },
}

impl ValidationError {
    pub(super) fn coercion(field: &'static str, reason: impl Into<String>) -> Self {
        Self::TypeCoercion {
            field,
            reason: reason.into(),
        }
    }
}

/// Validates an untyped payload into a [`DeviceReading`].
///
/// Pure: the payload is only read.
///
/// # Coercion
///
/// | Field | Accepted | Rejected |
/// |-------|----------|----------|
/// | `device_name` | non-empty string, number | empty string, bool, null, array, object |
/// | `cpu` | finite number, numeric string | `NaN`/`inf` strings, bool, null, array, object |
/// | `timestamp` | string, number | bool, null, array, object |
///
/// # Errors
///
/// Returns [`ValidationError`] describing the first problem found. Required
/// fields are checked in wire order: `device_name`, `cpu`, `timestamp`.
pub fn validate(payload: &Value) -> Result<DeviceReading, ValidationError> {
    let map = payload.as_object().ok_or(ValidationError::NotAMapping {
        found: type_name(payload),
    })?;

    let raw_name = require(map, field::DEVICE_NAME)?;
    let raw_metric = require(map, field::METRIC)?;
    let raw_timestamp = require(map, field::TIMESTAMP)?;

    let device_name = coerce_string(field::DEVICE_NAME, raw_name)?;
    let metric_value = coerce_finite(raw_metric)?;
    let timestamp = coerce_string(field::TIMESTAMP, raw_timestamp)?;

    DeviceReading::new(device_name, metric_value, timestamp)
}

fn require<'a>(map: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, ValidationError> {
    map.get(name).ok_or(ValidationError::MissingField(name))
}

fn coerce_string(field: &'static str, value: &Value) -> Result<String, ValidationError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ValidationError::coercion(
            field,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}

fn coerce_finite(value: &Value) -> Result<f64, ValidationError> {
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            ValidationError::coercion(field::METRIC, format!("{n} is not representable as f64"))
        })?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| {
            ValidationError::coercion(field::METRIC, format!("'{s}' is not a number: {e}"))
        })?,
        other => {
            return Err(ValidationError::coercion(
                field::METRIC,
                format!("expected a number, got {}", type_name(other)),
            ));
        }
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(ValidationError::coercion(
            field::METRIC,
            format!("{number} is not a finite number"),
        ))
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
