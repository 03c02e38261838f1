//! Device readings and payload validation.
//!
//! This module provides:
//! - The immutable reading value type ([`DeviceReading`])
//! - Validation of untyped payloads into readings ([`validate`])
//! - Validation errors ([`ValidationError`])
//!
//! # Wire Shape
//!
//! Readings travel as JSON objects in both directions:
//!
//! ```text
//! { "device_name": "d1", "cpu": 12.3, "timestamp": "2024-01-01T00:00:00Z" }
//! ```

mod validate;

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;

pub use validate::{ValidationError, field, validate};

use serde::Serialize;
use std::fmt;

/// A single validated device reading.
///
/// Constructed only through [`validate`] or [`DeviceReading::new`]; fields are
/// private so a reading cannot change once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReading {
    device_name: String,
    #[serde(rename = "cpu")]
    metric_value: f64,
    timestamp: String,
}

impl DeviceReading {
    /// Creates a reading from already-validated parts.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeCoercion`] if the device name is empty
    /// or the metric value is not finite.
    pub fn new(
        device_name: impl Into<String>,
        metric_value: f64,
        timestamp: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let device_name = device_name.into();
        if device_name.is_empty() {
            return Err(ValidationError::coercion(
                field::DEVICE_NAME,
                "must not be empty",
            ));
        }
        if !metric_value.is_finite() {
            return Err(ValidationError::coercion(
                field::METRIC,
                format!("{metric_value} is not a finite number"),
            ));
        }

        Ok(Self {
            device_name,
            metric_value,
            timestamp: timestamp.into(),
        })
    }

    /// Returns the device identity.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Returns the measured value.
    #[must_use]
    pub const fn metric_value(&self) -> f64 {
        self.metric_value
    }

    /// Returns the opaque timestamp token.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Serializes the reading to its JSON wire shape.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Serializes the reading to JSON bytes for transmission.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl fmt::Display for DeviceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={} @ {}",
            self.device_name, self.metric_value, self.timestamp
        )
    }
}
