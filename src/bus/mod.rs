//! Local publish/subscribe bus.
//!
//! This module provides:
//! - Message envelopes and payload decoding ([`BusMessage`], [`DecodeError`])
//! - The in-process topic bus ([`LocalBus`], [`Subscription`])
//! - A UDP datagram ingress that publishes onto the bus ([`UdpIngress`])
//! - Error handling ([`BusError`])

mod local;
mod udp;


pub use local::{LocalBus, Subscription};
pub use udp::UdpIngress;

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A message delivered by the bus.
///
/// Producers may publish either an already-structured JSON value or raw
/// bytes carrying JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// Structured JSON message.
    Json(serde_json::Value),
    /// Raw bytes expected to contain UTF-8 JSON.
    Binary(Vec<u8>),
}

impl BusMessage {
    /// Decodes the message into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Empty`] for an empty binary payload and
    /// [`DecodeError::InvalidJson`] if the bytes are not valid JSON.
    pub fn into_payload(self) -> Result<serde_json::Value, DecodeError> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Binary(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                Err(DecodeError::Empty)
            }
            Self::Binary(bytes) => serde_json::from_slice(&bytes).map_err(DecodeError::InvalidJson),
        }
    }
}

/// Failure to decode a bus message into JSON.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message carried no content.
    #[error("Empty payload")]
    Empty,

    /// The bytes are not valid JSON.
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

/// Errors raised while setting up or using the bus.
///
/// These occur during startup and are fatal to it.
#[derive(Debug, Error)]
pub enum BusError {
    /// The topic name is unusable.
    #[error("Invalid topic '{topic}': {reason}")]
    InvalidTopic {
        /// The rejected topic
        topic: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// The UDP ingress socket could not be bound.
    #[error("Failed to bind UDP ingress on {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Checks that a topic name is non-empty and free of whitespace.
///
/// # Errors
///
/// Returns [`BusError::InvalidTopic`] describing the problem.
pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    let reason = if topic.is_empty() {
        "must not be empty"
    } else if topic.chars().any(char::is_whitespace) {
        "must not contain whitespace"
    } else {
        return Ok(());
    };

    Err(BusError::InvalidTopic {
        topic: topic.to_string(),
        reason,
    })
}
