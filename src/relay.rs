//! Message entry point tying decoding, validation and change detection
//! together.

use crate::bus::BusMessage;
use crate::filter::{ChangeFilter, ForwardDecision};
use crate::forward::Forwarder;
use crate::reading::{ValidationError, validate};

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;

/// Handles messages delivered by the local bus.
///
/// Each call is independent: a message that fails to decode or validate is
/// logged and dropped without touching filter state.
#[derive(Debug)]
pub struct Relay<F> {
    filter: ChangeFilter<F>,
}

impl<F> Relay<F> {
    /// Creates a relay around a change filter.
    #[must_use]
    pub const fn new(filter: ChangeFilter<F>) -> Self {
        Self { filter }
    }

    /// The underlying filter.
    #[must_use]
    pub const fn filter(&self) -> &ChangeFilter<F> {
        &self.filter
    }
}

impl<F: Forwarder> Relay<F> {
    /// Validates a decoded payload and runs it through the filter.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] if the payload is not a valid reading.
    pub async fn process(
        &self,
        payload: &serde_json::Value,
    ) -> Result<ForwardDecision, ValidationError> {
        let reading = validate(payload)?;
        tracing::info!(
            "Received message at timestamp {} from {}",
            reading.timestamp(),
            reading.device_name()
        );
        Ok(self.filter.handle(&reading).await)
    }

    /// Handles one bus delivery.
    ///
    /// Returns `None` when the message was dropped.
    pub async fn on_message(&self, message: BusMessage) -> Option<ForwardDecision> {
        let payload = match message.into_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Dropping message: {e}");
                return None;
            }
        };

        match self.process(&payload).await {
            Ok(decision) => Some(decision),
            Err(e) => {
                tracing::warn!("Invalid message: {e}");
                None
            }
        }
    }
}
