//! In-process topic bus backed by `tokio::sync::broadcast`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::{BusError, BusMessage, validate_topic};

/// Cloneable handle to the local publish/subscribe bus.
///
/// Every topic is a bounded broadcast channel created on first use. Clones
/// share the same topics; a [`Subscription`] ends once every clone has been
/// dropped.
///
/// # Example
///
/// ```
/// use telemetry_relay::bus::{BusMessage, LocalBus};
///
/// let bus = LocalBus::new();
/// let _sub = bus.subscribe("iot/metrics/cpu").unwrap();
/// let reached = bus
///     .publish("iot/metrics/cpu", BusMessage::Binary(b"{}".to_vec()))
///     .unwrap();
/// assert_eq!(reached, 1);
/// ```
#[derive(Debug, Clone)]
pub struct LocalBus {
    topics: Arc<DashMap<String, broadcast::Sender<BusMessage>>>,
    capacity: usize,
}

impl LocalBus {
    /// Default per-topic buffer size.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Creates a bus with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a bus whose topics buffer up to `capacity` messages per
    /// subscriber before the slowest one starts lagging.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "bus capacity must be greater than zero");
        Self {
            topics: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Per-topic buffer size.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribes to `topic`, receiving every message published after this
    /// call.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidTopic`] if the topic name is unusable.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        validate_topic(topic)?;
        let receiver = self.sender(topic).subscribe();
        tracing::debug!("Subscribed to topic {topic}");

        Ok(Subscription {
            topic: topic.to_string(),
            inner: BroadcastStream::new(receiver),
        })
    }

    /// Publishes `message` on `topic`.
    ///
    /// Returns how many subscribers the message reached. Publishing to a
    /// topic nobody listens to is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidTopic`] if the topic name is unusable.
    pub fn publish(&self, topic: &str, message: BusMessage) -> Result<usize, BusError> {
        validate_topic(topic)?;
        Ok(self.sender(topic).send(message).unwrap_or(0))
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map_or(0, |sender| sender.receiver_count())
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        if let Some(sender) = self.topics.get(topic) {
            return sender.clone();
        }
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of messages delivered on one topic.
///
/// Messages dropped because this subscriber fell behind are logged and
/// skipped; the stream keeps going.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    inner: BroadcastStream<BusMessage>,
}

impl Subscription {
    /// The topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Stream for Subscription {
    type Item = BusMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(message))) => return Poll::Ready(Some(message)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!("Subscriber on {} lagged, skipped {skipped} messages", this.topic);
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
