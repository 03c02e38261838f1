//! UDP datagram ingress for the local bus.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::time::{Sleeper, TokioSleeper};

use super::{BusError, BusMessage, LocalBus, validate_topic};

/// Largest datagram accepted; anything longer is truncated by the socket.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Pause after a failed receive before the next attempt.
pub(super) const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Publishes every UDP datagram it receives onto a bus topic.
///
/// Each datagram is expected to carry one JSON-encoded reading and is
/// published unchanged as [`BusMessage::Binary`]; decoding happens in the
/// subscriber.
///
/// # Type Parameters
///
/// - `S`: The sleeper used to pause after a failed receive (defaults to [`TokioSleeper`])
#[derive(Debug)]
pub struct UdpIngress<S = TokioSleeper> {
    socket: UdpSocket,
    bus: LocalBus,
    topic: String,
    sleeper: S,
}

impl UdpIngress<TokioSleeper> {
    /// Binds the ingress socket.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidTopic`] for an unusable topic and
    /// [`BusError::Bind`] if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        bus: LocalBus,
        topic: impl Into<String>,
    ) -> Result<Self, BusError> {
        let topic = topic.into();
        validate_topic(&topic)?;

        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| BusError::Bind { addr, source })?;

        Ok(Self {
            socket,
            bus,
            topic,
            sleeper: TokioSleeper,
        })
    }
}

impl<S> UdpIngress<S> {
    /// Sets a custom sleeper for the receive-error pause.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> UdpIngress<S2> {
        UdpIngress {
            socket: self.socket,
            bus: self.bus,
            topic: self.topic,
            sleeper,
        }
    }

    /// Address the socket is actually bound to.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// The topic datagrams are published to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<S: Sleeper> UdpIngress<S> {
    /// Receives datagrams forever, publishing each one.
    ///
    /// Receive errors are logged and the loop pauses briefly before the next
    /// receive; the future only completes when dropped.
    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        tracing::info!(
            "UDP ingress listening on {} for topic {}",
            self.local_addr()
                .map_or_else(|_| "<unknown>".to_string(), |addr| addr.to_string()),
            self.topic
        );

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    self.on_receive_error(&e).await;
                    continue;
                }
            };

            let message = BusMessage::Binary(buf[..len].to_vec());
            match self.bus.publish(&self.topic, message) {
                Ok(0) => tracing::debug!("Datagram from {peer} had no subscribers"),
                Ok(_) => tracing::trace!("Published {len} bytes from {peer}"),
                Err(e) => tracing::warn!("Failed to publish datagram from {peer}: {e}"),
            }
        }
    }

    pub(super) async fn on_receive_error(&self, error: &io::Error) {
        tracing::warn!("UDP ingress receive failed: {error}");
        self.sleeper.sleep(RECV_ERROR_BACKOFF).await;
    }
}
