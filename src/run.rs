//! Application execution logic.
//!
//! This module wires the local bus, the optional producers and the relay
//! together and runs the delivery loop until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::signal;
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::{Stream, StreamExt};

use telemetry_relay::bus::{BusError, BusMessage, LocalBus, UdpIngress};
use telemetry_relay::config::ValidatedConfig;
use telemetry_relay::filter::{ChangeFilter, FilterState};
use telemetry_relay::forward::{Forwarder, HttpForwarder, LogForwarder, ReqwestClient};
use telemetry_relay::relay::Relay;
use telemetry_relay::sampler::{ProcStatSource, Publisher};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Failed to subscribe to the readings topic.
    #[error("Failed to subscribe to bus: {0}")]
    Subscribe(#[source] BusError),

    /// Failed to start the UDP ingress.
    #[error("Failed to start UDP ingress: {0}")]
    Ingress(#[source] BusError),

    /// Unexpected subscription termination.
    #[error("Bus subscription closed unexpectedly")]
    SubscriptionClosed,
}

/// Runtime options extracted from validated config.
///
/// Holds only the fields needed to assemble the bus and its producers, so
/// the endpoint settings can be handed to the forwarder separately.
struct RuntimeOptions {
    topic: String,
    listen: Option<SocketAddr>,
    bus_capacity: usize,
    device_name: String,
    publish_interval: Duration,
    publish_disabled: bool,
    tolerance: f64,
    dry_run: bool,
}

impl From<&ValidatedConfig> for RuntimeOptions {
    fn from(config: &ValidatedConfig) -> Self {
        Self {
            topic: config.topic.clone(),
            listen: config.listen,
            bus_capacity: config.bus_capacity,
            device_name: config.device_name.clone(),
            publish_interval: config.publish_interval,
            publish_disabled: config.publish_disabled,
            tolerance: config.tolerance,
            dry_run: config.dry_run,
        }
    }
}

/// Executes the main application loop.
///
/// This function:
/// 1. Creates the local bus and subscribes to the readings topic
/// 2. Starts the UDP ingress if a listen address is configured
/// 3. Starts the local CPU publisher unless disabled
/// 4. Creates the forwarder (HTTP, or logging in dry-run mode)
/// 5. Relays messages until a shutdown signal (Ctrl+C / SIGTERM)
///
/// # Errors
///
/// Returns an error if:
/// - The subscription cannot be created
/// - The UDP ingress cannot bind
/// - The subscription terminates unexpectedly
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires:
/// - Real sockets and procfs
/// - Real async runtime with signal handling
#[cfg(not(tarpaulin_include))]
pub async fn execute(config: ValidatedConfig) -> Result<(), RunError> {
    let options = RuntimeOptions::from(&config);

    let bus = LocalBus::with_capacity(options.bus_capacity);
    let subscription = bus
        .subscribe(&options.topic)
        .map_err(RunError::Subscribe)?;
    tracing::info!("Subscribed to {}", options.topic);

    let producers = start_producers(&bus, &options).await?;
    if producers.is_empty() {
        tracing::warn!("No message producers configured; enable the publisher or set a listen address");
    }

    let result = if options.dry_run {
        tracing::info!("Dry-run mode enabled - readings will be logged but not forwarded");
        let relay = build_relay(LogForwarder, options.tolerance);
        run_relay_loop(subscription, relay, shutdown_signal()).await
    } else {
        let relay = build_relay(create_forwarder(&config), options.tolerance);
        run_relay_loop(subscription, relay, shutdown_signal()).await
    };

    for producer in producers {
        producer.abort();
    }

    result
}

/// Starts the optional UDP ingress and local publisher.
///
/// Excluded from coverage - binds sockets and reads procfs.
#[cfg(not(tarpaulin_include))]
async fn start_producers(
    bus: &LocalBus,
    options: &RuntimeOptions,
) -> Result<Vec<JoinHandle<()>>, RunError> {
    let mut producers = Vec::new();

    if let Some(addr) = options.listen {
        let ingress = UdpIngress::bind(addr, bus.clone(), options.topic.as_str())
            .await
            .map_err(RunError::Ingress)?;
        producers.push(tokio::spawn(ingress.run()));
    }

    if options.publish_disabled {
        tracing::info!("Local publisher disabled");
    } else {
        let publisher = Publisher::new(
            ProcStatSource::new(),
            bus.clone(),
            options.topic.as_str(),
            options.device_name.as_str(),
        )
        .with_interval(options.publish_interval);
        producers.push(tokio::spawn(publisher.run()));
    }

    Ok(producers)
}

/// Creates the HTTP forwarder from configuration.
fn create_forwarder(config: &ValidatedConfig) -> HttpForwarder<ReqwestClient> {
    HttpForwarder::new(ReqwestClient::new(), config.url.clone())
        .with_method(config.method.clone())
        .with_headers(config.headers.clone())
        .with_timeout(config.forward_timeout)
        .with_retry_policy(config.retry_policy.clone())
}

/// Wraps a forwarder in a fresh filter and relay.
fn build_relay<F: Forwarder>(forwarder: F, tolerance: f64) -> Arc<Relay<F>> {
    let filter = ChangeFilter::new(FilterState::new(), forwarder).with_tolerance(tolerance);
    Arc::new(Relay::new(filter))
}

/// Delivers every message from `messages` to the relay until `shutdown`
/// completes.
///
/// Each message is handled on its own task so a slow forward never stalls
/// delivery. In-flight messages are drained before returning.
///
/// # Errors
///
/// Returns [`RunError::SubscriptionClosed`] if the message stream ends
/// before shutdown.
async fn run_relay_loop<S, F>(
    mut messages: S,
    relay: Arc<Relay<F>>,
    shutdown: impl Future<Output = ()>,
) -> Result<(), RunError>
where
    S: Stream<Item = BusMessage> + Unpin,
    F: Forwarder + 'static,
{
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                tracing::info!("Shutdown signal received, stopping...");
                break Ok(());
            }

            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}

            message = messages.next() => {
                match message {
                    Some(message) => {
                        let relay = Arc::clone(&relay);
                        in_flight.spawn(async move {
                            relay.on_message(message).await;
                        });
                    }
                    None => break Err(RunError::SubscriptionClosed),
                }
            }
        }
    };

    if !in_flight.is_empty() {
        tracing::info!("Waiting for {} in-flight message(s)", in_flight.len());
        while in_flight.join_next().await.is_some() {}
    }

    result
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
