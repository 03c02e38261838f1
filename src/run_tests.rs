//! Tests for the run module.

use super::*;

use std::sync::Mutex;

use serde_json::json;
use telemetry_relay::forward::ForwardError;
use telemetry_relay::reading::DeviceReading;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct RecordingForwarder {
    forwarded: Mutex<Vec<DeviceReading>>,
}

impl Forwarder for RecordingForwarder {
    async fn forward(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
        self.forwarded.lock().unwrap().push(reading.clone());
        Ok(())
    }
}

fn forwarded(relay: &Relay<RecordingForwarder>) -> Vec<DeviceReading> {
    relay.filter().forwarder().forwarded.lock().unwrap().clone()
}

fn reading(device: &str, cpu: f64, timestamp: &str) -> BusMessage {
    BusMessage::Json(json!({"device_name": device, "cpu": cpu, "timestamp": timestamp}))
}

mod run_error {
    use super::*;

    #[test]
    fn subscription_closed_displays_message() {
        let error = RunError::SubscriptionClosed;
        assert_eq!(error.to_string(), "Bus subscription closed unexpectedly");
    }

    #[test]
    fn subscribe_displays_source() {
        let bus_error = telemetry_relay::bus::validate_topic("").unwrap_err();
        let error = RunError::Subscribe(bus_error);
        assert_eq!(
            error.to_string(),
            "Failed to subscribe to bus: Invalid topic '': must not be empty"
        );
    }

    #[test]
    fn ingress_exposes_source() {
        let bus_error = telemetry_relay::bus::validate_topic("a b").unwrap_err();
        let error = RunError::Ingress(bus_error);
        assert!(error.to_string().contains("Failed to start UDP ingress"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn debug_format_works() {
        let error = RunError::SubscriptionClosed;
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("SubscriptionClosed"));
    }
}

mod runtime_options {
    use super::*;
    use telemetry_relay::config::Cli;

    fn make_test_config() -> ValidatedConfig {
        let cli = Cli::parse_from_iter([
            "telemetry-relay",
            "--endpoint",
            "https://ingest.example.com/metrics",
            "--topic",
            "site/b/cpu",
            "--listen",
            "127.0.0.1:7878",
            "--device-name",
            "edge-2",
            "--publish-interval",
            "5",
            "--tolerance",
            "0.25",
            "--dry-run",
            "--no-publish",
        ]);
        ValidatedConfig::from_raw(&cli, None).unwrap()
    }

    #[test]
    fn from_config_extracts_bus_settings() {
        let options = RuntimeOptions::from(&make_test_config());

        assert_eq!(options.topic, "site/b/cpu");
        assert_eq!(options.listen, Some("127.0.0.1:7878".parse().unwrap()));
        assert_eq!(options.bus_capacity, 256);
    }

    #[test]
    fn from_config_extracts_publisher_settings() {
        let options = RuntimeOptions::from(&make_test_config());

        assert_eq!(options.device_name, "edge-2");
        assert_eq!(options.publish_interval, Duration::from_secs(5));
        assert!(options.publish_disabled);
    }

    #[test]
    fn from_config_extracts_tolerance_and_dry_run() {
        let options = RuntimeOptions::from(&make_test_config());

        assert!((options.tolerance - 0.25).abs() < f64::EPSILON);
        assert!(options.dry_run);
    }

    #[test]
    fn defaults_when_not_specified() {
        let cli = Cli::parse_from_iter([
            "telemetry-relay",
            "--endpoint",
            "https://ingest.example.com/metrics",
        ]);
        let config = ValidatedConfig::from_raw(&cli, None).unwrap();
        let options = RuntimeOptions::from(&config);

        assert_eq!(options.topic, "iot/metrics/cpu");
        assert_eq!(options.listen, None);
        assert_eq!(options.device_name, "local-device");
        assert_eq!(options.publish_interval, Duration::from_secs(2));
        assert!(!options.publish_disabled);
        assert!((options.tolerance - 0.01).abs() < f64::EPSILON);
        assert!(!options.dry_run);
    }
}

mod relay_loop {
    use super::*;

    fn relay() -> Arc<Relay<RecordingForwarder>> {
        build_relay(RecordingForwarder::default(), 0.01)
    }

    #[tokio::test]
    async fn forwards_changes_and_stops_on_shutdown() {
        let bus = LocalBus::new();
        let subscription = bus.subscribe("iot/metrics/cpu").unwrap();
        let relay = relay();
        let (stop, stopped) = oneshot::channel::<()>();

        bus.publish("iot/metrics/cpu", reading("d1", 10.0, "t1"))
            .unwrap();

        let handle = tokio::spawn(run_relay_loop(subscription, Arc::clone(&relay), async move {
            let _ = stopped.await;
        }));

        while forwarded(&relay).is_empty() {
            tokio::task::yield_now().await;
        }
        stop.send(()).unwrap();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(
            forwarded(&relay),
            vec![DeviceReading::new("d1", 10.0, "t1").unwrap()]
        );
    }

    #[tokio::test]
    async fn closed_subscription_returns_error() {
        let bus = LocalBus::new();
        let subscription = bus.subscribe("iot/metrics/cpu").unwrap();
        drop(bus);

        let result = run_relay_loop(subscription, relay(), std::future::pending()).await;

        assert!(matches!(result, Err(RunError::SubscriptionClosed)));
    }

    #[tokio::test]
    async fn in_flight_messages_finish_before_return() {
        let bus = LocalBus::new();
        let subscription = bus.subscribe("iot/metrics/cpu").unwrap();
        let relay = relay();

        bus.publish("iot/metrics/cpu", reading("d1", 10.0, "t1"))
            .unwrap();
        bus.publish("iot/metrics/cpu", reading("d2", 20.0, "t1"))
            .unwrap();
        drop(bus);

        let result = run_relay_loop(subscription, Arc::clone(&relay), std::future::pending()).await;

        assert!(matches!(result, Err(RunError::SubscriptionClosed)));
        assert_eq!(forwarded(&relay).len(), 2);
    }

    #[tokio::test]
    async fn invalid_messages_do_not_stop_the_loop() {
        let bus = LocalBus::new();
        let subscription = bus.subscribe("iot/metrics/cpu").unwrap();
        let relay = relay();

        bus.publish("iot/metrics/cpu", BusMessage::Binary(b"not json".to_vec()))
            .unwrap();
        bus.publish("iot/metrics/cpu", BusMessage::Json(json!({"cpu": 1.0})))
            .unwrap();
        bus.publish("iot/metrics/cpu", reading("d1", 42.0, "t9"))
            .unwrap();
        drop(bus);

        let result = run_relay_loop(subscription, Arc::clone(&relay), std::future::pending()).await;

        assert!(matches!(result, Err(RunError::SubscriptionClosed)));
        assert_eq!(
            forwarded(&relay),
            vec![DeviceReading::new("d1", 42.0, "t9").unwrap()]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_forward_once() {
        let bus = LocalBus::new();
        let subscription = bus.subscribe("iot/metrics/cpu").unwrap();
        let relay = relay();

        for _ in 0..32 {
            bus.publish("iot/metrics/cpu", reading("d1", 55.5, "t1"))
                .unwrap();
        }
        drop(bus);

        let result = run_relay_loop(subscription, Arc::clone(&relay), std::future::pending()).await;

        assert!(matches!(result, Err(RunError::SubscriptionClosed)));
        assert_eq!(forwarded(&relay).len(), 1);
    }
}
