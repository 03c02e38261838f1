//! Tests for `ChangeFilter`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use super::{ChangeFilter, EPSILON, FilterState, ForwardDecision};
use crate::forward::{ForwardError, Forwarder, HttpError, RetryableError};
use crate::reading::DeviceReading;

/// Forwarder that records every reading and can be switched to fail.
#[derive(Debug, Default)]
struct RecordingForwarder {
    forwarded: Mutex<Vec<DeviceReading>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingForwarder {
    fn failing() -> Self {
        let forwarder = Self::default();
        forwarder.failing.store(true, Ordering::SeqCst);
        forwarder
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn values(&self) -> Vec<f64> {
        self.forwarded
            .lock()
            .unwrap()
            .iter()
            .map(DeviceReading::metric_value)
            .collect()
    }
}

impl Forwarder for RecordingForwarder {
    async fn forward(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ForwardError::MaxRetriesExceeded {
                attempts: 1,
                last_error: RetryableError::Http(HttpError::Timeout),
            });
        }
        self.forwarded.lock().unwrap().push(reading.clone());
        Ok(())
    }
}

fn reading(device: &str, value: f64) -> DeviceReading {
    DeviceReading::new(device, value, "t").unwrap()
}

fn filter() -> ChangeFilter<RecordingForwarder> {
    ChangeFilter::new(FilterState::new(), RecordingForwarder::default())
}

mod decisions {
    use super::*;

    #[tokio::test]
    async fn first_reading_is_forwarded_and_recorded() {
        let filter = filter();

        let decision = filter.handle(&reading("d1", 12.3)).await;

        assert_eq!(decision, ForwardDecision::Forwarded);
        assert_eq!(filter.state().last_value("d1"), Some(12.3));
        assert_eq!(filter.forwarder().values(), vec![12.3]);
    }

    #[tokio::test]
    async fn first_reading_for_any_value_is_forwarded() {
        let filter = filter();

        for (i, value) in [0.0, -3.5, 100.0, 1e-9].into_iter().enumerate() {
            let decision = filter.handle(&reading(&format!("dev-{i}"), value)).await;
            assert_eq!(decision, ForwardDecision::Forwarded);
        }
        assert_eq!(filter.state().len(), 4);
    }

    #[tokio::test]
    async fn unchanged_reading_is_suppressed_without_forwarding() {
        let filter = filter();
        filter.handle(&reading("d1", 12.3)).await;

        let decision = filter.handle(&reading("d1", 12.3)).await;

        assert_eq!(decision, ForwardDecision::Suppressed);
        assert_eq!(filter.forwarder().calls(), 1);
    }

    #[tokio::test]
    async fn tolerance_boundary() {
        let filter = filter();
        filter.handle(&reading("d1", 0.0)).await;

        assert_eq!(
            filter.handle(&reading("d1", 0.01)).await,
            ForwardDecision::Suppressed
        );
        assert_eq!(
            filter.handle(&reading("d1", 0.010_000_1)).await,
            ForwardDecision::Forwarded
        );
        assert_eq!(filter.state().last_value("d1"), Some(0.010_000_1));
    }

    #[tokio::test]
    async fn custom_tolerance_is_applied() {
        let filter = ChangeFilter::new(FilterState::new(), RecordingForwarder::default())
            .with_tolerance(1.0);
        filter.handle(&reading("d1", 50.0)).await;

        assert_eq!(
            filter.handle(&reading("d1", 50.9)).await,
            ForwardDecision::Suppressed
        );
        assert_eq!(
            filter.handle(&reading("d1", 51.5)).await,
            ForwardDecision::Forwarded
        );
    }

    #[test]
    fn default_tolerance_is_epsilon() {
        assert!((filter().tolerance() - EPSILON).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "tolerance must be a non-negative finite number")]
    fn negative_tolerance_panics() {
        let _ = filter().with_tolerance(-0.1);
    }

    #[test]
    fn committed_outcomes() {
        assert!(ForwardDecision::Forwarded.is_committed());
        assert!(ForwardDecision::ForwardFailed.is_committed());
        assert!(!ForwardDecision::Suppressed.is_committed());
    }
}

mod forward_failures {
    use super::*;

    #[tokio::test]
    async fn failed_forward_still_commits_baseline() {
        let filter = ChangeFilter::new(FilterState::new(), RecordingForwarder::failing());

        let first = filter.handle(&reading("d1", 33.0)).await;
        let repeat = filter.handle(&reading("d1", 33.0)).await;

        assert_eq!(first, ForwardDecision::ForwardFailed);
        assert_eq!(repeat, ForwardDecision::Suppressed);
        assert_eq!(filter.state().last_value("d1"), Some(33.0));
        assert_eq!(filter.forwarder().calls(), 1);
    }

    #[tokio::test]
    async fn change_after_failed_forward_is_forwarded() {
        let filter = ChangeFilter::new(FilterState::new(), RecordingForwarder::failing());
        filter.handle(&reading("d1", 33.0)).await;
        filter.forwarder().failing.store(false, Ordering::SeqCst);

        let decision = filter.handle(&reading("d1", 40.0)).await;

        assert_eq!(decision, ForwardDecision::Forwarded);
        assert_eq!(filter.forwarder().values(), vec![40.0]);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_changes_forward_once() {
        const TASKS: usize = 32;
        let filter = Arc::new(filter());
        filter.handle(&reading("d1", 10.0)).await;

        let tasks: Vec<_> = (0..TASKS)
            .map(|_| {
                let filter = Arc::clone(&filter);
                tokio::spawn(async move { filter.handle(&reading("d1", 90.0)).await })
            })
            .collect();

        let mut decisions = Vec::with_capacity(TASKS);
        for task in tasks {
            decisions.push(task.await.unwrap());
        }

        let forwarded = decisions
            .iter()
            .filter(|d| **d == ForwardDecision::Forwarded)
            .count();
        let suppressed = decisions
            .iter()
            .filter(|d| **d == ForwardDecision::Suppressed)
            .count();

        assert_eq!(forwarded, 1);
        assert_eq!(suppressed, TASKS - 1);
        // One call for the priming reading, one for the change.
        assert_eq!(filter.forwarder().calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_readings_forward_once() {
        const TASKS: usize = 32;
        let filter = Arc::new(filter());

        let tasks: Vec<_> = (0..TASKS)
            .map(|_| {
                let filter = Arc::clone(&filter);
                tokio::spawn(async move { filter.handle(&reading("fresh", 5.0)).await })
            })
            .collect();

        let mut forwarded = 0;
        for task in tasks {
            if task.await.unwrap() == ForwardDecision::Forwarded {
                forwarded += 1;
            }
        }

        assert_eq!(forwarded, 1);
        assert_eq!(filter.forwarder().calls(), 1);
    }

    /// Forwarder that blocks one device until released.
    struct GatedForwarder {
        gated_device: &'static str,
        gate: Notify,
        entered: Notify,
    }

    impl Forwarder for GatedForwarder {
        async fn forward(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
            if reading.device_name() == self.gated_device {
                self.entered.notify_one();
                self.gate.notified().await;
            }
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_forward_does_not_block_other_devices() {
        let filter = Arc::new(ChangeFilter::new(
            FilterState::new(),
            GatedForwarder {
                gated_device: "slow",
                gate: Notify::new(),
                entered: Notify::new(),
            },
        ));

        let slow = {
            let filter = Arc::clone(&filter);
            tokio::spawn(async move { filter.handle(&reading("slow", 1.0)).await })
        };
        filter.forwarder().entered.notified().await;

        // "slow" is mid-forward; other devices must still complete.
        for i in 0..8 {
            let decision = tokio::time::timeout(
                Duration::from_secs(5),
                filter.handle(&reading(&format!("fast-{i}"), 2.0)),
            )
            .await
            .expect("independent device was blocked");
            assert_eq!(decision, ForwardDecision::Forwarded);
        }

        // The slow device's baseline is already visible while it forwards.
        assert_eq!(filter.state().last_value("slow"), Some(1.0));
        assert_eq!(
            filter.handle(&reading("slow", 1.0)).await,
            ForwardDecision::Suppressed
        );

        filter.forwarder().gate.notify_one();
        assert_eq!(slow.await.unwrap(), ForwardDecision::Forwarded);
    }
}

mod end_to_end {
    use super::*;
    use crate::reading::{ValidationError, validate};
    use serde_json::json;

    #[tokio::test]
    async fn scenario_from_change_sequence() {
        let filter = &filter();
        let handle = move |payload: serde_json::Value| async move {
            let reading = validate(&payload)?;
            Ok::<_, ValidationError>(filter.handle(&reading).await)
        };

        assert_eq!(
            handle(json!({"device_name": "d1", "cpu": 12.3, "timestamp": "t1"})).await,
            Ok(ForwardDecision::Forwarded)
        );
        assert_eq!(
            handle(json!({"device_name": "d1", "cpu": 12.305, "timestamp": "t2"})).await,
            Ok(ForwardDecision::Suppressed)
        );
        assert_eq!(
            handle(json!({"device_name": "d1", "cpu": 45.0, "timestamp": "t3"})).await,
            Ok(ForwardDecision::Forwarded)
        );
        assert_eq!(
            handle(json!({"device_name": "d1", "timestamp": "t4"})).await,
            Err(ValidationError::MissingField("cpu"))
        );
        assert_eq!(filter.state().last_value("d1"), Some(45.0));
        assert_eq!(
            handle(json!({"device_name": "d1", "cpu": 45.0, "timestamp": "t5"})).await,
            Ok(ForwardDecision::Suppressed)
        );
        assert_eq!(filter.forwarder().values(), vec![12.3, 45.0]);
    }
}
