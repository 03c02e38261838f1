//! Tests for `RetryPolicy`.

use super::RetryPolicy;
use std::time::Duration;

mod defaults {
    use super::*;

    #[test]
    fn new_uses_documented_defaults() {
        let policy = RetryPolicy::new();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert!((policy.multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn no_retry_makes_single_attempt() {
        let policy = RetryPolicy::no_retry();

        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1));
    }
}

mod builder {
    use super::*;

    #[test]
    fn setters_chain() {
        let policy = RetryPolicy::new()
            .with_max_attempts(6)
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(3))
            .with_multiplier(1.5);

        assert_eq!(policy.max_attempts, 6);
        assert_eq!(policy.initial_delay, Duration::from_millis(200));
        assert_eq!(policy.max_delay, Duration::from_secs(3));
        assert!((policy.multiplier - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "max_attempts must be at least 1")]
    fn zero_attempts_panics() {
        let _ = RetryPolicy::new().with_max_attempts(0);
    }

    #[test]
    #[should_panic(expected = "multiplier must be positive")]
    fn zero_multiplier_panics() {
        let _ = RetryPolicy::new().with_multiplier(0.0);
    }

    #[test]
    #[should_panic(expected = "multiplier must be positive")]
    fn infinite_multiplier_panics() {
        let _ = RetryPolicy::new().with_multiplier(f64::INFINITY);
    }
}

mod delay_for_retry {
    use super::*;

    #[test]
    fn grows_geometrically() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(60));

        assert_eq!(policy.delay_for_retry(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(4));
    }

    #[test]
    fn is_capped_at_max_delay() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_secs(3))
            .with_max_delay(Duration::from_secs(10));

        // 3 * 2^2 = 12 -> 10
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn zero_initial_delay_stays_zero() {
        let policy = RetryPolicy::new().with_initial_delay(Duration::ZERO);

        assert_eq!(policy.delay_for_retry(5), Duration::ZERO);
    }
}

mod should_retry {
    use super::*;

    #[test]
    fn allows_attempts_below_max() {
        let policy = RetryPolicy::new().with_max_attempts(3);

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }
}
