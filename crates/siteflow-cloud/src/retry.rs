//! Retry with exponential backoff
//!
//! The policy itself is service-agnostic. Callers pass the vocabulary of
//! retryable error names for the service they are calling; an error is
//! retried when its message contains one of them.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Builds a vocabulary from service-specific names plus the shared
/// transport-level failures.
macro_rules! retryable_errors {
    ($($code:literal),* $(,)?) => {
        &[
            $($code,)*
            "ECONNRESET",
            "ETIMEDOUT",
            "ECONNREFUSED",
            "EPIPE",
            "connection reset",
            "timed out",
            "NetworkingError",
            "TimeoutError",
            "RequestTimeout",
        ]
    };
}

/// Transport-level failures worth retrying against any service
pub const NETWORK_RETRYABLE_ERRORS: &[&str] = retryable_errors!();

pub const OBJECT_STORE_RETRYABLE_ERRORS: &[&str] = retryable_errors!(
    "SlowDown",
    "ServiceUnavailable",
    "InternalError",
    "RequestTimeTooSkewed",
    "OperationAborted",
);

pub const CDN_RETRYABLE_ERRORS: &[&str] = retryable_errors!(
    "Throttling",
    "ServiceUnavailable",
    "InternalError",
    "TooManyInvalidationsInProgress",
    "PreconditionFailed",
);

/// `ResourceInUseException` is included because a deleted distribution
/// releases its certificate reference asynchronously.
pub const CERTIFICATE_RETRYABLE_ERRORS: &[&str] = retryable_errors!(
    "ThrottlingException",
    "RequestInProgressException",
    "ResourceInUseException",
    "ServiceUnavailable",
);

pub const DNS_RETRYABLE_ERRORS: &[&str] = retryable_errors!(
    "Throttling",
    "PriorRequestNotComplete",
    "ServiceUnavailable",
    "InternalError",
);

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Retry settings for remote operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(with = "duration_ms")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "duration_ms")]
    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Whether `message` names one of `retryable`. `None` retries everything.
pub fn is_retryable(message: &str, retryable: Option<&[&str]>) -> bool {
    match retryable {
        None => true,
        Some(names) => names.iter().any(|name| message.contains(name)),
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1` (zero-based), saturating at
    /// `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        self.scaled(self.initial_delay, factor)
    }

    /// `delay * factor`, capped at `max_delay`. Overflow, NaN and negative
    /// products all land on the cap.
    fn scaled(&self, delay: Duration, factor: f64) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Reject settings that cannot produce a growing, finite backoff
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(format!(
                "initial retry delay {:?} exceeds max delay {:?}",
                self.initial_delay, self.max_delay
            ));
        }
        Ok(())
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retries are used up. The last error is returned unchanged.
    ///
    /// `on_retry` is called after each backoff sleep with the retry number
    /// (starting at 1), the error that caused it and the delay waited.
    pub async fn run<T, E, F, Fut, O>(
        &self,
        retryable: Option<&[&str]>,
        mut operation: F,
        mut on_retry: O,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        O: FnMut(u32, &E, Duration),
    {
        let mut attempt = 0u32;
        let mut delay = self.initial_delay;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries {
                        tracing::debug!(attempts = attempt + 1, "giving up: {}", err);
                        return Err(err);
                    }
                    if !is_retryable(&err.to_string(), retryable) {
                        tracing::debug!("not retryable: {}", err);
                        return Err(err);
                    }

                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    on_retry(attempt, &err, delay);

                    delay = self.scaled(delay, self.backoff_multiplier);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(10000));
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable("SlowDown: reduce rate", Some(OBJECT_STORE_RETRYABLE_ERRORS)));
        assert!(!is_retryable("AccessDenied", Some(OBJECT_STORE_RETRYABLE_ERRORS)));
        assert!(is_retryable("anything", None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let mut seen = Vec::new();

        let result: Result<&str, String> = policy()
            .run(
                Some(CDN_RETRYABLE_ERRORS),
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n < 3 {
                            Err("Throttling: Rate exceeded".to_string())
                        } else {
                            Ok("done")
                        }
                    }
                },
                |attempt, _err, delay| seen.push((attempt, delay)),
            )
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
        assert_eq!(
            seen,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_capped() {
        let mut delays = Vec::new();
        let result: Result<(), String> = policy()
            .run(
                None,
                || async { Err("boom".to_string()) },
                |_, _, delay| delays.push(delay),
            )
            .await;

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(250),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_propagates_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), String> = policy()
            .run(
                Some(OBJECT_STORE_RETRYABLE_ERRORS),
                || {
                    calls.set(calls.get() + 1);
                    async { Err("AccessDenied".to_string()) }
                },
                |_, _, _| panic!("must not retry"),
            )
            .await;

        assert_eq!(result, Err("AccessDenied".to_string()));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_keep_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), String> = policy()
            .run(
                Some(DNS_RETRYABLE_ERRORS),
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move { Err(format!("Throttling #{n}")) }
                },
                |_, _, _| {},
            )
            .await;

        assert_eq!(calls.get(), 4);
        assert_eq!(result, Err("Throttling #4".to_string()));
    }

    #[test]
    fn test_delay_saturates_for_large_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(70), policy.max_delay);
        assert_eq!(policy.delay_for_attempt(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_validate_rejects_bad_multiplier() {
        assert!(RetryPolicy::default().validate().is_ok());
        for multiplier in [-1.0, 0.5, f64::NAN, f64::INFINITY] {
            let policy = RetryPolicy {
                backoff_multiplier: multiplier,
                ..RetryPolicy::default()
            };
            assert!(policy.validate().is_err(), "{multiplier}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_multiplier_does_not_panic() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"maxRetries":2,"initialDelay":10,"maxDelay":50,"backoffMultiplier":-1}"#)
                .unwrap();
        let mut delays = Vec::new();
        let result: Result<(), String> = policy
            .run(None, || async { Err("boom".to_string()) }, |_, _, delay| {
                delays.push(delay)
            })
            .await;

        assert!(result.is_err());
        assert_eq!(
            delays,
            vec![Duration::from_millis(10), Duration::from_millis(50)]
        );
    }

    #[test]
    fn test_service_vocabularies_include_network_errors() {
        for vocabulary in [
            OBJECT_STORE_RETRYABLE_ERRORS,
            CDN_RETRYABLE_ERRORS,
            CERTIFICATE_RETRYABLE_ERRORS,
            DNS_RETRYABLE_ERRORS,
        ] {
            for name in NETWORK_RETRYABLE_ERRORS {
                assert!(vocabulary.contains(name), "{name}");
            }
        }
        assert!(is_retryable("connection reset by peer", Some(DNS_RETRYABLE_ERRORS)));
    }

    #[test]
    fn test_policy_deserializes_millis() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"maxRetries":5,"initialDelay":500}"#).unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }
}
