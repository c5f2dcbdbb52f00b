//! Retrying executor with classified errors and exponential backoff.
//!
//! The executor governs timing and control only. Whether a retried
//! operation is safe to repeat is the caller's concern.

use crate::cancellation::CancellationToken;
use crate::core::AttemptRecord;
use crate::errors::{ConfigErrorCode, ConfigurationError};
use crate::events::{types, EventSink, NoOpEventSink};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Message fragments that mark an error as transient by default.
pub const DEFAULT_RETRY_KEYWORDS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "resource exhausted",
    "timeout",
    "timed out",
    "deadline",
    "unavailable",
    "429",
    "503",
];

/// Decides whether an error message describes a transient failure.
pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    /// Returns true if the error is worth retrying.
    fn is_retryable(&self, message: &str) -> bool;
}

/// Classifies errors by case-insensitive substring match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_KEYWORDS.iter().copied())
    }
}

impl KeywordClassifier {
    /// Creates a classifier from a keyword set.
    #[must_use]
    pub fn new(keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }

    /// Adds a keyword.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into().to_lowercase());
        self
    }

    /// Returns the keywords.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl ErrorClassifier for KeywordClassifier {
    fn is_retryable(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }
}

/// Classifies errors with a closure.
pub struct FnClassifier<F>(pub F)
where
    F: Fn(&str) -> bool + Send + Sync;

impl<F> fmt::Debug for FnClassifier<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnClassifier")
    }
}

impl<F> ErrorClassifier for FnClassifier<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_retryable(&self, message: &str) -> bool {
        (self.0)(message)
    }
}

/// Jitter applied on top of the computed backoff.
///
/// Jittered delays never drop below the previous attempt's delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Deterministic delays.
    #[default]
    None,
    /// Random from 0 to the delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of calls, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Multiplier applied per further failure.
    pub growth_factor: u32,
    /// Optional ceiling for any single delay.
    pub max_delay: Option<Duration>,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
    classifier: Arc<dyn ErrorClassifier>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            growth_factor: 2,
            max_delay: None,
            jitter: JitterStrategy::None,
            classifier: Arc::new(KeywordClassifier::default()),
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy: 3 attempts, 2s base delay, growth 2.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the growth factor.
    #[must_use]
    pub fn with_growth_factor(mut self, factor: u32) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Caps every delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the error classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Returns the error classifier.
    #[must_use]
    pub fn classifier(&self) -> &Arc<dyn ErrorClassifier> {
        &self.classifier
    }

    /// Checks the policy is usable.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `max_attempts` or `growth_factor`
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts < 1 {
            return Err(ConfigurationError::new(
                ConfigErrorCode::InvalidRetryPolicy,
                format!("max_attempts must be at least 1, got {}", self.max_attempts),
            ));
        }
        if self.growth_factor < 1 {
            return Err(ConfigurationError::new(
                ConfigErrorCode::InvalidRetryPolicy,
                "growth_factor must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the deterministic delay after failed attempt `attempt`
    /// (1-indexed): `base * growth^(attempt - 1)`, capped by `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay = self
            .growth_factor
            .checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Returns true if the policy's classifier considers `message` transient.
    #[must_use]
    pub fn is_retryable(&self, message: &str) -> bool {
        self.classifier.is_retryable(message)
    }

    fn jittered_delay(&self, attempt: u32, previous: Duration) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let jittered = match self.jitter {
            JitterStrategy::None => return delay,
            JitterStrategy::Full if millis > 0 => rand::thread_rng().gen_range(0..=millis),
            JitterStrategy::Equal if millis > 1 => {
                let half = millis / 2;
                half + rand::thread_rng().gen_range(0..=half)
            }
            _ => millis,
        };
        Duration::from_millis(jittered).max(previous)
    }
}

/// Why the executor gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// Every allowed attempt failed with a retryable error.
    Exhausted,
    /// An attempt failed with a non-retryable error.
    Fatal,
    /// The cancellation signal was observed between attempts.
    Cancelled,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "retries exhausted"),
            Self::Fatal => write!(f, "fatal error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The executor's terminal failure.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{reason} after {} attempt(s): {last_error}", .attempts.len())]
pub struct TerminalError {
    /// Classification of the failure.
    pub reason: TerminalReason,
    /// The last underlying error, or the cancel reason.
    pub last_error: String,
    /// The full attempt log.
    pub attempts: Vec<AttemptRecord>,
}

impl TerminalError {
    /// Returns the number of attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns true if the executor stopped because of cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason == TerminalReason::Cancelled
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("reason".to_string(), serde_json::json!(self.reason));
        map.insert("last_error".to_string(), serde_json::json!(self.last_error));
        map.insert("attempt_count".to_string(), serde_json::json!(self.attempts.len()));
        map.insert("attempts".to_string(), serde_json::json!(self.attempts));
        map
    }
}

/// A successful result together with the attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    /// The operation's value.
    pub value: T,
    /// The attempt log, ending with the success record.
    pub attempts: Vec<AttemptRecord>,
}

/// Runs an operation under a [`RetryPolicy`].
#[derive(Clone)]
pub struct RetryingExecutor {
    policy: RetryPolicy,
    operation: String,
    event_sink: Arc<dyn EventSink>,
}

impl fmt::Debug for RetryingExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingExecutor")
            .field("policy", &self.policy)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl RetryingExecutor {
    /// Creates an executor after validating the policy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for an unusable policy.
    pub fn new(policy: RetryPolicy) -> Result<Self, ConfigurationError> {
        policy.validate()?;
        Ok(Self {
            policy,
            operation: "operation".to_string(),
            event_sink: Arc::new(NoOpEventSink),
        })
    }

    /// Names the operation in logs and events.
    #[must_use]
    pub fn with_operation(mut self, name: impl Into<String>) -> Self {
        self.operation = name.into();
        self
    }

    /// Emits `retry.*` events to the given sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `operation` until it succeeds, fails fatally, runs out of
    /// attempts or is cancelled.
    ///
    /// `operation` receives the 1-indexed attempt number. Cancellation is
    /// checked before every attempt and interrupts a backoff sleep.
    ///
    /// # Errors
    ///
    /// Returns a `TerminalError` carrying the full attempt log.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationToken,
    ) -> Result<Retried<T>, TerminalError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut previous_delay = Duration::ZERO;
        let mut last_error = String::new();
        let mut attempt = 0u32;

        loop {
            if let Err(cancelled) = cancel.check() {
                return Err(self.cancelled(cancelled.reason, last_error, attempts));
            }

            attempt += 1;
            let error = match operation(attempt).await {
                Ok(value) => {
                    attempts.push(AttemptRecord::success(attempt));
                    debug!(operation = %self.operation, attempt, "Attempt succeeded");
                    return Ok(Retried { value, attempts });
                }
                Err(e) => e.to_string(),
            };

            let retryable = self.policy.is_retryable(&error);
            if !retryable || attempt >= self.policy.max_attempts {
                attempts.push(AttemptRecord::fatal(attempt, &error));
                let reason = if retryable {
                    TerminalReason::Exhausted
                } else {
                    TerminalReason::Fatal
                };
                warn!(
                    operation = %self.operation,
                    attempt,
                    reason = %reason,
                    error = %error,
                    "Giving up"
                );
                self.event_sink.emit(
                    types::RETRY_EXHAUSTED,
                    Some(serde_json::json!({
                        "operation": self.operation,
                        "reason": reason,
                        "attempts": attempt,
                        "error": error,
                    })),
                );
                return Err(TerminalError {
                    reason,
                    last_error: error,
                    attempts,
                });
            }

            let delay = self.policy.jittered_delay(attempt, previous_delay);
            previous_delay = delay;
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            attempts.push(AttemptRecord::retryable(attempt, &error, delay_ms));
            info!(
                operation = %self.operation,
                attempt,
                delay_ms,
                error = %error,
                "Retryable failure, backing off"
            );
            self.event_sink.emit(
                types::RETRY_ATTEMPT,
                Some(serde_json::json!({
                    "operation": self.operation,
                    "attempt": attempt,
                    "delay_ms": delay_ms,
                    "error": error,
                })),
            );
            last_error = error;

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    let reason = cancel.reason().unwrap_or_default();
                    return Err(self.cancelled(reason, last_error, attempts));
                }
            }
        }
    }

    fn cancelled(
        &self,
        reason: String,
        last_error: String,
        attempts: Vec<AttemptRecord>,
    ) -> TerminalError {
        info!(operation = %self.operation, reason = %reason, "Retry loop cancelled");
        let last_error = if last_error.is_empty() {
            format!("cancelled: {reason}")
        } else {
            last_error
        };
        TerminalError {
            reason: TerminalReason::Cancelled,
            last_error,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttemptOutcome;
    use crate::events::CollectingEventSink;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, secs(2));
        assert_eq!(policy.growth_factor, 2);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_backoff_is_exactly_2_4_8() {
        let policy = RetryPolicy::new();
        let delays: Vec<Duration> = (1..=4).map(|n| policy.delay_for_attempt(n)).collect();
        assert_eq!(delays, vec![secs(2), secs(4), secs(8), secs(16)]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_backoff_cap() {
        let policy = RetryPolicy::new().with_max_delay(secs(5));
        assert_eq!(policy.delay_for_attempt(2), secs(4));
        assert_eq!(policy.delay_for_attempt(3), secs(5));
        assert_eq!(policy.delay_for_attempt(40), secs(5));
    }

    #[test]
    fn test_backoff_saturates_without_cap() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.delay_for_attempt(200), Duration::MAX);
    }

    #[test]
    fn test_jitter_stays_monotonic() {
        let policy = RetryPolicy::new().with_jitter(JitterStrategy::Full);
        let mut previous = Duration::ZERO;
        for attempt in 1..=6 {
            let delay = policy.jittered_delay(attempt, previous);
            assert!(delay >= previous);
            assert!(delay <= policy.delay_for_attempt(attempt).max(previous));
            previous = delay;
        }
    }

    #[test]
    fn test_zero_attempts_is_a_configuration_error() {
        let err = RetryPolicy::new().with_max_attempts(0).validate().unwrap_err();
        assert_eq!(err.code, ConfigErrorCode::InvalidRetryPolicy);
        assert!(RetryingExecutor::new(RetryPolicy::new().with_max_attempts(0)).is_err());
        assert!(RetryPolicy::new().with_growth_factor(0).validate().is_err());
    }

    #[test]
    fn test_keyword_classifier() {
        let classifier = KeywordClassifier::default();
        assert!(classifier.is_retryable("429 Too Many Requests"));
        assert!(classifier.is_retryable("Quota exceeded for aiplatform.googleapis.com"));
        assert!(classifier.is_retryable("Service UNAVAILABLE"));
        assert!(!classifier.is_retryable("Permission denied on project"));
        assert!(!classifier.is_retryable("404 Not Found"));

        let custom = KeywordClassifier::new(["Busy"]);
        assert!(custom.is_retryable("server busy"));
        assert!(!custom.is_retryable("rate limit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let executor = RetryingExecutor::new(RetryPolicy::new()).unwrap();
        let token = CancellationToken::new();

        let result = executor
            .execute(|_| async { Ok::<_, String>(42) }, &token)
            .await
            .unwrap();

        assert_eq!(result.value, 42);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_retryable_produces_three_records() {
        let executor = RetryingExecutor::new(RetryPolicy::new()).unwrap();
        let token = CancellationToken::new();
        let start = tokio::time::Instant::now();

        let err = executor
            .execute(|_| async { Err::<(), _>("429 rate limit exceeded") }, &token)
            .await
            .unwrap_err();

        assert_eq!(err.reason, TerminalReason::Exhausted);
        assert_eq!(err.attempt_count(), 3);
        let outcomes: Vec<AttemptOutcome> = err.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::RetryableFailure,
                AttemptOutcome::RetryableFailure,
                AttemptOutcome::FatalFailure,
            ]
        );
        let delays: Vec<Option<u64>> = err.attempts.iter().map(|a| a.delay_ms).collect();
        assert_eq!(delays, vec![Some(2000), Some(4000), None]);
        assert_eq!(start.elapsed(), secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_short_circuits() {
        let executor = RetryingExecutor::new(RetryPolicy::new()).unwrap();
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let err = executor
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("403 permission denied") }
                },
                &token,
            )
            .await
            .unwrap_err();

        assert_eq!(err.reason, TerminalReason::Fatal);
        assert_eq!(err.attempt_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.last_error, "403 permission denied");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retries() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = RetryingExecutor::new(RetryPolicy::new())
            .unwrap()
            .with_operation("deploy")
            .with_event_sink(sink.clone());
        let token = CancellationToken::new();

        let result = executor
            .execute(
                |attempt| async move {
                    if attempt < 3 {
                        Err(format!("rate limit on attempt {attempt}"))
                    } else {
                        Ok("resource-1")
                    }
                },
                &token,
            )
            .await
            .unwrap();

        assert_eq!(result.value, "resource-1");
        assert_eq!(result.attempts.len(), 3);
        assert!(result.attempts[2].is_success());
        assert_eq!(sink.events_of_type(types::RETRY_ATTEMPT).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_attempt() {
        let executor = RetryingExecutor::new(RetryPolicy::new()).unwrap();
        let token = CancellationToken::new();
        token.cancel("shutdown");

        let err = executor
            .execute(|_| async { Ok::<_, String>(1) }, &token)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(err.attempts.is_empty());
        assert_eq!(err.last_error, "cancelled: shutdown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let executor = RetryingExecutor::new(RetryPolicy::new()).unwrap();
        let token = Arc::new(CancellationToken::new());

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(secs(1)).await;
            canceller.cancel("user abort");
        });

        let err = executor
            .execute(|_| async { Err::<(), _>("timeout") }, &token)
            .await
            .unwrap_err();

        assert_eq!(err.reason, TerminalReason::Cancelled);
        assert_eq!(err.attempt_count(), 1);
        assert_eq!(err.attempts[0].outcome, AttemptOutcome::RetryableFailure);
        assert_eq!(err.last_error, "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier() {
        let policy = RetryPolicy::new()
            .with_max_attempts(2)
            .with_classifier(FnClassifier(|msg: &str| msg.starts_with("E_RETRY")));
        let executor = RetryingExecutor::new(policy).unwrap();
        let token = CancellationToken::new();

        let err = executor
            .execute(|_| async { Err::<(), _>("E_RETRY busy") }, &token)
            .await
            .unwrap_err();
        assert_eq!(err.reason, TerminalReason::Exhausted);
        assert_eq!(err.attempt_count(), 2);
    }
}
