//! Caller-side retry with backoff and jitter.
//!
//! The engine never retries on its own. These helpers let a caller run an
//! action, and on a stage failure wait and resume it from its checkpoint,
//! up to a configured number of attempts. Validation failures, cancellation
//! and pool errors are returned immediately.

use crate::action::{RemoteAction, RemoteCall};
use crate::errors::{ActionResult, RemoteError};
use crate::files::{SendFile, UploadResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base
    Constant,
}

/// Jitter applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for caller-driven retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum runs, the first one included.
    pub max_attempts: usize,
    /// Base delay between runs in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Returns the delay before the run following `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(exponent)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(exponent).saturating_add(1)),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Only stage failures are worth another run.
fn is_retryable(error: &RemoteError) -> bool {
    error.stage_tag().is_some()
}

/// A call that can run blocking and resume blocking.
pub trait ResumableCall<T> {
    /// Runs from the start.
    fn sync(&self) -> ActionResult<T>;

    /// Resumes from the last checkpoint.
    fn retry_sync(&self) -> ActionResult<T>;
}

impl<T> ResumableCall<T> for RemoteCall<T>
where
    T: Send + 'static,
{
    fn sync(&self) -> ActionResult<T> {
        RemoteCall::sync(self)
    }

    fn retry_sync(&self) -> ActionResult<T> {
        RemoteCall::retry_sync(self)
    }
}

impl ResumableCall<UploadResult> for SendFile {
    fn sync(&self) -> ActionResult<UploadResult> {
        SendFile::sync(self)
    }

    fn retry_sync(&self) -> ActionResult<UploadResult> {
        SendFile::retry_sync(self)
    }
}

/// Runs `call` and resumes it after stage failures, sleeping between runs.
///
/// Blocks the calling thread.
pub fn retry_with_backoff<T, C>(call: &C, config: &RetryConfig) -> ActionResult<T>
where
    C: ResumableCall<T> + ?Sized,
{
    let mut attempt = 0;
    let mut result = call.sync();

    loop {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        attempt += 1;
        if !is_retryable(&error) || attempt >= config.max_attempts {
            return Err(error);
        }

        let delay = config.delay_for(attempt - 1);
        debug!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "resuming after stage failure"
        );
        std::thread::sleep(delay);
        result = call.retry_sync();
    }
}

/// Executes `action` and resumes it after stage failures.
pub async fn with_retry<T, A>(action: &A, config: &RetryConfig) -> ActionResult<T>
where
    A: RemoteAction<T> + ?Sized,
{
    let mut attempt = 0;
    let mut result = action.execute().await;

    loop {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        attempt += 1;
        if !is_retryable(&error) {
            return Err(error);
        }
        if attempt >= config.max_attempts {
            warn!(action = action.name(), attempts = attempt, "retries exhausted");
            return Err(error);
        }

        let delay = config.delay_for(attempt - 1);
        debug!(
            action = action.name(),
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "resuming after stage failure"
        );
        tokio::time::sleep(delay).await;
        result = action.resume().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{FnRemoteAction, RemoteActionExt};
    use crate::files::{ByteSource, ByteSourceStep, ChannelStep, FileNameStep};
    use crate::runtime::ExecutionPool;
    use crate::testing::{
        sample_destination, test_runtime, MockDestinationProvider, MockPublisher,
        MockTransferExecutor, UploadHarness,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn quick() -> RetryConfig {
        RetryConfig::new()
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None)
    }

    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> FnRemoteAction<u32> {
        FnRemoteAction::new("flaky", move || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < failures {
                    Err(anyhow::anyhow!("attempt {attempt} failed"))
                } else {
                    Ok(7)
                }
            }
        })
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_strategy, BackoffStrategy::Exponential);
        assert_eq!(config.jitter_strategy, JitterStrategy::Full);
    }

    #[test]
    fn test_retry_config_deserialize_partial() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_attempts": 5, "jitter_strategy": "equal"}"#).unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.jitter_strategy, JitterStrategy::Equal);
        assert_eq!(config.base_delay_ms, RetryConfig::default().base_delay_ms);
    }

    #[test]
    fn test_delay_exponential_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::None);

        assert_eq!(config.delay_for(0), Duration::from_millis(100));
        assert_eq!(config.delay_for(1), Duration::from_millis(200));
        assert_eq!(config.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_linear_and_constant() {
        let linear = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);
        assert_eq!(linear.delay_for(2), Duration::from_millis(300));

        let constant = linear.with_backoff(BackoffStrategy::Constant);
        assert_eq!(constant.delay_for(5), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(5000)
            .with_jitter(JitterStrategy::None);

        assert_eq!(config.delay_for(10), Duration::from_millis(5000));
        assert_eq!(config.delay_for(usize::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn test_delay_jitter_bounds() {
        let full = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Constant);
        let equal = full.clone().with_jitter(JitterStrategy::Equal);

        for _ in 0..20 {
            assert!(full.delay_for(0) <= Duration::from_millis(100));
            let delay = equal.delay_for(0);
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = flaky(2, calls.clone());

        let value = assert_ok!(with_retry(&action, &quick()).await);

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = flaky(usize::MAX, calls.clone()).shared();

        let err = assert_err!(with_retry(&action, &quick().with_max_attempts(2)).await);

        assert_eq!(err.stage_tag(), Some("flaky"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_skips_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = flaky(0, calls.clone());
        action.silent_cancel();

        let err = assert_err!(with_retry(&action, &quick()).await);

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retry_with_backoff_resumes_upload() {
        let rt = test_runtime();
        let harness = UploadHarness::new(
            MockDestinationProvider::returning(sample_destination("f1", "cat.png")),
            MockTransferExecutor::failing_times(2, "reset by peer"),
            MockPublisher::acknowledging(42),
        );
        let upload = SendFile::builder(harness.ports(), ExecutionPool::from_handle(rt.handle().clone()))
            .channel("room1")
            .file_name("cat.png")
            .byte_source(ByteSource::from(vec![1_u8; 4]));

        let result = assert_ok!(retry_with_backoff(&upload, &quick()));

        assert_eq!(result.timetoken, 42);
        assert_eq!(harness.destinations.call_count(), 1);
        assert_eq!(harness.transfers.call_count(), 3);
    }

    #[test]
    fn test_retry_with_backoff_never_retries_validation() {
        let rt = test_runtime();
        let harness = UploadHarness::succeeding("f1", "cat.png", 1);
        let upload = SendFile::builder(harness.ports(), ExecutionPool::from_handle(rt.handle().clone()))
            .channel("")
            .file_name("cat.png")
            .byte_source(ByteSource::from(vec![1_u8; 4]));

        let err = assert_err!(retry_with_backoff(&upload, &quick()));

        assert!(err.is_validation());
        assert_eq!(harness.destinations.call_count(), 0);
    }

    #[test]
    fn test_retry_with_backoff_on_remote_call() {
        let rt = test_runtime();
        let calls = Arc::new(AtomicUsize::new(0));
        let call = RemoteCall::new(
            flaky(1, calls.clone()).shared(),
            ExecutionPool::from_handle(rt.handle().clone()),
        );

        assert_eq!(assert_ok!(retry_with_backoff(&call, &quick())), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
