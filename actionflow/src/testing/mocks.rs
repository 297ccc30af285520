//! Recording mocks for the upload collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

use crate::files::{
    DestinationProvider, PublishAck, PublishFileMessage, Publisher, TransferExecutor,
    TransferRequest, UploadDestination,
};

/// Fails a fixed number of times before succeeding.
#[derive(Debug, Default)]
struct FailureScript {
    remaining: Mutex<usize>,
    message: String,
}

impl FailureScript {
    fn failing(times: usize, message: impl Into<String>) -> Self {
        Self {
            remaining: Mutex::new(times),
            message: message.into(),
        }
    }

    fn next(&self) -> anyhow::Result<()> {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return Ok(());
        }
        *remaining = remaining.saturating_sub(1);
        Err(anyhow::anyhow!(self.message.clone()))
    }
}

/// A destination provider returning a scripted destination.
#[derive(Debug, Default)]
pub struct MockDestinationProvider {
    destination: Option<UploadDestination>,
    script: FailureScript,
    /// Outcomes served before falling back to `destination`.
    queued: Mutex<VecDeque<Result<UploadDestination, String>>>,
    hang: bool,
    started: Notify,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockDestinationProvider {
    /// Always returns `destination`.
    #[must_use]
    pub fn returning(destination: UploadDestination) -> Self {
        Self {
            destination: Some(destination),
            ..Self::default()
        }
    }

    /// Fails on every call.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            script: FailureScript::failing(usize::MAX, message),
            ..Self::default()
        }
    }

    /// Serves `outcomes` in order, one per call, then fails.
    #[must_use]
    pub fn sequence(outcomes: Vec<Result<UploadDestination, String>>) -> Self {
        Self {
            queued: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    /// Never completes; only cancellation ends a call.
    #[must_use]
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Resolves once a request has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Returns the number of destination requests.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the `(channel, file_name)` pairs requested.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DestinationProvider for MockDestinationProvider {
    async fn request_destination(
        &self,
        channel: &str,
        file_name: &str,
    ) -> anyhow::Result<UploadDestination> {
        self.requests
            .lock()
            .push((channel.to_string(), file_name.to_string()));
        self.started.notify_one();
        if self.hang {
            std::future::pending::<()>().await;
        }
        let queued = self.queued.lock().pop_front();
        if let Some(outcome) = queued {
            return outcome.map_err(|message| anyhow::anyhow!(message));
        }
        self.script.next()?;
        self.destination
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no destination scripted"))
    }
}

/// A transfer executor that records requests.
#[derive(Debug, Default)]
pub struct MockTransferExecutor {
    script: FailureScript,
    hang: bool,
    started: Notify,
    requests: Mutex<Vec<TransferRequest>>,
}

impl MockTransferExecutor {
    /// Succeeds on every call.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Fails the first `times` calls, then succeeds.
    #[must_use]
    pub fn failing_times(times: usize, message: impl Into<String>) -> Self {
        Self {
            script: FailureScript::failing(times, message),
            ..Self::default()
        }
    }

    /// Never completes; only cancellation ends a call.
    #[must_use]
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Resolves once a transfer has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Returns the number of transfers attempted.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the recorded transfer requests.
    #[must_use]
    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TransferExecutor for MockTransferExecutor {
    async fn transfer(&self, request: TransferRequest) -> anyhow::Result<()> {
        self.requests.lock().push(request);
        self.started.notify_one();
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.script.next()
    }
}

/// A publisher acknowledging with a fixed timetoken.
#[derive(Debug, Default)]
pub struct MockPublisher {
    timetoken: i64,
    script: FailureScript,
    hang: bool,
    started: Notify,
    messages: Mutex<Vec<PublishFileMessage>>,
}

impl MockPublisher {
    /// Acknowledges every message with `timetoken`.
    #[must_use]
    pub fn acknowledging(timetoken: i64) -> Self {
        Self {
            timetoken,
            ..Self::default()
        }
    }

    /// Fails the first `times` calls, then acknowledges with `timetoken`.
    #[must_use]
    pub fn failing_times(times: usize, message: impl Into<String>, timetoken: i64) -> Self {
        Self {
            timetoken,
            script: FailureScript::failing(times, message),
            ..Self::default()
        }
    }

    /// Never completes; only cancellation ends a call.
    #[must_use]
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Resolves once a publish has started.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Returns the number of publish attempts.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns the published messages.
    #[must_use]
    pub fn messages(&self) -> Vec<PublishFileMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish_file_message(&self, message: PublishFileMessage) -> anyhow::Result<PublishAck> {
        self.messages.lock().push(message);
        self.started.notify_one();
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.script.next()?;
        Ok(PublishAck {
            timetoken: self.timetoken,
        })
    }
}
