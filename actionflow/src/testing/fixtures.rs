//! Fixtures for exercising remote actions and uploads.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::mocks::{MockDestinationProvider, MockPublisher, MockTransferExecutor};
use crate::core::ActionStatus;
use crate::files::{FileDescriptor, UploadDestination, UploadPorts};

/// Builds a multi-threaded runtime for tests that call blocking entry points.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build test runtime")
}

/// Builds a destination for the given file.
#[must_use]
pub fn sample_destination(id: &str, name: &str) -> UploadDestination {
    UploadDestination::new(
        FileDescriptor::new(id, name),
        format!("https://uploads.test/{id}"),
    )
    .with_form_field("key", format!("files/{id}/{name}"))
}

/// The three upload mocks plus the ports built from them.
#[derive(Debug, Clone)]
pub struct UploadHarness {
    /// The destination provider mock.
    pub destinations: Arc<MockDestinationProvider>,
    /// The transfer executor mock.
    pub transfers: Arc<MockTransferExecutor>,
    /// The publisher mock.
    pub publisher: Arc<MockPublisher>,
}

impl UploadHarness {
    /// Creates a harness from the given mocks.
    #[must_use]
    pub fn new(
        destinations: MockDestinationProvider,
        transfers: MockTransferExecutor,
        publisher: MockPublisher,
    ) -> Self {
        Self {
            destinations: Arc::new(destinations),
            transfers: Arc::new(transfers),
            publisher: Arc::new(publisher),
        }
    }

    /// A harness where every collaborator succeeds.
    #[must_use]
    pub fn succeeding(id: &str, name: &str, timetoken: i64) -> Self {
        Self::new(
            MockDestinationProvider::returning(sample_destination(id, name)),
            MockTransferExecutor::succeeding(),
            MockPublisher::acknowledging(timetoken),
        )
    }

    /// Returns ports backed by the mocks.
    #[must_use]
    pub fn ports(&self) -> UploadPorts {
        UploadPorts::new(
            self.destinations.clone(),
            self.transfers.clone(),
            self.publisher.clone(),
        )
    }
}

struct RecorderInner<T> {
    outcomes: Mutex<Vec<Result<T, ActionStatus>>>,
    notify: Notify,
}

/// Collects the outcomes delivered to asynchronous callbacks.
pub struct CallbackRecorder<T> {
    inner: Arc<RecorderInner<T>>,
}

impl<T> Default for CallbackRecorder<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RecorderInner {
                outcomes: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }),
        }
    }
}

impl<T> CallbackRecorder<T>
where
    T: Send + 'static,
{
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback that records into this recorder.
    pub fn callback(&self) -> impl Fn(Result<T, ActionStatus>) + Send + Sync + 'static {
        let inner = self.inner.clone();
        move |outcome| {
            inner.outcomes.lock().push(outcome);
            inner.notify.notify_waiters();
        }
    }

    /// Returns the number of outcomes recorded so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.outcomes.lock().len()
    }

    /// Removes and returns every recorded outcome.
    #[must_use]
    pub fn take(&self) -> Vec<Result<T, ActionStatus>> {
        std::mem::take(&mut *self.inner.outcomes.lock())
    }

    /// Waits until at least `count` outcomes arrived or `timeout` elapsed,
    /// returning the number recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> usize {
        let wait = async {
            loop {
                let notified = self.inner.notify.notified();
                if self.count() >= count {
                    return;
                }
                notified.await;
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.count()
    }
}

impl<T> std::fmt::Debug for CallbackRecorder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRecorder")
            .field("count", &self.inner.outcomes.lock().len())
            .finish()
    }
}
