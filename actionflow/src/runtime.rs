//! Execution pool used to run remote actions.

use crate::errors::{ActionResult, RemoteError};
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::JoinHandle;

/// A caller-supplied pool of workers backed by a tokio runtime.
///
/// Asynchronous calls are spawned onto the pool; blocking calls park the
/// calling thread until the pool has driven the future to completion.
#[derive(Debug, Clone)]
pub struct ExecutionPool {
    handle: Handle,
}

impl ExecutionPool {
    /// Wraps an existing runtime handle.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on, if any.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from_handle)
    }

    /// Returns the underlying runtime handle.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a work item onto the pool.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Blocks the calling thread until `future` completes.
    ///
    /// From inside a multi-threaded runtime the current worker is handed
    /// off with `block_in_place`. A current-thread runtime cannot be
    /// blocked from within, so that case is rejected.
    pub fn block_on<F>(&self, future: F) -> ActionResult<F::Output>
    where
        F: Future,
    {
        match Handle::try_current() {
            Err(_) => Ok(self.handle.block_on(future)),
            Ok(current) => match current.runtime_flavor() {
                RuntimeFlavor::CurrentThread => Err(RemoteError::Pool(
                    "cannot block inside a current-thread runtime; use the async entry point"
                        .to_string(),
                )),
                _ => Ok(tokio::task::block_in_place(|| self.handle.block_on(future))),
            },
        }
    }
}
