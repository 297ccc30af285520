//! Blocking and callback-based entry points for a remote action.

use super::SharedAction;
use crate::core::ActionStatus;
use crate::errors::ActionResult;
use crate::runtime::ExecutionPool;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Callback receiving the outcome of an asynchronous call.
pub type Callback<T> = Arc<dyn Fn(Result<T, ActionStatus>) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Mode {
    Execute,
    Resume,
}

struct CallState<T> {
    callback: Option<Callback<T>>,
    task: Option<JoinHandle<()>>,
}

/// Drives a [`RemoteAction`](super::RemoteAction) for callers.
///
/// `sync` blocks on the execution pool, `call_async` returns immediately
/// and reports through the callback exactly once, `retry` resumes the
/// action from its checkpoint and reports to the last callback, and
/// `silent_cancel` stops everything without a report.
pub struct RemoteCall<T> {
    action: SharedAction<T>,
    pool: ExecutionPool,
    state: Mutex<CallState<T>>,
    /// Set once silently cancelled. Callbacks run while holding this lock,
    /// so no callback can start or still be running after `silent_cancel`
    /// returns on another thread.
    gate: Arc<ReentrantMutex<Cell<bool>>>,
}

impl<T> RemoteCall<T>
where
    T: Send + 'static,
{
    /// Creates a call that runs `action` on `pool`.
    #[must_use]
    pub fn new(action: SharedAction<T>, pool: ExecutionPool) -> Self {
        Self {
            action,
            pool,
            state: Mutex::new(CallState {
                callback: None,
                task: None,
            }),
            gate: Arc::new(ReentrantMutex::new(Cell::new(false))),
        }
    }

    /// Returns the wrapped action.
    #[must_use]
    pub fn action(&self) -> &SharedAction<T> {
        &self.action
    }

    /// Runs the action to completion on the calling thread.
    pub fn sync(&self) -> ActionResult<T> {
        self.pool.block_on(self.action.execute())?
    }

    /// Resumes the action from its checkpoint on the calling thread.
    pub fn retry_sync(&self) -> ActionResult<T> {
        self.pool.block_on(self.action.resume())?
    }

    /// Runs the action on the pool and reports the outcome to `callback`.
    pub fn call_async<F>(&self, callback: F)
    where
        F: Fn(Result<T, ActionStatus>) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        self.state.lock().callback = Some(callback.clone());
        self.dispatch(callback, Mode::Execute);
    }

    /// Resumes the action on the pool, reporting to the last callback given
    /// to [`RemoteCall::call_async`].
    pub fn retry(&self) {
        let callback = self.state.lock().callback.clone();
        match callback {
            Some(callback) => self.dispatch(callback, Mode::Resume),
            None => warn!(
                action = self.action.name(),
                "retry requested before any asynchronous call"
            ),
        }
    }

    /// Abandons in-flight work without invoking any callback.
    pub fn silent_cancel(&self) {
        {
            let gate = self.gate.lock();
            gate.set(true);
        }
        self.action.silent_cancel();
        if let Some(task) = self.state.lock().task.take() {
            task.abort();
        }
        debug!(action = self.action.name(), "call silently cancelled");
    }

    /// Returns true once the call has been silently cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.gate.lock().get()
    }

    fn dispatch(&self, callback: Callback<T>, mode: Mode) {
        if self.is_cancelled() {
            debug!(action = self.action.name(), "ignoring dispatch on cancelled call");
            return;
        }

        let action = self.action.clone();
        let gate = self.gate.clone();
        let call_id = Uuid::new_v4();
        let span = info_span!("remote_call", %call_id, action = action.name(), ?mode);

        let task = self.pool.spawn(
            async move {
                let outcome = match mode {
                    Mode::Execute => action.execute().await,
                    Mode::Resume => action.resume().await,
                };

                let gate = gate.lock();
                if gate.get() {
                    debug!("suppressing callback for cancelled call");
                    return;
                }
                if let Err(err) = &outcome {
                    debug!(error = %err, "call failed");
                }
                callback(outcome.map_err(ActionStatus::from));
            }
            .instrument(span),
        );

        self.state.lock().task = Some(task);
    }
}

impl<T> fmt::Debug for RemoteCall<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCall")
            .field("action", &self.action.name())
            .field("pool", &self.pool)
            .field("cancelled", &self.gate.lock().get())
            .finish_non_exhaustive()
    }
}
