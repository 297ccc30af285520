//! Leaf actions backed by a single remote call.

use super::RemoteAction;
use crate::cancellation::CancellationToken;
use crate::errors::{ActionResult, RemoteError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;
use std::future::Future;
use tracing::{debug, warn};

type CallFn<T> = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// An action that runs an async closure on every execution.
///
/// Failures from the closure are tagged with the action's name. Each run
/// races the closure against the action's cancellation token.
pub struct FnRemoteAction<T> {
    name: String,
    call: CallFn<T>,
    token: CancellationToken,
}

impl<T> FnRemoteAction<T>
where
    T: Send + 'static,
{
    /// Creates a new function-based action.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            call: Box::new(move || Box::pin(func())),
            token: CancellationToken::new(),
        }
    }

    /// Returns true once the action has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Debug for FnRemoteAction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnRemoteAction")
            .field("name", &self.name)
            .field("token", &self.token)
            .finish()
    }
}

#[async_trait]
impl<T> RemoteAction<T> for FnRemoteAction<T>
where
    T: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> ActionResult<T> {
        if self.token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }

        debug!(stage = %self.name, "stage started");
        let call = (self.call)();

        tokio::select! {
            biased;
            () = self.token.cancelled() => {
                debug!(stage = %self.name, "stage abandoned");
                Err(RemoteError::Cancelled)
            }
            result = call => match result {
                Ok(value) => {
                    debug!(stage = %self.name, "stage completed");
                    Ok(value)
                }
                Err(source) => {
                    warn!(stage = %self.name, error = %source, "stage failed");
                    Err(RemoteError::stage(self.name.clone(), source))
                }
            },
        }
    }

    fn silent_cancel(&self) {
        self.token.cancel();
    }
}

/// An action that yields a clone of a fixed value.
#[derive(Debug)]
pub struct ReadyAction<T> {
    name: String,
    value: T,
    token: CancellationToken,
}

/// Creates an action that immediately succeeds with `value`.
pub fn ready<T>(name: impl Into<String>, value: T) -> ReadyAction<T>
where
    T: Clone + Send + Sync + 'static,
{
    ReadyAction {
        name: name.into(),
        value,
        token: CancellationToken::new(),
    }
}

#[async_trait]
impl<T> RemoteAction<T> for ReadyAction<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> ActionResult<T> {
        if self.token.is_cancelled() {
            Err(RemoteError::Cancelled)
        } else {
            Ok(self.value.clone())
        }
    }

    fn silent_cancel(&self) {
        self.token.cancel();
    }
}
