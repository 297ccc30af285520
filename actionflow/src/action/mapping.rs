//! Result transformation on top of an upstream action.

use super::{RemoteAction, SharedAction};
use crate::errors::ActionResult;
use async_trait::async_trait;
use std::sync::Arc;

type Mapper<T, R> = Arc<dyn Fn(T) -> R + Send + Sync>;

/// Runs an upstream action and applies a pure function to its result.
///
/// Failures pass through unchanged and never reach the mapper. Resume and
/// cancellation go straight to the upstream action; the mapping holds no
/// state of its own.
pub struct MappingRemoteAction<T, R> {
    upstream: SharedAction<T>,
    mapper: Mapper<T, R>,
}

impl<T, R> MappingRemoteAction<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Wraps `upstream` so its result is passed through `mapper`.
    pub fn map<F>(upstream: SharedAction<T>, mapper: F) -> Self
    where
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        Self {
            upstream,
            mapper: Arc::new(mapper),
        }
    }
}

impl<T, R> std::fmt::Debug for MappingRemoteAction<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingRemoteAction")
            .field("upstream", &self.upstream.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, R> RemoteAction<R> for MappingRemoteAction<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn name(&self) -> &str {
        self.upstream.name()
    }

    async fn execute(&self) -> ActionResult<R> {
        self.upstream.execute().await.map(|value| (self.mapper)(value))
    }

    async fn resume(&self) -> ActionResult<R> {
        self.upstream.resume().await.map(|value| (self.mapper)(value))
    }

    fn silent_cancel(&self) {
        self.upstream.silent_cancel();
    }
}
