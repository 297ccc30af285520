//! Remote actions and their composition.
//!
//! A [`RemoteAction`] is a unit of remote work that can be executed,
//! resumed from its last checkpoint, and silently cancelled. Actions are
//! combined with [`MappingRemoteAction`] and [`ComposableRemoteAction`],
//! and dispatched to callers through [`RemoteCall`], which exposes the
//! blocking and callback-based entry points.

mod call;
mod composable;
mod leaf;
mod mapping;

pub use call::{Callback, RemoteCall};
pub use composable::{first_do, ComposableRemoteAction, FirstStep};
pub use leaf::{ready, FnRemoteAction, ReadyAction};
pub use mapping::MappingRemoteAction;

use crate::errors::ActionResult;
use async_trait::async_trait;
use std::sync::Arc;

/// A shared, type-erased remote action.
pub type SharedAction<T> = Arc<dyn RemoteAction<T>>;

/// Capability contract implemented by every pipeline step and by pipelines
/// themselves.
#[async_trait]
pub trait RemoteAction<T>: Send + Sync {
    /// Returns the tag used for logging and error tagging.
    fn name(&self) -> &str;

    /// Runs the action from the start.
    async fn execute(&self) -> ActionResult<T>;

    /// Runs the action again from its last checkpoint.
    ///
    /// Actions without a checkpoint start over.
    async fn resume(&self) -> ActionResult<T> {
        self.execute().await
    }

    /// Abandons in-flight work.
    ///
    /// Any run that is in progress or started afterwards ends with
    /// [`RemoteError::Cancelled`](crate::errors::RemoteError::Cancelled).
    fn silent_cancel(&self);
}

#[async_trait]
impl<T, A> RemoteAction<T> for Arc<A>
where
    T: Send + 'static,
    A: RemoteAction<T> + ?Sized,
{
    fn name(&self) -> &str {
        A::name(self)
    }

    async fn execute(&self) -> ActionResult<T> {
        A::execute(self).await
    }

    async fn resume(&self) -> ActionResult<T> {
        A::resume(self).await
    }

    fn silent_cancel(&self) {
        A::silent_cancel(self);
    }
}

/// Convenience combinators for concrete actions.
pub trait RemoteActionExt<T>: RemoteAction<T> + Sized + 'static
where
    T: Send + 'static,
{
    /// Erases the concrete type.
    fn shared(self) -> SharedAction<T> {
        Arc::new(self)
    }

    /// Applies `mapper` to every successful result.
    fn map<R, F>(self, mapper: F) -> MappingRemoteAction<T, R>
    where
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        MappingRemoteAction::map(self.shared(), mapper)
    }
}

impl<T, A> RemoteActionExt<T> for A
where
    T: Send + 'static,
    A: RemoteAction<T> + 'static,
{
}
