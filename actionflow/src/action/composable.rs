//! Sequential composition of remote actions with checkpointed resume.
//!
//! A chain starts with [`first_do`] and grows with `then`. Each node owns
//! its upstream action and a step function that turns the upstream result
//! into the next action. The next action is only built after the upstream
//! value is available, so steps never overlap.
//!
//! ```rust,ignore
//! let upload = first_do(request_destination)
//!     .then(|destination| transfer(destination))
//!     .checkpoint()
//!     .then(|destination| publish(destination));
//! ```
//!
//! Calling `resume()` on the chain above re-runs the transfer and publish
//! steps but never requests a new destination once one was obtained.

use super::{RemoteAction, SharedAction};
use crate::cancellation::CancellationToken;
use crate::errors::{ActionResult, RemoteError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

type StepFn<T, U> = Box<dyn Fn(T) -> SharedAction<U> + Send + Sync>;

const DEFAULT_NAME: &str = "composed";

/// Starts a chain with `action` as its first step.
pub fn first_do<T>(action: SharedAction<T>) -> FirstStep<T>
where
    T: Send + 'static,
{
    FirstStep { action }
}

/// The head of a chain before any step has been appended.
pub struct FirstStep<T> {
    action: SharedAction<T>,
}

impl<T> FirstStep<T>
where
    T: Send + 'static,
{
    /// Appends the step that runs after the first action.
    pub fn then<U, F>(self, step: F) -> ComposableRemoteAction<T, U>
    where
        U: Send + 'static,
        F: Fn(T) -> SharedAction<U> + Send + Sync + 'static,
    {
        let step: StepFn<T, U> = Box::new(step);
        ComposableRemoteAction::new(self.action, step)
    }
}

/// One link in a chain of remote actions.
pub struct ComposableRemoteAction<T, U> {
    name: String,
    upstream: SharedAction<T>,
    step: StepFn<T, U>,
    /// The action built by `step` on the most recent run.
    next: Mutex<Option<SharedAction<U>>>,
    checkpoint: bool,
    token: CancellationToken,
}

impl<T, U> ComposableRemoteAction<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn new(upstream: SharedAction<T>, step: StepFn<T, U>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            upstream,
            step,
            next: Mutex::new(None),
            checkpoint: false,
            token: CancellationToken::new(),
        }
    }

    /// Appends a step that receives this chain's result.
    pub fn then<V, F>(self, step: F) -> ComposableRemoteAction<U, V>
    where
        V: Send + 'static,
        F: Fn(U) -> SharedAction<V> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        let upstream: SharedAction<U> = Arc::new(self);
        let step: StepFn<U, V> = Box::new(step);
        let mut composed = ComposableRemoteAction::new(upstream, step);
        composed.name = name;
        composed
    }

    /// Marks the current position as the resume point.
    ///
    /// Once the step after this point has been built, `resume()` restarts
    /// from that step instead of re-running everything before it.
    #[must_use]
    pub fn checkpoint(mut self) -> Self {
        self.checkpoint = true;
        self
    }

    /// Sets the name used in logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns true if this link is a checkpoint.
    #[must_use]
    pub fn is_checkpoint(&self) -> bool {
        self.checkpoint
    }

    /// Builds and records the next action, unless cancelled.
    fn advance(&self, value: T) -> ActionResult<SharedAction<U>> {
        let mut next = self.next.lock();
        if self.token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        let action = (self.step)(value);
        *next = Some(action.clone());
        Ok(action)
    }
}

impl<T, U> std::fmt::Debug for ComposableRemoteAction<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposableRemoteAction")
            .field("name", &self.name)
            .field("checkpoint", &self.checkpoint)
            .field("has_next", &self.next.lock().is_some())
            .field("token", &self.token)
            .finish()
    }
}

#[async_trait]
impl<T, U> RemoteAction<U> for ComposableRemoteAction<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> ActionResult<U> {
        {
            // A fresh run must not resume into a previous run's next action.
            let mut next = self.next.lock();
            if self.token.is_cancelled() {
                return Err(RemoteError::Cancelled);
            }
            *next = None;
        }

        let value = self.upstream.execute().await?;
        let next = self.advance(value)?;
        next.execute().await
    }

    async fn resume(&self) -> ActionResult<U> {
        if self.token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }

        let resumable = if self.checkpoint {
            self.next.lock().clone()
        } else {
            None
        };

        if let Some(next) = resumable {
            debug!(chain = %self.name, stage = next.name(), "resuming after checkpoint");
            return next.resume().await;
        }

        let value = self.upstream.resume().await?;
        let next = self.advance(value)?;
        next.execute().await
    }

    fn silent_cancel(&self) {
        {
            let next = self.next.lock();
            self.token.cancel();
            if let Some(next) = next.as_ref() {
                next.silent_cancel();
            }
        }
        self.upstream.silent_cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ready, FnRemoteAction, RemoteActionExt};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records the order in which steps run.
    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn record(&self, entry: impl Into<String>) {
            self.entries.lock().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().clone()
        }
    }

    fn step(journal: &Arc<Journal>, name: &str, input: u32, add: u32) -> SharedAction<u32> {
        let journal = journal.clone();
        let name = name.to_string();
        FnRemoteAction::new(name.clone(), move || {
            let journal = journal.clone();
            let name = name.clone();
            async move {
                journal.record(name);
                Ok(input * 10 + add)
            }
        })
        .shared()
    }

    fn failing(journal: &Arc<Journal>, name: &str) -> SharedAction<u32> {
        let journal = journal.clone();
        let name = name.to_string();
        FnRemoteAction::new(name.clone(), move || {
            let journal = journal.clone();
            let name = name.clone();
            async move {
                journal.record(name.clone());
                Err(anyhow::anyhow!("{name} exploded"))
            }
        })
        .shared()
    }

    /// Fails on the first `failures` runs, then succeeds.
    fn flaky(calls: &Arc<AtomicUsize>, name: &str, failures: usize, value: u32) -> SharedAction<u32> {
        let calls = calls.clone();
        FnRemoteAction::new(name, move || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < failures {
                    Err(anyhow::anyhow!("attempt {attempt} failed"))
                } else {
                    Ok(value)
                }
            }
        })
        .shared()
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_thread_results() {
        let journal = Arc::new(Journal::default());
        let (j1, j2, j3) = (journal.clone(), journal.clone(), journal.clone());

        let chain = first_do(step(&journal, "one", 0, 1))
            .then(move |v| step(&j1, "two", v, 2))
            .then(move |v| step(&j2, "three", v, 3))
            .then(move |v| step(&j3, "four", v, 4));

        assert_eq!(chain.execute().await.unwrap(), 1234);
        assert_eq!(journal.entries(), vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn test_failure_stops_later_steps() {
        for failing_index in 0..4_usize {
            let journal = Arc::new(Journal::default());
            let make = {
                let journal = journal.clone();
                move |index: usize, input: u32| {
                    let name = format!("s{index}");
                    if index == failing_index {
                        failing(&journal, &name)
                    } else {
                        step(&journal, &name, input, 1)
                    }
                }
            };
            let (m1, m2, m3) = (make.clone(), make.clone(), make.clone());

            let chain = first_do(make(0, 0))
                .then(move |v| m1(1, v))
                .then(move |v| m2(2, v))
                .then(move |v| m3(3, v));

            let err = chain.execute().await.unwrap_err();
            let expected: Vec<String> = (0..=failing_index).map(|i| format!("s{i}")).collect();
            assert_eq!(journal.entries(), expected);
            assert_eq!(err.stage_tag(), Some(format!("s{failing_index}").as_str()));
            assert_eq!(
                err.to_string(),
                format!("Stage 's{failing_index}' failed: s{failing_index} exploded")
            );
        }
    }

    #[tokio::test]
    async fn test_resume_after_checkpoint_skips_first_step() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let third_calls = Arc::new(AtomicUsize::new(0));
        let (second, third) = (second_calls.clone(), third_calls.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_step = seen.clone();

        let chain = first_do(flaky(&first_calls, "destination", 0, 5))
            .then(move |v| {
                seen_by_step.lock().push(v);
                flaky(&second, "transfer", 0, v)
            })
            .checkpoint()
            .then(move |v| flaky(&third, "publish", 2, v + 100));

        assert!(chain.execute().await.is_err());
        assert_eq!(chain.resume().await.unwrap_err().stage_tag(), Some("publish"));
        assert_eq!(chain.resume().await.unwrap(), 105);

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 3);
        assert_eq!(third_calls.load(Ordering::SeqCst), 3);
        // The step after the checkpoint is built once and re-run, not rebuilt.
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[tokio::test]
    async fn test_resume_before_checkpoint_reached_starts_over() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let second = second_calls.clone();

        let chain = first_do(flaky(&first_calls, "destination", 1, 7))
            .then(move |v| flaky(&second, "transfer", 0, v))
            .checkpoint();

        assert_eq!(chain.execute().await.unwrap_err().stage_tag(), Some("destination"));
        assert_eq!(chain.resume().await.unwrap(), 7);
        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_run_discards_previous_checkpoint() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let counter = first_calls.clone();
        let first = FnRemoteAction::new("destination", move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match attempt {
                    1 => Err(anyhow::anyhow!("down")),
                    n => Ok(u32::try_from(n).unwrap_or(0) + 1),
                }
            }
        });

        let chain = first_do(first.shared())
            .then(|v| ready("transfer", v).shared())
            .checkpoint();

        assert_eq!(chain.execute().await.unwrap(), 1);
        assert_eq!(chain.execute().await.unwrap_err().stage_tag(), Some("destination"));
        assert_eq!(chain.resume().await.unwrap(), 3);
        assert_eq!(first_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint_reruns_everything() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let second = second_calls.clone();

        let chain = first_do(flaky(&first_calls, "a", 0, 1))
            .then(move |v| flaky(&second, "b", 1, v));

        assert!(!chain.is_checkpoint());
        assert!(chain.execute().await.is_err());
        assert_eq!(chain.resume().await.unwrap(), 1);
        assert_eq!(first_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_prevents_next_step() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let slow = FnRemoteAction::new("slow", || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(1_u32)
        });

        let chain = Arc::new(first_do(slow.shared()).then(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            ready("next", v).shared()
        }));

        let running = {
            let chain = chain.clone();
            tokio::spawn(async move { chain.execute().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        chain.silent_cancel();

        let result = running.await.unwrap();
        assert!(matches!(result, Err(RemoteError::Cancelled)));
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert!(matches!(chain.resume().await, Err(RemoteError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_reaches_active_step() {
        let next = Arc::new(Mutex::new(None::<SharedAction<u32>>));
        let slot = next.clone();

        let chain = first_do(ready("first", 1_u32).shared()).then(move |v| {
            let action = ready("second", v).shared();
            *slot.lock() = Some(action.clone());
            action
        });

        assert_eq!(chain.execute().await.unwrap(), 1);
        chain.silent_cancel();

        let built = next.lock().clone().expect("second step should exist");
        assert!(matches!(built.execute().await, Err(RemoteError::Cancelled)));
    }

    #[test]
    fn test_named_chain_keeps_name_through_then() {
        let chain = first_do(ready("a", 1_u8).shared())
            .then(|v| ready("b", v).shared())
            .named("upload")
            .then(|v| ready("c", v).shared());

        assert_eq!(chain.name(), "upload");
    }
}
