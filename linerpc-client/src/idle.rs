//! Cancellable deferred action
//!
//! [`IdleTimer`] runs an action once a delay has elapsed unless it is
//! cancelled first. The manager keeps at most one of these alive and swaps
//! it out on every command, so the idle clock always measures time since the
//! last connect-or-reuse.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A spawned "sleep, then act" task
///
/// Cancelling (or dropping) the timer aborts the task. If the sleep has not
/// finished yet the action never runs.
#[derive(Debug)]
pub(crate) struct IdleTimer {
    task: JoinHandle<()>,
    deadline: Instant,
}

impl IdleTimer {
    /// Run `action` after `delay` on the current runtime
    pub(crate) fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            action.await;
        });
        Self { task, deadline }
    }

    /// Abort the timer; a no-op if it already fired
    pub(crate) fn cancel(self) {
        drop(self);
    }

    /// True until the action has run to completion or been aborted
    pub(crate) fn is_pending(&self) -> bool {
        !self.task.is_finished()
    }

    pub(crate) fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
