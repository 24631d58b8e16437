//! Cancellable single-shot deferred action
//!
//! At most one action is pending. Scheduling again cancels the previous one.
//! A firing can race with cancellation, so each schedule gets a generation
//! and the receiver confirms it with [`DeferredTask::complete`] before acting.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A single pending deferred action with cancel-on-reschedule
#[derive(Debug, Default)]
pub struct DeferredTask {
    generation: u64,
    pending: Option<CancellationToken>,
}

impl DeferredTask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fire` after `delay`, replacing any pending action
    ///
    /// `fire` receives the generation of this schedule. Returns that generation.
    pub fn schedule<F>(&mut self, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let token = CancellationToken::new();
        let cancelled = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(delay) => fire(generation),
            }
        });

        self.pending = Some(token);
        generation
    }

    /// Cancel the pending action; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Whether an action is scheduled and not yet completed or cancelled
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept a firing; false if it belongs to a cancelled or replaced schedule
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            return false;
        }
        self.pending = None;
        true
    }
}

impl Drop for DeferredTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
