//! View-state store
//!
//! Owns one screen's `ViewState` and serializes dispatch through a
//! lock, so the reducer never runs concurrently with itself. Fetch
//! generations keep superseded responses from overwriting newer state:
//! a controller takes a generation before its network call and commits
//! the terminal action only if no later fetch has started since.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::view::{reduce, Action, ViewState};

/// Single owner of one screen's view state
pub struct ViewStore<R> {
    state: RwLock<ViewState<R>>,
    generation: AtomicU64,
}

impl<R: Clone> ViewStore<R> {
    /// Create a store with default (empty, idle) state
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ViewState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current state
    pub async fn snapshot(&self) -> ViewState<R> {
        self.state.read().await.clone()
    }

    /// Run an action through the reducer unconditionally
    pub async fn dispatch(&self, action: Action<R>) {
        let mut state = self.state.write().await;
        let next = reduce(&state, action);
        *state = next;
    }

    /// Mark the start of a fetch, superseding any in-flight one
    pub fn begin_fetch(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Commit a fetch result unless a newer fetch has started
    ///
    /// Returns whether the action was applied.
    pub async fn commit(&self, generation: u64, action: Action<R>) -> bool {
        // Hold the write lock across the check so a begin_fetch/commit
        // pair from another task cannot interleave between them.
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "Dropping superseded fetch result");
            return false;
        }
        let next = reduce(&state, action);
        *state = next;
        true
    }
}

impl<R: Clone> Default for ViewStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
