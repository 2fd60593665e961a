//! Keyed debouncer for bursty filesystem notifications.
//!
//! Editors and sync clients rarely produce a single event per logical change:
//! an atomic replace is a delete plus a create, a large copy is a stream of
//! modify events. The debouncer collapses such bursts into one action per key,
//! fired after the key has been quiet for the requested delay.
//!
//! # Guarantees
//!
//! - Scheduling under a key replaces any pending action for that key and
//!   restarts its delay. Other keys are unaffected.
//! - An action that has started firing is never aborted by a later schedule.
//!   If another timer for the same key fires while it is still running, the
//!   second action waits for the first one (one in-flight action per key).
//! - [`Debouncer::shutdown`] drops all pending timers without firing them and
//!   waits for in-flight actions to complete.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// A timer waiting for its key to go quiet.
struct Pending {
    /// Distinguishes this timer from later timers for the same key.
    generation: u64,
    handle: JoinHandle<()>,
}

struct DebounceState<K> {
    pending: HashMap<K, Pending>,
    /// Serializes actions per key.
    gates: HashMap<K, Arc<tokio::sync::Mutex<()>>>,
    next_generation: u64,
    closed: bool,
}

/// Collapses bursts of triggers into one action per key.
///
/// Cloning is cheap; clones share the same timers.
pub struct Debouncer<K> {
    state: Arc<Mutex<DebounceState<K>>>,
}

impl<K> Clone for Debouncer<K> {
    fn clone(&self) -> Self { Self { state: Arc::clone(&self.state) } }
}

impl<K> Default for Debouncer<K>
where K: Eq + Hash + Clone + Debug + Send + 'static
{
    fn default() -> Self { Self::new() }
}

impl<K> Debouncer<K>
where K: Eq + Hash + Clone + Debug + Send + 'static
{
    /// Creates an empty debouncer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DebounceState {
                pending: HashMap::new(),
                gates: HashMap::new(),
                next_generation: 0,
                closed: false,
            })),
        }
    }

    /// Schedules `action` to run once `key` has been quiet for `delay`.
    ///
    /// Any action still pending under `key` is discarded. The action is only
    /// constructed when the timer fires, so it observes the state of the world
    /// at fire time.
    ///
    /// Must be called from within a tokio runtime. Returns `false` if the
    /// debouncer has been shut down.
    pub fn schedule<F, Fut>(&self, key: K, delay: Duration, action: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let gate = Arc::clone(state.gates.entry(key.clone()).or_default());
        let shared = Arc::clone(&self.state);
        let timer_key = key.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Claim the timer. Once removed from `pending` it can no longer be
            // aborted by a newer schedule.
            {
                let mut state = shared.lock();
                match state.pending.get(&timer_key) {
                    Some(pending) if pending.generation == generation => {
                        state.pending.remove(&timer_key);
                    }
                    _ => return,
                }
            }

            let _running = gate.lock().await;
            if shared.lock().closed {
                tracing::trace!(key = ?timer_key, "debouncer closed, dropping action");
                return;
            }

            tracing::trace!(key = ?timer_key, "debounced action firing");
            action().await;
        });

        if let Some(previous) = state.pending.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }

        true
    }

    /// Cancels the pending action for `key`, if any.
    ///
    /// Returns `true` if a timer was cancelled.
    pub fn cancel(&self, key: &K) -> bool {
        self.state.lock().pending.remove(key).is_some_and(|pending| {
            pending.handle.abort();
            true
        })
    }

    /// Number of timers currently waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize { self.state.lock().pending.len() }

    /// Returns `true` if a timer is waiting under `key`.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool { self.state.lock().pending.contains_key(key) }

    /// Stops the debouncer.
    ///
    /// New schedules are refused, pending timers are dropped without firing,
    /// and the call returns once every in-flight action has finished.
    pub async fn shutdown(&self) {
        let gates: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            for (key, pending) in state.pending.drain() {
                tracing::debug!(key = ?key, "dropping pending debounced action");
                pending.handle.abort();
            }
            state.gates.values().cloned().collect()
        };

        for gate in gates {
            drop(gate.lock().await);
        }
    }
}
