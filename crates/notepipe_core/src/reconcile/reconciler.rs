//! Stateful shell around `diff` for a displayed list.
//!
//! The reconciler remembers the last list it applied. Each submitted
//! snapshot is diffed against it on a background thread; the script is then
//! posted back to the delivery dispatcher and replayed into the sink there.
//! A generation counter discards scripts that a newer submit superseded.

use super::diff::{diff, DiffItem, EditScript, ListSink};
use crate::runtime::dispatch::{spawn_background, Dispatcher};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct ReconcilerState<T, L> {
    current: Arc<Vec<T>>,
    generation: u64,
    sink: L,
}

/// Applies minimal edit scripts to a `ListSink` as snapshots arrive.
pub struct ListReconciler<T, L> {
    state: Arc<Mutex<ReconcilerState<T, L>>>,
    delivery: Arc<dyn Dispatcher>,
}

impl<T, L> Clone for ListReconciler<T, L> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, L> ListReconciler<T, L>
where
    T: DiffItem + Clone + Send + Sync + 'static,
    L: ListSink<T> + Send + 'static,
{
    /// `delivery` must be the dispatcher `submit` is called on; scripts are
    /// replayed there.
    pub fn new(delivery: Arc<dyn Dispatcher>, sink: L) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReconcilerState {
                current: Arc::new(Vec::new()),
                generation: 0,
                sink,
            })),
            delivery,
        }
    }

    /// Schedules reconciliation of the displayed list towards `next`.
    ///
    /// Trivial transitions (identical snapshot, empty side) are applied
    /// inline; everything else is diffed in the background.
    pub fn submit(&self, next: Arc<Vec<T>>) {
        let (generation, previous) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            (state.generation, Arc::clone(&state.current))
        };

        if Arc::ptr_eq(&previous, &next) {
            return;
        }
        if previous.is_empty() || next.is_empty() {
            let script = timed_diff(&previous, &next, generation);
            apply(&self.state, generation, next, script);
            return;
        }

        let state = Arc::clone(&self.state);
        let delivery = Arc::clone(&self.delivery);
        let job_previous = Arc::clone(&previous);
        let job_next = Arc::clone(&next);
        let spawned = spawn_background("diff", move || {
            let script = timed_diff(&job_previous, &job_next, generation);
            delivery.dispatch(Box::new(move || apply(&state, generation, job_next, script)));
        });

        if spawned.is_err() {
            let script = timed_diff(&previous, &next, generation);
            apply(&self.state, generation, next, script);
        }
    }

    /// The most recently applied list.
    pub fn current(&self) -> Arc<Vec<T>> {
        Arc::clone(&lock(&self.state).current)
    }

    /// Runs `inspect` against the sink.
    pub fn with_sink<R>(&self, inspect: impl FnOnce(&L) -> R) -> R {
        inspect(&lock(&self.state).sink)
    }
}

fn timed_diff<T: DiffItem + Clone>(previous: &[T], next: &[T], generation: u64) -> EditScript<T> {
    let started_at = Instant::now();
    let script = diff(previous, next);
    debug!(
        "event=diff_computed module=reconcile status=ok generation={generation} old_len={} new_len={} ops={} duration_us={}",
        previous.len(),
        next.len(),
        script.len(),
        started_at.elapsed().as_micros()
    );
    script
}

fn apply<T, L: ListSink<T>>(
    state: &Mutex<ReconcilerState<T, L>>,
    generation: u64,
    next: Arc<Vec<T>>,
    script: EditScript<T>,
) {
    let mut state = lock(state);
    if state.generation != generation {
        debug!(
            "event=diff_apply module=reconcile status=skipped generation={generation} latest={}",
            state.generation
        );
        return;
    }
    script.replay(&mut state.sink);
    state.current = next;
}
