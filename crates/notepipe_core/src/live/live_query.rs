//! Change-notifying query handle.
//!
//! `LiveQuery` is a broadcast value with last-value memory. Publishers call
//! `publish`; subscribers register an observer plus the dispatcher it must
//! run on. Each subscriber tracks the last version it has seen, so a
//! delivery always carries the newest value and skips anything already
//! observed.

use crate::runtime::dispatch::Dispatcher;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SubscriptionId = u64;

type Observer<T> = Box<dyn FnMut(Arc<T>) + Send + 'static>;

struct Latest<T> {
    value: Option<Arc<T>>,
    /// Bumped on every publish; 0 means nothing published yet.
    version: u64,
}

struct SubscriberState<T> {
    active: bool,
    pending: bool,
    closed: bool,
    last_version: u64,
    /// Taken while the observer runs.
    observer: Option<Observer<T>>,
}

struct Subscriber<T> {
    id: SubscriptionId,
    dispatcher: Arc<dyn Dispatcher>,
    state: Mutex<SubscriberState<T>>,
}

struct Shared<T> {
    name: &'static str,
    latest: Mutex<Latest<T>>,
    subscribers: Mutex<HashMap<SubscriptionId, Arc<Subscriber<T>>>>,
    next_id: AtomicU64,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Shared<T> {
    fn current(&self) -> (Option<Arc<T>>, u64) {
        let latest = lock(&self.latest);
        (latest.value.clone(), latest.version)
    }

    fn remove(&self, subscriber: &Subscriber<T>) {
        {
            let mut state = lock(&subscriber.state);
            state.closed = true;
            state.observer = None;
        }
        lock(&self.subscribers).remove(&subscriber.id);
    }
}

/// Subscribable "latest value" handle. Clones share the same value.
pub struct LiveQuery<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LiveQuery<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> LiveQuery<T> {
    /// Creates an empty query; `name` appears in diagnostics only.
    pub fn new(name: &'static str) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                latest: Mutex::new(Latest {
                    value: None,
                    version: 0,
                }),
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Replaces the latest value and schedules delivery to active subscribers.
    pub fn publish(&self, value: T) {
        let version = {
            let mut latest = lock(&self.shared.latest);
            latest.version += 1;
            latest.value = Some(Arc::new(value));
            latest.version
        };
        let subscribers: Vec<_> = lock(&self.shared.subscribers).values().cloned().collect();
        debug!(
            "event=snapshot_publish module=live status=ok query={} version={version} subscribers={}",
            self.shared.name,
            subscribers.len()
        );
        for subscriber in &subscribers {
            schedule(&self.shared, subscriber);
        }
    }

    /// Latest published value, if any.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.shared.current().0
    }

    /// Number of publishes so far.
    pub fn version(&self) -> u64 {
        self.shared.current().1
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.subscribers).len()
    }

    /// Registers `observer` to run on `dispatcher`.
    ///
    /// The subscription starts active; the current value, if any, is
    /// delivered right away through `dispatcher`.
    pub fn subscribe<F>(&self, dispatcher: Arc<dyn Dispatcher>, observer: F) -> Subscription<T>
    where
        F: FnMut(Arc<T>) + Send + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            dispatcher,
            state: Mutex::new(SubscriberState {
                active: true,
                pending: false,
                closed: false,
                last_version: 0,
                observer: Some(Box::new(observer)),
            }),
        });
        lock(&self.shared.subscribers).insert(id, Arc::clone(&subscriber));
        schedule(&self.shared, &subscriber);

        Subscription {
            shared: Arc::clone(&self.shared),
            subscriber,
        }
    }
}

/// Posts one delivery unless the subscriber is idle, up to date or already
/// has a delivery queued.
fn schedule<T: Send + Sync + 'static>(shared: &Arc<Shared<T>>, subscriber: &Arc<Subscriber<T>>) {
    {
        let mut state = lock(&subscriber.state);
        if state.closed || !state.active || state.pending {
            return;
        }
        let (_, version) = shared.current();
        if version <= state.last_version {
            return;
        }
        state.pending = true;
    }

    let shared = Arc::clone(shared);
    let target = Arc::clone(subscriber);
    subscriber
        .dispatcher
        .dispatch(Box::new(move || deliver(&shared, &target)));
}

/// Runs on the subscriber's dispatcher.
fn deliver<T>(shared: &Shared<T>, subscriber: &Subscriber<T>) {
    loop {
        let (value, version) = shared.current();
        let (value, mut observer) = {
            let mut state = lock(&subscriber.state);
            state.pending = false;
            if state.closed || !state.active || version <= state.last_version {
                return;
            }
            let Some(value) = value else {
                return;
            };
            // An outer call on this thread is still running the observer; it
            // re-checks the version once it returns.
            let Some(observer) = state.observer.take() else {
                return;
            };
            state.last_version = version;
            (value, observer)
        };

        observer(value);

        let mut state = lock(&subscriber.state);
        if state.closed {
            return;
        }
        state.observer = Some(observer);
        let (_, newest) = shared.current();
        if !state.active || newest <= state.last_version {
            return;
        }
    }
}

/// Handle to one registered observer. Dropping it unsubscribes.
pub struct Subscription<T> {
    shared: Arc<Shared<T>>,
    subscriber: Arc<Subscriber<T>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.subscriber.id
    }

    pub fn is_active(&self) -> bool {
        let state = lock(&self.subscriber.state);
        state.active && !state.closed
    }

    /// Releases the observer; equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl<T: Send + Sync + 'static> Subscription<T> {
    /// Pauses or resumes delivery.
    ///
    /// Resuming replays the latest value once if it was missed while paused.
    pub fn set_active(&self, active: bool) {
        {
            let mut state = lock(&self.subscriber.state);
            if state.closed || state.active == active {
                return;
            }
            state.active = active;
        }
        if active {
            schedule(&self.shared, &self.subscriber);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.shared.remove(&self.subscriber);
    }
}
