//! Dispatchers: where a piece of work runs.
//!
//! A `Looper` is owned by the interactive thread and drained by it. Other
//! threads hold a cloneable `Handler` and post tasks that run on the looper
//! thread in FIFO order.

use log::{debug, error};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Unit of work handed to a dispatcher.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that runs posted tasks.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Runs tasks inline on the posting thread.
///
/// Useful for headless collaborators that have no interactive thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Dispatcher for Immediate {
    fn dispatch(&self, task: Task) {
        task();
    }
}

/// Task queue drained by the thread that owns it.
pub struct Looper {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Default for Looper {
    fn default() -> Self {
        Self::new()
    }
}

impl Looper {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    /// Returns a sendable handle that posts onto this looper.
    pub fn handler(&self) -> Handler {
        Handler {
            tx: self.tx.clone(),
        }
    }

    /// Runs every task queued right now, including tasks they enqueue.
    ///
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Runs tasks as they arrive until `done` holds or `timeout` elapses.
    ///
    /// `done` is evaluated on this thread between tasks. Returns its final
    /// value.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(task) => task(),
                // `self.tx` keeps the channel open, so only timeouts end the wait.
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return done();
                }
            }
        }
    }
}

/// Posting side of a `Looper`.
#[derive(Clone)]
pub struct Handler {
    tx: Sender<Task>,
}

impl Dispatcher for Handler {
    fn dispatch(&self, task: Task) {
        if self.tx.send(task).is_err() {
            debug!("event=dispatch module=runtime status=dropped reason=looper_gone");
        }
    }
}

/// Runs `task` on a new named background thread.
///
/// This is the unbounded background context used for list diffing.
pub fn spawn_background<F>(name: &str, task: F) -> std::io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("notepipe-{name}"))
        .spawn(task)
        .map(|_| ())
        .map_err(|err| {
            error!(
                "event=spawn_background module=runtime status=error name={name} error={err}"
            );
            err
        })
}

#[cfg(test)]
mod tests {
    use super::{spawn_background, Dispatcher, Looper};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn handler_posts_run_on_looper_thread_in_order() {
        let looper = Looper::new();
        let handler = looper.handler();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let worker = {
            let seen = Arc::clone(&seen);
            std::thread::spawn(move || {
                for idx in 0..5 {
                    let seen = Arc::clone(&seen);
                    let poster = std::thread::current().id();
                    handler.dispatch(Box::new(move || {
                        assert_ne!(std::thread::current().id(), poster);
                        seen.lock().unwrap().push(idx);
                    }));
                }
            })
        };
        worker.join().unwrap();

        assert_eq!(looper.run_pending(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn run_until_waits_for_background_posts() {
        let looper = Looper::new();
        let handler = looper.handler();
        let hits = Arc::new(AtomicUsize::new(0));

        let posted = Arc::clone(&hits);
        spawn_background("test", move || {
            std::thread::sleep(Duration::from_millis(20));
            handler.dispatch(Box::new(move || {
                posted.fetch_add(1, Ordering::SeqCst);
            }));
        })
        .unwrap();

        assert!(looper.run_until(Duration::from_secs(5), || hits.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn run_until_times_out_without_work() {
        let looper = Looper::new();
        assert!(!looper.run_until(Duration::from_millis(10), || false));
    }
}
