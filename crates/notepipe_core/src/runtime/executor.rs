//! Serialized background executor for store mutations.
//!
//! # Responsibility
//! - Own one store on a dedicated worker thread (single writer).
//! - Run submitted commands in submission order without blocking callers.
//! - Signal the commit hook once per drained batch of successful commands.
//! - Run barriers after every earlier command has been committed.
//!
//! # Invariants
//! - `submit` never blocks and never reports a command's outcome.
//! - A failing or panicking command is logged and dropped; the worker keeps
//!   serving the queue.
//! - The store lives exactly as long as the worker. Closing the queue lets
//!   the worker drain what was already queued, then drop the store, so no
//!   command ever runs against a torn-down store.

use log::{error, info, warn};
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

/// Upper bound of commands coalesced before the commit hook runs.
const MAX_BATCH: usize = 64;

type CommandFn<S> = Box<dyn FnOnce(&mut S) -> Result<(), String> + Send + 'static>;
type BarrierFn<S> = Box<dyn FnOnce(&S) + Send + 'static>;
type CommitHook<S> = Box<dyn FnMut(&mut S) + Send + 'static>;

enum Command<S> {
    Mutation {
        label: &'static str,
        run: CommandFn<S>,
    },
    /// Never commits; runs once the commit hook has seen every earlier
    /// successful mutation.
    Barrier {
        label: &'static str,
        run: BarrierFn<S>,
    },
}

/// Actor-style executor owning a store of type `S`.
pub struct CommandExecutor<S> {
    name: String,
    tx: Option<Sender<Command<S>>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> CommandExecutor<S> {
    /// Moves `store` onto a new worker thread.
    ///
    /// `on_commit` runs on the worker after every batch that contained at
    /// least one successful command.
    pub fn spawn<H>(name: &str, store: S, on_commit: H) -> std::io::Result<Self>
    where
        H: FnMut(&mut S) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Command<S>>();
        let worker_name = name.to_string();
        let worker = std::thread::Builder::new()
            .name(format!("notepipe-exec-{name}"))
            .spawn(move || run_worker(&worker_name, store, rx, Box::new(on_commit)))?;

        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Enqueues `command` and returns immediately.
    ///
    /// `label` names the command in diagnostics; it must not carry user text.
    pub fn submit<F, E>(&self, label: &'static str, command: F)
    where
        F: FnOnce(&mut S) -> Result<(), E> + Send + 'static,
        E: Display,
    {
        self.send(Command::Mutation {
            label,
            run: Box::new(move |store: &mut S| command(store).map_err(|err| err.to_string())),
        });
    }

    /// Enqueues a read-only `barrier` that runs after every earlier command
    /// and after the commit hook has observed their effects.
    ///
    /// Barriers do not count as commits.
    pub fn submit_barrier<F>(&self, label: &'static str, barrier: F)
    where
        F: FnOnce(&S) + Send + 'static,
    {
        self.send(Command::Barrier {
            label,
            run: Box::new(barrier),
        });
    }

    fn send(&self, command: Command<S>) {
        let label = command.label();
        let sent = self
            .tx
            .as_ref()
            .map(|tx| tx.send(command).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!(
                "event=command_submit module=executor status=dropped executor={} command={label} reason=worker_stopped",
                self.name
            );
        }
    }

    /// Closes the queue, waits for queued commands to finish and joins.
    pub fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(
                    "event=executor_stop module=executor status=error executor={} reason=worker_panicked",
                    self.name
                );
            }
        }
    }
}

impl<S> Drop for CommandExecutor<S> {
    fn drop(&mut self) {
        // Detach: the worker drains the closed queue on its own.
        self.tx.take();
        self.worker.take();
    }
}

impl<S> Command<S> {
    fn label(&self) -> &'static str {
        match self {
            Self::Mutation { label, .. } | Self::Barrier { label, .. } => *label,
        }
    }
}

fn run_worker<S>(name: &str, mut store: S, rx: Receiver<Command<S>>, mut on_commit: CommitHook<S>) {
    info!("event=executor_start module=executor status=ok executor={name}");
    let mut executed: u64 = 0;

    while let Ok(first) = rx.recv() {
        let mut committed = false;
        let mut batch = 0;
        let mut next = Some(first);
        while let Some(command) = next.take() {
            batch += 1;
            match command {
                Command::Mutation { label, run } => {
                    committed |= run_mutation(name, &mut store, label, run);
                }
                Command::Barrier { label, run } => {
                    if committed {
                        run_commit_hook(name, &mut store, &mut on_commit);
                        committed = false;
                    }
                    run_barrier(name, &store, label, run);
                }
            }
            if batch < MAX_BATCH {
                next = rx.try_recv().ok();
            }
        }
        executed += batch as u64;

        if committed {
            run_commit_hook(name, &mut store, &mut on_commit);
        }
    }

    info!("event=executor_stop module=executor status=ok executor={name} executed={executed}");
}

fn run_commit_hook<S>(name: &str, store: &mut S, on_commit: &mut CommitHook<S>) {
    if catch_unwind(AssertUnwindSafe(|| on_commit(store))).is_err() {
        error!("event=commit_hook module=executor status=error executor={name} reason=panicked");
    }
}

fn run_mutation<S>(name: &str, store: &mut S, label: &'static str, run: CommandFn<S>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| run(store))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(
                "event=command_failed module=executor status=error executor={name} command={label} error={err}"
            );
            false
        }
        Err(_) => {
            error!(
                "event=command_panicked module=executor status=error executor={name} command={label}"
            );
            false
        }
    }
}

fn run_barrier<S>(name: &str, store: &S, label: &'static str, run: BarrierFn<S>) {
    if catch_unwind(AssertUnwindSafe(|| run(store))).is_err() {
        error!(
            "event=command_panicked module=executor status=error executor={name} command={label}"
        );
    }
}
