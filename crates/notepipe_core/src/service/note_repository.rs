//! Note repository: the only mutation entry point for collaborators.
//!
//! # Responsibility
//! - Wrap every store mutation in an executor submission.
//! - Re-query the sorted note list after each committed batch and publish it
//!   through `all_notes()`.
//! - Insert placeholder notes when storage is created from scratch.
//!
//! # Invariants
//! - Verbs return immediately; completion is observed only through the live
//!   query.
//! - Mutations become visible in submission order.
//! - `all_notes()` returns the same handle for the repository's lifetime.

use crate::config::CoreConfig;
use crate::live::live_query::LiveQuery;
use crate::model::note::{Note, NoteId};
use crate::repo::note_store::{NoteStore, RepoError, SqliteNoteStore};
use crate::runtime::executor::CommandExecutor;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc;

/// Placeholder notes written on first creation of empty storage.
pub const SEED_NOTES: [(&str, &str, i32); 3] = [
    ("Title 1", "Description 1", 1),
    ("Title 2", "Description 2", 2),
    ("Title 3", "Description 3", 3),
];

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Repository construction error.
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    /// The executor worker thread could not be started.
    Spawn(std::io::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Spawn(err) => write!(f, "failed to start store worker: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Spawn(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Submit `SEED_NOTES` right after start-up.
    pub seed: bool,
}

/// Facade over a store owned by a background executor.
pub struct NoteRepository<S: NoteStore + Send + 'static> {
    executor: CommandExecutor<S>,
    notes: LiveQuery<Vec<Note>>,
}

impl NoteRepository<SqliteNoteStore> {
    /// Opens the configured SQLite store and starts the pipeline.
    ///
    /// Seed notes are written only when the schema check reports fresh
    /// storage and `config.seed_on_create` is set.
    pub fn open(config: &CoreConfig) -> ServiceResult<Self> {
        let store = SqliteNoteStore::open(&config.store)?;
        let fresh = store.schema_status().is_fresh();
        Self::new(
            store,
            RepositoryOptions {
                seed: config.seed_on_create && fresh,
            },
        )
    }
}

impl<S: NoteStore + Send + 'static> NoteRepository<S> {
    /// Moves `store` onto its executor and schedules the initial query.
    pub fn new(store: S, options: RepositoryOptions) -> ServiceResult<Self> {
        let notes = LiveQuery::new("all_notes");
        let publisher = notes.clone();
        let executor = CommandExecutor::spawn("notes", store, move |store: &mut S| {
            publish_snapshot(store, &publisher);
        })
        .map_err(ServiceError::Spawn)?;

        // A successful no-op still commits, which runs the first query on
        // the worker instead of the caller's thread.
        executor.submit("initial_query", |_: &mut S| Ok::<(), RepoError>(()));

        let repository = Self { executor, notes };
        if options.seed {
            info!("event=seed module=repository status=start count={}", SEED_NOTES.len());
            for (title, description, priority) in SEED_NOTES {
                repository.insert(Note::new(title, description, priority));
            }
        }
        Ok(repository)
    }

    /// Persists a new note; its id is assigned by the store.
    pub fn insert(&self, note: Note) {
        self.executor.submit("insert", move |store: &mut S| {
            let id = store.insert(&note)?;
            debug!("event=note_insert module=repository status=ok id={id}");
            Ok::<(), RepoError>(())
        });
    }

    /// Replaces the note with `note.id`; unknown ids are a silent no-op.
    pub fn update(&self, note: Note) {
        self.executor.submit("update", move |store: &mut S| {
            if !store.update(&note)? {
                debug!(
                    "event=note_update module=repository status=noop id={:?}",
                    note.id
                );
            }
            Ok::<(), RepoError>(())
        });
    }

    /// Removes the note with `note.id`; unknown ids are a silent no-op.
    pub fn delete(&self, note: Note) {
        self.executor.submit("delete", move |store: &mut S| {
            if !store.delete(&note)? {
                debug!(
                    "event=note_delete module=repository status=noop id={:?}",
                    note.id
                );
            }
            Ok::<(), RepoError>(())
        });
    }

    /// Removes every note.
    pub fn clear(&self) {
        self.executor.submit("clear", |store: &mut S| {
            let removed = store.clear()?;
            debug!("event=note_clear module=repository status=ok removed={removed}");
            Ok::<(), RepoError>(())
        });
    }

    /// Form entry point for new notes.
    pub fn insert_fields(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
    ) {
        self.insert(Note::new(title, description, priority));
    }

    /// Form entry point for edits of an existing note.
    pub fn update_fields(
        &self,
        id: NoteId,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: i32,
    ) {
        self.update(Note::new(title, description, priority).with_id(id));
    }

    /// Blocks until every command submitted so far has run and the
    /// resulting snapshot is published.
    ///
    /// Returns `false` when the worker is gone.
    pub fn sync(&self) -> bool {
        let (tx, rx) = mpsc::channel();
        self.executor.submit_barrier("sync", move |_: &S| {
            let _ = tx.send(());
        });
        rx.recv().is_ok()
    }

    /// Live list of all notes, priority descending.
    pub fn all_notes(&self) -> &LiveQuery<Vec<Note>> {
        &self.notes
    }

    /// Waits for every submitted command to finish, then stops the worker.
    pub fn shutdown(self) {
        self.executor.shutdown();
    }
}

fn publish_snapshot<S: NoteStore>(store: &mut S, notes: &LiveQuery<Vec<Note>>) {
    match store.all_by_priority() {
        Ok(snapshot) => notes.publish(snapshot),
        Err(err) => {
            warn!("event=snapshot_query module=repository status=error error={err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::repo::note_store::RepoError;
    use std::error::Error;

    #[test]
    fn service_error_wraps_store_and_spawn_failures() {
        let repo: ServiceError = RepoError::DuplicateId(7).into();
        assert_eq!(repo.to_string(), "note id already exists: 7");
        assert!(repo.source().is_some());

        let spawn = ServiceError::Spawn(std::io::Error::other("no threads"));
        assert!(spawn.to_string().contains("failed to start store worker"));
        assert!(spawn.source().is_some());
    }
}
