//! Core of the priority-notes application.
//!
//! Mutations flow from the repository verbs through a serialized background
//! executor into the record store; every committed batch re-queries the
//! sorted note list, publishes it on a live query, and list owners reconcile
//! the new snapshot against what they display with a minimal edit script.

pub mod config;
pub mod db;
pub mod live;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod repo;
pub mod runtime;
pub mod service;
pub mod session;

pub use config::{ConfigError, CoreConfig, StoreConfig, StoreLocation};
pub use live::live_query::{LiveQuery, Subscription, SubscriptionId};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::note::{
    clamp_priority, Note, NoteDraft, NoteId, NoteValidationError, PRIORITY_MAX, PRIORITY_MIN,
};
pub use reconcile::diff::{diff, DiffItem, EditOp, EditScript, ListSink};
pub use reconcile::reconciler::ListReconciler;
pub use repo::note_store::{NoteStore, RepoError, RepoResult, SqliteNoteStore};
pub use runtime::dispatch::{spawn_background, Dispatcher, Handler, Immediate, Looper, Task};
pub use runtime::executor::CommandExecutor;
pub use service::note_repository::{
    NoteRepository, RepositoryOptions, ServiceError, ServiceResult, SEED_NOTES,
};
pub use session::view_state::{NoteSession, OwnerBinding, SessionScope};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
