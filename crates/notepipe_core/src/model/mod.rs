//! Domain model for priority notes.
//!
//! # Responsibility
//! - Define the note record shared by storage, live snapshots and list diffs.
//! - Provide form-boundary validation for note drafts.
//!
//! # Invariants
//! - A persisted note always carries a store-assigned `NoteId`.
//! - Snapshots are ordered by priority descending.

pub mod note;
