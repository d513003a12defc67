//! Record store contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the point-mutation + sorted-query contract over note records.
//! - Isolate SQLite query details from the reactive pipeline.
//!
//! # Invariants
//! - Update/delete of an unknown id is a silent no-op, never an error.
//! - Only the command executor thread may hold a mutable store.

pub mod note_store;
