//! Use-case facades over the record store.
//!
//! # Responsibility
//! - Compose store, executor and live query behind the repository verbs.
//! - Keep UI collaborators decoupled from storage and threading details.

pub mod note_repository;
