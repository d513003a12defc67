//! Session-scoped view state.
//!
//! # Responsibility
//! - Keep the note-list subscription alive across recreation of its UI owner.
//! - Hand the latest list to exactly one active owner at a time.
//!
//! # Invariants
//! - A session ends only through `end`/`SessionScope::end_session`, never
//!   because an owner went away.

pub mod view_state;
