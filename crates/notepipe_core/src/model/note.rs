//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its identity/content predicates.
//! - Validate user input before it is handed to the repository.
//!
//! # Invariants
//! - `id` is `None` until the store assigns one, and immutable afterwards.
//! - Two notes are the same entity iff their ids are equal.
//! - Two notes have equivalent content iff title, description and priority
//!   are all equal.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned note identity (`note_table.id`).
pub type NoteId = i64;

/// Lowest priority accepted by the input widget.
pub const PRIORITY_MIN: i32 = 1;
/// Highest priority accepted by the input widget.
pub const PRIORITY_MAX: i32 = 10;

/// One note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// `None` while the note has not been persisted yet.
    pub id: Option<NoteId>,
    pub title: String,
    pub description: String,
    /// Expected in `[PRIORITY_MIN, PRIORITY_MAX]`; clamped by the widget,
    /// not re-validated by core.
    pub priority: i32,
}

impl Note {
    /// Creates an unpersisted note.
    pub fn new(title: impl Into<String>, description: impl Into<String>, priority: i32) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            priority,
        }
    }

    /// Returns a copy of this note bound to an existing identity.
    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns whether the store has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Identity predicate used for list matching.
    pub fn same_entity(&self, other: &Note) -> bool {
        self.id.is_some() && self.id == other.id
    }

    /// Content predicate used to suppress no-op changes.
    pub fn same_content(&self, other: &Note) -> bool {
        self.priority == other.priority
            && self.title == other.title
            && self.description == other.description
    }
}

/// Clamps raw widget input into the supported priority range.
pub fn clamp_priority(value: i32) -> i32 {
    value.clamp(PRIORITY_MIN, PRIORITY_MAX)
}

/// Form-boundary validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyTitle,
    EmptyDescription,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::EmptyDescription => write!(f, "description must not be empty"),
        }
    }
}

impl Error for NoteValidationError {}

/// Raw user input collected by the edit form.
///
/// Validation happens here, before anything is submitted; repository verbs
/// never re-check drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub description: String,
    pub priority: i32,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>, priority: i32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority,
        }
    }

    /// Rejects blank title or description.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.title.trim().is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        if self.description.trim().is_empty() {
            return Err(NoteValidationError::EmptyDescription);
        }
        Ok(())
    }

    /// Validates and converts into a note destined for insertion.
    pub fn into_note(self) -> Result<Note, NoteValidationError> {
        self.validate()?;
        Ok(Note::new(self.title, self.description, self.priority))
    }

    /// Validates and converts into a replacement for an existing note.
    pub fn into_update(self, id: NoteId) -> Result<Note, NoteValidationError> {
        self.into_note().map(|note| note.with_id(id))
    }
}
