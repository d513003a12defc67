//! Note record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/delete/clear over `note_table`.
//! - Provide the sorted query that backs the live note list.
//!
//! # Invariants
//! - `insert` assigns a fresh id to notes without one and refuses ids that
//!   already exist.
//! - `all_by_priority` is ordered by `priority DESC`, ties by ascending id.

use crate::config::StoreConfig;
use crate::db::{open_store, DbError, OpenedDb, SchemaStatus};
use crate::model::note::{Note, NoteId};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    priority
FROM note_table";

pub type RepoResult<T> = Result<T, RepoError>;

/// Record store error.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// `insert` received a note whose id is already taken.
    DuplicateId(NoteId),
    /// A persisted row does not map onto a `Note`.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "note id already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::DuplicateId(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable keyed storage of note records.
///
/// Mutating methods take `&mut self`: the executor worker is the only owner
/// of a store, which keeps mutation single-writer.
pub trait NoteStore {
    /// Persists a new note and returns its id.
    fn insert(&mut self, note: &Note) -> RepoResult<NoteId>;
    /// Replaces the record with `note.id`. `Ok(false)` when nothing matched.
    fn update(&mut self, note: &Note) -> RepoResult<bool>;
    /// Removes the record with `note.id`. `Ok(false)` when nothing matched.
    fn delete(&mut self, note: &Note) -> RepoResult<bool>;
    /// Removes every record and returns how many were removed.
    fn clear(&mut self) -> RepoResult<usize>;
    /// All records sorted by priority descending.
    fn all_by_priority(&self) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note store owning its connection.
pub struct SqliteNoteStore {
    conn: Connection,
    status: SchemaStatus,
}

impl SqliteNoteStore {
    /// Opens (and if needed creates or recreates) the configured store.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        Ok(Self::from_opened(open_store(config)?))
    }

    pub fn from_opened(opened: OpenedDb) -> Self {
        Self {
            conn: opened.conn,
            status: opened.status,
        }
    }

    /// Outcome of the schema check performed when this store was opened.
    pub fn schema_status(&self) -> SchemaStatus {
        self.status
    }

    /// Point lookup by id.
    pub fn get(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        rows.next()?.map(parse_note_row).transpose()
    }

    fn exists(&self, id: NoteId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM note_table WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl NoteStore for SqliteNoteStore {
    fn insert(&mut self, note: &Note) -> RepoResult<NoteId> {
        match note.id {
            Some(id) => {
                if self.exists(id)? {
                    return Err(RepoError::DuplicateId(id));
                }
                self.conn.execute(
                    "INSERT INTO note_table (id, title, description, priority)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id, note.title, note.description, note.priority],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO note_table (title, description, priority)
                     VALUES (?1, ?2, ?3);",
                    params![note.title, note.description, note.priority],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    fn update(&mut self, note: &Note) -> RepoResult<bool> {
        let Some(id) = note.id else {
            return Ok(false);
        };
        let changed = self.conn.execute(
            "UPDATE note_table
             SET
                title = ?2,
                description = ?3,
                priority = ?4
             WHERE id = ?1;",
            params![id, note.title, note.description, note.priority],
        )?;
        Ok(changed > 0)
    }

    fn delete(&mut self, note: &Note) -> RepoResult<bool> {
        let Some(id) = note.id else {
            return Ok(false);
        };
        let changed = self
            .conn
            .execute("DELETE FROM note_table WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn clear(&mut self) -> RepoResult<usize> {
        let removed = self.conn.execute("DELETE FROM note_table;", [])?;
        Ok(removed)
    }

    fn all_by_priority(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} ORDER BY priority DESC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id: NoteId = row.get("id")?;
    let priority: i64 = row.get("priority")?;
    let priority = i32::try_from(priority).map_err(|_| {
        RepoError::InvalidData(format!("priority `{priority}` out of range for note {id}"))
    })?;
    Ok(Note {
        id: Some(id),
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
    })
}
