//! Database models for notes.

use crate::db::models::users::UserDBResponse;
use crate::types::{NoteId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new note
#[derive(Debug, Clone)]
pub struct NoteCreateDBRequest {
    pub user_id: UserId,
    pub title: Option<String>,
    pub content: String,
}

/// Database request for updating a note.
///
/// `title` is doubly optional so a title can be cleared: `None` leaves it alone, `Some(None)`
/// removes it. Ownership cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdateDBRequest {
    pub title: Option<Option<String>>,
    pub content: Option<String>,
}

/// Database response for a note
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDBResponse {
    pub id: NoteId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note joined with its owning user (read-only projection).
#[derive(Debug, Clone)]
pub struct NoteWithOwner {
    pub note: NoteDBResponse,
    pub owner: UserDBResponse,
}
