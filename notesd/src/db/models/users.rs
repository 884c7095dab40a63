//! Database models for users.

use crate::db::models::notes::NoteDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    /// Stored as given; hashing happens before this layer
    pub password_hash: String,
}

/// Database request for updating a user. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user together with the notes they own, most recently updated first.
///
/// This is a query result: the notes are not a live back-reference and are not written back.
#[derive(Debug, Clone)]
pub struct UserWithNotes {
    pub user: UserDBResponse,
    pub notes: Vec<NoteDBResponse>,
}
