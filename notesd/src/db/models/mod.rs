//! Database record models.
//!
//! Request structs (`*CreateDBRequest`, `*UpdateDBRequest`) describe writes; response structs
//! (`*DBResponse`) are rows as stored. The composite types [`users::UserWithNotes`] and
//! [`notes::NoteWithOwner`] are eager-loaded read projections. Relationships are stored in one
//! direction only, through `notes.user_id`.

pub mod notes;
pub mod users;
