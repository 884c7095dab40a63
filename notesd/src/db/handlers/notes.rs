//! Database repository for notes.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::{Repository, run_cancellable},
    models::{
        notes::{NoteCreateDBRequest, NoteDBResponse, NoteUpdateDBRequest, NoteWithOwner},
        users::UserDBResponse,
    },
    pagination::Page,
    timestamps,
};
use crate::types::{NoteId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, SqliteConnection};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing notes: one owner's notes, most recently updated first
#[derive(Debug, Clone)]
pub struct NoteFilter {
    pub user_id: UserId,
    pub page: Page,
}

impl NoteFilter {
    pub fn new(user_id: UserId, skip: i64, take: i64) -> Self {
        Self {
            user_id,
            page: Page::new(skip, take),
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
pub(super) struct Note {
    pub id: NoteId,
    pub user_id: UserId,
    pub title: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for NoteDBResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            user_id: note.user_id,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

// A note row joined with its owner's columns
#[derive(Debug, FromRow)]
struct NoteOwnerRow {
    #[sqlx(flatten)]
    note: Note,
    owner_username: String,
    owner_email: String,
    owner_password_hash: String,
    owner_created_at: DateTime<Utc>,
    owner_updated_at: DateTime<Utc>,
}

impl From<NoteOwnerRow> for NoteWithOwner {
    fn from(row: NoteOwnerRow) -> Self {
        let owner = UserDBResponse {
            id: row.note.user_id,
            username: row.owner_username,
            email: row.owner_email,
            password_hash: row.owner_password_hash,
            created_at: row.owner_created_at,
            updated_at: row.owner_updated_at,
        };
        Self {
            note: row.note.into(),
            owner,
        }
    }
}

pub struct Notes<'c> {
    db: &'c mut SqliteConnection,
    cancel: Option<CancellationToken>,
}

#[async_trait::async_trait]
impl<'c> Repository for Notes<'c> {
    type CreateRequest = NoteCreateDBRequest;
    type UpdateRequest = NoteUpdateDBRequest;
    type Response = NoteDBResponse;
    type Detail = NoteWithOwner;
    type Listing = NoteDBResponse;
    type Id = NoteId;
    type Filter = NoteFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Always generate a new ID for notes
        let note_id = Uuid::new_v4();
        let stamps = timestamps::for_insert();

        let cancel = self.cancel.clone();
        let note = run_cancellable(cancel.as_ref(), async {
            let note = sqlx::query_as::<_, Note>(
                r#"
                INSERT INTO notes (id, user_id, title, content, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(note_id)
            .bind(request.user_id)
            .bind(&request.title)
            .bind(&request.content)
            .bind(stamps.created_at)
            .bind(stamps.updated_at)
            .fetch_one(&mut *self.db)
            .await?;
            Ok::<_, DbError>(note)
        })
        .await?;

        Ok(note.into())
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Detail>> {
        let cancel = self.cancel.clone();
        let row = run_cancellable(cancel.as_ref(), async {
            let row = sqlx::query_as::<_, NoteOwnerRow>(
                r#"
                SELECT n.id, n.user_id, n.title, n.content, n.created_at, n.updated_at,
                       u.username AS owner_username,
                       u.email AS owner_email,
                       u.password_hash AS owner_password_hash,
                       u.created_at AS owner_created_at,
                       u.updated_at AS owner_updated_at
                FROM notes n
                JOIN users u ON u.id = n.user_id
                WHERE n.id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
            Ok::<_, DbError>(row)
        })
        .await?;

        Ok(row.map(NoteWithOwner::from))
    }

    #[instrument(skip(self, filter), fields(user_id = %abbrev_uuid(&filter.user_id), skip = filter.page.skip(), take = filter.page.take()), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Listing>> {
        let cancel = self.cancel.clone();
        let notes = run_cancellable(cancel.as_ref(), async {
            let notes = sqlx::query_as::<_, Note>(
                "SELECT * FROM notes WHERE user_id = ? ORDER BY updated_at DESC, id ASC LIMIT ? OFFSET ?",
            )
            .bind(filter.user_id)
            .bind(filter.page.take())
            .bind(filter.page.skip())
            .fetch_all(&mut *self.db)
            .await?;
            Ok::<_, DbError>(notes)
        })
        .await?;

        Ok(notes.into_iter().map(NoteDBResponse::from).collect())
    }

    #[instrument(skip(self), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let cancel = self.cancel.clone();
        run_cancellable(cancel.as_ref(), async {
            let result = sqlx::query("DELETE FROM notes WHERE id = ?").bind(id).execute(&mut *self.db).await?;
            Ok::<_, DbError>(result.rows_affected() > 0)
        })
        .await
    }

    #[instrument(skip(self, request), fields(note_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let (title_set, title) = match &request.title {
            Some(title) => (true, title.clone()),
            None => (false, None),
        };

        let cancel = self.cancel.clone();
        let note = run_cancellable(cancel.as_ref(), async {
            let mut tx = self.db.begin().await?;

            let (created_at, previous_updated_at): (DateTime<Utc>, DateTime<Utc>) =
                sqlx::query_as("SELECT created_at, updated_at FROM notes WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(DbError::NotFound)?;
            let stored = timestamps::Timestamps {
                created_at,
                updated_at: previous_updated_at,
            };
            let updated_at = timestamps::clamp_updated_at(stored, timestamps::for_update());

            let note = sqlx::query_as::<_, Note>(
                r#"
                UPDATE notes SET
                    title = CASE WHEN ? THEN ? ELSE title END,
                    content = COALESCE(?, content),
                    updated_at = ?
                WHERE id = ?
                RETURNING *
                "#,
            )
            .bind(title_set)
            .bind(title)
            .bind(&request.content)
            .bind(updated_at)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, DbError>(note)
        })
        .await?;

        Ok(note.into())
    }
}

impl<'c> Notes<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db, cancel: None }
    }

    /// Fail every subsequent operation with [`DbError::Cancelled`] once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
