//! Database repository for users.

use std::collections::HashMap;

use crate::db::{
    errors::{DbError, Result},
    handlers::{
        notes::Note,
        repository::{Repository, run_cancellable},
    },
    models::{
        notes::NoteDBResponse,
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest, UserWithNotes},
    },
    pagination::Page,
    timestamps,
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub page: Page,
}

impl UserFilter {
    pub fn new(skip: i64, take: i64) -> Self {
        Self {
            page: Page::new(skip, take),
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub struct Users<'c> {
    db: &'c mut SqliteConnection,
    cancel: Option<CancellationToken>,
}

/// Notes owned by one user, most recently updated first
async fn notes_for_user(conn: &mut SqliteConnection, user_id: UserId) -> Result<Vec<NoteDBResponse>> {
    let notes = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE user_id = ? ORDER BY updated_at DESC, id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;

    Ok(notes.into_iter().map(NoteDBResponse::from).collect())
}

/// Notes for a batch of users in one query, grouped by owner
async fn notes_for_users(conn: &mut SqliteConnection, user_ids: &[UserId]) -> Result<HashMap<UserId, Vec<NoteDBResponse>>> {
    let mut grouped: HashMap<UserId, Vec<NoteDBResponse>> = HashMap::new();
    if user_ids.is_empty() {
        return Ok(grouped);
    }

    let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM notes WHERE user_id IN (");
    let mut ids = query.separated(", ");
    for id in user_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY updated_at DESC, id ASC");

    let notes = query.build_query_as::<Note>().fetch_all(conn).await?;
    for note in notes {
        grouped.entry(note.user_id).or_default().push(note.into());
    }

    Ok(grouped)
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Detail = UserWithNotes;
    type Listing = UserWithNotes;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        // Always generate a new ID for users
        let user_id = Uuid::new_v4();
        let stamps = timestamps::for_insert();

        let cancel = self.cancel.clone();
        let user = run_cancellable(cancel.as_ref(), async {
            let user = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                RETURNING *
                "#,
            )
            .bind(user_id)
            .bind(&request.username)
            .bind(&request.email)
            .bind(&request.password_hash)
            .bind(stamps.created_at)
            .bind(stamps.updated_at)
            .fetch_one(&mut *self.db)
            .await?;
            Ok::<_, DbError>(user)
        })
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Detail>> {
        let cancel = self.cancel.clone();
        run_cancellable(cancel.as_ref(), async {
            // Read the user and their notes from one snapshot
            let mut tx = self.db.begin().await?;
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

            let detail = match user {
                Some(user) => {
                    let notes = notes_for_user(&mut *tx, user.id).await?;
                    Some(UserWithNotes { user: user.into(), notes })
                }
                None => None,
            };

            // Read-only, but committing releases the snapshot cleanly
            tx.commit().await?;
            Ok::<_, DbError>(detail)
        })
        .await
    }

    #[instrument(skip(self, filter), fields(skip = filter.page.skip(), take = filter.page.take()), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Listing>> {
        let cancel = self.cancel.clone();
        run_cancellable(cancel.as_ref(), async {
            let mut tx = self.db.begin().await?;
            let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username ASC LIMIT ? OFFSET ?")
                .bind(filter.page.take())
                .bind(filter.page.skip())
                .fetch_all(&mut *tx)
                .await?;

            let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
            let mut notes = notes_for_users(&mut *tx, &ids).await?;
            tx.commit().await?;

            let result: Vec<UserWithNotes> = users
                .into_iter()
                .map(|user| UserWithNotes {
                    notes: notes.remove(&user.id).unwrap_or_default(),
                    user: user.into(),
                })
                .collect();
            Ok::<_, DbError>(result)
        })
        .await
    }

    /// Owned notes go with the user through `ON DELETE CASCADE`.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let cancel = self.cancel.clone();
        run_cancellable(cancel.as_ref(), async {
            let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&mut *self.db).await?;
            Ok::<_, DbError>(result.rows_affected() > 0)
        })
        .await
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let cancel = self.cancel.clone();
        let user = run_cancellable(cancel.as_ref(), async {
            let mut tx = self.db.begin().await?;

            let (created_at, previous_updated_at): (DateTime<Utc>, DateTime<Utc>) =
                sqlx::query_as("SELECT created_at, updated_at FROM users WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(DbError::NotFound)?;
            let stored = timestamps::Timestamps {
                created_at,
                updated_at: previous_updated_at,
            };
            let updated_at = timestamps::clamp_updated_at(stored, timestamps::for_update());

            let user = sqlx::query_as::<_, User>(
                r#"
                UPDATE users SET
                    username = COALESCE(?, username),
                    email = COALESCE(?, email),
                    password_hash = COALESCE(?, password_hash),
                    updated_at = ?
                WHERE id = ?
                RETURNING *
                "#,
            )
            .bind(&request.username)
            .bind(&request.email)
            .bind(&request.password_hash)
            .bind(updated_at)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, DbError>(user)
        })
        .await?;

        Ok(user.into())
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db, cancel: None }
    }

    /// Fail every subsequent operation with [`DbError::Cancelled`] once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Exact-match lookup. Comparison uses SQLite's default BINARY collation, so it is
    /// case-sensitive.
    #[instrument(skip(self), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserWithNotes>> {
        let cancel = self.cancel.clone();
        run_cancellable(cancel.as_ref(), async {
            let mut tx = self.db.begin().await?;
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&mut *tx)
                .await?;

            let detail = match user {
                Some(user) => {
                    let notes = notes_for_user(&mut *tx, user.id).await?;
                    Some(UserWithNotes { user: user.into(), notes })
                }
                None => None,
            };

            tx.commit().await?;
            Ok::<_, DbError>(detail)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::notes::{NoteFilter, Notes};
    use super::super::repository::Repository;
    use super::*;
    use crate::db::models::notes::{NoteCreateDBRequest, NoteUpdateDBRequest};
    use crate::test_utils::{create_test_note, create_test_user, user_create_request};
    use sqlx::SqlitePool;
    use std::time::Duration;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_user(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let before = Utc::now();
        let user = repo.create(&user_create_request("testuser")).await.unwrap();

        assert!(!user.id.is_nil());
        assert_eq!(user.username, "testuser");
        assert_eq!(user.email, "testuser@example.com");
        assert_eq!(user.password_hash, "opaque-hash");
        assert_eq!(user.created_at, user.updated_at);
        assert!(user.created_at >= before);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_fails(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let first = repo.create(&user_create_request("alice")).await.unwrap();

        let duplicate = UserCreateDBRequest {
            email: "someone-else@example.com".to_string(),
            ..user_create_request("alice")
        };
        let result = repo.create(&duplicate).await;
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));

        // The first user is untouched
        let found = repo.get_by_id(first.id).await.unwrap().expect("first user should remain");
        assert_eq!(found.user, first);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_fails(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let first = repo.create(&user_create_request("alice")).await.unwrap();

        let duplicate = UserCreateDBRequest {
            email: first.email.clone(),
            ..user_create_request("alice2")
        };
        let result = repo.create(&duplicate).await;
        let err = result.expect_err("duplicate email should be rejected");
        assert!(err.is_constraint_violation());
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        assert!(repo.get_by_username("alice").await.unwrap().is_some());
        assert!(repo.get_by_username("alice2").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_field_length_limits(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let long_username = UserCreateDBRequest {
            username: "u".repeat(51),
            email: "long@example.com".to_string(),
            password_hash: "h".to_string(),
        };
        assert!(matches!(repo.create(&long_username).await, Err(DbError::CheckViolation { .. })));

        let long_email = UserCreateDBRequest {
            username: "longmail".to_string(),
            email: format!("{}@example.com", "e".repeat(250)),
            password_hash: "h".to_string(),
        };
        assert!(matches!(repo.create(&long_email).await, Err(DbError::CheckViolation { .. })));

        let empty_username = UserCreateDBRequest {
            username: String::new(),
            email: "empty@example.com".to_string(),
            password_hash: "h".to_string(),
        };
        assert!(matches!(repo.create(&empty_username).await, Err(DbError::CheckViolation { .. })));

        let at_limit = UserCreateDBRequest {
            username: "u".repeat(50),
            email: format!("{}@example.com", "e".repeat(242)),
            password_hash: "h".to_string(),
        };
        repo.create(&at_limit).await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_id_attaches_notes(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = create_test_user(&mut conn, "alice").await;
        let older = create_test_note(&mut conn, user.id, "older").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = create_test_note(&mut conn, user.id, "newer").await;

        let mut repo = Users::new(&mut conn);
        let found = repo.get_by_id(user.id).await.unwrap().expect("user should exist");

        assert_eq!(found.user, user);
        assert_eq!(found.notes, vec![newer, older]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_id_missing_returns_none(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_by_username_is_case_sensitive(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = create_test_user(&mut conn, "Alice").await;
        create_test_note(&mut conn, user.id, "hi").await;

        let mut repo = Users::new(&mut conn);
        let found = repo.get_by_username("Alice").await.unwrap().expect("exact match");
        assert_eq!(found.user.id, user.id);
        assert_eq!(found.notes.len(), 1);

        assert!(repo.get_by_username("alice").await.unwrap().is_none());
        assert!(repo.get_by_username("ALICE").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_orders_by_username_with_notes(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let carol = create_test_user(&mut conn, "carol").await;
        let alice = create_test_user(&mut conn, "alice").await;
        let bob = create_test_user(&mut conn, "bob").await;
        create_test_note(&mut conn, alice.id, "a1").await;
        create_test_note(&mut conn, alice.id, "a2").await;
        create_test_note(&mut conn, carol.id, "c1").await;

        let mut repo = Users::new(&mut conn);
        let listed = repo.list(&UserFilter::new(0, 10)).await.unwrap();

        let names: Vec<_> = listed.iter().map(|u| u.user.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
        assert_eq!(listed[0].notes.len(), 2);
        assert!(listed[0].notes.iter().all(|n| n.user_id == alice.id));
        assert_eq!(listed[1].user.id, bob.id);
        assert!(listed[1].notes.is_empty());
        assert_eq!(listed[2].notes.len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_pagination(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        for name in ["dave", "alice", "erin", "bob", "carol"] {
            create_test_user(&mut conn, name).await;
        }

        let mut repo = Users::new(&mut conn);
        let page = repo.list(&UserFilter::new(1, 2)).await.unwrap();
        let names: Vec<_> = page.iter().map(|u| u.user.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol"]);

        // take is clamped to at least one
        let page = repo.list(&UserFilter::new(0, 0)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user.username, "alice");

        let page = repo.list(&UserFilter::new(0, 10_000)).await.unwrap();
        assert_eq!(page.len(), 5);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_user(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = create_test_user(&mut conn, "alice").await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut repo = Users::new(&mut conn);
        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    email: Some("alice@new.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.username, "alice");
        assert_eq!(updated.email, "alice@new.example.com");
        assert_eq!(updated.password_hash, user.password_hash);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at > user.updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_to_taken_username_fails(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        create_test_user(&mut conn, "alice").await;
        let bob = create_test_user(&mut conn, "bob").await;

        let mut repo = Users::new(&mut conn);
        let result = repo
            .update(
                bob.id,
                &UserUpdateDBRequest {
                    username: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));

        let bob_again = repo.get_by_id(bob.id).await.unwrap().unwrap();
        assert_eq!(bob_again.user, bob);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_never_moves_updated_at_backwards(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = create_test_user(&mut conn, "alice").await;

        let ahead = user.created_at + chrono::Duration::hours(1);
        sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
            .bind(ahead)
            .bind(user.id)
            .execute(&mut *conn)
            .await
            .unwrap();

        let mut repo = Users::new(&mut conn);
        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    email: Some("alice@new.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.email, "alice@new.example.com");
        assert!(updated.updated_at >= ahead, "updated_at went from {ahead} to {}", updated.updated_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_missing_user_is_not_found(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let result = repo.update(Uuid::new_v4(), &UserUpdateDBRequest::default()).await;
        assert!(matches!(result, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_cascades_to_notes(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let alice = create_test_user(&mut conn, "alice").await;
        let bob = create_test_user(&mut conn, "bob").await;
        let mut alice_notes = Vec::new();
        for i in 0..3 {
            alice_notes.push(create_test_note(&mut conn, alice.id, &format!("note {i}")).await);
        }
        let bobs_note = create_test_note(&mut conn, bob.id, "bob keeps this").await;

        let mut repo = Users::new(&mut conn);
        assert!(repo.delete(alice.id).await.unwrap());
        assert!(repo.get_by_id(alice.id).await.unwrap().is_none());

        let mut notes = Notes::new(&mut conn);
        assert!(notes.list(&NoteFilter::new(alice.id, 0, 200)).await.unwrap().is_empty());
        for note in &alice_notes {
            assert!(notes.get_by_id(note.id).await.unwrap().is_none());
        }
        assert!(notes.get_by_id(bobs_note.id).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_is_idempotent(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = create_test_user(&mut conn, "alice").await;

        let mut repo = Users::new(&mut conn);
        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(Uuid::new_v4()).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancelled_lookup(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = create_test_user(&mut conn, "alice").await;

        let token = CancellationToken::new();
        token.cancel();
        let mut repo = Users::new(&mut conn).with_cancellation(token);
        assert!(matches!(repo.get_by_id(user.id).await, Err(DbError::Cancelled)));
        assert!(matches!(repo.delete(user.id).await, Err(DbError::Cancelled)));

        // The cancelled delete never ran
        let mut repo = Users::new(&mut conn);
        assert!(repo.get_by_id(user.id).await.unwrap().is_some());
    }

    /// alice writes a note, edits it, and reads it back with herself as owner
    #[sqlx::test]
    #[test_log::test]
    async fn test_user_note_lifecycle(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();

        let alice = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: "alice".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "opaque".to_string(),
            })
            .await
            .unwrap();

        let mut notes = Notes::new(&mut conn);
        let n1 = notes
            .create(&NoteCreateDBRequest {
                user_id: alice.id,
                title: Some("N1".to_string()),
                content: "first draft".to_string(),
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        notes
            .update(
                n1.id,
                &NoteUpdateDBRequest {
                    content: Some("second draft".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let found = notes.get_by_id(n1.id).await.unwrap().expect("note should exist");
        assert_eq!(found.note.content, "second draft");
        assert!(found.note.updated_at > found.note.created_at);
        assert_eq!(found.owner.id, alice.id);
        assert_eq!(found.note.user_id, alice.id);
    }
}
