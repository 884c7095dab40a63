//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx SQLite connection (or a transaction, which derefs to one)
//! - Provides strongly-typed CRUD operations
//! - Stamps `created_at` / `updated_at` through [`crate::db::timestamps`] before every write
//! - Returns domain models from [`crate::db::models`]
//! - Passes storage errors through as [`crate::db::errors::DbError`] without further translation
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts; lookups attach the user's notes
//! - [`Notes`]: Notes; lookups attach the owning user
//!
//! # Common Pattern
//!
//! ```ignore
//! use notesd::db::handlers::{Notes, Repository, notes::NoteFilter};
//!
//! async fn example(pool: &sqlx::SqlitePool, user_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Notes::new(&mut conn);
//!
//!     let recent = repo.list(&NoteFilter::new(user_id, 0, 20)).await?;
//!     Ok(())
//! }
//! ```

pub mod notes;
pub mod repository;
pub mod users;

pub use notes::Notes;
pub use repository::Repository;
pub use users::Users;
