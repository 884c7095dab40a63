//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with SQLite.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Callers    │  (HTTP layer, library users)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries, pagination, eager loading)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - records; db::timestamps - save-time stamping)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │  (constraints, unique indexes, cascading foreign key)
//! └─────────────┘
//! ```
//!
//! # Connections
//!
//! Every unit of work takes its own connection from the pool and builds repositories over it:
//!
//! ```ignore
//! let mut conn = pool.acquire().await?;
//! let mut users = Users::new(&mut conn);
//! let alice = users.get_by_username("alice").await?;
//! ```
//!
//! # Migrations
//!
//! The schema lives in the `migrations/` directory and is applied on startup through
//! [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
pub mod pagination;
pub mod timestamps;

use sqlx::SqlitePool;

/// Touch the database with a trivial query; `false` if it cannot be reached.
pub async fn can_connect(pool: &SqlitePool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Database connectivity check failed: {}", e);
            false
        }
    }
}
