//! Base repository trait for database operations.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Contains the Repository trait.
///
/// A repository is a data access layer for one table. It provides methods for creating, reading,
/// updating, and deleting entities, as well as listing them with simple filters.
use crate::db::errors::{DbError, Result};

/// Base repository trait providing common database operations
///
/// This trait has separate associated types for create requests, update requests, and the shapes
/// returned by writes, single lookups, and listings.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The row returned by writes
    type Response;

    /// The shape returned by a lookup by ID, with related data attached
    type Detail;

    /// The shape returned by list operations
    type Listing;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Detail>>;

    /// List entities with filtering and pagination
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Listing>>;

    /// Delete an entity by ID. Returns whether a row was removed; a missing row is not an error.
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Update an entity by ID
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}

/// Drive a storage call, failing with [`DbError::Cancelled`] if `cancel` fires first.
///
/// Dropping the in-flight future rolls back any open transaction it owns.
pub(crate) async fn run_cancellable<T, F>(cancel: Option<&CancellationToken>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(DbError::Cancelled),
            result = fut => result,
        },
        None => fut.await,
    }
}
