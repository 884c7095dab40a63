//! Creation/update timestamp bookkeeping.
//!
//! Every repository write goes through one of these functions right before its statement is sent,
//! so `created_at` / `updated_at` are only ever set at save time. Both entity kinds share the same
//! rules:
//!
//! - a new row gets `created_at == updated_at == now`
//! - a modified row keeps `created_at` and gets `updated_at = now`, never earlier than its stored
//!   `created_at` or `updated_at`

use chrono::{DateTime, Utc};

/// The pair of timestamps carried by every persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Timestamps for a row about to be inserted.
pub fn for_insert() -> Timestamps {
    let now = Utc::now();
    Timestamps {
        created_at: now,
        updated_at: now,
    }
}

/// `updated_at` for a row about to be modified.
///
/// The statement applying it must still clamp against the stored timestamps, see
/// [`clamp_updated_at`].
pub fn for_update() -> DateTime<Utc> {
    Utc::now()
}

/// The `updated_at` to write over a stored row: never before its `created_at` and never before its
/// previous `updated_at`, even if the wall clock stepped backwards.
pub fn clamp_updated_at(stored: Timestamps, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(stored.created_at).max(stored.updated_at)
}
