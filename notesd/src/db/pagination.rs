//! Offset pagination shared by the list operations.
//!
//! Callers pass `skip` / `take` as-is; out-of-range values are clamped rather than rejected.

/// Default number of items returned when the caller does not say.
pub const DEFAULT_TAKE: i64 = 100;

/// Smallest page that will be returned.
pub const MIN_TAKE: i64 = 1;

/// Largest page that will be returned.
pub const MAX_TAKE: i64 = 200;

/// Offset pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub take: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            take: DEFAULT_TAKE,
        }
    }
}

impl Page {
    pub fn new(skip: i64, take: i64) -> Self {
        Self { skip, take }
    }

    /// Number of rows to skip; negative values become 0.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.skip.max(0)
    }

    /// Number of rows to return, clamped between [`MIN_TAKE`] and [`MAX_TAKE`].
    #[inline]
    pub fn take(&self) -> i64 {
        self.take.clamp(MIN_TAKE, MAX_TAKE)
    }
}
