//! Read results annotated with freshness

use chrono::{DateTime, Utc};

/// Whether a read reflects the service right now
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Just read from the service
    Fresh,
    /// Served from cache because the service could not be reached
    Stale {
        /// When the cached value was read
        since: DateTime<Utc>,
        /// Why the fresh read failed
        reason: String,
    },
}

/// A value plus how fresh it is
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observed<T> {
    /// The value
    pub value: T,
    /// Its freshness
    pub freshness: Freshness,
}

impl<T> Observed<T> {
    /// A value read just now
    #[must_use]
    pub const fn fresh(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Fresh,
        }
    }

    /// A cached value served in place of a failed read
    #[must_use]
    pub fn stale(value: T, since: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            value,
            freshness: Freshness::Stale {
                since,
                reason: reason.into(),
            },
        }
    }

    /// Whether the value came from cache
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }

    /// Drops the freshness flag
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }
}
