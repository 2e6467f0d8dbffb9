//! Point-in-time view of seat availability for one train.
//!
//! A snapshot is advisory: it drives what the shopper sees and the fast
//! pre-checks in the request builder, but the remote service alone decides
//! whether seats are actually free when a reservation is committed.

use crate::error::SnapshotError;
use crate::types::{CoachType, Money, TrainId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the availability feed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachAvailability {
    /// Coach type this row describes
    pub coach_type: CoachType,
    /// Seats not yet allocated
    pub available_seats: u32,
    /// Seats in the pool
    pub total_seats: u32,
    /// Price per ticket
    pub price: Money,
}

/// Seat counts and price for one coach type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachInventory {
    /// Seats not yet allocated
    pub available_seats: u32,
    /// Seats in the pool
    pub total_seats: u32,
    /// Price per ticket
    pub price: Money,
}

/// Immutable availability snapshot for one train.
///
/// Invariant: for every coach type `available_seats <= total_seats` and
/// `price > 0`. Enforced at construction; there are no mutators. A refresh
/// produces a new snapshot that replaces the old one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InventorySnapshot {
    train_id: TrainId,
    taken_at: DateTime<Utc>,
    per_coach: BTreeMap<CoachType, CoachInventory>,
}

impl InventorySnapshot {
    /// Builds a snapshot from availability rows.
    ///
    /// Several coaches of the same type are folded into one pool by summing
    /// their seats; the first row's price is kept.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if any row reports more available than total
    /// seats or a zero price.
    pub fn new(
        train_id: TrainId,
        taken_at: DateTime<Utc>,
        rows: impl IntoIterator<Item = CoachAvailability>,
    ) -> Result<Self, SnapshotError> {
        let mut per_coach: BTreeMap<CoachType, CoachInventory> = BTreeMap::new();

        for row in rows {
            if row.available_seats > row.total_seats {
                return Err(SnapshotError::SeatsExceedTotal {
                    coach_type: row.coach_type,
                    available: row.available_seats,
                    total: row.total_seats,
                });
            }
            if row.price.is_zero() {
                return Err(SnapshotError::NonPositivePrice {
                    coach_type: row.coach_type,
                });
            }

            per_coach
                .entry(row.coach_type)
                .and_modify(|pool| {
                    pool.available_seats = pool.available_seats.saturating_add(row.available_seats);
                    pool.total_seats = pool.total_seats.saturating_add(row.total_seats);
                })
                .or_insert(CoachInventory {
                    available_seats: row.available_seats,
                    total_seats: row.total_seats,
                    price: row.price,
                });
        }

        Ok(Self {
            train_id,
            taken_at,
            per_coach,
        })
    }

    /// Train this snapshot describes
    #[must_use]
    pub const fn train_id(&self) -> TrainId {
        self.train_id
    }

    /// When the availability was read
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Inventory for a coach type, if the train has it
    #[must_use]
    pub fn coach(&self, coach_type: &CoachType) -> Option<&CoachInventory> {
        self.per_coach.get(coach_type)
    }

    /// All coach types in a stable order
    pub fn coaches(&self) -> impl Iterator<Item = (&CoachType, &CoachInventory)> {
        self.per_coach.iter()
    }

    /// Seats available across every coach type
    #[must_use]
    pub fn total_available(&self) -> u32 {
        self.per_coach
            .values()
            .fold(0u32, |sum, pool| sum.saturating_add(pool.available_seats))
    }
}

/// Why an availability refresh was requested.
///
/// Refreshes are events, never timers: each one names its trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshReason {
    /// A purchase completed and seats were consumed
    TransactionFulfilled,
    /// A held reservation was released
    TransactionCancelled,
    /// The service rejected a reservation the snapshot said would fit
    ReservationConflict,
    /// The shopper came back to the coach selection view
    ViewResumed,
    /// Explicit reload
    UserRequested,
}

impl RefreshReason {
    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionFulfilled => "transaction_fulfilled",
            Self::TransactionCancelled => "transaction_cancelled",
            Self::ReservationConflict => "reservation_conflict",
            Self::ViewResumed => "view_resumed",
            Self::UserRequested => "user_requested",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(coach: &str, available: u32, total: u32, price: u64) -> CoachAvailability {
        CoachAvailability {
            coach_type: CoachType::new(coach),
            available_seats: available,
            total_seats: total,
            price: Money::from_taka(price).unwrap(),
        }
    }

    #[test]
    fn test_snapshot_from_feed() {
        let snapshot = InventorySnapshot::new(
            TrainId::new(7),
            Utc::now(),
            vec![row("AC_Chair", 72, 80, 1200), row("Shovon", 0, 108, 400)],
        )
        .unwrap();

        let chair = snapshot.coach(&CoachType::new("AC_Chair")).unwrap();
        assert_eq!(chair.available_seats, 72);
        assert_eq!(chair.price, Money::from_taka(1200).unwrap());
        assert_eq!(snapshot.total_available(), 72);
        assert!(snapshot.coach(&CoachType::new("AC_Cabin")).is_none());
    }

    #[test]
    fn test_same_coach_type_is_folded() {
        let snapshot = InventorySnapshot::new(
            TrainId::new(7),
            Utc::now(),
            vec![row("Snigdha", 10, 45, 800), row("Snigdha", 5, 45, 800)],
        )
        .unwrap();

        let pool = snapshot.coach(&CoachType::new("Snigdha")).unwrap();
        assert_eq!(pool.available_seats, 15);
        assert_eq!(pool.total_seats, 90);
        assert_eq!(snapshot.coaches().count(), 1);
    }

    #[test]
    fn test_rejects_overfull_coach() {
        let err = InventorySnapshot::new(TrainId::new(1), Utc::now(), vec![row("AC_Cabin", 25, 24, 2500)])
            .unwrap_err();
        assert!(matches!(err, SnapshotError::SeatsExceedTotal { available: 25, total: 24, .. }));
    }

    #[test]
    fn test_rejects_free_coach() {
        let err = InventorySnapshot::new(TrainId::new(1), Utc::now(), vec![row("Shovon", 1, 2, 0)])
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NonPositivePrice { .. }));
    }

    proptest! {
        #[test]
        fn prop_accepted_snapshots_never_oversell(
            rows in proptest::collection::vec((0u32..200, 0u32..200, 1u64..5000, 0usize..4), 0..12)
        ) {
            let names = ["AC_Cabin", "AC_Chair", "Snigdha", "Shovon"];
            let feed: Vec<_> = rows
                .iter()
                .map(|(a, t, p, n)| row(names[*n], *a, *t, *p))
                .collect();

            match InventorySnapshot::new(TrainId::new(1), Utc::now(), feed) {
                Ok(snapshot) => {
                    for (_, pool) in snapshot.coaches() {
                        prop_assert!(pool.available_seats <= pool.total_seats);
                        prop_assert!(!pool.price.is_zero());
                    }
                }
                Err(SnapshotError::SeatsExceedTotal { available, total, .. }) => {
                    prop_assert!(available > total);
                }
                Err(SnapshotError::NonPositivePrice { .. }) => prop_assert!(false),
            }
        }
    }
}
