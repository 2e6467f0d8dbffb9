//! Calls the reducer asks the shell to make.

use crate::booking::PaymentMethod;
use crate::inventory::RefreshReason;
use crate::request::ReservationRequest;
use crate::types::{BookingId, CorrelationId, Money, TrainId};

/// A remote call, described as data.
///
/// The shell executes each effect and reports the result back as a
/// [`TransactionAction`](super::TransactionAction). Nothing here is retried
/// by the reducer; retry policy belongs to whoever executes the effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionEffect {
    /// Commit a reservation. Not idempotent by itself; the correlation id
    /// lets the service recognise a duplicate.
    Reserve {
        /// Key for deduplication and later lookup
        correlation_id: CorrelationId,
        /// What to reserve
        request: ReservationRequest,
    },
    /// Ask whether a reservation with this correlation id exists
    LookupReservation {
        /// Correlation id sent with the reserve call
        correlation_id: CorrelationId,
    },
    /// Pay for a booking, idempotent on `booking_id`
    Pay {
        /// Booking (and idempotency key)
        booking_id: BookingId,
        /// Amount to charge
        amount: Money,
        /// Payment method
        method: PaymentMethod,
    },
    /// Release a held reservation
    Cancel {
        /// Booking to release
        booking_id: BookingId,
    },
    /// Best-effort availability refresh; the outcome is not fed back
    RefreshInventory {
        /// Train whose availability changed
        train_id: TrainId,
        /// Trigger
        reason: RefreshReason,
    },
}

impl TransactionEffect {
    /// Short name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reserve { .. } => "reserve",
            Self::LookupReservation { .. } => "lookup_reservation",
            Self::Pay { .. } => "pay",
            Self::Cancel { .. } => "cancel",
            Self::RefreshInventory { .. } => "refresh_inventory",
        }
    }
}
