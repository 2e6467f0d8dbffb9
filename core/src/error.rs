//! Error taxonomy surfaced to the storefront.
//!
//! Every failure a shopper can observe maps onto exactly one [`BookingError`]
//! variant. Transport details stay in the client crate; by the time an error
//! reaches this type it only says what happened to the booking.

use crate::types::CoachType;
use std::fmt;
use thiserror::Error;

/// Field of a reservation (or lookup) input that failed client-side validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestField {
    /// Selected train
    Train,
    /// Coach type selection
    CoachType,
    /// Number of tickets
    TicketCount,
    /// Boarding station
    FromStation,
    /// Destination station
    ToStation,
    /// Date of travel
    JourneyDate,
    /// Booking identifier typed in for verification
    BookingId,
}

impl fmt::Display for RequestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Train => "train_id",
            Self::CoachType => "coach_type",
            Self::TicketCount => "ticket_count",
            Self::FromStation => "from_station",
            Self::ToStation => "to_station",
            Self::JourneyDate => "journey_date",
            Self::BookingId => "booking_id",
        };
        f.write_str(name)
    }
}

/// Errors produced while building, driving or rendering a booking.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BookingError {
    /// Client-side validation failed; nothing was sent.
    #[error("invalid {field}: {reason}")]
    InvalidRequest {
        /// Offending field
        field: RequestField,
        /// Human-readable explanation
        reason: String,
    },

    /// Credential missing or expired; the caller must re-authenticate.
    #[error("authentication required")]
    Unauthorized,

    /// The service refused the operation against current inventory or booking state.
    #[error("conflict: {reason}")]
    Conflict {
        /// Reason reported by the service
        reason: String,
    },

    /// Network or service failure.
    #[error("service unavailable: {reason}")]
    Unavailable {
        /// What went wrong
        reason: String,
    },

    /// The requested booking (or train) does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// A ticket was requested before the booking was fulfilled.
    #[error("ticket not ready: {reason}")]
    NotReady {
        /// Why the booking is not ready
        reason: String,
    },

    /// Payment was rejected; the reservation is still held.
    #[error("payment declined: {reason}")]
    PaymentDeclined {
        /// Decline reason
        reason: String,
    },

    /// The command is not valid in the transaction's current phase.
    #[error("cannot {command} while {phase}")]
    InvalidTransition {
        /// Phase the transaction was in
        phase: String,
        /// Rejected command
        command: &'static str,
    },
}

impl BookingError {
    /// Shorthand for an [`BookingError::InvalidRequest`].
    #[must_use]
    pub fn invalid(field: RequestField, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`BookingError::Unavailable`].
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later can succeed without user action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// An availability feed violated the snapshot invariants.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// More seats reported available than exist.
    #[error("{coach_type}: {available} seats available exceeds {total} total")]
    SeatsExceedTotal {
        /// Coach type
        coach_type: CoachType,
        /// Reported available seats
        available: u32,
        /// Reported total seats
        total: u32,
    },

    /// A coach type was listed without a positive price.
    #[error("{coach_type}: price must be positive")]
    NonPositivePrice {
        /// Coach type
        coach_type: CoachType,
    },
}

impl From<SnapshotError> for BookingError {
    fn from(error: SnapshotError) -> Self {
        Self::unavailable(format!("malformed availability: {error}"))
    }
}
