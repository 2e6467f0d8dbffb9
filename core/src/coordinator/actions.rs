//! Inputs to the transaction reducer: user commands and call outcomes.

use crate::booking::{AllocatedSeat, PaymentMethod};
use crate::request::ReservationRequest;
use crate::types::{BookingId, Money};
use std::fmt;

/// Remote call an outcome refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceCall {
    /// Seat reservation
    Reserve,
    /// Reservation lookup by correlation id
    Lookup,
    /// Payment
    Pay,
    /// Cancellation
    Cancel,
}

impl ServiceCall {
    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Lookup => "lookup",
            Self::Pay => "pay",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the service turned a reservation down
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationRejection {
    /// Fewer seats left than requested at commit time
    InsufficientSeats {
        /// Reason reported by the service
        reason: String,
    },
    /// Train, date or coach type not accepted
    InvalidSelection {
        /// Reason reported by the service
        reason: String,
    },
}

impl ReservationRejection {
    /// Reason text reported by the service
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::InsufficientSeats { reason } | Self::InvalidSelection { reason } => reason,
        }
    }
}

/// Everything that can happen to a booking transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionAction {
    // Commands
    /// Reserve seats for a validated request
    Submit {
        /// The request to commit
        request: ReservationRequest,
    },
    /// Pay for the held reservation
    InitiatePayment {
        /// How to pay
        method: PaymentMethod,
    },
    /// Release whatever the transaction holds
    Cancel,
    /// Resolve an outcome that is still unknown
    Reconcile,

    // Reservation outcomes
    /// Service allocated the seats
    ReservationConfirmed {
        /// Service-assigned id
        booking_id: BookingId,
        /// Seats in allocation order
        allocated_seats: Vec<AllocatedSeat>,
        /// Amount due
        total_amount: Money,
    },
    /// Service refused the reservation
    ReservationRejected {
        /// Why
        rejection: ReservationRejection,
    },
    /// Reserve call ended without a definite answer
    ReservationOutcomeUnknown {
        /// What went wrong
        reason: String,
    },
    /// Lookup found no reservation for the correlation id
    ReservationAbsent,
    /// Lookup itself failed
    ReservationLookupFailed {
        /// What went wrong
        reason: String,
    },

    // Payment outcomes
    /// Payment is settled
    PaymentSettled {
        /// Booking the settlement refers to
        booking_id: BookingId,
        /// Amount collected
        amount: Money,
    },
    /// Payment was declined
    PaymentRejected {
        /// Decline reason
        reason: String,
    },
    /// Pay call ended without a definite answer
    PaymentOutcomeUnknown {
        /// What went wrong
        reason: String,
    },

    // Cancellation outcomes
    /// Seats were released
    CancellationConfirmed,
    /// Service refused to cancel (e.g. already paid)
    CancellationRefused {
        /// Reason reported by the service
        reason: String,
    },
    /// Cancel call failed
    CancellationFailed {
        /// What went wrong
        reason: String,
    },

    /// A call was rejected for lack of a valid credential
    Unauthorized {
        /// Which call
        call: ServiceCall,
    },
}
