//! The transaction value owned by one in-progress purchase.

use crate::booking::{Booking, Payment};
use crate::error::BookingError;
use crate::request::ReservationRequest;
use crate::ticket::{self, TicketArtifact, TicketFormat};
use crate::types::CorrelationId;
use chrono::{DateTime, Utc};
use std::fmt;

/// Where a transaction is in the purchase sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing sent yet
    Idle,
    /// Reservation sent, outcome pending or unresolved
    Reserving,
    /// Seats held, not paid
    Reserved,
    /// Payment sent, outcome pending
    PayingNow,
    /// Paid in full
    Fulfilled,
    /// The service refused the reservation
    ReservationRejected,
    /// Payment declined; seats still held
    PaymentRejected,
    /// Released by the shopper
    Cancelled,
}

impl Phase {
    /// Whether no further command can change the transaction
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Fulfilled | Self::Cancelled)
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Reserving => "reserving",
            Self::Reserved => "reserved",
            Self::PayingNow => "paying",
            Self::Fulfilled => "fulfilled",
            Self::ReservationRejected => "reservation_rejected",
            Self::PaymentRejected => "payment_rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One purchase, from coach selection to ticket.
///
/// Explicitly owned and keyed by its [`CorrelationId`]; there is no ambient
/// "current transaction". Only the reducer mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingTransaction {
    pub(super) correlation_id: CorrelationId,
    pub(super) phase: Phase,
    pub(super) request: Option<ReservationRequest>,
    pub(super) booking: Option<Booking>,
    pub(super) payment: Option<Payment>,
    /// A reserve call timed out and its outcome is not yet known
    pub(super) reservation_unresolved: bool,
    /// Cancel issued while a call was outstanding; executed once it lands
    pub(super) cancel_requested: bool,
    pub(super) cancel_in_flight: bool,
    /// Phase and payment to restore if the pay call is unauthorized
    pub(super) payment_resume: Option<(Phase, Option<Payment>)>,
    pub(super) last_error: Option<BookingError>,
    pub(super) updated_at: DateTime<Utc>,
}

impl BookingTransaction {
    /// Starts an idle transaction
    #[must_use]
    pub const fn new(correlation_id: CorrelationId, now: DateTime<Utc>) -> Self {
        Self {
            correlation_id,
            phase: Phase::Idle,
            request: None,
            booking: None,
            payment: None,
            reservation_unresolved: false,
            cancel_requested: false,
            cancel_in_flight: false,
            payment_resume: None,
            last_error: None,
            updated_at: now,
        }
    }

    /// Client-generated key for this purchase
    #[must_use]
    pub const fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Request most recently submitted
    #[must_use]
    pub const fn request(&self) -> Option<&ReservationRequest> {
        self.request.as_ref()
    }

    /// Booking, once the service confirmed the reservation
    #[must_use]
    pub const fn booking(&self) -> Option<&Booking> {
        self.booking.as_ref()
    }

    /// Payment, once one was attempted
    #[must_use]
    pub const fn payment(&self) -> Option<&Payment> {
        self.payment.as_ref()
    }

    /// Whether a reservation may exist that the client has not seen confirmed
    #[must_use]
    pub const fn reservation_unresolved(&self) -> bool {
        self.reservation_unresolved
    }

    /// Whether a cancellation is waiting for an outstanding call
    #[must_use]
    pub const fn cancel_pending(&self) -> bool {
        self.cancel_requested || self.cancel_in_flight
    }

    /// Error produced by the most recent action, cleared by the next command
    #[must_use]
    pub const fn last_error(&self) -> Option<&BookingError> {
        self.last_error.as_ref()
    }

    /// When the transaction last changed
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Booking and settled payment, only when fulfilled
    #[must_use]
    pub fn fulfilled(&self) -> Option<(&Booking, &Payment)> {
        match (self.phase, &self.booking, &self.payment) {
            (Phase::Fulfilled, Some(booking), Some(payment)) => Some((booking, payment)),
            _ => None,
        }
    }

    /// Renders the ticket for this purchase.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotReady`] until the transaction is fulfilled.
    pub fn ticket(&self, format: TicketFormat) -> Result<TicketArtifact, BookingError> {
        let (booking, payment) = self.fulfilled().ok_or_else(|| BookingError::NotReady {
            reason: format!("transaction is {}", self.phase),
        })?;
        ticket::render(booking, payment, format)
    }
}
