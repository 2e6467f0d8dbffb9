//! Contract of the remote railway service.
//!
//! The service is the only authority over seats, bookings and payments. It
//! must serialize seat decrements per (train, coach type), deduplicate
//! reservations by correlation id and payments by booking id. How it does
//! that is its own business; anything implementing [`RailwayService`] with
//! those guarantees can back a [`BookingSession`](crate::BookingSession).

use crate::error::ServiceError;
use async_trait::async_trait;
use rail_tikit_core::{
    AllocatedSeat, BookingId, CoachAvailability, CorrelationId, Money, PaymentMethod,
    PaymentStatus, ReservationRequest, TicketSummary, TrainId, VerificationRecord,
};
use serde::{Deserialize, Serialize};

/// Remote railway service.
///
/// Every call is a single outstanding request; retries are the caller's
/// decision.
#[async_trait]
pub trait RailwayService: Send + Sync {
    /// Commits a reservation. The service performs the authoritative seat
    /// check and allocates atomically.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Conflict`] when seats ran out, [`ServiceError::Timeout`]
    /// when the outcome is unknown.
    async fn reserve(
        &self,
        correlation_id: CorrelationId,
        request: &ReservationRequest,
    ) -> Result<ReservationReceipt, ServiceError>;

    /// Looks up a reservation made with `correlation_id`, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Transport and authorization failures.
    async fn find_reservation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<ReservationReceipt>, ServiceError>;

    /// Pays for a booking. Idempotent on `booking_id`: a replay returns the
    /// recorded payment instead of charging again.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PaymentDeclined`] when the provider refuses.
    async fn pay(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError>;

    /// Releases a held, unpaid reservation.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Conflict`] when the booking is already paid.
    async fn cancel(&self, booking_id: BookingId) -> Result<(), ServiceError>;

    /// Current per-coach availability for a train.
    ///
    /// # Errors
    ///
    /// Transport and authorization failures, [`ServiceError::NotFound`] for an unknown train.
    async fn availability(&self, train_id: TrainId) -> Result<Vec<CoachAvailability>, ServiceError>;

    /// Ticket record for a booking. Read-only.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when no such booking is visible to the caller.
    async fn verify(&self, booking_id: BookingId) -> Result<VerificationRecord, ServiceError>;

    /// Bookings of the authenticated user.
    ///
    /// # Errors
    ///
    /// Transport and authorization failures.
    async fn my_tickets(&self) -> Result<Vec<TicketSummary>, ServiceError>;
}

/// Successful reservation, as returned by reserve and lookup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReceipt {
    /// Service-assigned booking id
    pub booking_id: BookingId,
    /// Seats in allocation order
    pub allocated_seats: Vec<AllocatedSeat>,
    /// Amount due
    pub total_amount: Money,
}

/// Answer to a payment call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Recorded payment status
    pub payment_status: PaymentStatus,
    /// Reason when not settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PaymentReceipt {
    /// A settled receipt
    #[must_use]
    pub const fn settled() -> Self {
        Self {
            payment_status: PaymentStatus::Settled,
            reason: None,
        }
    }
}

// ============================================================================
// Wire bodies
// ============================================================================

/// Body of `POST /reservations`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveBody {
    /// Deduplication key
    pub correlation_id: CorrelationId,
    /// Train
    pub train_id: TrainId,
    /// Boarding station
    pub from_station: String,
    /// Destination station
    pub to_station: String,
    /// Date of travel
    pub journey_date: chrono::NaiveDate,
    /// Coach type code
    pub coach_type: String,
    /// Seats requested
    pub ticket_count: u32,
    /// Client's advisory quote
    pub total_amount: Money,
}

impl ReserveBody {
    /// Builds the wire body for a request
    #[must_use]
    pub fn new(correlation_id: CorrelationId, request: &ReservationRequest) -> Self {
        Self {
            correlation_id,
            train_id: request.train_id(),
            from_station: request.from_station().as_str().to_string(),
            to_station: request.to_station().as_str().to_string(),
            journey_date: request.journey_date(),
            coach_type: request.coach_type().code().to_string(),
            ticket_count: request.ticket_count(),
            total_amount: request.quoted_total(),
        }
    }
}

/// Body of `POST /payments`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayBody {
    /// Booking (also the idempotency key)
    pub booking_id: BookingId,
    /// Amount to charge
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
}

/// Body of `POST /cancellations`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBody {
    /// Booking to release
    pub booking_id: BookingId,
}

/// Answer to a cancellation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReceipt {
    /// Whether seats were released
    pub released: bool,
}

/// Error body; the service uses either `reason` or `detail`
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    /// Reason text
    #[serde(default)]
    pub reason: Option<String>,
    /// Reason text, alternative spelling
    #[serde(default)]
    pub detail: Option<String>,
    /// Payment status, present on payment replays
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl ErrorBody {
    /// Reason text, falling back to `fallback` when the body has none
    #[must_use]
    pub fn reason_or(&self, fallback: &str) -> String {
        self.reason
            .clone()
            .or_else(|| self.detail.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}
