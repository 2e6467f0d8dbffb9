//! Bookings, payments and the read projections built from them.

use crate::request::ReservationRequest;
use crate::types::{BookingId, CoachType, Money, StationName, TrainId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Booking
// ============================================================================

/// A seat allocated by the service
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocatedSeat {
    /// Coach label (e.g. `"KA"`)
    pub coach_number: String,
    /// Seat label within the coach
    pub seat_number: String,
}

impl fmt::Display for AllocatedSeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coach {}, Seat {}", self.coach_number, self.seat_number)
    }
}

/// Booking status as held by the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Accepted but not yet committed
    Pending,
    /// Seats are allocated to this booking
    Confirmed,
    /// Payment was rejected after the seats were allocated
    PaymentFailed,
    /// Seats were released
    Cancelled,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::PaymentFailed => "payment failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// A reservation accepted by the service.
///
/// Only ever created from a successful reservation response. Seat
/// allocation and amount never change afterwards; only `status` moves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Booking {
    /// Service-assigned identifier
    pub booking_id: BookingId,
    /// What was asked for
    pub request: ReservationRequest,
    /// Seats in allocation order
    pub allocated_seats: Vec<AllocatedSeat>,
    /// Amount due for the whole booking
    pub total_amount: Money,
    /// Current status
    pub status: BookingStatus,
    /// When the reservation was confirmed
    pub reserved_at: DateTime<Utc>,
}

impl Booking {
    /// Price per ticket implied by the total
    #[must_use]
    pub fn unit_price(&self) -> Money {
        let count = u32::try_from(self.allocated_seats.len()).unwrap_or(u32::MAX);
        self.total_amount.checked_split(count).unwrap_or(self.total_amount)
    }
}

// ============================================================================
// Payment
// ============================================================================

/// How the shopper pays
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Generic online checkout
    Online,
    /// Mobile financial service (bKash, Nagad, ...)
    MobileBanking {
        /// Provider name
        provider: String,
    },
    /// Debit or credit card
    Card {
        /// Last four digits of card
        last_four: String,
    },
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("Online"),
            Self::MobileBanking { provider } => write!(f, "Mobile banking ({provider})"),
            Self::Card { last_four } => write!(f, "Card ending {last_four}"),
        }
    }
}

/// Settlement state of a payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Submitted, outcome not known yet
    #[serde(alias = "unpaid")]
    Pending,
    /// Money has been collected
    #[serde(alias = "paid")]
    Settled,
    /// Rejected by the payment provider
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The single payment belonging to a booking.
///
/// Every attempt is sent with the booking id as idempotency key, so however
/// many attempts are made the service records at most one payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Payment {
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Amount charged
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Current status
    pub status: PaymentStatus,
    /// Attempts made so far, including retries after an unknown outcome
    pub attempts: u32,
    /// When settlement was confirmed
    pub settled_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Read projections
// ============================================================================

/// Ticket holder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    /// Full name
    pub name: String,
    /// Contact email
    pub email: String,
}

/// Train as shown on a verified ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainSummary {
    /// Catalog id
    pub train_id: TrainId,
    /// Display name
    pub train_name: String,
}

/// Boarding and destination stations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Boarding station
    pub from_station: StationName,
    /// Destination station
    pub to_station: StationName,
}

/// One seat on a verified ticket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatDetail {
    /// Seat label
    pub seat_number: String,
    /// Coach label
    pub coach_number: String,
    /// Coach type
    pub coach_type: CoachType,
    /// Fare paid for this seat
    pub fare: Money,
}

/// Everything needed to check a ticket, keyed by booking id.
///
/// Always derived on demand by the service; it has no lifecycle of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Booking being verified
    pub booking_id: BookingId,
    /// Booking status
    #[serde(rename = "status")]
    pub booking_status: BookingStatus,
    /// When the booking was made
    #[serde(rename = "booking_date", with = "service_datetime")]
    pub booked_at: NaiveDateTime,
    /// Date of travel
    pub journey_date: NaiveDate,
    /// Ticket holder
    pub passenger: Passenger,
    /// Train
    pub train: TrainSummary,
    /// Stations
    pub route: Route,
    /// Seats in allocation order
    #[serde(rename = "seat_details")]
    pub seats: Vec<SeatDetail>,
    /// Amount paid (or due, if unpaid)
    pub total_amount: Money,
    /// Payment status
    pub payment_status: PaymentStatus,
}

/// A row of the shopper's booking history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
    /// Booking id
    pub booking_id: BookingId,
    /// When the booking was made
    #[serde(rename = "booking_date", with = "service_datetime")]
    pub booked_at: NaiveDateTime,
    /// Date of travel
    pub journey_date: NaiveDate,
    /// Booking status
    pub status: BookingStatus,
    /// Number of seats
    pub ticket_count: u32,
    /// Amount for the booking
    pub total_amount: Money,
    /// Train display name
    pub train_name: String,
    /// Boarding station
    pub from_station: StationName,
    /// Destination station
    pub to_station: StationName,
    /// Coach type
    pub coach_type: CoachType,
}

/// Timestamps as the service writes them (`2026-10-18 09:30:00`); ISO-8601 is
/// accepted on input as well.
mod service_datetime {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| raw.parse::<NaiveDateTime>())
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}
