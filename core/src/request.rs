//! Reservation requests and their client-side validation.
//!
//! A [`ReservationRequest`] can only be obtained from
//! [`ReservationRequestBuilder::build`], so every request handed to the
//! coordinator has passed the pre-checks below. The seat-count check against
//! the snapshot is advisory; the service makes the authoritative decision.

use crate::environment::Clock;
use crate::error::{BookingError, RequestField};
use crate::inventory::InventorySnapshot;
use crate::types::{CoachType, Money, StationName, TrainId};
use chrono::NaiveDate;
use serde::Serialize;

/// Most tickets a single reservation may hold
pub const MAX_TICKETS_PER_BOOKING: u32 = 10;

/// A validated request to reserve seats
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReservationRequest {
    train_id: TrainId,
    from_station: StationName,
    to_station: StationName,
    journey_date: NaiveDate,
    coach_type: CoachType,
    ticket_count: u32,
    quoted_total: Money,
}

impl ReservationRequest {
    /// Starts building a request against the snapshot currently on screen
    #[must_use]
    pub const fn builder(snapshot: &InventorySnapshot) -> ReservationRequestBuilder<'_> {
        ReservationRequestBuilder {
            snapshot,
            from_station: None,
            to_station: None,
            journey_date: None,
            coach_type: None,
            ticket_count: None,
        }
    }

    /// Train to travel on
    #[must_use]
    pub const fn train_id(&self) -> TrainId {
        self.train_id
    }

    /// Boarding station
    #[must_use]
    pub const fn from_station(&self) -> &StationName {
        &self.from_station
    }

    /// Destination station
    #[must_use]
    pub const fn to_station(&self) -> &StationName {
        &self.to_station
    }

    /// Date of travel
    #[must_use]
    pub const fn journey_date(&self) -> NaiveDate {
        self.journey_date
    }

    /// Coach type to reserve in
    #[must_use]
    pub const fn coach_type(&self) -> &CoachType {
        &self.coach_type
    }

    /// Number of seats, always in `1..=10`
    #[must_use]
    pub const fn ticket_count(&self) -> u32 {
        self.ticket_count
    }

    /// Price shown when the request was built (price per ticket times count).
    ///
    /// Sent along for the service's reference; the amount charged is the
    /// `total_amount` the service returns with the reservation.
    #[must_use]
    pub const fn quoted_total(&self) -> Money {
        self.quoted_total
    }
}

/// Builder for [`ReservationRequest`].
#[derive(Debug, Clone)]
pub struct ReservationRequestBuilder<'a> {
    snapshot: &'a InventorySnapshot,
    from_station: Option<StationName>,
    to_station: Option<StationName>,
    journey_date: Option<NaiveDate>,
    coach_type: Option<CoachType>,
    ticket_count: Option<u32>,
}

impl ReservationRequestBuilder<'_> {
    /// Set the boarding station
    #[must_use]
    pub fn from_station(mut self, station: impl Into<String>) -> Self {
        self.from_station = Some(StationName::new(station));
        self
    }

    /// Set the destination station
    #[must_use]
    pub fn to_station(mut self, station: impl Into<String>) -> Self {
        self.to_station = Some(StationName::new(station));
        self
    }

    /// Set the date of travel
    #[must_use]
    pub const fn journey_date(mut self, date: NaiveDate) -> Self {
        self.journey_date = Some(date);
        self
    }

    /// Set the coach type
    #[must_use]
    pub fn coach_type(mut self, coach_type: impl Into<String>) -> Self {
        self.coach_type = Some(CoachType::new(coach_type));
        self
    }

    /// Set the number of tickets
    #[must_use]
    pub const fn ticket_count(mut self, count: u32) -> Self {
        self.ticket_count = Some(count);
        self
    }

    /// Validate and build the request. Never touches the network.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRequest`] tagged with the first field
    /// that fails validation.
    pub fn build(self, clock: &dyn Clock) -> Result<ReservationRequest, BookingError> {
        let coach_type = self
            .coach_type
            .ok_or_else(|| BookingError::invalid(RequestField::CoachType, "coach type is required"))?;
        let pool = self.snapshot.coach(&coach_type).ok_or_else(|| {
            BookingError::invalid(
                RequestField::CoachType,
                format!("train {} has no {coach_type} coach", self.snapshot.train_id()),
            )
        })?;

        let ticket_count = self.ticket_count.ok_or_else(|| {
            BookingError::invalid(RequestField::TicketCount, "ticket count is required")
        })?;
        if ticket_count == 0 {
            return Err(BookingError::invalid(
                RequestField::TicketCount,
                "at least one ticket is required",
            ));
        }
        if ticket_count > MAX_TICKETS_PER_BOOKING {
            return Err(BookingError::invalid(
                RequestField::TicketCount,
                format!("cannot book more than {MAX_TICKETS_PER_BOOKING} tickets (requested: {ticket_count})"),
            ));
        }
        if ticket_count > pool.available_seats {
            return Err(BookingError::invalid(
                RequestField::TicketCount,
                format!(
                    "only {} {} seats available, but {ticket_count} requested",
                    pool.available_seats,
                    coach_type.display_name()
                ),
            ));
        }

        let from_station = required_station(self.from_station, RequestField::FromStation)?;
        let to_station = required_station(self.to_station, RequestField::ToStation)?;
        if from_station.same_station(&to_station) {
            return Err(BookingError::invalid(
                RequestField::ToStation,
                "destination must differ from the boarding station",
            ));
        }

        let journey_date = self.journey_date.ok_or_else(|| {
            BookingError::invalid(RequestField::JourneyDate, "journey date is required")
        })?;
        let today = clock.today();
        if journey_date < today {
            return Err(BookingError::invalid(
                RequestField::JourneyDate,
                format!("{journey_date} is in the past (today is {today})"),
            ));
        }

        let quoted_total = pool.price.checked_multiply(ticket_count).ok_or_else(|| {
            BookingError::invalid(RequestField::TicketCount, "total amount overflows")
        })?;

        Ok(ReservationRequest {
            train_id: self.snapshot.train_id(),
            from_station,
            to_station,
            journey_date,
            coach_type,
            ticket_count,
            quoted_total,
        })
    }
}

fn required_station(
    station: Option<StationName>,
    field: RequestField,
) -> Result<StationName, BookingError> {
    match station {
        Some(name) if !name.as_str().trim().is_empty() => Ok(name),
        _ => Err(BookingError::invalid(field, "station is required")),
    }
}
