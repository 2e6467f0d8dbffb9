//! The shopper's booking history

use crate::error::ServiceError;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::service::RailwayService;
use chrono::NaiveDate;
use rail_tikit_core::{BookingError, Clock, TicketSummary};

/// Bookings split around today
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TicketHistory {
    /// Journeys today or later, soonest first
    pub upcoming: Vec<TicketSummary>,
    /// Journeys before today, most recent first
    pub past: Vec<TicketSummary>,
}

impl TicketHistory {
    /// Reads the authenticated user's bookings and splits them by journey date.
    ///
    /// # Errors
    ///
    /// Propagates the service failure after retries.
    pub async fn fetch(
        service: &dyn RailwayService,
        retry: &RetryPolicy,
        clock: &dyn Clock,
    ) -> Result<Self, BookingError> {
        let tickets = retry_with_predicate(
            retry,
            "my_tickets",
            || service.my_tickets(),
            ServiceError::is_transient,
        )
        .await?;
        Ok(Self::partition(tickets, clock.today()))
    }

    /// Splits bookings into upcoming and past relative to `today`
    #[must_use]
    pub fn partition(tickets: Vec<TicketSummary>, today: NaiveDate) -> Self {
        let (mut upcoming, mut past): (Vec<_>, Vec<_>) =
            tickets.into_iter().partition(|t| t.journey_date >= today);

        upcoming.sort_by(|a, b| a.journey_date.cmp(&b.journey_date).then(a.booking_id.cmp(&b.booking_id)));
        past.sort_by(|a, b| b.journey_date.cmp(&a.journey_date).then(b.booking_id.cmp(&a.booking_id)));

        Self { upcoming, past }
    }
}
