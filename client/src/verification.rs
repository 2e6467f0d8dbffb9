//! Ticket verification by booking id.
//!
//! Only ever issues `GET /verify/{id}`: calling it any number of times
//! changes nothing on the service.

use crate::error::ServiceError;
use crate::metrics;
use crate::observed::Observed;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::service::RailwayService;
use chrono::{DateTime, Utc};
use rail_tikit_core::{BookingError, BookingId, Clock, VerificationRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Looks up ticket records, falling back to the last answer when the service is down
pub struct VerificationLookup {
    service: Arc<dyn RailwayService>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    cache: RwLock<HashMap<BookingId, (VerificationRecord, DateTime<Utc>)>>,
}

impl VerificationLookup {
    /// Creates a lookup with an empty cache
    #[must_use]
    pub fn new(service: Arc<dyn RailwayService>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            service,
            clock,
            retry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Verifies a booking id as typed by a user or scanned from a ticket.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidRequest`] for non-numeric input, before any
    /// network call. Otherwise as [`VerificationLookup::verify_id`].
    pub async fn verify(&self, input: &str) -> Result<Observed<VerificationRecord>, BookingError> {
        let booking_id: BookingId = input.parse()?;
        self.verify_id(booking_id).await
    }

    /// Verifies a parsed booking id.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] when no such booking exists (an invalid
    /// ticket, not a transient failure). [`BookingError::Unavailable`] when
    /// the service fails and no earlier record is cached.
    pub async fn verify_id(&self, booking_id: BookingId) -> Result<Observed<VerificationRecord>, BookingError> {
        let result = retry_with_predicate(
            &self.retry,
            "verify",
            || self.service.verify(booking_id),
            ServiceError::is_transient,
        )
        .await;

        match result {
            Ok(record) => {
                self.cache
                    .write()
                    .await
                    .insert(booking_id, (record.clone(), self.clock.now()));
                Ok(Observed::fresh(record))
            }
            Err(ServiceError::NotFound { resource }) => {
                self.cache.write().await.remove(&booking_id);
                tracing::info!(%booking_id, "Verification found no such booking");
                Err(BookingError::NotFound { resource })
            }
            Err(error) if error.is_transient() => {
                let cached = self.cache.read().await.get(&booking_id).cloned();
                match cached {
                    Some((record, since)) => {
                        tracing::warn!(%booking_id, error = %error, "Verification failed, serving cached record");
                        metrics::record_stale_read("verification");
                        Ok(Observed::stale(record, since, error.to_string()))
                    }
                    None => Err(error.into()),
                }
            }
            Err(error) => Err(error.into()),
        }
    }
}
