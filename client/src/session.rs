//! Executes the transaction reducer's effects against the railway service.
//!
//! A [`BookingSession`] owns exactly one [`BookingTransaction`]. Its async
//! methods take `&mut self`, so one session can never have two calls in
//! flight; the reducer's phase guard covers everything else.

use crate::error::ServiceError;
use crate::inventory::InventoryCache;
use crate::metrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::service::{PaymentReceipt, RailwayService, ReservationReceipt};
use rail_tikit_core::{
    Booking, BookingError, BookingId, BookingTransaction, Clock, CorrelationId, Money, Payment,
    PaymentMethod, PaymentStatus, Phase, Reducer, ReservationRejection, ReservationRequest,
    ServiceCall, TicketArtifact, TicketFormat, TransactionAction, TransactionEffect,
    TransactionEnvironment, TransactionReducer,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// One purchase in progress, from coach selection to ticket
pub struct BookingSession {
    service: Arc<dyn RailwayService>,
    inventory: Option<Arc<InventoryCache>>,
    retry: RetryPolicy,
    reducer: TransactionReducer,
    env: TransactionEnvironment,
    transaction: BookingTransaction,
}

impl BookingSession {
    /// Starts a session with a fresh correlation id
    #[must_use]
    pub fn new(service: Arc<dyn RailwayService>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        let transaction = BookingTransaction::new(CorrelationId::new(), clock.now());
        Self {
            service,
            inventory: None,
            retry,
            reducer: TransactionReducer::new(),
            env: TransactionEnvironment::new(clock),
            transaction,
        }
    }

    /// Refresh this cache after purchases and cancellations
    #[must_use]
    pub fn with_inventory(mut self, inventory: Arc<InventoryCache>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// The transaction as it stands
    #[must_use]
    pub const fn transaction(&self) -> &BookingTransaction {
        &self.transaction
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.transaction.phase()
    }

    /// Reserves seats for a validated request.
    ///
    /// A timed-out reservation is looked up by correlation id before the
    /// session reports anything.
    ///
    /// # Errors
    ///
    /// [`BookingError::Conflict`] when the service refused,
    /// [`BookingError::Unavailable`] when the outcome could not be settled
    /// (call [`BookingSession::reconcile`] later), [`BookingError::Unauthorized`],
    /// or [`BookingError::InvalidTransition`] outside `Idle`.
    pub async fn submit(&mut self, request: ReservationRequest) -> Result<&Booking, BookingError> {
        self.dispatch(TransactionAction::Submit { request }).await?;
        self.require(Phase::Reserved)?;
        self.transaction.booking().ok_or_else(|| self.phase_error())
    }

    /// Pays for the held reservation. Retries reuse the booking id as
    /// idempotency key, so at most one payment is ever recorded.
    ///
    /// # Errors
    ///
    /// [`BookingError::PaymentDeclined`] (seats stay held; pay again),
    /// [`BookingError::Unavailable`] when the outcome is unknown (call
    /// [`BookingSession::reconcile`]), [`BookingError::Unauthorized`], or
    /// [`BookingError::InvalidTransition`].
    pub async fn pay(&mut self, method: PaymentMethod) -> Result<&Payment, BookingError> {
        self.dispatch(TransactionAction::InitiatePayment { method }).await?;
        self.require(Phase::Fulfilled)?;
        self.transaction.payment().ok_or_else(|| self.phase_error())
    }

    /// Cancels the purchase, releasing any held seats.
    ///
    /// # Errors
    ///
    /// [`BookingError::Conflict`] when the service refuses (e.g. already paid),
    /// [`BookingError::Unavailable`], [`BookingError::Unauthorized`], or
    /// [`BookingError::InvalidTransition`] once fulfilled.
    pub async fn cancel(&mut self) -> Result<Phase, BookingError> {
        self.dispatch(TransactionAction::Cancel).await?;
        Ok(self.phase())
    }

    /// Resolves an unknown reservation or payment outcome.
    ///
    /// # Errors
    ///
    /// Whatever the resolving call reports.
    pub async fn reconcile(&mut self) -> Result<Phase, BookingError> {
        self.dispatch(TransactionAction::Reconcile).await?;
        Ok(self.phase())
    }

    /// Renders the ticket.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotReady`] until the purchase is fulfilled.
    pub fn ticket(&self, format: TicketFormat) -> Result<TicketArtifact, BookingError> {
        self.transaction.ticket(format)
    }

    /// Feeds an action to the reducer and runs effects until none remain
    async fn dispatch(&mut self, action: TransactionAction) -> Result<(), BookingError> {
        let correlation_id = self.transaction.correlation_id();
        let mut queue: VecDeque<TransactionEffect> =
            self.reducer.reduce(&mut self.transaction, action, &self.env).into_iter().collect();

        while let Some(effect) = queue.pop_front() {
            tracing::debug!(
                %correlation_id,
                effect = effect.name(),
                phase = %self.transaction.phase(),
                "Executing effect"
            );
            if let Some(outcome) = self.execute(effect).await {
                let was_fulfilled = self.transaction.phase() == Phase::Fulfilled;
                let effects = self.reducer.reduce(&mut self.transaction, outcome, &self.env);
                if !was_fulfilled {
                    if let Some((booking, payment)) = self.transaction.fulfilled() {
                        metrics::record_fulfilled(payment.amount, booking.allocated_seats.len());
                    }
                }
                queue.extend(effects);
            }
        }

        tracing::info!(
            %correlation_id,
            phase = %self.transaction.phase(),
            "Transaction settled"
        );

        match self.transaction.last_error() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn require(&self, phase: Phase) -> Result<(), BookingError> {
        if self.transaction.phase() == phase {
            Ok(())
        } else {
            Err(self.phase_error())
        }
    }

    fn phase_error(&self) -> BookingError {
        self.transaction.last_error().cloned().unwrap_or_else(|| BookingError::NotReady {
            reason: format!("transaction is {}", self.transaction.phase()),
        })
    }

    async fn execute(&self, effect: TransactionEffect) -> Option<TransactionAction> {
        match effect {
            TransactionEffect::Reserve {
                correlation_id,
                request,
            } => Some(self.reserve(correlation_id, &request).await),
            TransactionEffect::LookupReservation { correlation_id } => {
                Some(self.lookup(correlation_id).await)
            }
            TransactionEffect::Pay {
                booking_id,
                amount,
                method,
            } => Some(self.pay_once(booking_id, amount, &method).await),
            TransactionEffect::Cancel { booking_id } => Some(self.release(booking_id).await),
            TransactionEffect::RefreshInventory { train_id, reason } => {
                if let Some(inventory) = &self.inventory {
                    // Best effort; the transaction does not depend on it.
                    if let Err(error) = inventory.request_refresh(train_id, reason).await {
                        tracing::warn!(%train_id, error = %error, "Availability refresh failed");
                    }
                }
                None
            }
        }
    }

    /// Single attempt: a reservation is never resubmitted blindly
    async fn reserve(&self, correlation_id: CorrelationId, request: &ReservationRequest) -> TransactionAction {
        let started = Instant::now();
        let result = self.service.reserve(correlation_id, request).await;
        metrics::record_call_duration("reserve", started.elapsed());

        let (outcome, action) = match result {
            Ok(receipt) => {
                tracing::info!(
                    %correlation_id,
                    booking_id = %receipt.booking_id,
                    seats = receipt.allocated_seats.len(),
                    "Reservation confirmed"
                );
                ("confirmed", confirmed(receipt))
            }
            Err(ServiceError::Conflict { reason }) => {
                tracing::info!(%correlation_id, %reason, "Reservation rejected: insufficient seats");
                (
                    "rejected",
                    TransactionAction::ReservationRejected {
                        rejection: ReservationRejection::InsufficientSeats { reason },
                    },
                )
            }
            Err(ServiceError::NotFound { resource }) => (
                "rejected",
                TransactionAction::ReservationRejected {
                    rejection: ReservationRejection::InvalidSelection {
                        reason: format!("{resource} not found"),
                    },
                },
            ),
            Err(ServiceError::Rejected { status, reason }) if !ServiceError::transient_status(status) => (
                "rejected",
                TransactionAction::ReservationRejected {
                    rejection: ReservationRejection::InvalidSelection { reason },
                },
            ),
            Err(ServiceError::Unauthorized) => (
                "unauthorized",
                TransactionAction::Unauthorized {
                    call: ServiceCall::Reserve,
                },
            ),
            Err(error) => {
                tracing::warn!(%correlation_id, error = %error, "Reservation outcome unknown");
                (
                    "unknown",
                    TransactionAction::ReservationOutcomeUnknown {
                        reason: error.to_string(),
                    },
                )
            }
        };
        metrics::record_reservation(outcome);
        action
    }

    async fn lookup(&self, correlation_id: CorrelationId) -> TransactionAction {
        let result = retry_with_predicate(
            &self.retry,
            "find_reservation",
            || self.service.find_reservation(correlation_id),
            ServiceError::is_transient,
        )
        .await;

        match result {
            Ok(Some(receipt)) => {
                tracing::info!(%correlation_id, booking_id = %receipt.booking_id, "Reservation found by lookup");
                metrics::record_reservation("confirmed");
                confirmed(receipt)
            }
            Ok(None) => {
                tracing::info!(%correlation_id, "No reservation recorded; safe to resubmit");
                TransactionAction::ReservationAbsent
            }
            Err(ServiceError::Unauthorized) => TransactionAction::Unauthorized {
                call: ServiceCall::Lookup,
            },
            Err(error) => TransactionAction::ReservationLookupFailed {
                reason: error.to_string(),
            },
        }
    }

    async fn pay_once(&self, booking_id: BookingId, amount: Money, method: &PaymentMethod) -> TransactionAction {
        let started = Instant::now();
        let result = retry_with_predicate(
            &self.retry,
            "pay",
            || self.service.pay(booking_id, amount, method),
            ServiceError::is_transient,
        )
        .await;
        metrics::record_call_duration("pay", started.elapsed());

        let (outcome, action) = match result {
            Ok(PaymentReceipt {
                payment_status: PaymentStatus::Settled,
                ..
            }) => {
                tracing::info!(%booking_id, %amount, "Payment settled");
                ("settled", TransactionAction::PaymentSettled { booking_id, amount })
            }
            Ok(PaymentReceipt {
                payment_status: PaymentStatus::Failed,
                reason,
            }) => (
                "declined",
                TransactionAction::PaymentRejected {
                    reason: reason.unwrap_or_else(|| "payment failed".to_string()),
                },
            ),
            Ok(PaymentReceipt {
                payment_status: PaymentStatus::Pending,
                ..
            }) => (
                "unknown",
                TransactionAction::PaymentOutcomeUnknown {
                    reason: "payment is still pending".to_string(),
                },
            ),
            Err(ServiceError::PaymentDeclined { reason } | ServiceError::Conflict { reason }) => {
                tracing::info!(%booking_id, %reason, "Payment declined");
                ("declined", TransactionAction::PaymentRejected { reason })
            }
            Err(ServiceError::NotFound { resource }) => (
                "declined",
                TransactionAction::PaymentRejected {
                    reason: format!("{resource} not found"),
                },
            ),
            Err(ServiceError::Unauthorized) => (
                "unauthorized",
                TransactionAction::Unauthorized { call: ServiceCall::Pay },
            ),
            Err(error) => {
                tracing::warn!(%booking_id, error = %error, "Payment outcome unknown");
                (
                    "unknown",
                    TransactionAction::PaymentOutcomeUnknown {
                        reason: error.to_string(),
                    },
                )
            }
        };
        metrics::record_payment(outcome);
        action
    }

    async fn release(&self, booking_id: BookingId) -> TransactionAction {
        let result = retry_with_predicate(
            &self.retry,
            "cancel",
            || self.service.cancel(booking_id),
            ServiceError::is_transient,
        )
        .await;

        let (outcome, action) = match result {
            Ok(()) => {
                tracing::info!(%booking_id, "Reservation released");
                ("released", TransactionAction::CancellationConfirmed)
            }
            Err(ServiceError::Conflict { reason }) => {
                ("refused", TransactionAction::CancellationRefused { reason })
            }
            Err(ServiceError::NotFound { resource }) => (
                "refused",
                TransactionAction::CancellationRefused {
                    reason: format!("{resource} not found"),
                },
            ),
            Err(ServiceError::Unauthorized) => (
                "unauthorized",
                TransactionAction::Unauthorized {
                    call: ServiceCall::Cancel,
                },
            ),
            Err(error) => (
                "failed",
                TransactionAction::CancellationFailed {
                    reason: error.to_string(),
                },
            ),
        };
        metrics::record_cancellation(outcome);
        action
    }
}

fn confirmed(receipt: ReservationReceipt) -> TransactionAction {
    TransactionAction::ReservationConfirmed {
        booking_id: receipt.booking_id,
        allocated_seats: receipt.allocated_seats,
        total_amount: receipt.total_amount,
    }
}
