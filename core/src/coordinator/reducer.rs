use super::actions::{ReservationRejection, ServiceCall, TransactionAction};
use super::effects::TransactionEffect;
use super::state::{BookingTransaction, Phase};
use crate::booking::{AllocatedSeat, Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus};
use crate::environment::Clock;
use crate::error::BookingError;
use crate::inventory::RefreshReason;
use crate::reducer::Reducer;
use crate::request::ReservationRequest;
use crate::types::{BookingId, Money};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;

type Effects = SmallVec<[TransactionEffect; 4]>;

/// Dependencies of the transaction reducer
#[derive(Clone)]
pub struct TransactionEnvironment {
    /// Time source for timestamps
    pub clock: Arc<dyn Clock>,
}

impl TransactionEnvironment {
    /// Creates an environment around a clock
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// The booking transaction state machine.
///
/// Reservation and payment are separate stages: a declined payment keeps the
/// seats held so the shopper can pay again without re-reserving. A reserve
/// call with an unknown outcome is resolved by looking the reservation up
/// by correlation id before anything else is attempted.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionReducer;

impl TransactionReducer {
    /// Creates the reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn reject(state: &mut BookingTransaction, command: &'static str) -> Effects {
        state.last_error = Some(BookingError::InvalidTransition {
            phase: state.phase.to_string(),
            command,
        });
        SmallVec::new()
    }

    fn submit(state: &mut BookingTransaction, request: ReservationRequest) -> Effects {
        if state.phase != Phase::Idle {
            return Self::reject(state, "submit");
        }

        state.phase = Phase::Reserving;
        state.request = Some(request.clone());
        smallvec![TransactionEffect::Reserve {
            correlation_id: state.correlation_id,
            request,
        }]
    }

    fn initiate_payment(state: &mut BookingTransaction, method: PaymentMethod) -> Effects {
        if !matches!(state.phase, Phase::Reserved | Phase::PaymentRejected) || state.cancel_in_flight {
            return Self::reject(state, "pay");
        }
        let Some(booking) = &state.booking else {
            return Self::reject(state, "pay");
        };

        let booking_id = booking.booking_id;
        let amount = booking.total_amount;
        let attempts = state.payment.as_ref().map_or(0, |p| p.attempts);

        state.payment_resume = Some((state.phase, state.payment.clone()));
        state.phase = Phase::PayingNow;
        state.payment = Some(Payment {
            booking_id,
            amount,
            method: method.clone(),
            status: PaymentStatus::Pending,
            attempts: attempts.saturating_add(1),
            settled_at: None,
        });

        smallvec![TransactionEffect::Pay {
            booking_id,
            amount,
            method,
        }]
    }

    fn cancel(state: &mut BookingTransaction) -> Effects {
        match state.phase {
            Phase::Idle | Phase::ReservationRejected => {
                state.phase = Phase::Cancelled;
                SmallVec::new()
            }
            Phase::Reserving if state.reservation_unresolved => {
                // Nothing is outstanding to deliver the outcome; ask for it.
                state.cancel_requested = true;
                smallvec![TransactionEffect::LookupReservation {
                    correlation_id: state.correlation_id,
                }]
            }
            Phase::Reserving | Phase::PayingNow => {
                state.cancel_requested = true;
                SmallVec::new()
            }
            Phase::Reserved | Phase::PaymentRejected => {
                if state.cancel_in_flight {
                    return SmallVec::new();
                }
                Self::release(state)
            }
            Phase::Fulfilled | Phase::Cancelled => Self::reject(state, "cancel"),
        }
    }

    fn release(state: &mut BookingTransaction) -> Effects {
        state.cancel_requested = false;
        match &state.booking {
            Some(booking) => {
                state.cancel_in_flight = true;
                smallvec![TransactionEffect::Cancel {
                    booking_id: booking.booking_id,
                }]
            }
            None => {
                state.phase = Phase::Cancelled;
                SmallVec::new()
            }
        }
    }

    fn reconcile(state: &mut BookingTransaction) -> Effects {
        if state.phase == Phase::Reserving && state.reservation_unresolved {
            return smallvec![TransactionEffect::LookupReservation {
                correlation_id: state.correlation_id,
            }];
        }

        // A payment left pending by an unknown outcome is replayed under the
        // same idempotency key; the service answers with the recorded result.
        let pending_method = state
            .payment
            .as_ref()
            .filter(|p| p.status == PaymentStatus::Pending)
            .map(|p| p.method.clone());
        match (state.phase, pending_method) {
            (Phase::Reserved, Some(method)) => Self::initiate_payment(state, method),
            _ => SmallVec::new(),
        }
    }

    fn reservation_confirmed(
        state: &mut BookingTransaction,
        booking_id: BookingId,
        allocated_seats: Vec<AllocatedSeat>,
        total_amount: Money,
        env: &TransactionEnvironment,
    ) -> Effects {
        if state.phase != Phase::Reserving {
            return SmallVec::new();
        }
        let Some(request) = state.request.clone() else {
            return SmallVec::new();
        };

        state.booking = Some(Booking {
            booking_id,
            request,
            allocated_seats,
            total_amount,
            status: BookingStatus::Confirmed,
            reserved_at: env.clock.now(),
        });
        state.reservation_unresolved = false;
        state.phase = Phase::Reserved;
        state.last_error = None;

        if state.cancel_requested {
            return Self::release(state);
        }
        SmallVec::new()
    }

    fn reservation_rejected(state: &mut BookingTransaction, rejection: ReservationRejection) -> Effects {
        if state.phase != Phase::Reserving {
            return SmallVec::new();
        }

        state.reservation_unresolved = false;
        state.last_error = Some(BookingError::Conflict {
            reason: rejection.reason().to_string(),
        });
        state.phase = if state.cancel_requested {
            state.cancel_requested = false;
            Phase::Cancelled
        } else {
            Phase::ReservationRejected
        };

        match (rejection, &state.request) {
            (ReservationRejection::InsufficientSeats { .. }, Some(request)) => {
                smallvec![TransactionEffect::RefreshInventory {
                    train_id: request.train_id(),
                    reason: RefreshReason::ReservationConflict,
                }]
            }
            _ => SmallVec::new(),
        }
    }

    fn reservation_unknown(state: &mut BookingTransaction, reason: String) -> Effects {
        if state.phase != Phase::Reserving {
            return SmallVec::new();
        }

        state.reservation_unresolved = true;
        state.last_error = Some(BookingError::Unavailable { reason });
        smallvec![TransactionEffect::LookupReservation {
            correlation_id: state.correlation_id,
        }]
    }

    fn reservation_absent(state: &mut BookingTransaction) -> Effects {
        if state.phase != Phase::Reserving || !state.reservation_unresolved {
            return SmallVec::new();
        }

        state.reservation_unresolved = false;
        if state.cancel_requested {
            state.cancel_requested = false;
            state.last_error = None;
            state.phase = Phase::Cancelled;
        } else {
            state.phase = Phase::Idle;
        }
        SmallVec::new()
    }

    fn payment_settled(
        state: &mut BookingTransaction,
        booking_id: BookingId,
        env: &TransactionEnvironment,
    ) -> Effects {
        if state.phase != Phase::PayingNow {
            return SmallVec::new();
        }
        let (Some(booking), Some(payment)) = (&state.booking, &mut state.payment) else {
            return SmallVec::new();
        };
        if booking.booking_id != booking_id || payment.booking_id != booking_id {
            return SmallVec::new();
        }

        payment.status = PaymentStatus::Settled;
        payment.settled_at = Some(env.clock.now());
        let train_id = booking.request.train_id();

        state.phase = Phase::Fulfilled;
        state.payment_resume = None;
        state.last_error = None;
        if state.cancel_requested {
            state.cancel_requested = false;
            state.last_error = Some(BookingError::Conflict {
                reason: format!("booking {booking_id} was paid before it could be cancelled"),
            });
        }

        smallvec![TransactionEffect::RefreshInventory {
            train_id,
            reason: RefreshReason::TransactionFulfilled,
        }]
    }

    fn payment_rejected(state: &mut BookingTransaction, reason: String) -> Effects {
        if state.phase != Phase::PayingNow {
            return SmallVec::new();
        }

        if let Some(payment) = &mut state.payment {
            payment.status = PaymentStatus::Failed;
        }
        state.phase = Phase::PaymentRejected;
        state.payment_resume = None;
        state.last_error = Some(BookingError::PaymentDeclined { reason });

        if state.cancel_requested {
            return Self::release(state);
        }
        SmallVec::new()
    }

    fn payment_unknown(state: &mut BookingTransaction, reason: String) -> Effects {
        if state.phase != Phase::PayingNow {
            return SmallVec::new();
        }

        // Payment stays Pending: it may have gone through.
        state.phase = Phase::Reserved;
        state.payment_resume = None;
        state.last_error = Some(BookingError::Unavailable { reason });

        if state.cancel_requested {
            return Self::release(state);
        }
        SmallVec::new()
    }

    fn cancellation_confirmed(state: &mut BookingTransaction) -> Effects {
        if !state.cancel_in_flight {
            return SmallVec::new();
        }

        state.cancel_in_flight = false;
        state.phase = Phase::Cancelled;
        state.last_error = None;
        match &mut state.booking {
            Some(booking) => {
                booking.status = BookingStatus::Cancelled;
                smallvec![TransactionEffect::RefreshInventory {
                    train_id: booking.request.train_id(),
                    reason: RefreshReason::TransactionCancelled,
                }]
            }
            None => SmallVec::new(),
        }
    }

    fn cancellation_failed(state: &mut BookingTransaction, error: BookingError) -> Effects {
        if !state.cancel_in_flight {
            return SmallVec::new();
        }

        state.cancel_in_flight = false;
        state.last_error = Some(error);
        SmallVec::new()
    }

    fn unauthorized(state: &mut BookingTransaction, call: ServiceCall) -> Effects {
        match call {
            ServiceCall::Reserve if state.phase == Phase::Reserving => {
                state.phase = Phase::Idle;
                state.reservation_unresolved = false;
                state.cancel_requested = false;
            }
            ServiceCall::Pay if state.phase == Phase::PayingNow => {
                let (phase, payment) = state.payment_resume.take().unwrap_or((Phase::Reserved, None));
                state.phase = phase;
                state.payment = payment;
                state.cancel_requested = false;
            }
            ServiceCall::Cancel => state.cancel_in_flight = false,
            // Lookup: the reservation stays unresolved until a later reconcile.
            _ => {}
        }

        state.last_error = Some(BookingError::Unauthorized);
        SmallVec::new()
    }
}

impl Reducer for TransactionReducer {
    type State = BookingTransaction;
    type Action = TransactionAction;
    type Effect = TransactionEffect;
    type Environment = TransactionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Self::Effect; 4]> {
        state.updated_at = env.clock.now();

        match action {
            // Commands start from a clean error slot.
            TransactionAction::Submit { request } => {
                state.last_error = None;
                Self::submit(state, request)
            }
            TransactionAction::InitiatePayment { method } => {
                state.last_error = None;
                Self::initiate_payment(state, method)
            }
            TransactionAction::Cancel => {
                state.last_error = None;
                Self::cancel(state)
            }
            TransactionAction::Reconcile => {
                state.last_error = None;
                Self::reconcile(state)
            }

            TransactionAction::ReservationConfirmed {
                booking_id,
                allocated_seats,
                total_amount,
            } => Self::reservation_confirmed(state, booking_id, allocated_seats, total_amount, env),
            TransactionAction::ReservationRejected { rejection } => {
                Self::reservation_rejected(state, rejection)
            }
            TransactionAction::ReservationOutcomeUnknown { reason } => {
                Self::reservation_unknown(state, reason)
            }
            TransactionAction::ReservationAbsent => Self::reservation_absent(state),
            TransactionAction::ReservationLookupFailed { reason } => {
                if state.phase == Phase::Reserving && state.reservation_unresolved {
                    state.last_error = Some(BookingError::Unavailable { reason });
                }
                SmallVec::new()
            }

            TransactionAction::PaymentSettled { booking_id, amount: _ } => {
                Self::payment_settled(state, booking_id, env)
            }
            TransactionAction::PaymentRejected { reason } => Self::payment_rejected(state, reason),
            TransactionAction::PaymentOutcomeUnknown { reason } => {
                Self::payment_unknown(state, reason)
            }

            TransactionAction::CancellationConfirmed => Self::cancellation_confirmed(state),
            TransactionAction::CancellationRefused { reason } => {
                Self::cancellation_failed(state, BookingError::Conflict { reason })
            }
            TransactionAction::CancellationFailed { reason } => {
                Self::cancellation_failed(state, BookingError::Unavailable { reason })
            }

            TransactionAction::Unauthorized { call } => Self::unauthorized(state, call),
        }
    }
}
