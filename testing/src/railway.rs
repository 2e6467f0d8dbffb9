//! In-memory railway service.
//!
//! Behaves like the real service where the client depends on it: seats come
//! from per-coach pools that never go negative, reservations are deduplicated
//! by correlation id, payments are idempotent by booking id, and a paid
//! booking cannot be cancelled. Faults can be queued per operation to drive
//! the client through timeouts, outages and declines.

use async_trait::async_trait;
use chrono::NaiveDate;
use rail_tikit_client::{PaymentReceipt, RailwayService, ReservationReceipt, ServiceError};
use rail_tikit_core::{
    AllocatedSeat, BookingId, BookingStatus, Clock, CoachAvailability, CoachType, CorrelationId,
    DateTime, Money, Passenger, PaymentMethod, PaymentStatus, ReservationRequest, Route, SeatDetail,
    StationName, TicketSummary, TrainId, TrainSummary, Utc, VerificationRecord,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Service operations faults can be attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `POST /reservations`
    Reserve,
    /// `GET /reservations/by-correlation/{id}`
    Lookup,
    /// `POST /payments`
    Pay,
    /// `POST /cancellations`
    Cancel,
    /// `GET /availability/{train}`
    Availability,
    /// `GET /verify/{booking}`
    Verify,
    /// `GET /my-tickets`
    MyTickets,
}

/// A failure to inject into the next call of an operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Times out before the service does anything
    Timeout,
    /// Connection refused before the service does anything
    Unreachable,
    /// Credential rejected
    Unauthorized,
    /// 503 before the service does anything
    ServerError,
    /// Payment provider declines the charge
    Decline {
        /// Decline reason
        reason: String,
    },
    /// The service commits the change, then the response is lost
    TimeoutAfterCommit,
    /// The service answers from the state at arrival, but the response
    /// takes `delay` to come back
    SlowResponse {
        /// How long the response is held back
        delay: Duration,
    },
}

/// A coach on a seeded train
#[derive(Clone, Debug)]
pub struct CoachFixture {
    /// Coach type
    pub coach_type: CoachType,
    /// Coach label printed on tickets
    pub coach_number: String,
    /// Seats in the coach
    pub total_seats: u32,
    /// Seats still free when the service starts
    pub available_seats: u32,
    /// Fare per seat
    pub price: Money,
}

impl CoachFixture {
    /// A coach with `available_seats` of `total_seats` free at `price_taka` each
    #[must_use]
    pub fn new(coach_type: &str, coach_number: &str, total_seats: u32, available_seats: u32, price_taka: u64) -> Self {
        Self {
            coach_type: CoachType::new(coach_type),
            coach_number: coach_number.to_string(),
            total_seats,
            available_seats: available_seats.min(total_seats),
            price: Money::from_taka(price_taka).unwrap_or_default(),
        }
    }
}

/// A train the service knows about
#[derive(Clone, Debug)]
pub struct TrainFixture {
    /// Catalog id
    pub train_id: TrainId,
    /// Display name
    pub name: String,
    /// Coaches on the train
    pub coaches: Vec<CoachFixture>,
}

impl TrainFixture {
    /// A train with no coaches yet
    #[must_use]
    pub fn new(train_id: u64, name: &str) -> Self {
        Self {
            train_id: TrainId::new(train_id),
            name: name.to_string(),
            coaches: Vec::new(),
        }
    }

    /// Adds a coach
    #[must_use]
    pub fn coach(mut self, coach: CoachFixture) -> Self {
        self.coaches.push(coach);
        self
    }
}

/// What the service recorded for a booking's payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRecord {
    /// Amount collected
    pub amount: Money,
    /// Method used
    pub method: PaymentMethod,
    /// Times money was actually collected; never above one
    pub charges: u32,
    /// Pay calls received for the booking, replays included
    pub requests: u32,
}

struct SeatPool {
    coach_number: String,
    total: u32,
    price: Money,
    free: BTreeSet<u32>,
}

struct BookingRecord {
    correlation_id: CorrelationId,
    train_id: TrainId,
    coach_type: CoachType,
    from_station: StationName,
    to_station: StationName,
    journey_date: NaiveDate,
    seats: Vec<u32>,
    coach_number: String,
    unit_price: Money,
    total_amount: Money,
    status: BookingStatus,
    booked_at: DateTime<Utc>,
}

impl BookingRecord {
    fn receipt(&self, booking_id: BookingId) -> ReservationReceipt {
        ReservationReceipt {
            booking_id,
            allocated_seats: self
                .seats
                .iter()
                .map(|seat| AllocatedSeat {
                    coach_number: self.coach_number.clone(),
                    seat_number: seat.to_string(),
                })
                .collect(),
            total_amount: self.total_amount,
        }
    }
}

#[derive(Default)]
struct Ledger {
    next_booking_id: u64,
    bookings: BTreeMap<BookingId, BookingRecord>,
    by_correlation: HashMap<CorrelationId, BookingId>,
    payments: HashMap<BookingId, PaymentRecord>,
}

/// A railway service held entirely in memory
pub struct InMemoryRailwayService {
    clock: Arc<dyn Clock>,
    trains: HashMap<TrainId, String>,
    pools: HashMap<(TrainId, CoachType), Mutex<SeatPool>>,
    ledger: Mutex<Ledger>,
    faults: Mutex<HashMap<Operation, VecDeque<Fault>>>,
    calls: Mutex<Vec<Operation>>,
    passenger: Passenger,
    latency: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryRailwayService {
    /// An empty service using `clock` for booking timestamps
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            trains: HashMap::new(),
            pools: HashMap::new(),
            ledger: Mutex::new(Ledger {
                next_booking_id: 1001,
                ..Ledger::default()
            }),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            passenger: Passenger {
                name: "Nusrat Jahan".to_string(),
                email: "nusrat@example.com".to_string(),
            },
            latency: None,
        }
    }

    /// Subarna Express (701) on the test clock:
    /// `AC_Chair` coach KA, 40 of 72 free at ৳1200;
    /// `Shovon` coach GA, 2 of 108 free at ৳400;
    /// `Snigdha` coach KHA, sold out at ৳1100.
    #[must_use]
    pub fn seeded() -> Self {
        Self::new(Arc::new(crate::test_clock())).with_train(
            TrainFixture::new(701, "Subarna Express")
                .coach(CoachFixture::new("AC_Chair", "KA", 72, 40, 1200))
                .coach(CoachFixture::new("Shovon", "GA", 108, 2, 400))
                .coach(CoachFixture::new("Snigdha", "KHA", 60, 0, 1100)),
        )
    }

    /// Adds a train and its seat pools
    #[must_use]
    pub fn with_train(mut self, train: TrainFixture) -> Self {
        for coach in train.coaches {
            let taken = coach.total_seats - coach.available_seats;
            self.pools.insert(
                (train.train_id, coach.coach_type),
                Mutex::new(SeatPool {
                    coach_number: coach.coach_number,
                    total: coach.total_seats,
                    price: coach.price,
                    free: (taken + 1..=coach.total_seats).collect(),
                }),
            );
        }
        self.trains.insert(train.train_id, train.name);
        self
    }

    /// Delays every call, giving concurrent callers a chance to interleave
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queues a fault for the next call of `operation`
    pub fn fail_next(&self, operation: Operation, fault: Fault) {
        lock(&self.faults).entry(operation).or_default().push_back(fault);
    }

    /// Queues `times` identical faults for `operation`
    pub fn fail_times(&self, operation: Operation, fault: &Fault, times: usize) {
        let mut faults = lock(&self.faults);
        let queue = faults.entry(operation).or_default();
        queue.extend(std::iter::repeat_n(fault.clone(), times));
    }

    /// Every call received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<Operation> {
        lock(&self.calls).clone()
    }

    /// Number of calls received for `operation`
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        lock(&self.calls).iter().filter(|op| **op == operation).count()
    }

    /// Payment recorded for a booking
    #[must_use]
    pub fn payment_record(&self, booking_id: BookingId) -> Option<PaymentRecord> {
        lock(&self.ledger).payments.get(&booking_id).cloned()
    }

    /// Seats currently free in a coach pool
    #[must_use]
    pub fn available_seats(&self, train_id: TrainId, coach_type: &str) -> Option<u32> {
        self.pools
            .get(&(train_id, CoachType::new(coach_type)))
            .map(|pool| u32::try_from(lock(pool).free.len()).unwrap_or(u32::MAX))
    }

    /// Bookings the service holds, by status
    #[must_use]
    pub fn booking_count(&self, status: BookingStatus) -> usize {
        lock(&self.ledger)
            .bookings
            .values()
            .filter(|record| record.status == status)
            .count()
    }

    /// Availability rows for a train, without recording a call
    #[must_use]
    pub fn availability_rows(&self, train_id: TrainId) -> Option<Vec<CoachAvailability>> {
        if !self.trains.contains_key(&train_id) {
            return None;
        }
        let mut rows: Vec<CoachAvailability> = self
            .pools
            .iter()
            .filter(|((train, _), _)| *train == train_id)
            .map(|((_, coach_type), pool)| {
                let pool = lock(pool);
                CoachAvailability {
                    coach_type: coach_type.clone(),
                    available_seats: u32::try_from(pool.free.len()).unwrap_or(u32::MAX),
                    total_seats: pool.total,
                    price: pool.price,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.coach_type.cmp(&b.coach_type));
        Some(rows)
    }

    /// Records the call, waits out the latency and pops a queued fault
    async fn enter(&self, operation: Operation) -> Option<Fault> {
        lock(&self.calls).push(operation);
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        lock(&self.faults).get_mut(&operation).and_then(VecDeque::pop_front)
    }

    /// Answers a call, holding the response back when the fault asks for it
    async fn respond<T: Send>(
        &self,
        operation: &'static str,
        fault: Option<Fault>,
        commit: impl FnOnce() -> Result<T, ServiceError> + Send,
    ) -> Result<T, ServiceError> {
        let delay = match &fault {
            Some(Fault::SlowResponse { delay }) => Some(*delay),
            _ => None,
        };
        let result = apply(operation, fault, commit);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    fn commit_reservation(
        &self,
        correlation_id: CorrelationId,
        request: &ReservationRequest,
    ) -> Result<ReservationReceipt, ServiceError> {
        let train_id = request.train_id();
        if !self.trains.contains_key(&train_id) {
            return Err(ServiceError::NotFound {
                resource: format!("train {train_id}"),
            });
        }
        if request.from_station().same_station(request.to_station()) {
            return Err(ServiceError::Rejected {
                status: 422,
                reason: "From and To stations must be different".to_string(),
            });
        }
        if request.journey_date() < self.clock.today() {
            return Err(ServiceError::Rejected {
                status: 422,
                reason: "Journey date is in the past".to_string(),
            });
        }
        let Some(pool) = self.pools.get(&(train_id, request.coach_type().clone())) else {
            return Err(ServiceError::Rejected {
                status: 400,
                reason: format!("Train {train_id} has no {} coach", request.coach_type()),
            });
        };

        // Pool before ledger, always.
        let mut pool = lock(pool);
        let mut ledger = lock(&self.ledger);

        if let Some(booking_id) = ledger.by_correlation.get(&correlation_id).copied() {
            if let Some(record) = ledger.bookings.get(&booking_id) {
                return Ok(record.receipt(booking_id));
            }
        }

        let requested = request.ticket_count();
        let available = u32::try_from(pool.free.len()).unwrap_or(u32::MAX);
        if available < requested {
            return Err(ServiceError::Conflict {
                reason: format!("Only {available} seats available, but {requested} requested"),
            });
        }

        let seats: Vec<u32> = pool.free.iter().take(usize::try_from(requested).unwrap_or(usize::MAX)).copied().collect();
        for seat in &seats {
            pool.free.remove(seat);
        }

        let booking_id = BookingId::new(ledger.next_booking_id);
        ledger.next_booking_id += 1;
        let record = BookingRecord {
            correlation_id,
            train_id,
            coach_type: request.coach_type().clone(),
            from_station: request.from_station().clone(),
            to_station: request.to_station().clone(),
            journey_date: request.journey_date(),
            seats,
            coach_number: pool.coach_number.clone(),
            unit_price: pool.price,
            total_amount: pool.price.checked_multiply(requested).unwrap_or(pool.price),
            status: BookingStatus::Pending,
            booked_at: self.clock.now(),
        };
        let receipt = record.receipt(booking_id);
        ledger.by_correlation.insert(correlation_id, booking_id);
        ledger.bookings.insert(booking_id, record);
        Ok(receipt)
    }

    fn commit_payment(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError> {
        let mut ledger = lock(&self.ledger);
        let Some(record) = ledger.bookings.get(&booking_id) else {
            return Err(ServiceError::NotFound {
                resource: format!("booking {booking_id}"),
            });
        };
        if record.status == BookingStatus::Cancelled {
            return Err(ServiceError::Conflict {
                reason: format!("Booking {booking_id} was cancelled"),
            });
        }
        if record.total_amount != amount {
            return Err(ServiceError::Rejected {
                status: 422,
                reason: format!("Amount {amount} does not match {}", record.total_amount),
            });
        }

        let entry = ledger.payments.entry(booking_id).or_insert_with(|| PaymentRecord {
            amount,
            method: method.clone(),
            charges: 0,
            requests: 0,
        });
        entry.requests += 1;
        if entry.charges == 0 {
            entry.charges = 1;
        }
        if let Some(record) = ledger.bookings.get_mut(&booking_id) {
            record.status = BookingStatus::Confirmed;
        }
        Ok(PaymentReceipt::settled())
    }

    fn commit_cancellation(&self, booking_id: BookingId) -> Result<(), ServiceError> {
        let (train_id, coach_type) = {
            let ledger = lock(&self.ledger);
            let Some(record) = ledger.bookings.get(&booking_id) else {
                return Err(ServiceError::NotFound {
                    resource: format!("booking {booking_id}"),
                });
            };
            (record.train_id, record.coach_type.clone())
        };
        let Some(pool) = self.pools.get(&(train_id, coach_type)) else {
            return Err(ServiceError::InvalidResponse(format!("no seat pool for booking {booking_id}")));
        };

        let mut pool = lock(pool);
        let mut ledger = lock(&self.ledger);
        let paid = ledger.payments.get(&booking_id).is_some_and(|p| p.charges > 0);
        let Some(record) = ledger.bookings.get_mut(&booking_id) else {
            return Err(ServiceError::NotFound {
                resource: format!("booking {booking_id}"),
            });
        };
        match record.status {
            BookingStatus::Cancelled => Ok(()),
            _ if paid => Err(ServiceError::Conflict {
                reason: format!("Booking {booking_id} is already paid"),
            }),
            _ => {
                record.status = BookingStatus::Cancelled;
                pool.free.extend(record.seats.iter().copied());
                Ok(())
            }
        }
    }

    fn verification(&self, booking_id: BookingId) -> Result<VerificationRecord, ServiceError> {
        let ledger = lock(&self.ledger);
        let record = ledger.bookings.get(&booking_id).ok_or_else(|| ServiceError::NotFound {
            resource: format!("booking {booking_id}"),
        })?;
        let payment_status = match ledger.payments.get(&booking_id) {
            Some(payment) if payment.charges > 0 => PaymentStatus::Settled,
            _ => PaymentStatus::Pending,
        };

        Ok(VerificationRecord {
            booking_id,
            booking_status: record.status,
            booked_at: record.booked_at.naive_utc(),
            journey_date: record.journey_date,
            passenger: self.passenger.clone(),
            train: TrainSummary {
                train_id: record.train_id,
                train_name: self.trains.get(&record.train_id).cloned().unwrap_or_default(),
            },
            route: Route {
                from_station: record.from_station.clone(),
                to_station: record.to_station.clone(),
            },
            seats: record
                .seats
                .iter()
                .map(|seat| SeatDetail {
                    seat_number: seat.to_string(),
                    coach_number: record.coach_number.clone(),
                    coach_type: record.coach_type.clone(),
                    fare: record.unit_price,
                })
                .collect(),
            total_amount: record.total_amount,
            payment_status,
        })
    }
}

fn injected(operation: &'static str, fault: Fault) -> ServiceError {
    match fault {
        Fault::Timeout | Fault::TimeoutAfterCommit | Fault::SlowResponse { .. } => {
            ServiceError::Timeout { operation }
        }
        Fault::Unreachable => ServiceError::Unreachable("connection refused".to_string()),
        Fault::Unauthorized => ServiceError::Unauthorized,
        Fault::ServerError => ServiceError::Rejected {
            status: 503,
            reason: "Service Unavailable".to_string(),
        },
        Fault::Decline { reason } => ServiceError::PaymentDeclined { reason },
    }
}

/// Runs `commit` unless a fault preempts it; `TimeoutAfterCommit` commits
/// and then reports a timeout.
fn apply<T>(
    operation: &'static str,
    fault: Option<Fault>,
    commit: impl FnOnce() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match fault {
        None | Some(Fault::SlowResponse { .. }) => commit(),
        Some(Fault::TimeoutAfterCommit) => {
            let _ = commit()?;
            Err(ServiceError::Timeout { operation })
        }
        Some(fault) => Err(injected(operation, fault)),
    }
}

#[async_trait]
impl RailwayService for InMemoryRailwayService {
    async fn reserve(
        &self,
        correlation_id: CorrelationId,
        request: &ReservationRequest,
    ) -> Result<ReservationReceipt, ServiceError> {
        let fault = self.enter(Operation::Reserve).await;
        self.respond("reserve", fault, || self.commit_reservation(correlation_id, request)).await
    }

    async fn find_reservation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<ReservationReceipt>, ServiceError> {
        let fault = self.enter(Operation::Lookup).await;
        self.respond("find_reservation", fault, || {
            let ledger = lock(&self.ledger);
            Ok(ledger
                .by_correlation
                .get(&correlation_id)
                .and_then(|id| ledger.bookings.get(id).map(|record| (id, record)))
                .filter(|(_, record)| record.correlation_id == correlation_id)
                .map(|(id, record)| record.receipt(*id)))
        })
        .await
    }

    async fn pay(
        &self,
        booking_id: BookingId,
        amount: Money,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError> {
        let fault = self.enter(Operation::Pay).await;
        self.respond("pay", fault, || self.commit_payment(booking_id, amount, method)).await
    }

    async fn cancel(&self, booking_id: BookingId) -> Result<(), ServiceError> {
        let fault = self.enter(Operation::Cancel).await;
        self.respond("cancel", fault, || self.commit_cancellation(booking_id)).await
    }

    async fn availability(&self, train_id: TrainId) -> Result<Vec<CoachAvailability>, ServiceError> {
        let fault = self.enter(Operation::Availability).await;
        self.respond("availability", fault, || {
            self.availability_rows(train_id).ok_or_else(|| ServiceError::NotFound {
                resource: format!("train {train_id}"),
            })
        })
        .await
    }

    async fn verify(&self, booking_id: BookingId) -> Result<VerificationRecord, ServiceError> {
        let fault = self.enter(Operation::Verify).await;
        self.respond("verify", fault, || self.verification(booking_id)).await
    }

    async fn my_tickets(&self) -> Result<Vec<TicketSummary>, ServiceError> {
        let fault = self.enter(Operation::MyTickets).await;
        self.respond("my_tickets", fault, || {
            let ledger = lock(&self.ledger);
            Ok(ledger
                .bookings
                .iter()
                .map(|(booking_id, record)| TicketSummary {
                    booking_id: *booking_id,
                    booked_at: record.booked_at.naive_utc(),
                    journey_date: record.journey_date,
                    status: record.status,
                    ticket_count: u32::try_from(record.seats.len()).unwrap_or(u32::MAX),
                    total_amount: record.total_amount,
                    train_name: self.trains.get(&record.train_id).cloned().unwrap_or_default(),
                    from_station: record.from_station.clone(),
                    to_station: record.to_station.clone(),
                    coach_type: record.coach_type.clone(),
                })
                .collect())
        })
        .await
    }
}
