//! # Rail Tikit Testing
//!
//! Test doubles and helpers for Rail Tikit.
//!
//! This crate provides:
//! - [`FixedClock`] for deterministic time
//! - [`InMemoryRailwayService`], a railway service with real seat pools and
//!   injectable faults
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - Fixtures and proptest strategies for domain types
//!
//! ## Example
//!
//! ```ignore
//! use rail_tikit_testing::{InMemoryRailwayService, helpers, test_clock};
//!
//! #[tokio::test]
//! async fn test_purchase() {
//!     let service = Arc::new(InMemoryRailwayService::seeded());
//!     let mut session = helpers::session(service.clone());
//!
//!     session.submit(helpers::request(3)).await.unwrap();
//!     session.pay(PaymentMethod::Online).await.unwrap();
//!
//!     assert_eq!(session.phase(), Phase::Fulfilled);
//! }
//! ```

pub mod railway;

pub use railway::{CoachFixture, Fault, InMemoryRailwayService, Operation, PaymentRecord, TrainFixture};
pub use reducer_test::ReducerTest;

use chrono::{DateTime, Utc};
use rail_tikit_core::Clock;

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::atomic::{AtomicI32, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rail_tikit_testing::mocks::FixedClock;
    /// use rail_tikit_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that moves forward by `step` every time it is read
    #[derive(Debug)]
    pub struct SteppingClock {
        start: DateTime<Utc>,
        step: chrono::Duration,
        readings: AtomicI32,
    }

    impl SteppingClock {
        /// Starts at `start`; the first reading returns `start`
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: chrono::Duration) -> Self {
            Self {
                start,
                step,
                readings: AtomicI32::new(0),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            self.start + self.step * self.readings.fetch_add(1, Ordering::SeqCst)
        }
    }

    /// Create a default fixed clock for tests (2026-10-18 09:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-10-18T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Fixtures shared by the integration tests
pub mod helpers {
    use super::mocks::test_clock;
    use crate::railway::InMemoryRailwayService;
    use chrono::{Duration, NaiveDate};
    use rail_tikit_client::{BookingSession, InventoryCache, RetryPolicy};
    use rail_tikit_core::{Clock, InventorySnapshot, ReservationRequest, TrainId};
    use std::sync::Arc;

    /// Train seeded by [`InMemoryRailwayService::seeded`]
    pub const SUBARNA_EXPRESS: TrainId = TrainId::new(701);

    /// Installs a test subscriber once; later calls are no-ops
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// Fast retries so fault-injection tests stay quick
    #[must_use]
    pub fn fast_retry() -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(2)
            .initial_delay(std::time::Duration::from_millis(1))
            .max_delay(std::time::Duration::from_millis(5))
            .build()
    }

    /// A week after the test clock's today
    #[must_use]
    pub fn journey_date() -> NaiveDate {
        test_clock().today() + Duration::days(7)
    }

    /// Snapshot of the seeded train as the service reports it now
    ///
    /// # Panics
    ///
    /// If the seeded train is missing or malformed.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn snapshot(service: &InMemoryRailwayService) -> InventorySnapshot {
        InventorySnapshot::new(
            SUBARNA_EXPRESS,
            test_clock().now(),
            service.availability_rows(SUBARNA_EXPRESS).expect("seeded train"),
        )
        .expect("seeded availability is valid")
    }

    /// A Dhaka to Chittagong request for `count` seats in the given coach type
    ///
    /// # Panics
    ///
    /// If the request fails validation.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn request_for(service: &InMemoryRailwayService, coach_type: &str, count: u32) -> ReservationRequest {
        ReservationRequest::builder(&snapshot(service))
            .from_station("Dhaka")
            .to_station("Chittagong")
            .journey_date(journey_date())
            .coach_type(coach_type)
            .ticket_count(count)
            .build(&test_clock())
            .expect("fixture request is valid")
    }

    /// A session against `service` using the test clock and fast retries
    #[must_use]
    pub fn session(service: Arc<InMemoryRailwayService>) -> BookingSession {
        BookingSession::new(service, Arc::new(test_clock()), fast_retry())
    }

    /// A session that also refreshes the given cache
    #[must_use]
    pub fn session_with_inventory(
        service: Arc<InMemoryRailwayService>,
        inventory: Arc<InventoryCache>,
    ) -> BookingSession {
        session(service).with_inventory(inventory)
    }

    /// An availability cache in front of `service`
    #[must_use]
    pub fn inventory(service: Arc<InMemoryRailwayService>) -> Arc<InventoryCache> {
        Arc::new(InventoryCache::new(
            service,
            Arc::new(test_clock()),
            fast_retry(),
            std::time::Duration::from_millis(200),
        ))
    }
}

/// Property-based testing utilities using proptest
pub mod properties {
    use proptest::prelude::*;
    use rail_tikit_core::{MAX_TICKETS_PER_BOOKING, Money, PaymentMethod};

    /// Ticket counts a request accepts
    pub fn ticket_count() -> impl Strategy<Value = u32> {
        1..=MAX_TICKETS_PER_BOOKING
    }

    /// Fares between ৳50 and ৳5000 in whole paisa
    pub fn fare() -> impl Strategy<Value = Money> {
        (5_000u64..=500_000).prop_map(Money::from_paisa)
    }

    /// Any payment method
    pub fn payment_method() -> impl Strategy<Value = PaymentMethod> {
        prop_oneof![
            Just(PaymentMethod::Online),
            prop_oneof![Just("bKash"), Just("Nagad"), Just("Rocket")]
                .prop_map(|provider| PaymentMethod::MobileBanking {
                    provider: provider.to_string()
                }),
            "[0-9]{4}".prop_map(|last_four| PaymentMethod::Card { last_four }),
        ]
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SteppingClock, test_clock};
