//! Business metrics recorded by `BookingSession`.
#![allow(clippy::unwrap_used, clippy::panic)]

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use rail_tikit_core::{PaymentMethod, Phase};
use rail_tikit_testing::helpers;
use rail_tikit_testing::{Fault, InMemoryRailwayService, Operation};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Keeps counter totals by metric name, ignoring labels
#[derive(Default)]
struct CountingRecorder {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

impl CountingRecorder {
    fn total(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(name)
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let counter = self
            .counters
            .lock()
            .unwrap()
            .entry(key.name().to_string())
            .or_default()
            .clone();
        Counter::from_arc(counter)
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[tokio::test]
async fn test_revenue_is_counted_once_per_fulfilled_booking() {
    let recorder = CountingRecorder::default();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let service = Arc::new(InMemoryRailwayService::seeded());
    let mut session = helpers::session(service.clone());
    session
        .submit(helpers::request_for(&service, "AC_Chair", 3))
        .await
        .unwrap();

    service.fail_next(
        Operation::Pay,
        Fault::Decline {
            reason: "insufficient balance".to_string(),
        },
    );
    session.pay(PaymentMethod::Online).await.unwrap_err();
    assert_eq!(recorder.total("rail_tikit_payment_revenue_paisa_total"), 0);

    session.pay(PaymentMethod::Online).await.unwrap();
    assert_eq!(session.phase(), Phase::Fulfilled);

    assert_eq!(recorder.total("rail_tikit_payment_revenue_paisa_total"), 360_000);
    assert_eq!(recorder.total("rail_tikit_tickets_sold_total"), 3);
}

#[tokio::test]
async fn test_replayed_settlement_after_reconcile_is_counted_once() {
    let recorder = CountingRecorder::default();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let service = Arc::new(InMemoryRailwayService::seeded());
    let mut session = helpers::session(service.clone());
    session
        .submit(helpers::request_for(&service, "Shovon", 2))
        .await
        .unwrap();

    service.fail_times(Operation::Pay, &Fault::TimeoutAfterCommit, 3);
    session.pay(PaymentMethod::Online).await.unwrap_err();
    assert_eq!(recorder.total("rail_tikit_tickets_sold_total"), 0);

    assert_eq!(session.reconcile().await.unwrap(), Phase::Fulfilled);
    // A further reconcile has nothing left to settle.
    session.reconcile().await.unwrap();

    assert_eq!(recorder.total("rail_tikit_payment_revenue_paisa_total"), 80_000);
    assert_eq!(recorder.total("rail_tikit_tickets_sold_total"), 2);
}
