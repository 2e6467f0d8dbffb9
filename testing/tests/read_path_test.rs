//! Verification, availability and history reads, including stale fallbacks.
#![allow(clippy::unwrap_used, clippy::panic)]

use rail_tikit_client::{Freshness, InventoryCache, RailwayService, TicketHistory, VerificationLookup};
use rail_tikit_core::{
    BookingError, BookingId, BookingStatus, Clock, CoachType, CorrelationId, PaymentMethod, PaymentStatus,
    RefreshReason, RequestField,
};
use rail_tikit_testing::helpers::{self, SUBARNA_EXPRESS};
use rail_tikit_testing::{Fault, InMemoryRailwayService, Operation, SteppingClock, test_clock};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn slow_response(delay: Duration) -> Fault {
    Fault::SlowResponse { delay }
}

fn lookup(service: Arc<InMemoryRailwayService>) -> VerificationLookup {
    VerificationLookup::new(service, Arc::new(test_clock()), helpers::fast_retry())
}

async fn purchased(service: &Arc<InMemoryRailwayService>, coach_type: &str, count: u32) -> BookingId {
    let mut session = helpers::session(service.clone());
    let booking_id = session
        .submit(helpers::request_for(service, coach_type, count))
        .await
        .unwrap()
        .booking_id;
    session.pay(PaymentMethod::Online).await.unwrap();
    booking_id
}

#[tokio::test]
async fn test_verify_unknown_booking_is_not_found() {
    let service = Arc::new(InMemoryRailwayService::seeded());

    let err = lookup(service.clone()).verify("999999").await.unwrap_err();

    assert!(matches!(err, BookingError::NotFound { .. }), "got {err:?}");
    assert_eq!(service.calls(), vec![Operation::Verify]);
}

#[tokio::test]
async fn test_verify_rejects_non_numeric_input_without_calling() {
    let service = Arc::new(InMemoryRailwayService::seeded());

    let err = lookup(service.clone()).verify("TKT-12").await.unwrap_err();

    assert!(
        matches!(
            err,
            BookingError::InvalidRequest {
                field: RequestField::BookingId,
                ..
            }
        ),
        "got {err:?}"
    );
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_verify_is_read_only() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let booking_id = purchased(&service, "AC_Chair", 3).await;
    let before = service.calls().len();
    let lookup = lookup(service.clone());

    let mut records = Vec::new();
    for _ in 0..5 {
        records.push(lookup.verify(&booking_id.to_string()).await.unwrap().into_inner());
    }

    assert!(records.windows(2).all(|pair| pair[0] == pair[1]));
    let record = &records[0];
    assert_eq!(record.booking_status, BookingStatus::Confirmed);
    assert_eq!(record.payment_status, PaymentStatus::Settled);
    assert_eq!(record.seats.len(), 3);
    assert_eq!(record.train.train_name, "Subarna Express");

    let after = service.calls();
    assert_eq!(after.len() - before, 5);
    assert!(after[before..].iter().all(|op| *op == Operation::Verify));
}

#[tokio::test]
async fn test_verify_serves_cached_record_when_service_is_down() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let booking_id = purchased(&service, "Shovon", 1).await;
    let lookup = lookup(service.clone());
    let fresh = lookup.verify_id(booking_id).await.unwrap();
    assert!(!fresh.is_stale());

    service.fail_times(Operation::Verify, &Fault::ServerError, 3);
    let stale = lookup.verify_id(booking_id).await.unwrap();

    assert!(matches!(stale.freshness, Freshness::Stale { .. }));
    assert_eq!(stale.value, fresh.value);
}

#[tokio::test]
async fn test_verify_outage_without_cache_is_unavailable() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    service.fail_times(Operation::Verify, &Fault::Unreachable, 3);

    let err = lookup(service).verify_id(BookingId::new(1001)).await.unwrap_err();

    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_inventory_falls_back_to_last_good_snapshot() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let inventory = helpers::inventory(service.clone());
    let first = inventory.load(SUBARNA_EXPRESS).await.unwrap();
    assert!(!first.is_stale());

    service.fail_next(Operation::Availability, Fault::Timeout);
    let second = inventory
        .request_refresh(SUBARNA_EXPRESS, RefreshReason::ViewResumed)
        .await
        .unwrap();

    assert!(second.is_stale());
    assert_eq!(second.value, first.value);
    for (_, pool) in second.value.coaches() {
        assert!(pool.available_seats <= pool.total_seats);
    }
}

#[tokio::test]
async fn test_slow_refresh_keeps_previous_snapshot_flagged_stale() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let inventory = helpers::inventory(service.clone());
    let first = inventory.load(SUBARNA_EXPRESS).await.unwrap();

    service.fail_next(Operation::Availability, slow_response(Duration::from_secs(2)));
    let started = Instant::now();
    let second = inventory
        .request_refresh(SUBARNA_EXPRESS, RefreshReason::ViewResumed)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert!(matches!(second.freshness, Freshness::Stale { .. }));
    assert_eq!(second.value, first.value);
}

#[tokio::test]
async fn test_slow_load_with_cached_snapshot_is_bounded() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let inventory = helpers::inventory(service.clone());
    let first = inventory.load(SUBARNA_EXPRESS).await.unwrap();

    service.fail_times(Operation::Availability, &slow_response(Duration::from_secs(2)), 3);
    let started = Instant::now();
    let second = inventory.load(SUBARNA_EXPRESS).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert!(matches!(second.freshness, Freshness::Stale { .. }));
    assert_eq!(second.value, first.value);
}

#[tokio::test]
async fn test_slow_first_load_is_unavailable() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    service.fail_next(Operation::Availability, slow_response(Duration::from_secs(2)));

    let started = Instant::now();
    let err = helpers::inventory(service).load(SUBARNA_EXPRESS).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert!(err.is_retryable(), "got {err:?}");
}

#[tokio::test]
async fn test_overlapping_refreshes_keep_the_newer_snapshot() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let inventory = Arc::new(InventoryCache::new(
        service.clone(),
        Arc::new(SteppingClock::new(test_clock().now(), chrono::Duration::seconds(1))),
        helpers::fast_retry(),
        Duration::from_millis(500),
    ));
    inventory.load(SUBARNA_EXPRESS).await.unwrap();

    // The first refresh reads 40 free seats but its answer is held back.
    service.fail_next(Operation::Availability, slow_response(Duration::from_millis(150)));
    let slow = tokio::spawn({
        let inventory = inventory.clone();
        async move { inventory.refresh(SUBARNA_EXPRESS).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    service
        .reserve(CorrelationId::new(), &helpers::request_for(&service, "AC_Chair", 4))
        .await
        .unwrap();
    let newer = inventory.refresh(SUBARNA_EXPRESS).await.unwrap();
    let late = slow.await.unwrap().unwrap();

    let ac_chair = CoachType::new("AC_Chair");
    assert_eq!(newer.value.coach(&ac_chair).unwrap().available_seats, 36);
    assert_eq!(late.value.coach(&ac_chair).unwrap().available_seats, 36);
    let cached = inventory.cached(SUBARNA_EXPRESS).await.unwrap();
    assert_eq!(cached.coach(&ac_chair).unwrap().available_seats, 36);
}

#[tokio::test]
async fn test_inventory_outage_on_first_load_is_an_error() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    service.fail_times(Operation::Availability, &Fault::Unreachable, 3);

    let err = helpers::inventory(service).load(SUBARNA_EXPRESS).await.unwrap_err();

    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_inventory_unauthorized_is_not_masked_by_cache() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let inventory = helpers::inventory(service.clone());
    inventory.load(SUBARNA_EXPRESS).await.unwrap();

    service.fail_next(Operation::Availability, Fault::Unauthorized);
    let err = inventory.refresh(SUBARNA_EXPRESS).await.unwrap_err();

    assert_eq!(err, BookingError::Unauthorized);
}

#[tokio::test]
async fn test_refresh_reflects_other_shoppers() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let inventory = helpers::inventory(service.clone());
    inventory.load(SUBARNA_EXPRESS).await.unwrap();

    purchased(&service, "AC_Chair", 5).await;
    let refreshed = inventory
        .request_refresh(SUBARNA_EXPRESS, RefreshReason::UserRequested)
        .await
        .unwrap();

    let pool = refreshed.value.coach(&CoachType::new("AC_Chair")).unwrap();
    assert_eq!(pool.available_seats, 35);
}

#[tokio::test]
async fn test_history_splits_upcoming_and_past() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    purchased(&service, "AC_Chair", 1).await;
    purchased(&service, "Shovon", 2).await;

    let history = TicketHistory::fetch(service.as_ref(), &helpers::fast_retry(), &test_clock())
        .await
        .unwrap();

    assert_eq!(history.upcoming.len(), 2);
    assert!(history.past.is_empty());
    assert_eq!(history.upcoming[1].ticket_count, 2);
    assert_eq!(history.upcoming[1].coach_type, CoachType::new("Shovon"));
}

#[tokio::test]
async fn test_my_tickets_reports_cancelled_bookings() {
    let service = Arc::new(InMemoryRailwayService::seeded());
    let mut session = helpers::session(service.clone());
    session
        .submit(helpers::request_for(&service, "AC_Chair", 2))
        .await
        .unwrap();
    session.cancel().await.unwrap();

    let tickets = service.my_tickets().await.unwrap();

    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].status, BookingStatus::Cancelled);
}
