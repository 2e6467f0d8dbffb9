//! Concurrent shoppers racing for the same seat pool.
#![allow(clippy::unwrap_used, clippy::panic)]

use futures::future::join_all;
use rail_tikit_client::RailwayService;
use rail_tikit_core::{BookingError, BookingStatus, CorrelationId, PaymentMethod, Phase, ReservationRequest};
use rail_tikit_testing::helpers::{self, SUBARNA_EXPRESS};
use rail_tikit_testing::{CoachFixture, InMemoryRailwayService, TrainFixture};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn racing_service() -> Arc<InMemoryRailwayService> {
    helpers::init_tracing();
    Arc::new(InMemoryRailwayService::seeded().with_latency(Duration::from_millis(2)))
}

/// Runs one full purchase; `Ok(seats)` on success
async fn shop(service: Arc<InMemoryRailwayService>, request: ReservationRequest) -> Result<Vec<String>, BookingError> {
    let mut session = helpers::session(service);
    let booking = session.submit(request).await?;
    let seats = booking
        .allocated_seats
        .iter()
        .map(ToString::to_string)
        .collect();
    session.pay(PaymentMethod::Online).await?;
    assert_eq!(session.phase(), Phase::Fulfilled);
    Ok(seats)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_seats_are_never_oversold() {
    let service = racing_service();

    // Every shopper saw the same snapshot with two seats left.
    let request = helpers::request_for(&service, "Shovon", 1);
    let handles = (0..10).map(|_| tokio::spawn(shop(service.clone(), request.clone())));
    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(BookingError::Conflict { .. })))
        .count();
    assert_eq!(winners, 2);
    assert_eq!(conflicts, 8);
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "Shovon"), Some(0));
    assert_eq!(service.booking_count(BookingStatus::Confirmed), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_seat_is_allocated_twice() {
    let service = racing_service();

    let request = helpers::request_for(&service, "AC_Chair", 3);
    let handles = (0..15).map(|_| tokio::spawn(shop(service.clone(), request.clone())));
    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();

    let seats: Vec<String> = results.iter().filter_map(|r| r.as_ref().ok()).flatten().cloned().collect();
    let unique: HashSet<&String> = seats.iter().collect();

    assert_eq!(seats.len(), 39);
    assert_eq!(unique.len(), seats.len());
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pools_of_different_coaches_do_not_interfere() {
    let service = Arc::new(
        InMemoryRailwayService::seeded()
            .with_latency(Duration::from_millis(2))
            .with_train(
                TrainFixture::new(701, "Subarna Express")
                    .coach(CoachFixture::new("Shovon", "GA", 108, 20, 400))
                    .coach(CoachFixture::new("Snigdha", "KHA", 60, 20, 1100)),
            ),
    );

    let shovon = helpers::request_for(&service, "Shovon", 2);
    let snigdha = helpers::request_for(&service, "Snigdha", 2);
    let handles = (0..20).map(|i| {
        let request = if i % 2 == 0 { shovon.clone() } else { snigdha.clone() };
        tokio::spawn(shop(service.clone(), request))
    });
    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "Shovon"), Some(0));
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "Snigdha"), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payment_replays_charge_once() {
    let service = racing_service();
    let receipt = service
        .reserve(CorrelationId::new(), &helpers::request_for(&service, "AC_Chair", 2))
        .await
        .unwrap();

    let replays = (0..8).map(|_| {
        let service = service.clone();
        let receipt = receipt.clone();
        tokio::spawn(async move {
            service
                .pay(receipt.booking_id, receipt.total_amount, &PaymentMethod::Online)
                .await
        })
    });
    let results: Vec<_> = join_all(replays).await.into_iter().map(Result::unwrap).collect();

    assert!(results.iter().all(Result::is_ok));
    let record = service.payment_record(receipt.booking_id).unwrap();
    assert_eq!(record.charges, 1);
    assert_eq!(record.requests, 8);
}
