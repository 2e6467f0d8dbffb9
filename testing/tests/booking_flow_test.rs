//! End-to-end purchase flows through `BookingSession` against the in-memory service.
#![allow(clippy::unwrap_used, clippy::panic)]

use rail_tikit_core::{
    BookingError, BookingStatus, CoachType, Money, PaymentMethod, PaymentStatus, Phase, TicketFormat,
};
use rail_tikit_testing::helpers::{self, SUBARNA_EXPRESS};
use rail_tikit_testing::{CoachFixture, Fault, InMemoryRailwayService, Operation, TrainFixture};
use std::sync::Arc;

fn seeded() -> Arc<InMemoryRailwayService> {
    helpers::init_tracing();
    Arc::new(InMemoryRailwayService::seeded())
}

#[tokio::test]
async fn test_purchase_three_ac_chair_seats() {
    let service = seeded();
    let inventory = helpers::inventory(service.clone());
    let mut session = helpers::session_with_inventory(service.clone(), inventory.clone());
    let request = helpers::request_for(&service, "AC_Chair", 3);

    let booking = session.submit(request).await.unwrap();
    let booking_id = booking.booking_id;
    assert_eq!(booking.total_amount, Money::from_taka(3600).unwrap());
    assert_eq!(booking.allocated_seats.len(), 3);
    assert_eq!(session.phase(), Phase::Reserved);

    let payment = session.pay(PaymentMethod::Online).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Settled);
    assert_eq!(payment.amount, Money::from_taka(3600).unwrap());
    assert_eq!(session.phase(), Phase::Fulfilled);

    let ticket = session.ticket(TicketFormat::Text).unwrap();
    assert_eq!(ticket.file_name, format!("Railway_Ticket_{booking_id}.txt"));
    assert!(ticket.body.contains(&booking_id.to_string()));
    assert!(ticket.body.contains("৳3600"));
    assert_eq!(ticket.body.matches("Coach KA, Seat").count(), 3);

    // Fulfilment triggers a refresh of the purchased train.
    let snapshot = inventory.cached(SUBARNA_EXPRESS).await.unwrap();
    let ac_chair = snapshot.coach(&CoachType::new("AC_Chair")).unwrap();
    assert_eq!(ac_chair.available_seats, 37);
    assert!(ac_chair.available_seats <= ac_chair.total_seats);

    let record = service.payment_record(booking_id).unwrap();
    assert_eq!(record.charges, 1);
}

#[tokio::test]
async fn test_insufficient_seats_leaves_inventory_unchanged() {
    let service = seeded();
    // The shopper's snapshot still shows ten free Shovon seats; the service has two.
    let stale = InMemoryRailwayService::seeded()
        .with_train(TrainFixture::new(701, "Subarna Express").coach(CoachFixture::new("Shovon", "GA", 108, 10, 400)));
    let request = helpers::request_for(&stale, "Shovon", 5);

    let inventory = helpers::inventory(service.clone());
    let mut session = helpers::session_with_inventory(service.clone(), inventory.clone());

    let err = session.submit(request).await.unwrap_err();

    assert!(matches!(err, BookingError::Conflict { .. }), "got {err:?}");
    assert_eq!(session.phase(), Phase::ReservationRejected);
    assert!(session.transaction().booking().is_none());
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "Shovon"), Some(2));
    assert_eq!(service.booking_count(BookingStatus::Pending), 0);
    assert_eq!(service.call_count(Operation::Pay), 0);

    // The conflict refreshes availability so the shopper sees the real count.
    let snapshot = inventory.cached(SUBARNA_EXPRESS).await.unwrap();
    assert_eq!(snapshot.coach(&CoachType::new("Shovon")).unwrap().available_seats, 2);
}

#[tokio::test]
async fn test_payment_timeout_is_retried_under_same_key() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    let booking_id = session
        .submit(helpers::request_for(&service, "AC_Chair", 2))
        .await
        .unwrap()
        .booking_id;

    service.fail_next(Operation::Pay, Fault::TimeoutAfterCommit);
    session.pay(PaymentMethod::Online).await.unwrap();

    assert_eq!(session.phase(), Phase::Fulfilled);
    let record = service.payment_record(booking_id).unwrap();
    assert_eq!(record.requests, 2);
    assert_eq!(record.charges, 1);
}

#[tokio::test]
async fn test_unknown_payment_outcome_resolves_on_reconcile() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    let booking_id = session
        .submit(helpers::request_for(&service, "AC_Chair", 1))
        .await
        .unwrap()
        .booking_id;

    // Every attempt commits but every response is lost.
    service.fail_times(Operation::Pay, &Fault::TimeoutAfterCommit, 3);
    let err = session.pay(PaymentMethod::Online).await.unwrap_err();

    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
    assert_eq!(session.phase(), Phase::Reserved);
    assert_eq!(
        session.transaction().payment().map(|p| p.status),
        Some(PaymentStatus::Pending)
    );
    assert!(session.ticket(TicketFormat::Html).is_err());

    assert_eq!(session.reconcile().await.unwrap(), Phase::Fulfilled);
    let record = service.payment_record(booking_id).unwrap();
    assert_eq!(record.charges, 1);
    assert_eq!(record.requests, 4);
    assert_eq!(session.transaction().payment().unwrap().attempts, 2);
}

#[tokio::test]
async fn test_reserve_timeout_is_looked_up_not_resubmitted() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    service.fail_next(Operation::Reserve, Fault::TimeoutAfterCommit);

    let booking = session
        .submit(helpers::request_for(&service, "AC_Chair", 2))
        .await
        .unwrap();
    assert_eq!(booking.allocated_seats.len(), 2);

    assert_eq!(session.phase(), Phase::Reserved);
    assert_eq!(service.call_count(Operation::Reserve), 1);
    assert_eq!(service.call_count(Operation::Lookup), 1);
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(38));
}

#[tokio::test]
async fn test_reserve_lost_before_commit_allows_resubmit() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    let request = helpers::request_for(&service, "AC_Chair", 2);
    service.fail_next(Operation::Reserve, Fault::Timeout);

    let err = session.submit(request.clone()).await.unwrap_err();
    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(40));

    session.submit(request).await.unwrap();
    assert_eq!(session.phase(), Phase::Reserved);
    assert_eq!(service.booking_count(BookingStatus::Pending), 1);
}

#[tokio::test]
async fn test_unresolved_reservation_waits_for_reconcile() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    service.fail_next(Operation::Reserve, Fault::TimeoutAfterCommit);
    service.fail_times(Operation::Lookup, &Fault::Unreachable, 3);

    let err = session
        .submit(helpers::request_for(&service, "AC_Chair", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
    assert_eq!(session.phase(), Phase::Reserving);
    assert!(session.transaction().reservation_unresolved());

    // No second submit while the first is unresolved.
    let err = session
        .submit(helpers::request_for(&service, "AC_Chair", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidTransition { .. }), "got {err:?}");
    assert_eq!(service.call_count(Operation::Reserve), 1);

    assert_eq!(session.reconcile().await.unwrap(), Phase::Reserved);
    assert_eq!(service.booking_count(BookingStatus::Pending), 1);
}

#[tokio::test]
async fn test_cancel_with_unresolved_reservation_releases_committed_seats() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    service.fail_next(Operation::Reserve, Fault::TimeoutAfterCommit);
    service.fail_times(Operation::Lookup, &Fault::Unreachable, 3);

    let err = session
        .submit(helpers::request_for(&service, "AC_Chair", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
    assert!(session.transaction().reservation_unresolved());
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(37));

    assert_eq!(session.cancel().await.unwrap(), Phase::Cancelled);

    assert_eq!(service.call_count(Operation::Cancel), 1);
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(40));
    assert_eq!(
        session.transaction().booking().map(|b| b.status),
        Some(BookingStatus::Cancelled)
    );
}

#[tokio::test]
async fn test_cancel_with_unresolved_reservation_reports_outage() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    service.fail_next(Operation::Reserve, Fault::TimeoutAfterCommit);
    service.fail_times(Operation::Lookup, &Fault::Unreachable, 6);

    session
        .submit(helpers::request_for(&service, "AC_Chair", 3))
        .await
        .unwrap_err();
    let err = session.cancel().await.unwrap_err();

    assert!(matches!(err, BookingError::Unavailable { .. }), "got {err:?}");
    assert_eq!(session.phase(), Phase::Reserving);
    assert!(session.transaction().cancel_pending());

    // Once the service answers, the pending cancellation goes through.
    assert_eq!(session.reconcile().await.unwrap(), Phase::Cancelled);
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(40));
}

#[tokio::test]
async fn test_declined_payment_keeps_seats_for_another_try() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    session
        .submit(helpers::request_for(&service, "Shovon", 2))
        .await
        .unwrap();

    service.fail_next(
        Operation::Pay,
        Fault::Decline {
            reason: "insufficient balance".to_string(),
        },
    );
    let err = session
        .pay(PaymentMethod::MobileBanking {
            provider: "bKash".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BookingError::PaymentDeclined {
            reason: "insufficient balance".to_string()
        }
    );
    assert_eq!(session.phase(), Phase::PaymentRejected);
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "Shovon"), Some(0));

    session
        .pay(PaymentMethod::Card {
            last_four: "4242".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(session.phase(), Phase::Fulfilled);
}

#[tokio::test]
async fn test_cancel_releases_held_seats() {
    let service = seeded();
    let inventory = helpers::inventory(service.clone());
    let mut session = helpers::session_with_inventory(service.clone(), inventory.clone());
    session
        .submit(helpers::request_for(&service, "AC_Chair", 4))
        .await
        .unwrap();
    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(36));

    assert_eq!(session.cancel().await.unwrap(), Phase::Cancelled);

    assert_eq!(service.available_seats(SUBARNA_EXPRESS, "AC_Chair"), Some(40));
    assert_eq!(
        session.transaction().booking().map(|b| b.status),
        Some(BookingStatus::Cancelled)
    );
    let snapshot = inventory.cached(SUBARNA_EXPRESS).await.unwrap();
    assert_eq!(snapshot.coach(&CoachType::new("AC_Chair")).unwrap().available_seats, 40);
}

#[tokio::test]
async fn test_fulfilled_purchase_cannot_be_cancelled() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    session
        .submit(helpers::request_for(&service, "AC_Chair", 1))
        .await
        .unwrap();
    session.pay(PaymentMethod::Online).await.unwrap();

    let err = session.cancel().await.unwrap_err();

    assert!(matches!(err, BookingError::InvalidTransition { .. }), "got {err:?}");
    assert_eq!(session.phase(), Phase::Fulfilled);
    assert_eq!(service.call_count(Operation::Cancel), 0);
}

#[tokio::test]
async fn test_expired_credential_does_not_move_the_transaction() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    let booking_id = session
        .submit(helpers::request_for(&service, "AC_Chair", 1))
        .await
        .unwrap()
        .booking_id;

    service.fail_next(Operation::Pay, Fault::Unauthorized);
    let err = session.pay(PaymentMethod::Online).await.unwrap_err();

    assert_eq!(err, BookingError::Unauthorized);
    assert_eq!(session.phase(), Phase::Reserved);
    assert!(session.transaction().payment().is_none());
    assert!(service.payment_record(booking_id).is_none());

    // After re-authentication the same transaction carries on.
    session.pay(PaymentMethod::Online).await.unwrap();
    assert_eq!(session.phase(), Phase::Fulfilled);
}

#[tokio::test]
async fn test_ticket_is_not_ready_before_payment() {
    let service = seeded();
    let mut session = helpers::session(service.clone());
    session
        .submit(helpers::request_for(&service, "AC_Chair", 1))
        .await
        .unwrap();

    let err = session.ticket(TicketFormat::Html).unwrap_err();
    assert!(matches!(err, BookingError::NotReady { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_pay_before_reserving_is_rejected_locally() {
    let service = seeded();
    let mut session = helpers::session(service.clone());

    let err = session.pay(PaymentMethod::Online).await.unwrap_err();

    assert_eq!(
        err,
        BookingError::InvalidTransition {
            phase: "idle".to_string(),
            command: "pay"
        }
    );
    assert!(service.calls().is_empty());
}
