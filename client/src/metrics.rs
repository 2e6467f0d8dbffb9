//! Business metrics for the storefront client.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `rail_tikit_reservations_total{outcome}` - Reservation calls by outcome
//! - `rail_tikit_payments_total{outcome}` - Payment calls by outcome
//! - `rail_tikit_payment_revenue_paisa_total` - Settled revenue in paisa
//! - `rail_tikit_tickets_sold_total` - Seats in fulfilled bookings
//! - `rail_tikit_cancellations_total{outcome}` - Cancellation calls by outcome
//! - `rail_tikit_inventory_refreshes_total{reason, outcome}` - Availability refreshes
//! - `rail_tikit_stale_reads_total{source}` - Reads answered from cache
//!
//! ## Histograms
//! - `rail_tikit_call_duration_seconds{call}` - Remote call latency

use metrics::{describe_counter, describe_histogram};
use rail_tikit_core::{Money, RefreshReason};
use std::time::Duration;

/// Initialize and register all metric descriptions.
///
/// Call once at startup, after installing a recorder.
pub fn register_client_metrics() {
    describe_counter!(
        "rail_tikit_reservations_total",
        "Reservation calls by outcome (confirmed, rejected, unknown, unauthorized)"
    );
    describe_counter!(
        "rail_tikit_payments_total",
        "Payment calls by outcome (settled, declined, unknown, unauthorized)"
    );
    describe_counter!(
        "rail_tikit_payment_revenue_paisa_total",
        "Revenue from settled payments in paisa"
    );
    describe_counter!(
        "rail_tikit_tickets_sold_total",
        "Seats in fulfilled bookings"
    );
    describe_counter!(
        "rail_tikit_cancellations_total",
        "Cancellation calls by outcome"
    );
    describe_counter!(
        "rail_tikit_inventory_refreshes_total",
        "Availability refreshes by trigger and outcome"
    );
    describe_counter!(
        "rail_tikit_stale_reads_total",
        "Reads answered from cache after the service failed"
    );
    describe_histogram!(
        "rail_tikit_call_duration_seconds",
        "Latency of remote calls"
    );

    tracing::info!("Client metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the outcome of a reservation call
pub fn record_reservation(outcome: &'static str) {
    metrics::counter!("rail_tikit_reservations_total", "outcome" => outcome).increment(1);
    tracing::debug!(outcome, "Recorded reservation metric");
}

/// Record the outcome of a payment call
pub fn record_payment(outcome: &'static str) {
    metrics::counter!("rail_tikit_payments_total", "outcome" => outcome).increment(1);
    tracing::debug!(outcome, "Recorded payment metric");
}

/// Record a fulfilled booking.
///
/// # Arguments
///
/// * `amount` - Settled amount
/// * `seats` - Number of seats in the booking
pub fn record_fulfilled(amount: Money, seats: usize) {
    metrics::counter!("rail_tikit_payment_revenue_paisa_total").increment(amount.paisa());
    metrics::counter!("rail_tikit_tickets_sold_total").increment(u64::try_from(seats).unwrap_or(u64::MAX));
    tracing::debug!(amount_paisa = amount.paisa(), seats, "Recorded fulfilled metric");
}

/// Record the outcome of a cancellation call
pub fn record_cancellation(outcome: &'static str) {
    metrics::counter!("rail_tikit_cancellations_total", "outcome" => outcome).increment(1);
}

/// Record an availability refresh
pub fn record_inventory_refresh(reason: RefreshReason, succeeded: bool) {
    let outcome = if succeeded { "fresh" } else { "stale" };
    metrics::counter!(
        "rail_tikit_inventory_refreshes_total",
        "reason" => reason.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a read served from cache
pub fn record_stale_read(source: &'static str) {
    metrics::counter!("rail_tikit_stale_reads_total", "source" => source).increment(1);
    tracing::debug!(source, "Recorded stale read metric");
}

/// Record how long a remote call took
pub fn record_call_duration(call: &'static str, elapsed: Duration) {
    metrics::histogram!("rail_tikit_call_duration_seconds", "call" => call).record(elapsed.as_secs_f64());
}
