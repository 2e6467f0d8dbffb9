//! Rail Tikit storefront demo.
//!
//! Buys three AC chair seats on one train, pays, writes the ticket in both
//! formats and verifies it. Talks to the HTTP service when
//! `RAIL_TIKIT_API_URL` is set, otherwise to a seeded in-memory service.

use anyhow::Context;
use chrono::Duration;
use rail_tikit_client::metrics::register_client_metrics;
use rail_tikit_client::{
    BookingSession, ClientConfig, HttpRailwayService, InventoryCache, RailwayService, TicketHistory,
    VerificationLookup,
};
use rail_tikit_core::{
    Clock, PaymentMethod, RefreshReason, ReservationRequest, SystemClock, TicketFormat, TrainId,
};
use rail_tikit_testing::{CoachFixture, InMemoryRailwayService, TrainFixture};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TRAIN: TrainId = TrainId::new(701);
const COACH_TYPE: &str = "AC_Chair";
const TICKETS: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rail_tikit=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    register_client_metrics();

    let config = ClientConfig::from_env();
    info!(?config, "Configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service: Arc<dyn RailwayService> = if std::env::var("RAIL_TIKIT_API_URL").is_ok() {
        info!(api_url = %config.api_url, "Using remote railway service");
        Arc::new(HttpRailwayService::new(&config)?)
    } else {
        warn!("RAIL_TIKIT_API_URL not set, using the in-memory railway service");
        Arc::new(
            InMemoryRailwayService::new(clock.clone()).with_train(
                TrainFixture::new(TRAIN.value(), "Subarna Express")
                    .coach(CoachFixture::new("AC_Chair", "KA", 72, 40, 1200))
                    .coach(CoachFixture::new("Shovon", "GA", 108, 25, 400))
                    .coach(CoachFixture::new("Snigdha", "KHA", 60, 12, 1100)),
            ),
        )
    };

    let inventory = Arc::new(InventoryCache::new(
        service.clone(),
        clock.clone(),
        config.retry.clone(),
        config.refresh_timeout,
    ));
    let snapshot = inventory.load(TRAIN).await?.into_inner();
    for (coach_type, pool) in snapshot.coaches() {
        info!(
            coach = %coach_type.display_name(),
            available = pool.available_seats,
            total = pool.total_seats,
            price = %pool.price,
            "Coach availability"
        );
    }

    let request = ReservationRequest::builder(&snapshot)
        .from_station("Dhaka")
        .to_station("Chittagong")
        .journey_date(clock.today() + Duration::days(7))
        .coach_type(COACH_TYPE)
        .ticket_count(TICKETS)
        .build(clock.as_ref())?;

    let mut session =
        BookingSession::new(service.clone(), clock.clone(), config.retry.clone()).with_inventory(inventory.clone());

    let booking = session.submit(request).await?;
    let booking_id = booking.booking_id;
    info!(%booking_id, total = %booking.total_amount, "Seats reserved");

    let payment = session.pay(PaymentMethod::Online).await?;
    info!(%booking_id, amount = %payment.amount, "Payment settled");

    tokio::fs::create_dir_all(&config.ticket_dir)
        .await
        .with_context(|| format!("creating {}", config.ticket_dir.display()))?;
    for format in [TicketFormat::Html, TicketFormat::Text] {
        let ticket = session.ticket(format)?;
        let path = config.ticket_dir.join(&ticket.file_name);
        tokio::fs::write(&path, ticket.body.as_bytes())
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), media_type = ticket.media_type, "Ticket written");
    }

    let verification = VerificationLookup::new(service.clone(), clock.clone(), config.retry.clone());
    let record = verification.verify_id(booking_id).await?;
    info!(
        %booking_id,
        status = %record.value.booking_status,
        payment = %record.value.payment_status,
        seats = record.value.seats.len(),
        stale = record.is_stale(),
        "Ticket verified"
    );

    let history = TicketHistory::fetch(service.as_ref(), &config.retry, clock.as_ref()).await?;
    info!(
        upcoming = history.upcoming.len(),
        past = history.past.len(),
        "Booking history loaded"
    );

    let after = inventory
        .request_refresh(TRAIN, RefreshReason::ViewResumed)
        .await?
        .into_inner();
    if let Some(pool) = after.coach(&rail_tikit_core::CoachType::new(COACH_TYPE)) {
        info!(coach = COACH_TYPE, available = pool.available_seats, "Availability after purchase");
    }

    Ok(())
}
