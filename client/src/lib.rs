//! # Rail Tikit Client
//!
//! The imperative shell around `rail-tikit-core`: talks to the remote
//! railway service, executes the transaction reducer's effects, and keeps
//! advisory caches of availability and verification records.
//!
//! ## Example
//!
//! ```ignore
//! use rail_tikit_client::{BookingSession, ClientConfig, HttpRailwayService, InventoryCache};
//!
//! let config = ClientConfig::from_env();
//! let service = Arc::new(HttpRailwayService::new(&config)?);
//! let inventory = Arc::new(InventoryCache::new(service.clone(), clock.clone(), config.retry.clone(), config.refresh_timeout));
//!
//! let snapshot = inventory.load(TrainId::new(701)).await?.into_inner();
//! let request = ReservationRequest::builder(&snapshot)
//!     /* ... */
//!     .build(clock.as_ref())?;
//!
//! let mut session = BookingSession::new(service, clock, config.retry.clone()).with_inventory(inventory);
//! session.submit(request).await?;
//! session.pay(PaymentMethod::Online).await?;
//! let ticket = session.ticket(TicketFormat::Html)?;
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod inventory;
pub mod metrics;
pub mod observed;
pub mod retry;
pub mod service;
pub mod session;
pub mod verification;

pub use config::ClientConfig;
pub use error::ServiceError;
pub use history::TicketHistory;
pub use http::HttpRailwayService;
pub use inventory::InventoryCache;
pub use observed::{Freshness, Observed};
pub use retry::RetryPolicy;
pub use service::{PaymentReceipt, RailwayService, ReservationReceipt};
pub use session::BookingSession;
pub use verification::VerificationLookup;
