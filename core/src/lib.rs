//! # Rail Tikit Core
//!
//! Domain types and the booking transaction coordinator for the Rail Tikit
//! storefront.
//!
//! This crate has no I/O. Everything that talks to the remote railway
//! service lives in `rail-tikit-client`; this crate decides *what* to call
//! and *what the answers mean*.
//!
//! ## Core Concepts
//!
//! - **Inventory snapshot**: advisory, immutable per-coach availability for one train
//! - **Reservation request**: a selection that passed client-side validation
//! - **Transaction**: one purchase, owned explicitly and keyed by a correlation id
//! - **Reducer**: pure function `(Transaction, Action, Environment) → (Transaction, Effects)`
//! - **Effect**: a remote call described as data
//! - **Ticket**: deterministic rendering of a fulfilled booking
//!
//! ## Example
//!
//! ```ignore
//! use rail_tikit_core::*;
//!
//! let request = ReservationRequest::builder(&snapshot)
//!     .from_station("Dhaka")
//!     .to_station("Chittagong")
//!     .journey_date(date)
//!     .coach_type("AC_Chair")
//!     .ticket_count(3)
//!     .build(&SystemClock)?;
//!
//! let mut tx = BookingTransaction::new(CorrelationId::new(), Utc::now());
//! let effects = TransactionReducer::new().reduce(&mut tx, TransactionAction::Submit { request }, &env);
//! // effects == [TransactionEffect::Reserve { .. }]
//! ```

pub mod booking;
pub mod coordinator;
pub mod environment;
pub mod error;
pub mod inventory;
pub mod reducer;
pub mod request;
pub mod ticket;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};

pub use booking::{
    AllocatedSeat, Booking, BookingStatus, Passenger, Payment, PaymentMethod, PaymentStatus, Route,
    SeatDetail, TicketSummary, TrainSummary, VerificationRecord,
};
pub use coordinator::{
    BookingTransaction, Phase, ReservationRejection, ServiceCall, TransactionAction,
    TransactionEffect, TransactionEnvironment, TransactionReducer,
};
pub use environment::{Clock, SystemClock};
pub use error::{BookingError, RequestField, SnapshotError};
pub use inventory::{CoachAvailability, CoachInventory, InventorySnapshot, RefreshReason};
pub use reducer::Reducer;
pub use request::{MAX_TICKETS_PER_BOOKING, ReservationRequest, ReservationRequestBuilder};
pub use ticket::{TicketArtifact, TicketFormat};
pub use types::{BookingId, CoachType, CorrelationId, Money, StationName, TrainId};
