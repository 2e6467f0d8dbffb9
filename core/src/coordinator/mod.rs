//! Booking transaction coordinator.
//!
//! Drives one purchase through reserve → pay → fulfil as a pure reducer:
//!
//! ```text
//! Idle ──submit──▶ Reserving ──confirmed──▶ Reserved ──pay──▶ PayingNow ──settled──▶ Fulfilled
//!                     │                        ▲                 │
//!                     ├─conflict──▶ ReservationRejected          ├─declined──▶ PaymentRejected
//!                     └─unknown──▶ lookup by correlation id      └─unknown───▶ Reserved (payment pending)
//! ```
//!
//! Any phase before `Fulfilled` can be cancelled. The reducer only describes
//! calls ([`TransactionEffect`]); a shell executes them and feeds results
//! back as [`TransactionAction`]s.

mod actions;
mod effects;
mod reducer;
mod state;


pub use actions::{ReservationRejection, ServiceCall, TransactionAction};
pub use effects::TransactionEffect;
pub use reducer::{TransactionEnvironment, TransactionReducer};
pub use state::{BookingTransaction, Phase};
