//! # DriveBook Booking
//!
//! The driving-school booking domain: instructor slots for driving tests,
//! driving lessons and ticket classes; pending holds; the 48-hour
//! cancellation policy with credits; credit redemption; carts and orders.
//!
//! All of it is one reducer over one [`BookingState`], run by a
//! [`Store`](drivebook_runtime::Store). The store serialises commands, so a
//! booking, its cart line and its order always change together.
//!
//! ## Example
//!
//! ```ignore
//! use drivebook_booking::{BookingAction, BookingStore};
//!
//! let store: BookingStore = build_store(environment);
//! store
//!     .send(BookingAction::ReservePending { slot_id, student_id })
//!     .await?;
//! ```

pub mod action;
pub mod environment;
pub mod error;
pub mod journal;
pub mod notifier;
pub mod policy;
pub mod queries;
pub mod reducer;
pub mod state;
pub mod types;

pub use action::{BookingAction, BookingEvent, ReleaseReason};
pub use environment::{BookingConfig, BookingEnvironment};
pub use error::{BookingError, ErrorKind};
pub use notifier::{BroadcastNotifier, Notifier, NotifyError};
pub use policy::{CancellationOutcome, CancellationPolicy};
pub use queries::SlotFilter;
pub use reducer::BookingReducer;
pub use state::BookingState;
pub use types::*;

/// Store running the booking reducer
pub type BookingStore =
    drivebook_runtime::Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>;
