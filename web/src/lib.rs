//! HTTP API for DriveBook.
//!
//! Handlers are a thin shell: they turn a request into a
//! [`BookingAction`](drivebook_booking::BookingAction), send it through the
//! store with `send_and_read`, and map `last_error` to an HTTP status.
//!
//! ```text
//! request ─► handler ─► Store::send_and_read ─► BookingReducer
//!                                │
//!                 last_error? ───┴─► AppError (404 / 409 / 422)
//!                 otherwise   ─────► JSON view of the touched entity
//! ```
//!
//! # Example
//!
//! ```ignore
//! use drivebook_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(store, metrics.handle().cloned()));
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;
