//! Router configuration.

use crate::handlers::{health, orders, slots, students};
use crate::middleware::correlation_id_layer;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

/// Build the complete router.
///
/// Health and metrics sit at the root; everything else lives under `/api`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Schedule
        .route("/slots", get(slots::list_slots))
        .route("/instructors/:id/slots", post(slots::add_slot))
        .route(
            "/instructors/:id/slots/:slot_id/cancel",
            post(slots::cancel_by_instructor),
        )
        .route(
            "/slots/:id",
            get(slots::get_slot).delete(slots::remove_slot),
        )
        // Booking lifecycle
        .route("/slots/:id/reserve", post(slots::reserve))
        .route("/slots/:id/release", post(slots::release))
        .route("/slots/:id/book", post(slots::book))
        .route("/slots/:id/cancel", post(slots::cancel))
        .route("/slots/:id/redeem", post(slots::redeem))
        .route("/slots/:id/status", put(slots::update_status))
        // Students
        .route("/students/:id/bookings", get(students::bookings))
        .route("/students/:id/credits", get(students::credits))
        .route("/students/:id/orders", get(students::orders))
        .route(
            "/students/:id/cart",
            get(students::cart)
                .post(students::add_to_cart)
                .delete(students::clear_cart),
        )
        .route(
            "/students/:id/cart/:slot_id",
            axum::routing::delete(students::remove_from_cart),
        )
        .route("/students/:id/checkout", post(students::checkout))
        // Orders
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/confirm", post(orders::confirm))
        .route("/orders/:id/fail", post(orders::fail))
        .route("/orders/:id/cancel", post(orders::cancel));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
