//! Student views and cart endpoints.

use super::{dispatch, present};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use drivebook_booking::{
    BookingAction, BookingState, Cart, Credit, Order, OrderId, Slot, SlotId, StudentId,
};
use serde::Deserialize;

/// Body of `POST /api/students/:id/cart`.
#[derive(Debug, Deserialize)]
pub struct CartRequest {
    /// Slot to hold and add
    pub slot_id: SlotId,
}

fn cart_of(booking: &BookingState, student_id: StudentId) -> Cart {
    booking
        .cart(&student_id)
        .cloned()
        .unwrap_or_else(|| Cart::new(student_id))
}

/// Booked slots, earliest first.
pub async fn bookings(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Json<Vec<Slot>> {
    let slots = state
        .store
        .state(|booking| {
            booking
                .student_bookings(student_id)
                .into_iter()
                .cloned()
                .collect()
        })
        .await;
    Json(slots)
}

/// Unredeemed credits.
pub async fn credits(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Json<Vec<Credit>> {
    let credits = state
        .store
        .state(|booking| {
            booking
                .student_credits(student_id)
                .into_iter()
                .cloned()
                .collect()
        })
        .await;
    Json(credits)
}

/// Orders, oldest first.
pub async fn orders(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Json<Vec<Order>> {
    let orders = state
        .store
        .state(|booking| {
            booking
                .student_orders(student_id)
                .into_iter()
                .cloned()
                .collect()
        })
        .await;
    Json(orders)
}

/// Current cart (empty when the student has none).
pub async fn cart(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Json<Cart> {
    Json(state.store.state(|booking| cart_of(booking, student_id)).await)
}

/// Hold a slot and add it to the cart.
///
/// # Errors
///
/// 409 if already in the cart, unavailable, or over the hold limit.
pub async fn add_to_cart(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    Json(request): Json<CartRequest>,
) -> Result<Json<Cart>, AppError> {
    let action = BookingAction::AddToCart {
        student_id,
        slot_id: request.slot_id,
    };
    let cart = dispatch(&state, action, |booking| cart_of(booking, student_id)).await?;
    Ok(Json(cart))
}

/// Drop one line and release its hold.
///
/// # Errors
///
/// 409 if the slot is not in the cart.
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Path((student_id, slot_id)): Path<(StudentId, SlotId)>,
) -> Result<Json<Cart>, AppError> {
    let action = BookingAction::RemoveFromCart {
        student_id,
        slot_id,
    };
    let cart = dispatch(&state, action, |booking| cart_of(booking, student_id)).await?;
    Ok(Json(cart))
}

/// Empty the cart, releasing every hold.
///
/// # Errors
///
/// 503 while shutting down.
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Result<StatusCode, AppError> {
    dispatch(&state, BookingAction::ClearCart { student_id }, |_| ()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Turn the cart into an order awaiting payment.
///
/// # Errors
///
/// 422 for an empty cart; 409 if a line lost its hold.
pub async fn checkout(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order_id = OrderId::new();
    let action = BookingAction::Checkout {
        student_id,
        order_id,
    };
    let order = dispatch(&state, action, |booking| booking.order(&order_id).cloned()).await?;
    Ok((StatusCode::CREATED, Json(present(order, "order")?)))
}
