//! Order endpoints. Payment outcomes arrive here as plain commands.

use super::{dispatch, present};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use drivebook_booking::{BookingAction, BookingError, Order, OrderId};
use serde::Deserialize;

/// Body of `POST /api/orders/:id/fail`.
#[derive(Debug, Deserialize)]
pub struct FailRequest {
    /// Why the payment failed
    pub reason: String,
}

async fn order_command(
    state: &AppState,
    order_id: OrderId,
    action: BookingAction,
) -> Result<Json<Order>, AppError> {
    let order = dispatch(state, action, |booking| booking.order(&order_id).cloned()).await?;
    Ok(Json(present(order, "order")?))
}

/// Fetch one order.
///
/// # Errors
///
/// 404 if the order does not exist.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    state
        .store
        .state(|booking| booking.order(&order_id).cloned())
        .await
        .map(Json)
        .ok_or_else(|| BookingError::OrderNotFound(order_id).into())
}

/// Payment succeeded: book every slot of the order.
///
/// # Errors
///
/// 409 if the order is no longer awaiting payment.
pub async fn confirm(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    order_command(&state, order_id, BookingAction::ConfirmOrderPayment { order_id }).await
}

/// Payment failed: cancel the order and release its slots.
///
/// # Errors
///
/// 409 if the order is no longer awaiting payment.
pub async fn fail(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<FailRequest>,
) -> Result<Json<Order>, AppError> {
    let action = BookingAction::FailOrderPayment {
        order_id,
        reason: request.reason,
    };
    order_command(&state, order_id, action).await
}

/// Student abandoned the order.
///
/// # Errors
///
/// 409 if the order is no longer awaiting payment.
pub async fn cancel(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    order_command(&state, order_id, BookingAction::CancelOrder { order_id }).await
}
