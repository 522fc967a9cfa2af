//! Slot endpoints: schedule, holds, booking, cancellation and redemption.
//!
//! - `GET /api/slots` - search (`instructor`, `kind`, `status`, `from`, `to`)
//! - `POST /api/instructors/:id/slots` - publish a slot
//! - `POST /api/instructors/:id/slots/:slot_id/cancel` - instructor cancel
//! - `GET|DELETE /api/slots/:id`
//! - `POST /api/slots/:id/{reserve,release,book,cancel,redeem}`
//! - `PUT /api/slots/:id/status` - admin status change

use super::{dispatch, present};
use crate::error::AppError;
use crate::middleware::CorrelationId;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use drivebook_booking::{
    BookingAction, BookingError, CancellationOutcome, ClassKind, Credit, CreditId, InstructorId,
    Money, Slot, SlotFilter, SlotId, SlotStatus, StudentId,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Body of `POST /api/instructors/:id/slots`.
#[derive(Debug, Deserialize)]
pub struct AddSlotRequest {
    /// Client-chosen id, generated when absent
    pub slot_id: Option<SlotId>,
    /// Class kind
    pub kind: ClassKind,
    /// Window start
    pub start: DateTime<Utc>,
    /// Window end
    pub end: DateTime<Utc>,
    /// Price in cents
    pub price: Money,
}

/// Body naming the acting student.
#[derive(Debug, Deserialize)]
pub struct StudentRequest {
    /// Acting student
    pub student_id: StudentId,
}

/// Body of `POST /api/slots/:id/cancel`.
///
/// Instructor cancellations go through
/// `POST /api/instructors/:id/slots/:slot_id/cancel` instead.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Student who booked the slot
    pub student_id: StudentId,
}

/// Result of a cancellation.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// The cancelled slot
    pub slot: Slot,
    /// Free with credit, or late with fee
    pub outcome: CancellationOutcome,
    /// Credit issued by a free cancellation
    pub credit: Option<Credit>,
    /// The slot published in place of the cancelled one
    pub replacement: Option<Slot>,
}

/// Body of `POST /api/slots/:id/redeem`.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Owner of the credit
    pub student_id: StudentId,
    /// Credit to spend
    pub credit_id: CreditId,
}

/// Body of `PUT /api/slots/:id/status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// Target status
    pub status: SlotStatus,
    /// Needed when moving to pending or booked
    pub student_id: Option<StudentId>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Search slots; results are ordered by start time.
pub async fn list_slots(
    State(state): State<AppState>,
    Query(filter): Query<SlotFilter>,
) -> Json<Vec<Slot>> {
    let slots = state
        .store
        .state(|booking| booking.find_slots(&filter).into_iter().cloned().collect())
        .await;
    Json(slots)
}

/// Fetch one slot.
///
/// # Errors
///
/// 404 if the slot does not exist.
pub async fn get_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
) -> Result<Json<Slot>, AppError> {
    state
        .store
        .state(|booking| booking.slot(&slot_id).cloned())
        .await
        .map(Json)
        .ok_or_else(|| BookingError::SlotNotFound(slot_id).into())
}

/// Publish a new available slot for an instructor.
///
/// # Errors
///
/// 409 on overlap or duplicate id; 422 for an empty or past window.
pub async fn add_slot(
    State(state): State<AppState>,
    Path(instructor_id): Path<InstructorId>,
    Json(request): Json<AddSlotRequest>,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    let slot_id = request.slot_id.unwrap_or_default();
    let action = BookingAction::AddSlot {
        slot_id,
        instructor_id,
        kind: request.kind,
        start: request.start,
        end: request.end,
        price: request.price,
    };

    let slot = dispatch(&state, action, |booking| booking.slot(&slot_id).cloned()).await?;
    Ok((StatusCode::CREATED, Json(present(slot, "slot")?)))
}

/// Withdraw an available slot.
///
/// # Errors
///
/// 404 if unknown; 409 unless the slot is available.
pub async fn remove_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
) -> Result<StatusCode, AppError> {
    dispatch(&state, BookingAction::RemoveSlot { slot_id }, |_| ()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn slot_command(
    state: &AppState,
    slot_id: SlotId,
    action: BookingAction,
) -> Result<Json<Slot>, AppError> {
    let slot = dispatch(state, action, |booking| booking.slot(&slot_id).cloned()).await?;
    Ok(Json(present(slot, "slot")?))
}

/// Put a pending hold on an available slot.
///
/// # Errors
///
/// 409 if the slot is not available or the student's hold limit is reached.
pub async fn reserve(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    Json(request): Json<StudentRequest>,
) -> Result<Json<Slot>, AppError> {
    let action = BookingAction::ReservePending {
        slot_id,
        student_id: request.student_id,
    };
    slot_command(&state, slot_id, action).await
}

/// Release the caller's hold.
///
/// # Errors
///
/// 409 if the slot is not held by this student or belongs to an order.
pub async fn release(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    Json(request): Json<StudentRequest>,
) -> Result<Json<Slot>, AppError> {
    let action = BookingAction::ReleaseHold {
        slot_id,
        student_id: request.student_id,
    };
    slot_command(&state, slot_id, action).await
}

/// Book a slot directly.
///
/// # Errors
///
/// 409 if the slot is taken, held by someone else, or already started.
pub async fn book(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    Json(request): Json<StudentRequest>,
) -> Result<Json<Slot>, AppError> {
    let action = BookingAction::BookSlot {
        slot_id,
        student_id: request.student_id,
    };
    slot_command(&state, slot_id, action).await
}

/// Cancel a booking under the 48-hour policy.
///
/// # Errors
///
/// 409 if the slot is not booked by this student or has started.
pub async fn cancel(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(slot_id): Path<SlotId>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, AppError> {
    let action = BookingAction::CancelBooking {
        slot_id,
        student_id: request.student_id,
        by_instructor: false,
    };
    cancellation(&state, correlation, slot_id, action).await
}

/// Cancel a booking on the instructor's side; always free for the student.
///
/// # Errors
///
/// 409 if the slot belongs to another instructor, is not booked, or has
/// started.
pub async fn cancel_by_instructor(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path((instructor_id, slot_id)): Path<(InstructorId, SlotId)>,
) -> Result<Json<CancelResponse>, AppError> {
    let action = BookingAction::CancelByInstructor {
        slot_id,
        instructor_id,
    };
    cancellation(&state, correlation, slot_id, action).await
}

async fn cancellation(
    state: &AppState,
    correlation: CorrelationId,
    slot_id: SlotId,
    action: BookingAction,
) -> Result<Json<CancelResponse>, AppError> {
    let response = dispatch(state, action, |booking| {
        let slot = booking.slot(&slot_id)?.clone();
        let cancellation = slot.cancellation?;
        let credit = match cancellation.outcome {
            CancellationOutcome::Free { credit_id } => booking.credit(&credit_id).cloned(),
            CancellationOutcome::Late { .. } => None,
        };
        let replacement = slot
            .replaced_by
            .and_then(|id| booking.slot(&id).cloned());
        Some(CancelResponse {
            slot,
            outcome: cancellation.outcome,
            credit,
            replacement,
        })
    })
    .await?;
    let response = present(response, "cancellation")?;

    tracing::info!(
        correlation_id = %correlation.0,
        slot_id = %slot_id,
        outcome = response.outcome.as_str(),
        by_instructor = response.slot.cancellation.is_some_and(|c| c.by_instructor),
        "Booking cancelled"
    );
    Ok(Json(response))
}

/// Book a slot with a credit.
///
/// # Errors
///
/// 404 for an unknown credit; 409 if used or not owned; 422 on kind mismatch.
pub async fn redeem(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<Slot>, AppError> {
    let action = BookingAction::RedeemCredit {
        credit_id: request.credit_id,
        slot_id,
        student_id: request.student_id,
    };
    slot_command(&state, slot_id, action).await
}

/// Admin status change along one lifecycle edge.
///
/// # Errors
///
/// 409 for an edge outside the lifecycle; 422 if a student is required.
pub async fn update_status(
    State(state): State<AppState>,
    Path(slot_id): Path<SlotId>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Slot>, AppError> {
    let action = BookingAction::UpdateSlotStatus {
        slot_id,
        status: request.status,
        student_id: request.student_id,
    };
    slot_command(&state, slot_id, action).await
}
