//! Commands accepted by the booking reducer and the events they produce.

use crate::policy::CancellationOutcome;
use crate::types::{
    CartItem, ClassKind, Credit, CreditId, Hold, HoldId, InstructorId, Money, Order,
    OrderCancelReason, OrderId, Payment, SlotId, SlotStatus, SlotWindow, StudentId,
};
use chrono::{DateTime, Utc};
use drivebook_core::journal::JournalEvent;
use serde::{Deserialize, Serialize};

// ============================================================================
// Actions
// ============================================================================

/// Every input to the booking reducer.
///
/// Most variants are commands from the HTTP layer. `ExpireHold`,
/// `ExpireOrder` and `JournalAppendFailed` are fed back by effects;
/// `SweepExpired` is sent periodically by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BookingAction {
    // ========== Instructor schedule ==========
    /// Publish a new available slot
    AddSlot {
        /// Id chosen by the caller
        slot_id: SlotId,
        /// Owning instructor
        instructor_id: InstructorId,
        /// Class kind
        kind: ClassKind,
        /// Start of the slot
        start: DateTime<Utc>,
        /// End of the slot
        end: DateTime<Utc>,
        /// Price
        price: Money,
    },

    /// Withdraw an available slot
    RemoveSlot {
        /// Slot
        slot_id: SlotId,
    },

    // ========== Slot lifecycle ==========
    /// Hold an available slot for a student
    ReservePending {
        /// Slot
        slot_id: SlotId,
        /// Student
        student_id: StudentId,
    },

    /// Give back a held slot
    ReleaseHold {
        /// Slot
        slot_id: SlotId,
        /// Holder
        student_id: StudentId,
    },

    /// Hold timer fired
    ExpireHold {
        /// Slot
        slot_id: SlotId,
        /// Hold the timer was started for
        hold_id: HoldId,
    },

    /// Book a slot directly
    BookSlot {
        /// Slot
        slot_id: SlotId,
        /// Student
        student_id: StudentId,
    },

    /// Cancel a booking under the 48-hour policy
    CancelBooking {
        /// Slot
        slot_id: SlotId,
        /// Booked student
        student_id: StudentId,
        /// Instructor/admin cancellations are always free
        by_instructor: bool,
    },

    /// Cancel a booking on behalf of the slot's instructor (always free)
    CancelByInstructor {
        /// Slot
        slot_id: SlotId,
        /// Instructor who owns the slot
        instructor_id: InstructorId,
    },

    /// Book a slot with a credit
    RedeemCredit {
        /// Credit
        credit_id: CreditId,
        /// Slot
        slot_id: SlotId,
        /// Credit owner
        student_id: StudentId,
    },

    /// Admin status change along one lifecycle edge
    UpdateSlotStatus {
        /// Slot
        slot_id: SlotId,
        /// Target status
        status: SlotStatus,
        /// Student, where the edge needs one
        student_id: Option<StudentId>,
    },

    // ========== Cart ==========
    /// Hold a slot and add it to the cart
    AddToCart {
        /// Student
        student_id: StudentId,
        /// Slot
        slot_id: SlotId,
    },

    /// Drop a cart line and release its hold
    RemoveFromCart {
        /// Student
        student_id: StudentId,
        /// Slot
        slot_id: SlotId,
    },

    /// Release every hold in the cart
    ClearCart {
        /// Student
        student_id: StudentId,
    },

    // ========== Orders ==========
    /// Turn the cart into an order awaiting payment
    Checkout {
        /// Student
        student_id: StudentId,
        /// Id chosen by the caller
        order_id: OrderId,
    },

    /// Payment succeeded
    ConfirmOrderPayment {
        /// Order
        order_id: OrderId,
    },

    /// Payment declined
    FailOrderPayment {
        /// Order
        order_id: OrderId,
        /// Provider message
        reason: String,
    },

    /// Student abandoned the order
    CancelOrder {
        /// Order
        order_id: OrderId,
    },

    /// Payment window elapsed
    ExpireOrder {
        /// Order
        order_id: OrderId,
    },

    // ========== Maintenance ==========
    /// Release every lapsed hold and expire every overdue order
    ///
    /// Timers do not survive a restart; this catches up after replay.
    SweepExpired,

    /// Journal append failed after retries
    JournalAppendFailed {
        /// Event types that were not persisted
        event_types: Vec<String>,
        /// Last error
        error: String,
    },
}

impl BookingAction {
    /// Variant name for logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddSlot { .. } => "add_slot",
            Self::RemoveSlot { .. } => "remove_slot",
            Self::ReservePending { .. } => "reserve_pending",
            Self::ReleaseHold { .. } => "release_hold",
            Self::ExpireHold { .. } => "expire_hold",
            Self::BookSlot { .. } => "book_slot",
            Self::CancelBooking { .. } => "cancel_booking",
            Self::CancelByInstructor { .. } => "cancel_by_instructor",
            Self::RedeemCredit { .. } => "redeem_credit",
            Self::UpdateSlotStatus { .. } => "update_slot_status",
            Self::AddToCart { .. } => "add_to_cart",
            Self::RemoveFromCart { .. } => "remove_from_cart",
            Self::ClearCart { .. } => "clear_cart",
            Self::Checkout { .. } => "checkout",
            Self::ConfirmOrderPayment { .. } => "confirm_order_payment",
            Self::FailOrderPayment { .. } => "fail_order_payment",
            Self::CancelOrder { .. } => "cancel_order",
            Self::ExpireOrder { .. } => "expire_order",
            Self::SweepExpired => "sweep_expired",
            Self::JournalAppendFailed { .. } => "journal_append_failed",
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Why a hold ended without a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    /// The holder gave it back
    Released,
    /// The hold timer fired
    Expired,
    /// The order it belonged to was cancelled
    OrderCancelled,
    /// Removed by an admin status change
    Admin,
}

/// Facts recorded in the journal. State changes only by applying these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    /// Slot published
    SlotAdded {
        /// Slot
        slot_id: SlotId,
        /// Instructor
        instructor_id: InstructorId,
        /// Kind
        kind: ClassKind,
        /// Window
        window: SlotWindow,
        /// Price
        price: Money,
        /// When
        added_at: DateTime<Utc>,
    },

    /// Slot withdrawn
    SlotRemoved {
        /// Slot
        slot_id: SlotId,
    },

    /// Slot moved to pending
    SlotHeld {
        /// Slot
        slot_id: SlotId,
        /// Hold
        hold: Hold,
    },

    /// Slot moved back to available
    HoldReleased {
        /// Slot
        slot_id: SlotId,
        /// Hold that ended
        hold_id: HoldId,
        /// Why
        reason: ReleaseReason,
    },

    /// Slot moved to booked
    SlotBooked {
        /// Slot
        slot_id: SlotId,
        /// Student
        student_id: StudentId,
        /// How it was paid
        payment: Payment,
        /// When
        booked_at: DateTime<Utc>,
    },

    /// Booking cancelled
    BookingCancelled {
        /// Slot
        slot_id: SlotId,
        /// Student whose booking it was
        student_id: StudentId,
        /// Free or late
        outcome: CancellationOutcome,
        /// Instructor/admin cancellation
        by_instructor: bool,
        /// When
        cancelled_at: DateTime<Utc>,
    },

    /// Cancelled slot re-opened as a new available slot
    SlotReplaced {
        /// Cancelled slot
        cancelled: SlotId,
        /// New slot
        replacement: SlotId,
        /// When
        replaced_at: DateTime<Utc>,
    },

    /// Credit minted by a free cancellation
    CreditIssued {
        /// Credit
        credit: Credit,
    },

    /// Credit consumed
    CreditRedeemed {
        /// Credit
        credit_id: CreditId,
        /// Slot it booked
        slot_id: SlotId,
    },

    /// Cart line added
    CartItemAdded {
        /// Student
        student_id: StudentId,
        /// Line
        item: CartItem,
    },

    /// Cart line removed
    CartItemRemoved {
        /// Student
        student_id: StudentId,
        /// Slot
        slot_id: SlotId,
    },

    /// Order placed; cart emptied, slots linked to the order
    OrderPlaced {
        /// Order
        order: Order,
    },

    /// Order paid
    OrderPaid {
        /// Order
        order_id: OrderId,
        /// When
        paid_at: DateTime<Utc>,
    },

    /// Order cancelled, failed or expired
    OrderCancelled {
        /// Order
        order_id: OrderId,
        /// Why
        reason: OrderCancelReason,
        /// When
        cancelled_at: DateTime<Utc>,
    },
}

impl BookingEvent {
    /// Slot the event concerns, if any
    #[must_use]
    pub const fn slot_id(&self) -> Option<SlotId> {
        match self {
            Self::SlotAdded { slot_id, .. }
            | Self::SlotRemoved { slot_id }
            | Self::SlotHeld { slot_id, .. }
            | Self::HoldReleased { slot_id, .. }
            | Self::SlotBooked { slot_id, .. }
            | Self::BookingCancelled { slot_id, .. }
            | Self::CreditRedeemed { slot_id, .. }
            | Self::CartItemRemoved { slot_id, .. } => Some(*slot_id),
            Self::SlotReplaced { replacement, .. } => Some(*replacement),
            Self::CartItemAdded { item, .. } => Some(item.slot_id),
            Self::CreditIssued { .. }
            | Self::OrderPlaced { .. }
            | Self::OrderPaid { .. }
            | Self::OrderCancelled { .. } => None,
        }
    }
}

impl JournalEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::SlotAdded { .. } => "SlotAdded.v1",
            Self::SlotRemoved { .. } => "SlotRemoved.v1",
            Self::SlotHeld { .. } => "SlotHeld.v1",
            Self::HoldReleased { .. } => "HoldReleased.v1",
            Self::SlotBooked { .. } => "SlotBooked.v1",
            Self::BookingCancelled { .. } => "BookingCancelled.v1",
            Self::SlotReplaced { .. } => "SlotReplaced.v1",
            Self::CreditIssued { .. } => "CreditIssued.v1",
            Self::CreditRedeemed { .. } => "CreditRedeemed.v1",
            Self::CartItemAdded { .. } => "CartItemAdded.v1",
            Self::CartItemRemoved { .. } => "CartItemRemoved.v1",
            Self::OrderPlaced { .. } => "OrderPlaced.v1",
            Self::OrderPaid { .. } => "OrderPaid.v1",
            Self::OrderCancelled { .. } => "OrderCancelled.v1",
        }
    }
}
