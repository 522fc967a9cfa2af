//! Rejection reasons for booking commands.

use crate::types::{ClassKind, CreditId, InstructorId, OrderId, SlotId, SlotStatus, StudentId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a command was rejected.
///
/// Recorded in `BookingState::last_error`; the web layer maps the
/// [`kind`](Self::kind) to an HTTP status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// No slot with this id
    #[error("Slot {0} not found")]
    SlotNotFound(SlotId),

    /// No credit with this id
    #[error("Credit {0} not found")]
    CreditNotFound(CreditId),

    /// No order with this id
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// The requested edge is not part of the slot lifecycle
    #[error("Cannot move slot from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: SlotStatus,
        /// Requested status
        to: SlotStatus,
    },

    /// The pending slot is held by someone else
    #[error("Slot {0} is held by another student")]
    NotHolder(SlotId),

    /// The booking or credit belongs to someone else
    #[error("Student {student} does not own {resource}")]
    NotOwner {
        /// Acting student
        student: StudentId,
        /// What they tried to act on
        resource: String,
    },

    /// The slot belongs to another instructor
    #[error("Instructor {instructor_id} does not own slot {slot_id}")]
    NotSlotInstructor {
        /// Acting instructor
        instructor_id: InstructorId,
        /// Slot
        slot_id: SlotId,
    },

    /// The slot is part of an order awaiting payment
    #[error("Slot {slot_id} is part of order {order_id} awaiting payment")]
    SlotInOrder {
        /// Slot
        slot_id: SlotId,
        /// Order holding it
        order_id: OrderId,
    },

    /// Only available slots can be withdrawn
    #[error("Slot {slot_id} is {status} and cannot be removed")]
    NotRemovable {
        /// Slot
        slot_id: SlotId,
        /// Current status
        status: SlotStatus,
    },

    /// The slot has already begun
    #[error("Slot {0} has already started")]
    AlreadyStarted(SlotId),

    /// A slot id was reused
    #[error("Slot {0} already exists")]
    DuplicateSlot(SlotId),

    /// An order id was reused
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),

    /// `start` is not before `end`
    #[error("Slot window is empty or inverted ({start} .. {end})")]
    InvalidWindow {
        /// Requested start
        start: DateTime<Utc>,
        /// Requested end
        end: DateTime<Utc>,
    },

    /// New slots must start in the future
    #[error("Slot window starts in the past ({0})")]
    WindowInPast(DateTime<Utc>),

    /// The instructor already has a slot in that window
    #[error("Slot overlaps existing slot {0} of the same instructor")]
    Overlap(SlotId),

    /// The credit was issued for a different class kind
    #[error("Credit is for {credit}, slot is a {slot}")]
    KindMismatch {
        /// Credit's kind
        credit: ClassKind,
        /// Slot's kind
        slot: ClassKind,
    },

    /// Credits are single-use
    #[error("Credit {credit_id} was already redeemed for slot {slot_id}")]
    CreditAlreadyRedeemed {
        /// Credit
        credit_id: CreditId,
        /// Slot it was redeemed for
        slot_id: SlotId,
    },

    /// Too many simultaneous holds
    #[error("Student already holds {limit} slots")]
    HoldLimitReached {
        /// Configured limit
        limit: usize,
    },

    /// The slot is already in the cart
    #[error("Slot {0} is already in the cart")]
    AlreadyInCart(SlotId),

    /// The slot is not in the cart
    #[error("Slot {0} is not in the cart")]
    NotInCart(SlotId),

    /// Checkout needs at least one line
    #[error("Cart is empty")]
    EmptyCart,

    /// Order is no longer awaiting payment
    #[error("Order {0} is not awaiting payment")]
    OrderNotAwaitingPayment(OrderId),

    /// A status change needs a student that was not given
    #[error("A student is required to move a slot to {0}")]
    StudentRequired(SlotStatus),

    /// Arithmetic overflow on money
    #[error("Amount overflow")]
    AmountOverflow,

    /// A hold or payment deadline is past the representable range
    #[error("Deadline out of range")]
    DeadlineOverflow,
}

/// Coarse classification of [`BookingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Something referenced does not exist
    NotFound,
    /// The request conflicts with the current state
    Conflict,
    /// The request itself is malformed
    Validation,
}

impl BookingError {
    /// Classification used for HTTP status mapping
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SlotNotFound(_) | Self::CreditNotFound(_) | Self::OrderNotFound(_) => {
                ErrorKind::NotFound
            },
            Self::InvalidTransition { .. }
            | Self::NotHolder(_)
            | Self::NotOwner { .. }
            | Self::NotSlotInstructor { .. }
            | Self::SlotInOrder { .. }
            | Self::NotRemovable { .. }
            | Self::AlreadyStarted(_)
            | Self::DuplicateSlot(_)
            | Self::DuplicateOrder(_)
            | Self::Overlap(_)
            | Self::CreditAlreadyRedeemed { .. }
            | Self::HoldLimitReached { .. }
            | Self::AlreadyInCart(_)
            | Self::NotInCart(_)
            | Self::OrderNotAwaitingPayment(_) => ErrorKind::Conflict,
            Self::InvalidWindow { .. }
            | Self::WindowInPast(_)
            | Self::KindMismatch { .. }
            | Self::EmptyCart
            | Self::StudentRequired(_)
            | Self::AmountOverflow
            | Self::DeadlineOverflow => ErrorKind::Validation,
        }
    }

    /// Machine-readable code (also the metrics label)
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SlotNotFound(_) => "slot_not_found",
            Self::CreditNotFound(_) => "credit_not_found",
            Self::OrderNotFound(_) => "order_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotHolder(_) => "not_holder",
            Self::NotOwner { .. } => "not_owner",
            Self::NotSlotInstructor { .. } => "not_slot_instructor",
            Self::SlotInOrder { .. } => "slot_in_order",
            Self::NotRemovable { .. } => "not_removable",
            Self::AlreadyStarted(_) => "already_started",
            Self::DuplicateSlot(_) => "duplicate_slot",
            Self::DuplicateOrder(_) => "duplicate_order",
            Self::InvalidWindow { .. } => "invalid_window",
            Self::WindowInPast(_) => "window_in_past",
            Self::Overlap(_) => "overlap",
            Self::KindMismatch { .. } => "kind_mismatch",
            Self::CreditAlreadyRedeemed { .. } => "credit_already_redeemed",
            Self::HoldLimitReached { .. } => "hold_limit_reached",
            Self::AlreadyInCart(_) => "already_in_cart",
            Self::NotInCart(_) => "not_in_cart",
            Self::EmptyCart => "empty_cart",
            Self::OrderNotAwaitingPayment(_) => "order_not_awaiting_payment",
            Self::StudentRequired(_) => "student_required",
            Self::AmountOverflow => "amount_overflow",
            Self::DeadlineOverflow => "deadline_overflow",
        }
    }
}
