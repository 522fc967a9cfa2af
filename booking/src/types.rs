//! Domain types for driving-school bookings.
//!
//! Value objects (identifiers, [`Money`], [`SlotWindow`]) and the entities
//! held in [`BookingState`](crate::state::BookingState): slots, credits,
//! carts and orders.

use crate::error::BookingError;
use crate::policy::CancellationOutcome;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an instructor
    InstructorId
);
define_id!(
    /// Unique identifier for a bookable slot
    SlotId
);
define_id!(
    /// Unique identifier for a student
    StudentId
);
define_id!(
    /// Unique identifier for an order
    OrderId
);
define_id!(
    /// Unique identifier for a pending hold on a slot
    HoldId
);
define_id!(
    /// Unique identifier for a redeemable credit
    CreditId
);

// ============================================================================
// Value Objects
// ============================================================================

/// Money amount in cents (avoids floating point errors)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from dollars with overflow checking
    #[must_use]
    pub const fn checked_from_dollars(dollars: u64) -> Option<Self> {
        match dollars.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// The three kinds of class a slot can be booked for.
///
/// Credits are only redeemable against a slot of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Road test with an examiner
    DrivingTest,
    /// Behind-the-wheel lesson
    DrivingLesson,
    /// Classroom session (traffic-ticket course)
    TicketClass,
}

impl ClassKind {
    /// Stable label for metrics and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DrivingTest => "driving_test",
            Self::DrivingLesson => "driving_lesson",
            Self::TicketClass => "ticket_class",
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open time interval `[start, end)` of a slot.
///
/// Decoding goes through [`SlotWindow::new`], so `start < end` holds for
/// windows read from requests and from the journal alike.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct SlotWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Unchecked wire form of [`SlotWindow`].
#[derive(Deserialize)]
struct RawWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawWindow> for SlotWindow {
    type Error = BookingError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl SlotWindow {
    /// Creates a window, rejecting empty or inverted intervals
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidWindow`] unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BookingError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(BookingError::InvalidWindow { start, end })
        }
    }

    /// Start of the slot
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the slot
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the slot
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether the two windows share any instant
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether the slot has begun at `now`
    #[must_use]
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start
    }

    /// Whether the window lies inside `[from, to]`
    #[must_use]
    pub fn within(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
        from.is_none_or(|from| self.start >= from) && to.is_none_or(|to| self.end <= to)
    }
}

// ============================================================================
// Slots
// ============================================================================

/// Lifecycle status of a slot.
///
/// ```text
/// Available ──► Pending ──► Booked ──► Cancelled
///     │  ▲         │           ▲
///     │  └─────────┘           │
///     └────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// Open for booking
    Available,
    /// Held for a student while payment or confirmation is outstanding
    Pending,
    /// Booked by a student
    #[serde(alias = "scheduled")]
    Booked,
    /// Cancelled (terminal; a replacement slot takes its place)
    Cancelled,
}

impl SlotStatus {
    /// Whether `self → to` is an edge of the slot lifecycle
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Available, Self::Pending | Self::Booked)
                | (Self::Pending, Self::Booked | Self::Available)
                | (Self::Booked, Self::Cancelled)
        )
    }

    /// Stable label for metrics and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Pending => "pending",
            Self::Booked => "booked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-boxed claim on a pending slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// Hold identifier (matched by `ExpireHold`)
    pub id: HoldId,
    /// Student holding the slot
    pub student: StudentId,
    /// When the hold lapses unless the slot is booked or ordered
    pub expires_at: DateTime<Utc>,
}

/// How a booked slot was paid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payment {
    /// Paid through a checked-out order
    Paid {
        /// Order that paid for the slot
        order_id: OrderId,
    },
    /// Redeemed with a credit from an earlier free cancellation
    Credit {
        /// Credit consumed
        credit_id: CreditId,
    },
    /// Booked directly (payment settled outside the cart)
    Direct,
}

impl Payment {
    /// Stable label for metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paid { .. } => "order",
            Self::Credit { .. } => "credit",
            Self::Direct => "direct",
        }
    }
}

/// Record of a cancelled booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Free (with credit) or late (with fee)
    pub outcome: CancellationOutcome,
    /// Whether the instructor or an admin cancelled
    pub by_instructor: bool,
    /// When the cancellation happened
    pub cancelled_at: DateTime<Utc>,
}

/// A bookable slot on an instructor's schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identifier
    pub id: SlotId,
    /// Owning instructor
    pub instructor_id: InstructorId,
    /// Class kind
    pub kind: ClassKind,
    /// Time interval
    pub window: SlotWindow,
    /// Price of one booking
    pub price: Money,
    /// Lifecycle status
    pub status: SlotStatus,
    /// Booked student (set while pending, booked or cancelled)
    pub student: Option<StudentId>,
    /// Active hold (pending only)
    pub hold: Option<Hold>,
    /// How the booking was paid (booked and cancelled only)
    pub payment: Option<Payment>,
    /// Order the pending hold belongs to
    pub order_id: Option<OrderId>,
    /// Cancellation details (cancelled only)
    pub cancellation: Option<Cancellation>,
    /// Slot that re-opened this window after cancellation
    pub replaced_by: Option<SlotId>,
    /// When the slot was published
    pub created_at: DateTime<Utc>,
}

impl Slot {
    /// New available slot
    #[must_use]
    pub const fn available(
        id: SlotId,
        instructor_id: InstructorId,
        kind: ClassKind,
        window: SlotWindow,
        price: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            instructor_id,
            kind,
            window,
            price,
            status: SlotStatus::Available,
            student: None,
            hold: None,
            payment: None,
            order_id: None,
            cancellation: None,
            replaced_by: None,
            created_at,
        }
    }

    /// Whether `student` holds this pending slot
    #[must_use]
    pub fn is_held_by(&self, student: StudentId) -> bool {
        self.status == SlotStatus::Pending && self.hold.is_some_and(|h| h.student == student)
    }
}

// ============================================================================
// Credits
// ============================================================================

/// Redeemable credit issued by a free cancellation.
///
/// One credit buys one class of the same kind, whatever its price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    /// Credit identifier
    pub id: CreditId,
    /// Owner
    pub student: StudentId,
    /// Class kind the credit can be redeemed for
    pub kind: ClassKind,
    /// Cancelled slot that produced the credit
    pub source_slot: SlotId,
    /// Price of the cancelled booking
    pub amount: Money,
    /// When it was issued
    pub issued_at: DateTime<Utc>,
    /// Slot booked with this credit, once redeemed
    pub redeemed_by: Option<SlotId>,
}

impl Credit {
    /// Whether the credit can still be used
    #[must_use]
    pub const fn is_redeemable(&self) -> bool {
        self.redeemed_by.is_none()
    }
}

// ============================================================================
// Cart & Orders
// ============================================================================

/// A held slot waiting in a student's cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Held slot
    pub slot_id: SlotId,
    /// Class kind at the time it was added
    pub kind: ClassKind,
    /// Price at the time it was added
    pub price: Money,
    /// When it was added
    pub added_at: DateTime<Utc>,
}

/// A student's cart. Every line is backed by a pending hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Owner
    pub student: StudentId,
    /// Lines in insertion order
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Empty cart for `student`
    #[must_use]
    pub const fn new(student: StudentId) -> Self {
        Self {
            student,
            items: Vec::new(),
        }
    }

    /// Whether the cart has a line for `slot_id`
    #[must_use]
    pub fn contains(&self, slot_id: SlotId) -> bool {
        self.items.iter().any(|item| item.slot_id == slot_id)
    }

    /// Sum of line prices, `None` on overflow
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        self.items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.price))
    }
}

/// One purchased slot inside an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Purchased slot
    pub slot_id: SlotId,
    /// Class kind
    pub kind: ClassKind,
    /// Price charged
    pub price: Money,
}

/// Order lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Checked out, waiting for the payment outcome
    AwaitingPayment,
    /// Paid; every slot is booked
    Paid,
    /// Cancelled, failed or expired; every slot was released
    Cancelled,
}

/// Why an order was cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderCancelReason {
    /// The payment provider declined
    PaymentFailed {
        /// Provider message
        reason: String,
    },
    /// Cancelled by the student before paying
    CancelledByStudent,
    /// Payment window elapsed
    Expired,
}

impl OrderCancelReason {
    /// Stable label for metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentFailed { .. } => "payment_failed",
            Self::CancelledByStudent => "cancelled",
            Self::Expired => "expired",
        }
    }
}

/// A checked-out cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// Buyer
    pub student: StudentId,
    /// Purchased slots
    pub lines: Vec<OrderLine>,
    /// Sum of line prices
    pub total: Money,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Cancellation reason, once cancelled
    pub cancel_reason: Option<OrderCancelReason>,
    /// When the order was placed
    pub created_at: DateTime<Utc>,
    /// When the order expires unless paid
    pub payment_deadline: DateTime<Utc>,
}

impl Order {
    /// Whether the order is still waiting for payment
    #[must_use]
    pub const fn is_awaiting_payment(&self) -> bool {
        matches!(self.status, OrderStatus::AwaitingPayment)
    }

    /// Slots covered by the order
    pub fn slot_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.lines.iter().map(|line| line.slot_id)
    }
}
