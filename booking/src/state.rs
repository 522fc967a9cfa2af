//! Booking state and event application.

use crate::action::BookingEvent;
use crate::error::BookingError;
use crate::types::{
    Cancellation, Cart, Credit, CreditId, Order, OrderId, OrderStatus, Slot, SlotId, SlotStatus,
    StudentId,
};
use drivebook_core::journal::{JournalEntry, JournalError, JournalEvent};
use std::collections::HashMap;

/// Everything the booking reducer owns.
///
/// Slots, credits, carts and orders live together so a single reducer call
/// can change all of them atomically.
#[derive(Clone, Debug, Default)]
pub struct BookingState {
    /// Every slot ever published (cancelled slots are kept)
    pub slots: HashMap<SlotId, Slot>,
    /// Issued credits
    pub credits: HashMap<CreditId, Credit>,
    /// Non-empty carts by student
    pub carts: HashMap<StudentId, Cart>,
    /// Orders
    pub orders: HashMap<OrderId, Order>,
    /// Rejection reason of the last command (cleared on success)
    pub last_error: Option<BookingError>,
    /// Journal appends that failed after retries
    pub journal_failures: u64,
    /// Accepted commands since startup; orders journal writes
    pub revision: u64,
}

impl BookingState {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state from journal entries, in order.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Serialization`] on the first entry that does
    /// not decode.
    pub fn replay<'a, I>(entries: I) -> Result<Self, JournalError>
    where
        I: IntoIterator<Item = &'a JournalEntry>,
    {
        let mut state = Self::new();
        let mut count = 0_usize;
        for entry in entries {
            let event = BookingEvent::from_entry(entry)?;
            state.apply_event(&event);
            count += 1;
        }
        tracing::info!(
            events = count,
            slots = state.slots.len(),
            orders = state.orders.len(),
            "Booking state replayed"
        );
        Ok(state)
    }

    /// Apply one event.
    ///
    /// Events have already been validated by the reducer, so missing
    /// targets are ignored rather than reported.
    pub fn apply_event(&mut self, event: &BookingEvent) {
        match event {
            BookingEvent::SlotAdded {
                slot_id,
                instructor_id,
                kind,
                window,
                price,
                added_at,
            } => {
                self.slots.insert(
                    *slot_id,
                    Slot::available(*slot_id, *instructor_id, *kind, *window, *price, *added_at),
                );
            },

            BookingEvent::SlotRemoved { slot_id } => {
                self.slots.remove(slot_id);
            },

            BookingEvent::SlotHeld { slot_id, hold } => {
                if let Some(slot) = self.slots.get_mut(slot_id) {
                    slot.status = SlotStatus::Pending;
                    slot.student = Some(hold.student);
                    slot.hold = Some(*hold);
                }
            },

            BookingEvent::HoldReleased { slot_id, .. } => {
                if let Some(slot) = self.slots.get_mut(slot_id) {
                    slot.status = SlotStatus::Available;
                    slot.student = None;
                    slot.hold = None;
                    slot.order_id = None;
                }
            },

            BookingEvent::SlotBooked {
                slot_id,
                student_id,
                payment,
                ..
            } => {
                if let Some(slot) = self.slots.get_mut(slot_id) {
                    slot.status = SlotStatus::Booked;
                    slot.student = Some(*student_id);
                    slot.payment = Some(*payment);
                    slot.hold = None;
                    slot.order_id = None;
                }
            },

            BookingEvent::BookingCancelled {
                slot_id,
                outcome,
                by_instructor,
                cancelled_at,
                ..
            } => {
                if let Some(slot) = self.slots.get_mut(slot_id) {
                    slot.status = SlotStatus::Cancelled;
                    slot.cancellation = Some(Cancellation {
                        outcome: *outcome,
                        by_instructor: *by_instructor,
                        cancelled_at: *cancelled_at,
                    });
                }
            },

            BookingEvent::SlotReplaced {
                cancelled,
                replacement,
                replaced_at,
            } => {
                let Some(original) = self.slots.get_mut(cancelled) else {
                    return;
                };
                original.replaced_by = Some(*replacement);
                let fresh = Slot::available(
                    *replacement,
                    original.instructor_id,
                    original.kind,
                    original.window,
                    original.price,
                    *replaced_at,
                );
                self.slots.insert(*replacement, fresh);
            },

            BookingEvent::CreditIssued { credit } => {
                self.credits.insert(credit.id, credit.clone());
            },

            BookingEvent::CreditRedeemed { credit_id, slot_id } => {
                if let Some(credit) = self.credits.get_mut(credit_id) {
                    credit.redeemed_by = Some(*slot_id);
                }
            },

            BookingEvent::CartItemAdded { student_id, item } => {
                self.carts
                    .entry(*student_id)
                    .or_insert_with(|| Cart::new(*student_id))
                    .items
                    .push(item.clone());
            },

            BookingEvent::CartItemRemoved {
                student_id,
                slot_id,
            } => {
                if let Some(cart) = self.carts.get_mut(student_id) {
                    cart.items.retain(|item| item.slot_id != *slot_id);
                    if cart.items.is_empty() {
                        self.carts.remove(student_id);
                    }
                }
            },

            BookingEvent::OrderPlaced { order } => {
                for slot_id in order.slot_ids() {
                    if let Some(slot) = self.slots.get_mut(&slot_id) {
                        slot.order_id = Some(order.id);
                    }
                }
                self.carts.remove(&order.student);
                self.orders.insert(order.id, order.clone());
            },

            BookingEvent::OrderPaid { order_id, .. } => {
                if let Some(order) = self.orders.get_mut(order_id) {
                    order.status = OrderStatus::Paid;
                }
            },

            BookingEvent::OrderCancelled {
                order_id, reason, ..
            } => {
                if let Some(order) = self.orders.get_mut(order_id) {
                    order.status = OrderStatus::Cancelled;
                    order.cancel_reason = Some(reason.clone());
                }
            },
        }
    }

    /// Slot by id
    #[must_use]
    pub fn slot(&self, slot_id: &SlotId) -> Option<&Slot> {
        self.slots.get(slot_id)
    }

    /// Credit by id
    #[must_use]
    pub fn credit(&self, credit_id: &CreditId) -> Option<&Credit> {
        self.credits.get(credit_id)
    }

    /// Order by id
    #[must_use]
    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// A student's cart, if it has any lines
    #[must_use]
    pub fn cart(&self, student_id: &StudentId) -> Option<&Cart> {
        self.carts.get(student_id)
    }

    /// Slot lookup that reports a missing slot as an error
    pub(crate) fn require_slot(&self, slot_id: SlotId) -> Result<&Slot, BookingError> {
        self.slots
            .get(&slot_id)
            .ok_or(BookingError::SlotNotFound(slot_id))
    }

    /// Order lookup that reports a missing order as an error
    pub(crate) fn require_order(&self, order_id: OrderId) -> Result<&Order, BookingError> {
        self.orders
            .get(&order_id)
            .ok_or(BookingError::OrderNotFound(order_id))
    }

    /// Whether the slot is linked to an order still awaiting payment
    pub(crate) fn awaiting_order_of(&self, slot: &Slot) -> Option<OrderId> {
        slot.order_id
            .filter(|id| self.orders.get(id).is_some_and(Order::is_awaiting_payment))
    }
}
