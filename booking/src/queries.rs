//! Read-side queries over [`BookingState`].
//!
//! Results are sorted so that responses are stable across calls.

use crate::state::BookingState;
use crate::types::{ClassKind, Credit, InstructorId, Order, Slot, SlotStatus, StudentId};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Slot search criteria; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SlotFilter {
    /// Only this instructor's slots
    pub instructor: Option<InstructorId>,
    /// Only this class kind
    pub kind: Option<ClassKind>,
    /// Only this status
    pub status: Option<SlotStatus>,
    /// Slots starting at or after
    pub from: Option<DateTime<Utc>>,
    /// Slots ending at or before
    pub to: Option<DateTime<Utc>>,
}

impl SlotFilter {
    /// Open slots of one kind in a time range
    #[must_use]
    pub const fn available(
        kind: ClassKind,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            instructor: None,
            kind: Some(kind),
            status: Some(SlotStatus::Available),
            from,
            to,
        }
    }

    /// Whether `slot` satisfies every criterion
    #[must_use]
    pub fn matches(&self, slot: &Slot) -> bool {
        self.instructor.is_none_or(|id| slot.instructor_id == id)
            && self.kind.is_none_or(|kind| slot.kind == kind)
            && self.status.is_none_or(|status| slot.status == status)
            && slot.window.within(self.from, self.to)
    }
}

fn by_start(slots: &mut [&Slot]) {
    slots.sort_by_key(|slot| (slot.window.start(), slot.id));
}

impl BookingState {
    /// Slots matching `filter`, earliest first
    #[must_use]
    pub fn find_slots(&self, filter: &SlotFilter) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self
            .slots
            .values()
            .filter(|slot| filter.matches(slot))
            .collect();
        by_start(&mut slots);
        slots
    }

    /// An instructor's schedule, earliest first
    #[must_use]
    pub fn instructor_schedule(&self, instructor: InstructorId) -> Vec<&Slot> {
        self.find_slots(&SlotFilter {
            instructor: Some(instructor),
            ..SlotFilter::default()
        })
    }

    /// A student's booked slots, earliest first
    #[must_use]
    pub fn student_bookings(&self, student: StudentId) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self
            .slots
            .values()
            .filter(|slot| slot.status == SlotStatus::Booked && slot.student == Some(student))
            .collect();
        by_start(&mut slots);
        slots
    }

    /// Slots a student currently holds
    #[must_use]
    pub fn student_holds(&self, student: StudentId) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self
            .slots
            .values()
            .filter(|slot| slot.is_held_by(student))
            .collect();
        by_start(&mut slots);
        slots
    }

    /// A student's unredeemed credits, oldest first
    #[must_use]
    pub fn student_credits(&self, student: StudentId) -> Vec<&Credit> {
        let mut credits: Vec<&Credit> = self
            .credits
            .values()
            .filter(|credit| credit.student == student && credit.is_redeemable())
            .collect();
        credits.sort_by_key(|credit| (credit.issued_at, credit.id));
        credits
    }

    /// A student's orders, oldest first
    #[must_use]
    pub fn student_orders(&self, student: StudentId) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|order| order.student == student)
            .collect();
        orders.sort_by_key(|order| (order.created_at, order.id));
        orders
    }
}
