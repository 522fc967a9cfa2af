//! The booking reducer.
//!
//! Every command is validated against the current state and turned into a
//! list of [`BookingEvent`]s. Accepted events are applied to state
//! immediately, then persisted and published by a single effect. Commands
//! that fail validation only record `last_error`.
//!
//! Slot, cart and order changes made by one command land in the same
//! reducer call, so they are atomic with respect to every other command.

use crate::action::{BookingAction, BookingEvent, ReleaseReason};
use crate::environment::BookingEnvironment;
use crate::error::BookingError;
use crate::policy::{CancellationCharge, CancellationOutcome};
use crate::state::BookingState;
use crate::types::{
    CartItem, ClassKind, Credit, CreditId, Hold, HoldId, InstructorId, Money, Order,
    OrderCancelReason, OrderId, OrderLine, OrderStatus, Payment, Slot, SlotId, SlotStatus,
    SlotWindow, StudentId,
};
use chrono::{DateTime, Utc};
use drivebook_core::journal::JournalEvent;
use drivebook_core::{SmallVec, effect::Effect, reducer::Reducer};
use std::sync::Arc;

type Decision = Result<Vec<BookingEvent>, BookingError>;

/// Reducer for the whole booking domain
#[derive(Clone, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========== Schedule ==========

    fn add_slot(
        state: &BookingState,
        now: DateTime<Utc>,
        slot_id: SlotId,
        instructor_id: InstructorId,
        kind: ClassKind,
        window: (DateTime<Utc>, DateTime<Utc>),
        price: Money,
    ) -> Decision {
        if state.slots.contains_key(&slot_id) {
            return Err(BookingError::DuplicateSlot(slot_id));
        }

        let window = SlotWindow::new(window.0, window.1)?;
        if window.has_started(now) {
            return Err(BookingError::WindowInPast(window.start()));
        }

        if let Some(clash) = state.slots.values().find(|slot| {
            slot.instructor_id == instructor_id
                && slot.status != SlotStatus::Cancelled
                && slot.window.overlaps(&window)
        }) {
            return Err(BookingError::Overlap(clash.id));
        }

        Ok(vec![BookingEvent::SlotAdded {
            slot_id,
            instructor_id,
            kind,
            window,
            price,
            added_at: now,
        }])
    }

    fn remove_slot(state: &BookingState, slot_id: SlotId) -> Decision {
        let slot = state.require_slot(slot_id)?;
        if slot.status != SlotStatus::Available {
            return Err(BookingError::NotRemovable {
                slot_id,
                status: slot.status,
            });
        }
        Ok(vec![BookingEvent::SlotRemoved { slot_id }])
    }

    // ========== Holds ==========

    fn reserve_pending(
        state: &BookingState,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
        slot_id: SlotId,
        student_id: StudentId,
    ) -> Decision {
        let slot = state.require_slot(slot_id)?;
        if slot.status != SlotStatus::Available {
            return Err(BookingError::InvalidTransition {
                from: slot.status,
                to: SlotStatus::Pending,
            });
        }
        if slot.window.has_started(now) {
            return Err(BookingError::AlreadyStarted(slot_id));
        }

        let limit = env.config.max_holds_per_student;
        let held = state
            .slots
            .values()
            .filter(|slot| slot.is_held_by(student_id))
            .count();
        if held >= limit {
            return Err(BookingError::HoldLimitReached { limit });
        }

        let expires_at = now
            .checked_add_signed(env.config.hold_ttl)
            .ok_or(BookingError::DeadlineOverflow)?;

        Ok(vec![BookingEvent::SlotHeld {
            slot_id,
            hold: Hold {
                id: HoldId::new(),
                student: student_id,
                expires_at,
            },
        }])
    }

    fn release_hold(state: &BookingState, slot_id: SlotId, student_id: StudentId) -> Decision {
        let slot = state.require_slot(slot_id)?;
        let hold = Self::pending_hold(slot, SlotStatus::Available)?;
        if hold.student != student_id {
            return Err(BookingError::NotHolder(slot_id));
        }
        Self::ensure_not_ordered(state, slot)?;

        let mut events = vec![BookingEvent::HoldReleased {
            slot_id,
            hold_id: hold.id,
            reason: ReleaseReason::Released,
        }];
        events.extend(Self::drop_cart_line(state, student_id, slot_id));
        Ok(events)
    }

    fn expire_hold(state: &BookingState, slot_id: SlotId, hold_id: HoldId) -> Vec<BookingEvent> {
        let Some(slot) = state.slot(&slot_id) else {
            return Vec::new();
        };
        match slot.hold {
            Some(hold)
                if hold.id == hold_id
                    && slot.status == SlotStatus::Pending
                    && state.awaiting_order_of(slot).is_none() =>
            {
                let mut events = vec![BookingEvent::HoldReleased {
                    slot_id,
                    hold_id,
                    reason: ReleaseReason::Expired,
                }];
                events.extend(Self::drop_cart_line(state, hold.student, slot_id));
                events
            },
            _ => Vec::new(),
        }
    }

    // ========== Booking ==========

    /// Checks shared by direct booking and redemption
    fn ensure_bookable(
        state: &BookingState,
        slot: &Slot,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        match slot.status {
            SlotStatus::Available => {},
            SlotStatus::Pending => {
                if !slot.is_held_by(student_id) {
                    return Err(BookingError::NotHolder(slot.id));
                }
                Self::ensure_not_ordered(state, slot)?;
            },
            from @ (SlotStatus::Booked | SlotStatus::Cancelled) => {
                return Err(BookingError::InvalidTransition {
                    from,
                    to: SlotStatus::Booked,
                });
            },
        }
        if slot.window.has_started(now) {
            return Err(BookingError::AlreadyStarted(slot.id));
        }
        Ok(())
    }

    fn book_slot(
        state: &BookingState,
        now: DateTime<Utc>,
        slot_id: SlotId,
        student_id: StudentId,
    ) -> Decision {
        let slot = state.require_slot(slot_id)?;
        Self::ensure_bookable(state, slot, student_id, now)?;

        let mut events = Self::drop_cart_line(state, student_id, slot_id);
        events.push(BookingEvent::SlotBooked {
            slot_id,
            student_id,
            payment: Payment::Direct,
            booked_at: now,
        });
        Ok(events)
    }

    fn cancel_booking(
        state: &BookingState,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
        slot_id: SlotId,
        student_id: StudentId,
        by_instructor: bool,
    ) -> Decision {
        let slot = state.require_slot(slot_id)?;
        if slot.status != SlotStatus::Booked {
            return Err(BookingError::InvalidTransition {
                from: slot.status,
                to: SlotStatus::Cancelled,
            });
        }
        if slot.student != Some(student_id) {
            return Err(BookingError::NotOwner {
                student: student_id,
                resource: format!("booking {slot_id}"),
            });
        }
        if slot.window.has_started(now) {
            return Err(BookingError::AlreadyStarted(slot_id));
        }

        let (outcome, credit) = match env.config.policy.assess(slot.window.start(), now, by_instructor) {
            CancellationCharge::Free => {
                let credit = Credit {
                    id: CreditId::new(),
                    student: student_id,
                    kind: slot.kind,
                    source_slot: slot_id,
                    amount: slot.price,
                    issued_at: now,
                    redeemed_by: None,
                };
                (CancellationOutcome::Free { credit_id: credit.id }, Some(credit))
            },
            CancellationCharge::Late { fee } => (CancellationOutcome::Late { fee }, None),
        };

        let mut events = vec![BookingEvent::BookingCancelled {
            slot_id,
            student_id,
            outcome,
            by_instructor,
            cancelled_at: now,
        }];
        events.extend(credit.map(|credit| BookingEvent::CreditIssued { credit }));
        events.push(BookingEvent::SlotReplaced {
            cancelled: slot_id,
            replacement: SlotId::new(),
            replaced_at: now,
        });
        Ok(events)
    }

    fn cancel_by_instructor(
        state: &BookingState,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
        slot_id: SlotId,
        instructor_id: InstructorId,
    ) -> Decision {
        let slot = state.require_slot(slot_id)?;
        if slot.instructor_id != instructor_id {
            return Err(BookingError::NotSlotInstructor {
                instructor_id,
                slot_id,
            });
        }
        let student_id = match (slot.status, slot.student) {
            (SlotStatus::Booked, Some(student_id)) => student_id,
            (from, _) => {
                return Err(BookingError::InvalidTransition {
                    from,
                    to: SlotStatus::Cancelled,
                });
            },
        };
        Self::cancel_booking(state, env, now, slot_id, student_id, true)
    }

    fn redeem_credit(
        state: &BookingState,
        now: DateTime<Utc>,
        credit_id: CreditId,
        slot_id: SlotId,
        student_id: StudentId,
    ) -> Decision {
        let credit = state
            .credit(&credit_id)
            .ok_or(BookingError::CreditNotFound(credit_id))?;
        if credit.student != student_id {
            return Err(BookingError::NotOwner {
                student: student_id,
                resource: format!("credit {credit_id}"),
            });
        }
        if let Some(used_for) = credit.redeemed_by {
            return Err(BookingError::CreditAlreadyRedeemed {
                credit_id,
                slot_id: used_for,
            });
        }

        let slot = state.require_slot(slot_id)?;
        Self::ensure_bookable(state, slot, student_id, now)?;
        if credit.kind != slot.kind {
            return Err(BookingError::KindMismatch {
                credit: credit.kind,
                slot: slot.kind,
            });
        }

        let mut events = Self::drop_cart_line(state, student_id, slot_id);
        events.push(BookingEvent::CreditRedeemed { credit_id, slot_id });
        events.push(BookingEvent::SlotBooked {
            slot_id,
            student_id,
            payment: Payment::Credit { credit_id },
            booked_at: now,
        });
        Ok(events)
    }

    fn update_slot_status(
        state: &BookingState,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
        slot_id: SlotId,
        to: SlotStatus,
        student_id: Option<StudentId>,
    ) -> Decision {
        let slot = state.require_slot(slot_id)?;
        let from = slot.status;
        if !from.can_transition_to(to) {
            return Err(BookingError::InvalidTransition { from, to });
        }

        match (from, to) {
            (SlotStatus::Available, SlotStatus::Pending) => {
                let student_id = student_id.ok_or(BookingError::StudentRequired(to))?;
                Self::reserve_pending(state, env, now, slot_id, student_id)
            },
            (SlotStatus::Available, SlotStatus::Booked) => {
                let student_id = student_id.ok_or(BookingError::StudentRequired(to))?;
                Self::book_slot(state, now, slot_id, student_id)
            },
            (SlotStatus::Pending, SlotStatus::Booked) => {
                let student_id = student_id
                    .or(slot.hold.map(|hold| hold.student))
                    .ok_or(BookingError::StudentRequired(to))?;
                Self::book_slot(state, now, slot_id, student_id)
            },
            (SlotStatus::Pending, SlotStatus::Available) => {
                let hold = Self::pending_hold(slot, to)?;
                Self::ensure_not_ordered(state, slot)?;
                let mut events = vec![BookingEvent::HoldReleased {
                    slot_id,
                    hold_id: hold.id,
                    reason: ReleaseReason::Admin,
                }];
                events.extend(Self::drop_cart_line(state, hold.student, slot_id));
                Ok(events)
            },
            (SlotStatus::Booked, SlotStatus::Cancelled) => {
                let student_id = slot.student.ok_or(BookingError::StudentRequired(to))?;
                Self::cancel_booking(state, env, now, slot_id, student_id, true)
            },
            _ => Err(BookingError::InvalidTransition { from, to }),
        }
    }

    // ========== Cart ==========

    fn add_to_cart(
        state: &BookingState,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
        student_id: StudentId,
        slot_id: SlotId,
    ) -> Decision {
        if state
            .cart(&student_id)
            .is_some_and(|cart| cart.contains(slot_id))
        {
            return Err(BookingError::AlreadyInCart(slot_id));
        }

        let slot = state.require_slot(slot_id)?;
        let mut events = if slot.is_held_by(student_id) {
            Self::ensure_not_ordered(state, slot)?;
            Vec::new()
        } else {
            Self::reserve_pending(state, env, now, slot_id, student_id)?
        };

        events.push(BookingEvent::CartItemAdded {
            student_id,
            item: CartItem {
                slot_id,
                kind: slot.kind,
                price: slot.price,
                added_at: now,
            },
        });
        Ok(events)
    }

    fn remove_from_cart(state: &BookingState, student_id: StudentId, slot_id: SlotId) -> Decision {
        if !state
            .cart(&student_id)
            .is_some_and(|cart| cart.contains(slot_id))
        {
            return Err(BookingError::NotInCart(slot_id));
        }

        let mut events = vec![BookingEvent::CartItemRemoved {
            student_id,
            slot_id,
        }];
        events.extend(Self::release_for_cart(state, student_id, slot_id));
        Ok(events)
    }

    fn clear_cart(state: &BookingState, student_id: StudentId) -> Vec<BookingEvent> {
        let Some(cart) = state.cart(&student_id) else {
            return Vec::new();
        };
        cart.items
            .iter()
            .flat_map(|item| {
                let mut events = vec![BookingEvent::CartItemRemoved {
                    student_id,
                    slot_id: item.slot_id,
                }];
                events.extend(Self::release_for_cart(state, student_id, item.slot_id));
                events
            })
            .collect()
    }

    // ========== Orders ==========

    fn checkout(
        state: &BookingState,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
        student_id: StudentId,
        order_id: OrderId,
    ) -> Decision {
        if state.orders.contains_key(&order_id) {
            return Err(BookingError::DuplicateOrder(order_id));
        }
        let cart = state
            .cart(&student_id)
            .filter(|cart| !cart.items.is_empty())
            .ok_or(BookingError::EmptyCart)?;

        for item in &cart.items {
            let slot = state.require_slot(item.slot_id)?;
            if !slot.is_held_by(student_id) {
                return Err(BookingError::NotHolder(item.slot_id));
            }
            Self::ensure_not_ordered(state, slot)?;
        }

        let total = cart.total().ok_or(BookingError::AmountOverflow)?;
        let payment_deadline = now
            .checked_add_signed(env.config.payment_window)
            .ok_or(BookingError::DeadlineOverflow)?;
        let lines = cart
            .items
            .iter()
            .map(|item| OrderLine {
                slot_id: item.slot_id,
                kind: item.kind,
                price: item.price,
            })
            .collect();

        Ok(vec![BookingEvent::OrderPlaced {
            order: Order {
                id: order_id,
                student: student_id,
                lines,
                total,
                status: OrderStatus::AwaitingPayment,
                cancel_reason: None,
                created_at: now,
                payment_deadline,
            },
        }])
    }

    fn confirm_order(state: &BookingState, now: DateTime<Utc>, order_id: OrderId) -> Decision {
        let order = state.require_order(order_id)?;
        if !order.is_awaiting_payment() {
            return Err(BookingError::OrderNotAwaitingPayment(order_id));
        }

        let mut events = vec![BookingEvent::OrderPaid {
            order_id,
            paid_at: now,
        }];
        events.extend(order.slot_ids().map(|slot_id| BookingEvent::SlotBooked {
            slot_id,
            student_id: order.student,
            payment: Payment::Paid { order_id },
            booked_at: now,
        }));
        Ok(events)
    }

    fn cancel_order(
        state: &BookingState,
        now: DateTime<Utc>,
        order_id: OrderId,
        reason: OrderCancelReason,
    ) -> Decision {
        let order = state.require_order(order_id)?;
        if !order.is_awaiting_payment() {
            return Err(BookingError::OrderNotAwaitingPayment(order_id));
        }

        let mut events = vec![BookingEvent::OrderCancelled {
            order_id,
            reason,
            cancelled_at: now,
        }];
        for slot_id in order.slot_ids() {
            let hold = state
                .slot(&slot_id)
                .filter(|slot| slot.status == SlotStatus::Pending && slot.order_id == Some(order_id))
                .and_then(|slot| slot.hold);
            if let Some(hold) = hold {
                events.push(BookingEvent::HoldReleased {
                    slot_id,
                    hold_id: hold.id,
                    reason: ReleaseReason::OrderCancelled,
                });
            }
        }
        Ok(events)
    }

    fn expire_order(state: &BookingState, now: DateTime<Utc>, order_id: OrderId) -> Vec<BookingEvent> {
        match state.order(&order_id) {
            Some(order) if order.is_awaiting_payment() => {
                Self::cancel_order(state, now, order_id, OrderCancelReason::Expired)
                    .unwrap_or_default()
            },
            _ => Vec::new(),
        }
    }

    fn sweep_expired(state: &BookingState, now: DateTime<Utc>) -> Vec<BookingEvent> {
        let mut lapsed_holds: Vec<(SlotId, HoldId)> = state
            .slots
            .values()
            .filter(|slot| slot.status == SlotStatus::Pending)
            .filter_map(|slot| slot.hold.map(|hold| (slot.id, hold)))
            .filter(|(_, hold)| hold.expires_at <= now)
            .map(|(slot_id, hold)| (slot_id, hold.id))
            .collect();
        lapsed_holds.sort_unstable();

        let mut overdue_orders: Vec<OrderId> = state
            .orders
            .values()
            .filter(|order| order.is_awaiting_payment() && order.payment_deadline <= now)
            .map(|order| order.id)
            .collect();
        overdue_orders.sort_unstable();

        let mut events: Vec<BookingEvent> = lapsed_holds
            .into_iter()
            .flat_map(|(slot_id, hold_id)| Self::expire_hold(state, slot_id, hold_id))
            .collect();
        events.extend(
            overdue_orders
                .into_iter()
                .flat_map(|order_id| Self::expire_order(state, now, order_id)),
        );
        events
    }

    // ========== Helpers ==========

    fn pending_hold(slot: &Slot, to: SlotStatus) -> Result<Hold, BookingError> {
        match (slot.status, slot.hold) {
            (SlotStatus::Pending, Some(hold)) => Ok(hold),
            (from, _) => Err(BookingError::InvalidTransition { from, to }),
        }
    }

    fn ensure_not_ordered(state: &BookingState, slot: &Slot) -> Result<(), BookingError> {
        match state.awaiting_order_of(slot) {
            Some(order_id) => Err(BookingError::SlotInOrder {
                slot_id: slot.id,
                order_id,
            }),
            None => Ok(()),
        }
    }

    /// Cart line removal for a slot leaving the student's hands
    fn drop_cart_line(state: &BookingState, student_id: StudentId, slot_id: SlotId) -> Vec<BookingEvent> {
        if state
            .cart(&student_id)
            .is_some_and(|cart| cart.contains(slot_id))
        {
            vec![BookingEvent::CartItemRemoved {
                student_id,
                slot_id,
            }]
        } else {
            Vec::new()
        }
    }

    /// Hold release for a slot leaving the cart
    fn release_for_cart(state: &BookingState, student_id: StudentId, slot_id: SlotId) -> Option<BookingEvent> {
        state
            .slot(&slot_id)
            .filter(|slot| slot.is_held_by(student_id))
            .and_then(|slot| slot.hold)
            .map(|hold| BookingEvent::HoldReleased {
                slot_id,
                hold_id: hold.id,
                reason: ReleaseReason::Released,
            })
    }

    /// Validate a command and produce its events
    fn decide(
        state: &BookingState,
        action: BookingAction,
        env: &BookingEnvironment,
        now: DateTime<Utc>,
    ) -> Decision {
        match action {
            BookingAction::AddSlot {
                slot_id,
                instructor_id,
                kind,
                start,
                end,
                price,
            } => Self::add_slot(state, now, slot_id, instructor_id, kind, (start, end), price),
            BookingAction::RemoveSlot { slot_id } => Self::remove_slot(state, slot_id),
            BookingAction::ReservePending {
                slot_id,
                student_id,
            } => Self::reserve_pending(state, env, now, slot_id, student_id),
            BookingAction::ReleaseHold {
                slot_id,
                student_id,
            } => Self::release_hold(state, slot_id, student_id),
            BookingAction::ExpireHold { slot_id, hold_id } => {
                Ok(Self::expire_hold(state, slot_id, hold_id))
            },
            BookingAction::BookSlot {
                slot_id,
                student_id,
            } => Self::book_slot(state, now, slot_id, student_id),
            BookingAction::CancelBooking {
                slot_id,
                student_id,
                by_instructor,
            } => Self::cancel_booking(state, env, now, slot_id, student_id, by_instructor),
            BookingAction::CancelByInstructor {
                slot_id,
                instructor_id,
            } => Self::cancel_by_instructor(state, env, now, slot_id, instructor_id),
            BookingAction::RedeemCredit {
                credit_id,
                slot_id,
                student_id,
            } => Self::redeem_credit(state, now, credit_id, slot_id, student_id),
            BookingAction::UpdateSlotStatus {
                slot_id,
                status,
                student_id,
            } => Self::update_slot_status(state, env, now, slot_id, status, student_id),
            BookingAction::AddToCart {
                student_id,
                slot_id,
            } => Self::add_to_cart(state, env, now, student_id, slot_id),
            BookingAction::RemoveFromCart {
                student_id,
                slot_id,
            } => Self::remove_from_cart(state, student_id, slot_id),
            BookingAction::ClearCart { student_id } => Ok(Self::clear_cart(state, student_id)),
            BookingAction::Checkout {
                student_id,
                order_id,
            } => Self::checkout(state, env, now, student_id, order_id),
            BookingAction::ConfirmOrderPayment { order_id } => {
                Self::confirm_order(state, now, order_id)
            },
            BookingAction::FailOrderPayment { order_id, reason } => Self::cancel_order(
                state,
                now,
                order_id,
                OrderCancelReason::PaymentFailed { reason },
            ),
            BookingAction::CancelOrder { order_id } => Self::cancel_order(
                state,
                now,
                order_id,
                OrderCancelReason::CancelledByStudent,
            ),
            BookingAction::ExpireOrder { order_id } => Ok(Self::expire_order(state, now, order_id)),
            BookingAction::SweepExpired => Ok(Self::sweep_expired(state, now)),
            // Handled in `reduce`
            BookingAction::JournalAppendFailed { .. } => Ok(Vec::new()),
        }
    }

    /// Timers started by accepted events
    fn schedule_timers(
        events: &[BookingEvent],
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = Effect<BookingAction>> + '_ {
        let until = move |deadline: DateTime<Utc>| {
            (deadline - now).to_std().unwrap_or(std::time::Duration::ZERO)
        };
        events.iter().filter_map(move |event| match event {
            BookingEvent::SlotHeld { slot_id, hold } => Some(Effect::delay(
                until(hold.expires_at),
                BookingAction::ExpireHold {
                    slot_id: *slot_id,
                    hold_id: hold.id,
                },
            )),
            BookingEvent::OrderPlaced { order } => Some(Effect::delay(
                until(order.payment_deadline),
                BookingAction::ExpireOrder { order_id: order.id },
            )),
            _ => None,
        })
    }

    /// Persist then publish one batch of events
    fn persist(
        events: Vec<BookingEvent>,
        revision: u64,
        env: &BookingEnvironment,
    ) -> Effect<BookingAction> {
        let writer = Arc::clone(&env.journal);
        let notifier = Arc::clone(&env.notifier);

        Effect::Future(Box::pin(async move {
            let written = writer.write(revision, &events).await;

            if let Err(error) = notifier.publish(&events).await {
                tracing::debug!(%error, revision, "Notification dropped");
            }

            match written {
                Ok(sequence) => {
                    tracing::trace!(%sequence, revision, "Events journalled");
                    None
                },
                Err(error) => Some(BookingAction::JournalAppendFailed {
                    event_types: events
                        .iter()
                        .map(|event| event.event_type().to_string())
                        .collect(),
                    error: error.to_string(),
                }),
            }
        }))
    }

    fn record_metrics(state: &BookingState, events: &[BookingEvent]) {
        for event in events {
            match event {
                BookingEvent::SlotBooked {
                    slot_id, payment, ..
                } => {
                    let kind = state.slot(slot_id).map_or("unknown", |slot| slot.kind.as_str());
                    metrics::counter!(
                        "drivebook_bookings_total",
                        "kind" => kind,
                        "payment" => payment.as_str()
                    )
                    .increment(1);
                },
                BookingEvent::BookingCancelled { outcome, .. } => {
                    metrics::counter!("drivebook_cancellations_total", "outcome" => outcome.as_str())
                        .increment(1);
                    if let CancellationOutcome::Late { fee } = outcome {
                        metrics::counter!("drivebook_late_fees_cents_total").increment(fee.cents());
                    }
                },
                BookingEvent::HoldReleased {
                    reason: ReleaseReason::Expired,
                    ..
                } => {
                    metrics::counter!("drivebook_holds_expired_total").increment(1);
                },
                BookingEvent::OrderPaid { .. } => {
                    metrics::counter!("drivebook_orders_total", "status" => "paid").increment(1);
                },
                BookingEvent::OrderCancelled { reason, .. } => {
                    metrics::counter!("drivebook_orders_total", "status" => reason.as_str())
                        .increment(1);
                },
                _ => {},
            }
        }
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if let BookingAction::JournalAppendFailed { event_types, error } = &action {
            state.journal_failures += 1;
            metrics::counter!("drivebook_journal_failures_total").increment(1);
            tracing::error!(
                ?event_types,
                %error,
                failures = state.journal_failures,
                "Accepted events were not journalled"
            );
            return SmallVec::new();
        }

        let command = action.name();
        let now = env.clock.now();

        let events = match Self::decide(state, action, env, now) {
            Ok(events) => events,
            Err(error) => {
                metrics::counter!("drivebook_commands_rejected_total", "reason" => error.code())
                    .increment(1);
                tracing::debug!(command, %error, "Command rejected");
                state.last_error = Some(error);
                return SmallVec::new();
            },
        };

        state.last_error = None;
        if events.is_empty() {
            return SmallVec::new();
        }

        for event in &events {
            state.apply_event(event);
        }
        state.revision += 1;
        Self::record_metrics(state, &events);
        tracing::info!(
            command,
            events = events.len(),
            revision = state.revision,
            "Command accepted"
        );

        let mut effects: SmallVec<[Effect<BookingAction>; 4]> =
            Self::schedule_timers(&events, now).collect();
        effects.push(Self::persist(events, state.revision, env));
        effects
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::too_many_lines)]
mod tests;
