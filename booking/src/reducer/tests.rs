use super::*;
use crate::environment::BookingConfig;
use crate::notifier::BroadcastNotifier;
use chrono::Duration;
use drivebook_core::environment::Clock;
use drivebook_runtime::RetryPolicy;
use drivebook_testing::{FixedClock, InMemoryJournal, ReducerTest, assertions, test_clock};

// ============================================================================
// Fixtures
// ============================================================================

/// 2025-01-10 09:00 UTC; the test clock starts at 2025-01-01 00:00 UTC.
fn lesson_start() -> DateTime<Utc> {
    test_clock().now() + Duration::days(9) + Duration::hours(9)
}

fn env_with(clock: &FixedClock, config: BookingConfig) -> BookingEnvironment {
    BookingEnvironment::new(
        Arc::new(clock.clone()),
        Arc::new(InMemoryJournal::new()),
        Arc::new(BroadcastNotifier::default()),
        config,
        RetryPolicy::new(),
    )
}

fn env(clock: &FixedClock) -> BookingEnvironment {
    env_with(clock, BookingConfig::default())
}

fn add_slot(slot_id: SlotId, instructor_id: InstructorId, kind: ClassKind, start: DateTime<Utc>) -> BookingAction {
    BookingAction::AddSlot {
        slot_id,
        instructor_id,
        kind,
        start,
        end: start + Duration::hours(1),
        price: Money::from_cents(7_500),
    }
}

fn lesson(slot_id: SlotId) -> BookingAction {
    add_slot(slot_id, InstructorId::new(), ClassKind::DrivingLesson, lesson_start())
}

fn booked_state(clock: &FixedClock, slot_id: SlotId, student_id: StudentId) -> BookingState {
    let env = env(clock);
    let reducer = BookingReducer::new();
    let mut state = BookingState::new();
    reducer.reduce(&mut state, lesson(slot_id), &env);
    reducer.reduce(&mut state, BookingAction::BookSlot { slot_id, student_id }, &env);
    assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Booked);
    state
}

fn free_credit(state: &BookingState, slot_id: SlotId) -> CreditId {
    match state.slot(&slot_id).unwrap().cancellation.unwrap().outcome {
        CancellationOutcome::Free { credit_id } => credit_id,
        CancellationOutcome::Late { .. } => panic!("expected a free cancellation"),
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[test]
fn add_slot_publishes_available_slot() {
    let slot_id = SlotId::new();
    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .when_action(lesson(slot_id))
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Available);
            assert_eq!(slot.window.start(), lesson_start());
            assert!(state.last_error.is_none());
            assert_eq!(state.revision, 1);
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn overlapping_slot_for_same_instructor_is_rejected() {
    let instructor = InstructorId::new();
    let first = SlotId::new();
    let clash = SlotId::new();
    let other_instructor = SlotId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(add_slot(first, instructor, ClassKind::DrivingLesson, lesson_start()))
        .given_action(add_slot(
            other_instructor,
            InstructorId::new(),
            ClassKind::DrivingLesson,
            lesson_start(),
        ))
        .when_action(add_slot(
            clash,
            instructor,
            ClassKind::DrivingTest,
            lesson_start() + Duration::minutes(30),
        ))
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::Overlap(first)));
            assert!(state.slot(&clash).is_none());
            assert!(state.slot(&other_instructor).is_some());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn slot_in_the_past_is_rejected() {
    let start = test_clock().now() - Duration::hours(1);
    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .when_action(add_slot(SlotId::new(), InstructorId::new(), ClassKind::TicketClass, start))
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::WindowInPast(start)));
            assert!(state.slots.is_empty());
        })
        .run();
}

#[test]
fn only_available_slots_can_be_removed() {
    let slot_id = SlotId::new();
    let state = booked_state(&test_clock(), slot_id, StudentId::new());

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(state)
        .when_action(BookingAction::RemoveSlot { slot_id })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::NotRemovable {
                    slot_id,
                    status: SlotStatus::Booked
                })
            );
            assert!(state.slot(&slot_id).is_some());
        })
        .run();
}

// ============================================================================
// Holds
// ============================================================================

#[test]
fn reserve_pending_holds_and_schedules_expiry() {
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let clock = test_clock();
    let expected_expiry = clock.now() + Duration::minutes(15);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .when_action(BookingAction::ReservePending { slot_id, student_id })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Pending);
            assert_eq!(slot.student, Some(student_id));
            assert_eq!(slot.hold.unwrap().expires_at, expected_expiry);
        })
        .then_effects(move |effects| {
            assertions::assert_effects_count(effects, 2);
            assertions::assert_has_delay(effects, |action| {
                matches!(action, BookingAction::ExpireHold { slot_id: s, .. } if *s == slot_id)
            });
            let delay = effects.iter().find_map(|effect| match effect {
                Effect::Delay { duration, .. } => Some(*duration),
                _ => None,
            });
            assert_eq!(delay, Some(std::time::Duration::from_secs(15 * 60)));
        })
        .run();
}

#[test]
fn hold_deadline_past_the_calendar_is_rejected() {
    let clock = test_clock();
    let config = BookingConfig {
        hold_ttl: Duration::minutes(200_000_000_000),
        ..BookingConfig::default()
    };
    let slot_id = SlotId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env_with(&clock, config))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .when_action(BookingAction::ReservePending {
            slot_id,
            student_id: StudentId::new(),
        })
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::DeadlineOverflow));
            assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Available);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn hold_limit_is_enforced() {
    let clock = test_clock();
    let config = BookingConfig {
        max_holds_per_student: 1,
        ..BookingConfig::default()
    };
    let instructor = InstructorId::new();
    let first = SlotId::new();
    let second = SlotId::new();
    let student_id = StudentId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env_with(&clock, config))
        .given_state(BookingState::new())
        .given_action(add_slot(first, instructor, ClassKind::DrivingLesson, lesson_start()))
        .given_action(add_slot(
            second,
            instructor,
            ClassKind::DrivingLesson,
            lesson_start() + Duration::hours(2),
        ))
        .given_action(BookingAction::ReservePending {
            slot_id: first,
            student_id,
        })
        .when_action(BookingAction::ReservePending {
            slot_id: second,
            student_id,
        })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::HoldLimitReached { limit: 1 })
            );
            assert_eq!(state.slot(&second).unwrap().status, SlotStatus::Available);
        })
        .run();
}

#[test]
fn expire_hold_releases_only_the_matching_hold() {
    let clock = test_clock();
    let env = env(&clock);
    let reducer = BookingReducer::new();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let mut state = BookingState::new();

    reducer.reduce(&mut state, lesson(slot_id), &env);
    reducer.reduce(&mut state, BookingAction::ReservePending { slot_id, student_id }, &env);
    let first_hold = state.slot(&slot_id).unwrap().hold.unwrap().id;

    reducer.reduce(&mut state, BookingAction::ReleaseHold { slot_id, student_id }, &env);
    reducer.reduce(&mut state, BookingAction::ReservePending { slot_id, student_id }, &env);
    let second_hold = state.slot(&slot_id).unwrap().hold.unwrap().id;

    // The timer of the first hold fires late: nothing happens.
    let effects = reducer.reduce(
        &mut state,
        BookingAction::ExpireHold {
            slot_id,
            hold_id: first_hold,
        },
        &env,
    );
    assert!(effects.is_empty());
    assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Pending);

    reducer.reduce(
        &mut state,
        BookingAction::ExpireHold {
            slot_id,
            hold_id: second_hold,
        },
        &env,
    );
    let slot = state.slot(&slot_id).unwrap();
    assert_eq!(slot.status, SlotStatus::Available);
    assert!(slot.hold.is_none());
}

#[test]
fn only_the_holder_can_release() {
    let slot_id = SlotId::new();
    let holder = StudentId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .given_action(BookingAction::ReservePending {
            slot_id,
            student_id: holder,
        })
        .when_action(BookingAction::ReleaseHold {
            slot_id,
            student_id: StudentId::new(),
        })
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::NotHolder(slot_id)));
            assert!(state.slot(&slot_id).unwrap().is_held_by(holder));
        })
        .run();
}

// ============================================================================
// Booking
// ============================================================================

#[test]
fn book_available_slot_directly() {
    let slot_id = SlotId::new();
    let student_id = StudentId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .when_action(BookingAction::BookSlot { slot_id, student_id })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Booked);
            assert_eq!(slot.payment, Some(Payment::Direct));
            assert_eq!(state.student_bookings(student_id).len(), 1);
        })
        .run();
}

#[test]
fn pending_slot_can_only_be_booked_by_holder() {
    let slot_id = SlotId::new();
    let holder = StudentId::new();
    let intruder = StudentId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .given_action(BookingAction::ReservePending {
            slot_id,
            student_id: holder,
        })
        .when_action(BookingAction::BookSlot {
            slot_id,
            student_id: intruder,
        })
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::NotHolder(slot_id)));
        })
        .run();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .given_action(BookingAction::ReservePending {
            slot_id,
            student_id: holder,
        })
        .when_action(BookingAction::BookSlot {
            slot_id,
            student_id: holder,
        })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Booked);
            assert!(slot.hold.is_none());
        })
        .run();
}

#[test]
fn booked_slot_cannot_be_booked_again() {
    let slot_id = SlotId::new();
    let state = booked_state(&test_clock(), slot_id, StudentId::new());

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(state)
        .when_action(BookingAction::BookSlot {
            slot_id,
            student_id: StudentId::new(),
        })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::InvalidTransition {
                    from: SlotStatus::Booked,
                    to: SlotStatus::Booked
                })
            );
        })
        .run();
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn cancellation_exactly_48_hours_ahead_is_free() {
    let clock = test_clock();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let state = booked_state(&clock, slot_id, student_id);
    clock.set(lesson_start() - Duration::hours(48));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::CancelBooking {
            slot_id,
            student_id,
            by_instructor: false,
        })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Cancelled);

            let credit = state.credit(&free_credit(state, slot_id)).unwrap();
            assert_eq!(credit.student, student_id);
            assert_eq!(credit.kind, ClassKind::DrivingLesson);
            assert_eq!(credit.amount, Money::from_cents(7_500));
            assert_eq!(state.student_credits(student_id).len(), 1);

            let replacement = state.slot(&slot.replaced_by.unwrap()).unwrap();
            assert_eq!(replacement.status, SlotStatus::Available);
            assert_eq!(replacement.window, slot.window);
            assert_eq!(replacement.instructor_id, slot.instructor_id);
        })
        .run();
}

#[test]
fn late_cancellation_charges_fee_without_credit() {
    let clock = test_clock();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let state = booked_state(&clock, slot_id, student_id);
    clock.set(lesson_start() - Duration::hours(47));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::CancelBooking {
            slot_id,
            student_id,
            by_instructor: false,
        })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(
                slot.cancellation.unwrap().outcome,
                CancellationOutcome::Late {
                    fee: Money::from_cents(5_000)
                }
            );
            assert!(state.credits.is_empty());
            assert!(slot.replaced_by.is_some());
        })
        .run();
}

#[test]
fn instructor_cancellation_is_always_free() {
    let clock = test_clock();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let state = booked_state(&clock, slot_id, student_id);
    clock.set(lesson_start() - Duration::hours(2));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::CancelBooking {
            slot_id,
            student_id,
            by_instructor: true,
        })
        .then_state(move |state| {
            let credit_id = free_credit(state, slot_id);
            assert!(state.credit(&credit_id).unwrap().is_redeemable());
            assert!(state.slot(&slot_id).unwrap().cancellation.unwrap().by_instructor);
        })
        .run();
}

#[test]
fn instructor_cancel_is_limited_to_their_own_slots() {
    let clock = test_clock();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let state = booked_state(&clock, slot_id, student_id);
    let owner = state.slot(&slot_id).unwrap().instructor_id;
    let stranger = InstructorId::new();
    clock.set(lesson_start() - Duration::hours(2));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state.clone())
        .when_action(BookingAction::CancelByInstructor {
            slot_id,
            instructor_id: stranger,
        })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::NotSlotInstructor {
                    instructor_id: stranger,
                    slot_id
                })
            );
            assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Booked);
        })
        .then_effects(assertions::assert_no_effects)
        .run();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::CancelByInstructor {
            slot_id,
            instructor_id: owner,
        })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Cancelled);
            assert!(slot.cancellation.unwrap().by_instructor);
            let credit = state.credit(&free_credit(state, slot_id)).unwrap();
            assert_eq!(credit.student, student_id);
        })
        .run();
}

#[test]
fn only_the_booked_student_can_cancel() {
    let slot_id = SlotId::new();
    let state = booked_state(&test_clock(), slot_id, StudentId::new());
    let stranger = StudentId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(state)
        .when_action(BookingAction::CancelBooking {
            slot_id,
            student_id: stranger,
            by_instructor: false,
        })
        .then_state(move |state| {
            assert!(matches!(
                state.last_error,
                Some(BookingError::NotOwner { student, .. }) if student == stranger
            ));
            assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Booked);
        })
        .run();
}

#[test]
fn started_slot_cannot_be_cancelled() {
    let clock = test_clock();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let state = booked_state(&clock, slot_id, student_id);
    clock.set(lesson_start() + Duration::minutes(5));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::CancelBooking {
            slot_id,
            student_id,
            by_instructor: true,
        })
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::AlreadyStarted(slot_id)));
        })
        .run();
}

// ============================================================================
// Redemption
// ============================================================================

fn state_with_credit(clock: &FixedClock, student_id: StudentId) -> (BookingState, CreditId, SlotId) {
    let env = env(clock);
    let reducer = BookingReducer::new();
    let cancelled = SlotId::new();
    let mut state = booked_state(clock, cancelled, student_id);
    reducer.reduce(
        &mut state,
        BookingAction::CancelBooking {
            slot_id: cancelled,
            student_id,
            by_instructor: false,
        },
        &env,
    );
    let credit_id = free_credit(&state, cancelled);
    let replacement = state.slot(&cancelled).unwrap().replaced_by.unwrap();
    (state, credit_id, replacement)
}

#[test]
fn credit_books_slot_of_same_kind_once() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let (state, credit_id, target) = state_with_credit(&clock, student_id);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state.clone())
        .when_action(BookingAction::RedeemCredit {
            credit_id,
            slot_id: target,
            student_id,
        })
        .then_state(move |state| {
            let slot = state.slot(&target).unwrap();
            assert_eq!(slot.status, SlotStatus::Booked);
            assert_eq!(slot.payment, Some(Payment::Credit { credit_id }));
            assert_eq!(state.credit(&credit_id).unwrap().redeemed_by, Some(target));
            assert!(state.student_credits(student_id).is_empty());
        })
        .run();

    let second_target = SlotId::new();
    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .given_action(BookingAction::RedeemCredit {
            credit_id,
            slot_id: target,
            student_id,
        })
        .given_action(add_slot(
            second_target,
            InstructorId::new(),
            ClassKind::DrivingLesson,
            lesson_start() + Duration::days(1),
        ))
        .when_action(BookingAction::RedeemCredit {
            credit_id,
            slot_id: second_target,
            student_id,
        })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::CreditAlreadyRedeemed {
                    credit_id,
                    slot_id: target
                })
            );
            assert_eq!(
                state.slot(&second_target).unwrap().status,
                SlotStatus::Available
            );
        })
        .run();
}

#[test]
fn free_cancellation_of_credit_booking_returns_a_fresh_credit() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let (state, credit_id, target) = state_with_credit(&clock, student_id);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .given_action(BookingAction::RedeemCredit {
            credit_id,
            slot_id: target,
            student_id,
        })
        .when_action(BookingAction::CancelBooking {
            slot_id: target,
            student_id,
            by_instructor: false,
        })
        .then_state(move |state| {
            let fresh = free_credit(state, target);
            assert_ne!(fresh, credit_id);
            assert_eq!(state.credit(&credit_id).unwrap().redeemed_by, Some(target));

            let unredeemed = state.student_credits(student_id);
            assert_eq!(unredeemed.len(), 1);
            assert_eq!(unredeemed[0].id, fresh);
            assert_eq!(unredeemed[0].kind, ClassKind::DrivingLesson);
            assert_eq!(unredeemed[0].source_slot, target);
        })
        .run();
}

#[test]
fn late_cancellation_of_credit_booking_forfeits_the_credit() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let (mut state, credit_id, target) = state_with_credit(&clock, student_id);
    BookingReducer::new().reduce(
        &mut state,
        BookingAction::RedeemCredit {
            credit_id,
            slot_id: target,
            student_id,
        },
        &env(&clock),
    );
    assert_eq!(state.slot(&target).unwrap().status, SlotStatus::Booked);
    clock.set(lesson_start() - Duration::hours(47));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::CancelBooking {
            slot_id: target,
            student_id,
            by_instructor: false,
        })
        .then_state(move |state| {
            assert!(matches!(
                state.slot(&target).unwrap().cancellation.unwrap().outcome,
                CancellationOutcome::Late { .. }
            ));
            assert!(state.student_credits(student_id).is_empty());
            assert_eq!(state.credits.len(), 1);
        })
        .run();
}

#[test]
fn credit_kind_must_match_slot_kind() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let (state, credit_id, _) = state_with_credit(&clock, student_id);
    let road_test = SlotId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .given_action(add_slot(
            road_test,
            InstructorId::new(),
            ClassKind::DrivingTest,
            lesson_start() + Duration::days(2),
        ))
        .when_action(BookingAction::RedeemCredit {
            credit_id,
            slot_id: road_test,
            student_id,
        })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::KindMismatch {
                    credit: ClassKind::DrivingLesson,
                    slot: ClassKind::DrivingTest
                })
            );
            assert!(state.credit(&credit_id).unwrap().is_redeemable());
        })
        .run();
}

#[test]
fn credit_belongs_to_its_owner() {
    let clock = test_clock();
    let (state, credit_id, target) = state_with_credit(&clock, StudentId::new());

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::RedeemCredit {
            credit_id,
            slot_id: target,
            student_id: StudentId::new(),
        })
        .then_state(|state| {
            assert!(matches!(
                state.last_error,
                Some(BookingError::NotOwner { .. })
            ));
        })
        .run();
}

// ============================================================================
// Admin status updates
// ============================================================================

#[test]
fn status_update_follows_lifecycle_edges() {
    let slot_id = SlotId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .when_action(BookingAction::UpdateSlotStatus {
            slot_id,
            status: SlotStatus::Cancelled,
            student_id: None,
        })
        .then_state(move |state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::InvalidTransition {
                    from: SlotStatus::Available,
                    to: SlotStatus::Cancelled
                })
            );
        })
        .run();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .when_action(BookingAction::UpdateSlotStatus {
            slot_id,
            status: SlotStatus::Pending,
            student_id: None,
        })
        .then_state(|state| {
            assert_eq!(
                state.last_error,
                Some(BookingError::StudentRequired(SlotStatus::Pending))
            );
        })
        .run();
}

#[test]
fn status_update_books_pending_slot_for_its_holder() {
    let slot_id = SlotId::new();
    let holder = StudentId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(lesson(slot_id))
        .given_action(BookingAction::ReservePending {
            slot_id,
            student_id: holder,
        })
        .when_action(BookingAction::UpdateSlotStatus {
            slot_id,
            status: SlotStatus::Booked,
            student_id: None,
        })
        .then_state(move |state| {
            let slot = state.slot(&slot_id).unwrap();
            assert_eq!(slot.status, SlotStatus::Booked);
            assert_eq!(slot.student, Some(holder));
        })
        .run();
}

#[test]
fn status_update_to_cancelled_is_an_instructor_cancellation() {
    let clock = test_clock();
    let slot_id = SlotId::new();
    let student_id = StudentId::new();
    let state = booked_state(&clock, slot_id, student_id);
    clock.set(lesson_start() - Duration::hours(1));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::UpdateSlotStatus {
            slot_id,
            status: SlotStatus::Cancelled,
            student_id: None,
        })
        .then_state(move |state| {
            let credit_id = free_credit(state, slot_id);
            assert_eq!(state.credit(&credit_id).unwrap().student, student_id);
        })
        .run();
}

// ============================================================================
// Cart & orders
// ============================================================================

fn cart_with_two_lessons(clock: &FixedClock, student_id: StudentId) -> (BookingState, SlotId, SlotId) {
    let env = env(clock);
    let reducer = BookingReducer::new();
    let instructor = InstructorId::new();
    let first = SlotId::new();
    let second = SlotId::new();
    let mut state = BookingState::new();

    reducer.reduce(
        &mut state,
        add_slot(first, instructor, ClassKind::DrivingLesson, lesson_start()),
        &env,
    );
    reducer.reduce(
        &mut state,
        add_slot(second, instructor, ClassKind::DrivingLesson, lesson_start() + Duration::hours(3)),
        &env,
    );
    for slot_id in [first, second] {
        reducer.reduce(&mut state, BookingAction::AddToCart { student_id, slot_id }, &env);
    }
    assert!(state.last_error.is_none());
    (state, first, second)
}

#[test]
fn add_to_cart_holds_the_slot() {
    let student_id = StudentId::new();
    let (state, first, second) = cart_with_two_lessons(&test_clock(), student_id);

    let cart = state.cart(&student_id).unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.total(), Some(Money::from_cents(15_000)));
    assert!(state.slot(&first).unwrap().is_held_by(student_id));
    assert!(state.slot(&second).unwrap().is_held_by(student_id));

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(state)
        .when_action(BookingAction::AddToCart {
            student_id,
            slot_id: first,
        })
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::AlreadyInCart(first)));
        })
        .run();
}

#[test]
fn removing_from_cart_releases_the_hold() {
    let student_id = StudentId::new();
    let (state, first, second) = cart_with_two_lessons(&test_clock(), student_id);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(state)
        .when_action(BookingAction::RemoveFromCart {
            student_id,
            slot_id: first,
        })
        .then_state(move |state| {
            assert_eq!(state.slot(&first).unwrap().status, SlotStatus::Available);
            assert!(state.slot(&second).unwrap().is_held_by(student_id));
            assert_eq!(state.cart(&student_id).unwrap().items.len(), 1);
        })
        .run();
}

#[test]
fn clearing_cart_releases_every_hold() {
    let student_id = StudentId::new();
    let (state, first, second) = cart_with_two_lessons(&test_clock(), student_id);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(state)
        .when_action(BookingAction::ClearCart { student_id })
        .then_state(move |state| {
            assert!(state.cart(&student_id).is_none());
            for slot_id in [first, second] {
                assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Available);
            }
        })
        .run();
}

#[test]
fn expired_hold_leaves_the_cart() {
    let clock = test_clock();
    let env = env(&clock);
    let reducer = BookingReducer::new();
    let student_id = StudentId::new();
    let (mut state, first, _) = cart_with_two_lessons(&clock, student_id);
    let hold_id = state.slot(&first).unwrap().hold.unwrap().id;

    reducer.reduce(&mut state, BookingAction::ExpireHold { slot_id: first, hold_id }, &env);

    assert_eq!(state.slot(&first).unwrap().status, SlotStatus::Available);
    assert!(!state.cart(&student_id).unwrap().contains(first));
}

#[test]
fn checkout_places_order_and_schedules_expiry() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let order_id = OrderId::new();
    let (state, first, second) = cart_with_two_lessons(&clock, student_id);
    let deadline = clock.now() + Duration::minutes(30);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::Checkout {
            student_id,
            order_id,
        })
        .then_state(move |state| {
            let order = state.order(&order_id).unwrap();
            assert_eq!(order.status, OrderStatus::AwaitingPayment);
            assert_eq!(order.total, Money::from_cents(15_000));
            assert_eq!(order.payment_deadline, deadline);
            assert_eq!(order.lines.len(), 2);
            assert!(state.cart(&student_id).is_none());
            for slot_id in [first, second] {
                let slot = state.slot(&slot_id).unwrap();
                assert_eq!(slot.status, SlotStatus::Pending);
                assert_eq!(slot.order_id, Some(order_id));
            }
        })
        .then_effects(move |effects| {
            assertions::assert_has_delay(effects, |action| {
                *action == BookingAction::ExpireOrder { order_id }
            });
        })
        .run();
}

#[test]
fn checkout_with_unrepresentable_deadline_keeps_the_cart() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let order_id = OrderId::new();
    let (state, first, _) = cart_with_two_lessons(&clock, student_id);
    let config = BookingConfig {
        payment_window: Duration::minutes(200_000_000_000),
        ..BookingConfig::default()
    };

    ReducerTest::new(BookingReducer::new())
        .with_env(env_with(&clock, config))
        .given_state(state)
        .when_action(BookingAction::Checkout {
            student_id,
            order_id,
        })
        .then_state(move |state| {
            assert_eq!(state.last_error, Some(BookingError::DeadlineOverflow));
            assert!(state.order(&order_id).is_none());
            assert!(state.cart(&student_id).unwrap().contains(first));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn checkout_of_empty_cart_is_rejected() {
    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .when_action(BookingAction::Checkout {
            student_id: StudentId::new(),
            order_id: OrderId::new(),
        })
        .then_state(|state| {
            assert_eq!(state.last_error, Some(BookingError::EmptyCart));
            assert!(state.orders.is_empty());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

fn checked_out(clock: &FixedClock, student_id: StudentId) -> (BookingState, OrderId, [SlotId; 2]) {
    let env = env(clock);
    let order_id = OrderId::new();
    let (mut state, first, second) = cart_with_two_lessons(clock, student_id);
    BookingReducer::new().reduce(
        &mut state,
        BookingAction::Checkout {
            student_id,
            order_id,
        },
        &env,
    );
    (state, order_id, [first, second])
}

#[test]
fn ordered_holds_do_not_expire() {
    let clock = test_clock();
    let env = env(&clock);
    let (mut state, order_id, [first, _]) = checked_out(&clock, StudentId::new());
    let hold_id = state.slot(&first).unwrap().hold.unwrap().id;

    let effects = BookingReducer::new().reduce(
        &mut state,
        BookingAction::ExpireHold { slot_id: first, hold_id },
        &env,
    );

    assert!(effects.is_empty());
    let slot = state.slot(&first).unwrap();
    assert_eq!(slot.status, SlotStatus::Pending);
    assert_eq!(slot.order_id, Some(order_id));
}

#[test]
fn confirmed_payment_books_every_slot() {
    let clock = test_clock();
    let student_id = StudentId::new();
    let (state, order_id, slots) = checked_out(&clock, student_id);

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .when_action(BookingAction::ConfirmOrderPayment { order_id })
        .then_state(move |state| {
            assert_eq!(state.order(&order_id).unwrap().status, OrderStatus::Paid);
            for slot_id in slots {
                let slot = state.slot(&slot_id).unwrap();
                assert_eq!(slot.status, SlotStatus::Booked);
                assert_eq!(slot.payment, Some(Payment::Paid { order_id }));
                assert_eq!(slot.student, Some(student_id));
            }
            assert_eq!(state.student_bookings(student_id).len(), 2);
        })
        .run();
}

#[test]
fn failed_payment_releases_every_slot() {
    let clock = test_clock();
    let (state, order_id, slots) = checked_out(&clock, StudentId::new());

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .given_action(BookingAction::FailOrderPayment {
            order_id,
            reason: "card declined".to_string(),
        })
        .when_action(BookingAction::ConfirmOrderPayment { order_id })
        .then_state(move |state| {
            let order = state.order(&order_id).unwrap();
            assert_eq!(order.status, OrderStatus::Cancelled);
            assert_eq!(
                order.cancel_reason,
                Some(OrderCancelReason::PaymentFailed {
                    reason: "card declined".to_string()
                })
            );
            assert_eq!(
                state.last_error,
                Some(BookingError::OrderNotAwaitingPayment(order_id))
            );
            for slot_id in slots {
                let slot = state.slot(&slot_id).unwrap();
                assert_eq!(slot.status, SlotStatus::Available);
                assert!(slot.order_id.is_none());
            }
        })
        .run();
}

#[test]
fn expiry_after_payment_is_a_no_op() {
    let clock = test_clock();
    let (state, order_id, _) = checked_out(&clock, StudentId::new());

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&clock))
        .given_state(state)
        .given_action(BookingAction::ConfirmOrderPayment { order_id })
        .when_action(BookingAction::ExpireOrder { order_id })
        .then_state(move |state| {
            assert_eq!(state.order(&order_id).unwrap().status, OrderStatus::Paid);
            assert!(state.last_error.is_none());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ============================================================================
// Maintenance
// ============================================================================

#[test]
fn sweep_catches_up_on_lapsed_holds_and_orders() {
    let clock = test_clock();
    let env = env(&clock);
    let reducer = BookingReducer::new();
    let buyer = StudentId::new();
    let (mut state, order_id, ordered) = checked_out(&clock, buyer);

    let browsing = SlotId::new();
    reducer.reduce(
        &mut state,
        add_slot(browsing, InstructorId::new(), ClassKind::TicketClass, lesson_start()),
        &env,
    );
    reducer.reduce(
        &mut state,
        BookingAction::ReservePending {
            slot_id: browsing,
            student_id: StudentId::new(),
        },
        &env,
    );

    clock.advance(Duration::minutes(20));
    reducer.reduce(&mut state, BookingAction::SweepExpired, &env);
    assert_eq!(state.slot(&browsing).unwrap().status, SlotStatus::Available);
    assert!(state.order(&order_id).unwrap().is_awaiting_payment());

    clock.advance(Duration::minutes(15));
    reducer.reduce(&mut state, BookingAction::SweepExpired, &env);
    let order = state.order(&order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.cancel_reason, Some(OrderCancelReason::Expired));
    for slot_id in ordered {
        assert_eq!(state.slot(&slot_id).unwrap().status, SlotStatus::Available);
    }
}

#[test]
fn success_clears_previous_error() {
    let slot_id = SlotId::new();

    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .given_action(BookingAction::RemoveSlot { slot_id })
        .when_action(lesson(slot_id))
        .then_state(move |state| {
            assert!(state.last_error.is_none());
            assert!(state.slot(&slot_id).is_some());
        })
        .run();
}

#[test]
fn journal_failure_is_counted_not_rejected() {
    ReducerTest::new(BookingReducer::new())
        .with_env(env(&test_clock()))
        .given_state(BookingState::new())
        .when_action(BookingAction::JournalAppendFailed {
            event_types: vec!["SlotAdded.v1".to_string()],
            error: "connection refused".to_string(),
        })
        .then_state(|state| {
            assert_eq!(state.journal_failures, 1);
            assert!(state.last_error.is_none());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}
