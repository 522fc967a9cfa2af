//! End-to-end booking flows through the store: effects, journal, replay.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, Utc};
use drivebook_booking::{
    BookingAction, BookingConfig, BookingEnvironment, BookingEvent, BookingReducer, BookingState,
    BookingStore, BroadcastNotifier, ClassKind, InstructorId, Money, OrderId, SlotId,
    SlotStatus, StudentId,
};
use drivebook_core::environment::Clock;
use drivebook_core::journal::{Journal, JournalEvent};
use drivebook_runtime::RetryPolicy;
use drivebook_testing::{FailingJournal, FixedClock, InMemoryJournal, init_test_tracing, test_clock};
use std::sync::Arc;

struct Harness {
    store: BookingStore,
    clock: FixedClock,
    notifier: Arc<BroadcastNotifier>,
}

fn harness(journal: Arc<dyn Journal>, config: BookingConfig) -> Harness {
    init_test_tracing();
    let clock = test_clock();
    let notifier = Arc::new(BroadcastNotifier::default());
    let env = BookingEnvironment::new(
        Arc::new(clock.clone()),
        journal,
        Arc::clone(&notifier) as _,
        config,
        RetryPolicy::new()
            .with_max_attempts(2)
            .with_initial_delay(std::time::Duration::from_millis(1)),
    );
    Harness {
        store: BookingStore::new(BookingState::new(), BookingReducer::new(), env),
        clock,
        notifier,
    }
}

fn tomorrow_at(clock: &FixedClock, hour: i64) -> DateTime<Utc> {
    clock.now() + Duration::days(1) + Duration::hours(hour)
}

async fn send(store: &BookingStore, action: BookingAction) {
    let mut handle = store.send(action).await.unwrap();
    handle
        .wait_with_timeout(std::time::Duration::from_secs(5))
        .await
        .unwrap();
}

async fn wait_for_entries(journal: &InMemoryJournal, expected: usize) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while journal.len() < expected {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

async fn add_lesson(h: &Harness, hour: i64) -> SlotId {
    let slot_id = SlotId::new();
    let start = tomorrow_at(&h.clock, hour);
    send(
        &h.store,
        BookingAction::AddSlot {
            slot_id,
            instructor_id: InstructorId::new(),
            kind: ClassKind::DrivingLesson,
            start,
            end: start + Duration::minutes(90),
            price: Money::from_cents(8_000),
        },
    )
    .await;
    slot_id
}

#[tokio::test]
async fn accepted_commands_are_journalled_in_order() {
    let journal = InMemoryJournal::new();
    let h = harness(Arc::new(journal.clone()), BookingConfig::default());
    let student_id = StudentId::new();

    let slot_id = add_lesson(&h, 9).await;
    send(&h.store, BookingAction::BookSlot { slot_id, student_id }).await;
    send(
        &h.store,
        BookingAction::CancelBooking {
            slot_id,
            student_id,
            by_instructor: false,
        },
    )
    .await;

    // Tomorrow is inside the 48h window: late fee, no credit.
    assert_eq!(
        journal.event_types(),
        [
            "SlotAdded.v1",
            "SlotBooked.v1",
            "BookingCancelled.v1",
            "SlotReplaced.v1"
        ]
    );
}

#[tokio::test]
async fn rejected_commands_leave_no_trace_in_the_journal() {
    let journal = InMemoryJournal::new();
    let h = harness(Arc::new(journal.clone()), BookingConfig::default());

    let error = h
        .store
        .send_and_read(
            BookingAction::BookSlot {
                slot_id: SlotId::new(),
                student_id: StudentId::new(),
            },
            |state| state.last_error.clone(),
        )
        .await
        .unwrap();

    assert!(error.is_some());
    assert!(journal.is_empty());
}

#[tokio::test]
async fn replayed_journal_rebuilds_the_same_state() {
    let journal = InMemoryJournal::new();
    let h = harness(Arc::new(journal.clone()), BookingConfig::default());
    let student_id = StudentId::new();

    let direct = add_lesson(&h, 8).await;
    let carted = add_lesson(&h, 11).await;
    send(
        &h.store,
        BookingAction::BookSlot {
            slot_id: direct,
            student_id,
        },
    )
    .await;

    // Cart and checkout start long timers; only wait for the journal.
    for action in [
        BookingAction::AddToCart {
            student_id,
            slot_id: carted,
        },
        BookingAction::Checkout {
            student_id,
            order_id: OrderId::new(),
        },
    ] {
        h.store.send(action).await.unwrap();
    }
    wait_for_entries(&journal, 6).await;

    let entries = journal.load(None).await.unwrap();
    let replayed = BookingState::replay(&entries).unwrap();

    h.store
        .state(|live| {
            assert_eq!(live.slots, replayed.slots);
            assert_eq!(live.carts, replayed.carts);
            assert_eq!(live.orders, replayed.orders);
            assert_eq!(live.credits, replayed.credits);
            assert_eq!(live.student_orders(student_id).len(), 1);
        })
        .await;
}

#[tokio::test]
async fn hold_expires_through_delayed_effect() {
    let config = BookingConfig {
        hold_ttl: Duration::milliseconds(20),
        ..BookingConfig::default()
    };
    let journal = InMemoryJournal::new();
    let h = harness(Arc::new(journal.clone()), config);
    let slot_id = add_lesson(&h, 10).await;

    // The handle tracks the delay, so waiting covers the expiry too.
    send(
        &h.store,
        BookingAction::ReservePending {
            slot_id,
            student_id: StudentId::new(),
        },
    )
    .await;

    let status = h
        .store
        .state(|state| state.slot(&slot_id).map(|slot| slot.status))
        .await;
    assert_eq!(status, Some(SlotStatus::Available));
}

#[tokio::test]
async fn subscribers_see_accepted_events() {
    let h = harness(Arc::new(InMemoryJournal::new()), BookingConfig::default());
    let mut events = h.notifier.subscribe();

    let slot_id = add_lesson(&h, 14).await;

    let event = events.recv().await.unwrap();
    assert!(matches!(event, BookingEvent::SlotAdded { slot_id: id, .. } if id == slot_id));
    assert_eq!(event.event_type(), "SlotAdded.v1");
}

#[tokio::test]
async fn journal_outage_is_recorded_without_rolling_back() {
    let journal = FailingJournal::new();
    let h = harness(Arc::new(journal.clone()), BookingConfig::default());

    let slot_id = add_lesson(&h, 9).await;

    let (failures, slot_present) = h
        .store
        .state(|state| (state.journal_failures, state.slot(&slot_id).is_some()))
        .await;
    assert_eq!(failures, 1);
    assert!(slot_present);
    assert_eq!(journal.attempts(), 2);
}
