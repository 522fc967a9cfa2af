//! Injected dependencies and tunables of the booking reducer.

use crate::journal::JournalWriter;
use crate::notifier::Notifier;
use crate::policy::CancellationPolicy;
use chrono::Duration;
use drivebook_core::environment::Clock;
use drivebook_core::journal::Journal;
use drivebook_runtime::retry::RetryPolicy;
use std::sync::Arc;

/// Booking rules that operators may tune.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingConfig {
    /// How long a pending hold lasts (default 15 minutes)
    pub hold_ttl: Duration,
    /// How long an order may await payment (default 30 minutes)
    pub payment_window: Duration,
    /// Simultaneous holds per student (default 5)
    pub max_holds_per_student: usize,
    /// Cancellation fee rule
    pub policy: CancellationPolicy,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::minutes(15),
            payment_window: Duration::minutes(30),
            max_holds_per_student: 5,
            policy: CancellationPolicy::default(),
        }
    }
}

/// Environment dependencies for the booking reducer
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for holds, deadlines and the 48-hour rule
    pub clock: Arc<dyn Clock>,
    /// Ordered journal writes
    pub journal: Arc<JournalWriter>,
    /// Change notifications
    pub notifier: Arc<dyn Notifier>,
    /// Tunables
    pub config: BookingConfig,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        journal: Arc<dyn Journal>,
        notifier: Arc<dyn Notifier>,
        config: BookingConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            clock,
            journal: Arc::new(JournalWriter::new(journal, retry)),
            notifier,
            config,
        }
    }
}
