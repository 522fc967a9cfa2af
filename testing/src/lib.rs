//! # DriveBook Testing
//!
//! Testing utilities for DriveBook reducers and stores.
//!
//! This crate provides:
//! - [`FixedClock`]: a controllable clock for the 48-hour rule and hold expiry
//! - [`InMemoryJournal`] / [`FailingJournal`]: journal doubles
//! - [`ReducerTest`]: Given-When-Then reducer tests with effect assertions
//!
//! ## Example
//!
//! ```ignore
//! use drivebook_testing::{test_clock, InMemoryJournal};
//!
//! #[tokio::test]
//! async fn booking_is_journalled() {
//!     let journal = InMemoryJournal::new();
//!     let store = booking_store(test_clock(), journal.clone());
//!
//!     store.send(BookingAction::BookSlot { slot_id, student_id }).await?;
//!
//!     assert_eq!(journal.event_types(), ["SlotBooked.v1"]);
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use drivebook_core::environment::Clock;

pub mod journal_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    pub use super::journal_mocks::{FailingJournal, InMemoryJournal};

    /// Controllable clock for deterministic tests
    ///
    /// Returns the same instant until a test moves it with
    /// [`advance`](Self::advance) or [`set`](Self::set). Clones share the
    /// same time, so a test can keep a handle after moving one into an
    /// environment.
    ///
    /// # Example
    ///
    /// ```
    /// use drivebook_testing::mocks::FixedClock;
    /// use drivebook_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let start = clock.now();
    /// assert_eq!(clock.now(), start);
    ///
    /// clock.advance(Duration::hours(1));
    /// assert_eq!(clock.now(), start + Duration::hours(1));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, for negative durations)
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute instant
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a test-friendly tracing subscriber (idempotent).
///
/// Honors `RUST_LOG`; output goes through the test writer so it is only
/// shown for failing tests.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FailingJournal, FixedClock, InMemoryJournal, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_stable() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn clones_share_time() {
        let clock = test_clock();
        let handle = clock.clone();
        handle.advance(Duration::hours(48));
        assert_eq!(clock.now(), handle.now());
        assert_eq!(
            clock.now().to_rfc3339(),
            "2025-01-03T00:00:00+00:00".to_string()
        );
    }
}
