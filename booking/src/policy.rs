//! The 48-hour cancellation policy.
//!
//! A booking cancelled at least `free_window` before it starts is free and
//! earns a credit for a class of the same kind. Inside the window a late fee
//! is charged and no credit is issued. Instructor cancellations are always
//! free.

use crate::types::{CreditId, Money};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default late fee: $50.00
pub const DEFAULT_LATE_FEE: Money = Money::from_cents(5_000);

/// Cancellation rule parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancellationPolicy {
    /// Minimum lead time for a free cancellation (inclusive)
    pub free_window: Duration,
    /// Fee charged for late cancellations
    pub late_fee: Money,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            free_window: Duration::hours(48),
            late_fee: DEFAULT_LATE_FEE,
        }
    }
}

/// What a cancellation costs, before any credit is minted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancellationCharge {
    /// No fee; a credit will be issued
    Free,
    /// Fee charged; no credit
    Late {
        /// Fee
        fee: Money,
    },
}

impl CancellationPolicy {
    /// Charge for cancelling a slot starting at `start` at time `now`.
    ///
    /// Callers must reject slots that have already started.
    #[must_use]
    pub fn assess(&self, start: DateTime<Utc>, now: DateTime<Utc>, by_instructor: bool) -> CancellationCharge {
        if by_instructor || start - now >= self.free_window {
            CancellationCharge::Free
        } else {
            CancellationCharge::Late { fee: self.late_fee }
        }
    }
}

/// Result of a cancellation, recorded on the slot and returned to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationOutcome {
    /// Free cancellation
    Free {
        /// Credit issued to the student
        credit_id: CreditId,
    },
    /// Late cancellation
    Late {
        /// Fee charged
        fee: Money,
    },
}

impl CancellationOutcome {
    /// Stable label for metrics
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free { .. } => "free",
            Self::Late { .. } => "late",
        }
    }
}
