//! In-memory journal implementations
//!
//! - [`InMemoryJournal`]: `Vec`-backed journal for tests and local runs
//! - [`FailingJournal`]: rejects every append, for exercising failure paths

#![allow(clippy::missing_panics_doc)] // Poisoned locks are recovered, never panicked on

use chrono::Utc;
use drivebook_core::journal::{
    Journal, JournalEntry, JournalError, JournalFuture, PendingEntry, Sequence,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory journal for fast, deterministic testing.
///
/// Clones share the same entries, so a test can hand one clone to the
/// booking environment and inspect another.
///
/// # Example
///
/// ```
/// use drivebook_testing::InMemoryJournal;
/// use drivebook_core::journal::{Journal, PendingEntry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let journal = InMemoryJournal::new();
/// journal
///     .append(vec![PendingEntry { event_type: "SlotAdded.v1".into(), payload: vec![1] }])
///     .await?;
/// assert_eq!(journal.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryJournal {
    entries: Arc<RwLock<Vec<JournalEntry>>>,
}

impl InMemoryJournal {
    /// Create an empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Event types in append order
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.event_type.clone())
            .collect()
    }

    /// Copy of every stored entry
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Journal for InMemoryJournal {
    fn append(&self, pending: Vec<PendingEntry>) -> JournalFuture<'_, Sequence> {
        Box::pin(async move {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let mut sequence = entries.last().map_or_else(Sequence::default, |e| e.sequence);
            let recorded_at = Utc::now();
            for entry in pending {
                sequence = sequence.next();
                entries.push(JournalEntry {
                    sequence,
                    event_type: entry.event_type,
                    payload: entry.payload,
                    recorded_at,
                });
            }
            Ok(sequence)
        })
    }

    fn load(&self, after: Option<Sequence>) -> JournalFuture<'_, Vec<JournalEntry>> {
        Box::pin(async move {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            Ok(entries
                .iter()
                .filter(|entry| after.is_none_or(|after| entry.sequence > after))
                .cloned()
                .collect())
        })
    }

    fn head(&self) -> JournalFuture<'_, Option<Sequence>> {
        Box::pin(async move {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            Ok(entries.last().map(|entry| entry.sequence))
        })
    }
}

/// Journal whose appends always fail with a database error.
///
/// Counts attempts so tests can check that retries happened.
#[derive(Clone, Debug, Default)]
pub struct FailingJournal {
    attempts: Arc<AtomicU32>,
}

impl FailingJournal {
    /// Create a failing journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of append calls so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Journal for FailingJournal {
    fn append(&self, _entries: Vec<PendingEntry>) -> JournalFuture<'_, Sequence> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(JournalError::Database("connection refused".to_string())) })
    }

    fn load(&self, _after: Option<Sequence>) -> JournalFuture<'_, Vec<JournalEntry>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn head(&self) -> JournalFuture<'_, Option<Sequence>> {
        Box::pin(async { Ok(None) })
    }
}
