//! Append-only journal of accepted booking events.
//!
//! The booking state is never written to storage directly. Every accepted
//! command produces events; those events are appended to a [`Journal`] and
//! replayed in order at startup to rebuild the state.
//!
//! # Implementations
//!
//! - `PostgresJournal` (in `drivebook-postgres`): durable storage
//! - `InMemoryJournal` (in `drivebook-testing`): tests and local runs
//!
//! # Encoding
//!
//! Payloads are `bincode`. Events are not human-readable in the database,
//! but they are compact and every consumer is Rust.

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`Journal`] methods.
pub type JournalFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, JournalError>> + Send + 'a>>;

/// Errors that can occur during journal operations.
#[derive(Error, Debug)]
pub enum JournalError {
    /// The backing database rejected or failed the operation.
    #[error("Database error: {0}")]
    Database(String),

    /// An event could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Position of an entry in the journal (1-based, gap-free per writer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(u64);

impl Sequence {
    /// Create a sequence number
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The following position
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event ready to be appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingEntry {
    /// Versioned event type (e.g. `"SlotBooked.v1"`).
    pub event_type: String,
    /// Bincode payload.
    pub payload: Vec<u8>,
}

/// A stored journal entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JournalEntry {
    /// Position in the journal.
    pub sequence: Sequence,
    /// Versioned event type.
    pub event_type: String,
    /// Bincode payload.
    pub payload: Vec<u8>,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
}

/// An event that can be written to and read back from the journal.
///
/// `event_type()` returns a stable, versioned name such as
/// `"SlotCancelled.v1"` so the schema can evolve.
pub trait JournalEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Versioned event type identifier.
    fn event_type(&self) -> &'static str;

    /// Encode as a pending journal entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Serialization`] if bincode rejects the value.
    fn to_entry(&self) -> Result<PendingEntry, JournalError> {
        let payload =
            bincode::serialize(self).map_err(|e| JournalError::Serialization(e.to_string()))?;
        Ok(PendingEntry {
            event_type: self.event_type().to_string(),
            payload,
        })
    }

    /// Decode from a stored entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Serialization`] if the payload is corrupt or
    /// belongs to an incompatible schema.
    fn from_entry(entry: &JournalEntry) -> Result<Self, JournalError> {
        bincode::deserialize(&entry.payload).map_err(|e| {
            JournalError::Serialization(format!(
                "entry {} ({}): {e}",
                entry.sequence, entry.event_type
            ))
        })
    }
}

/// Append-only event journal.
///
/// Uses boxed futures instead of `async fn` so it can be held as
/// `Arc<dyn Journal>` inside the booking environment.
pub trait Journal: Send + Sync {
    /// Append entries atomically, returning the sequence of the last one.
    ///
    /// # Errors
    ///
    /// - [`JournalError::Database`] if the write fails
    fn append(&self, entries: Vec<PendingEntry>) -> JournalFuture<'_, Sequence>;

    /// Load entries in order, starting after `after` (or from the beginning).
    ///
    /// # Errors
    ///
    /// - [`JournalError::Database`] if the read fails
    fn load(&self, after: Option<Sequence>) -> JournalFuture<'_, Vec<JournalEntry>>;

    /// Sequence of the newest entry, if any.
    ///
    /// # Errors
    ///
    /// - [`JournalError::Database`] if the read fails
    fn head(&self) -> JournalFuture<'_, Option<Sequence>>;
}
