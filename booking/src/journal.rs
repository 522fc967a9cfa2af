//! Ordered journal writes.
//!
//! The reducer runs one command at a time, but the effects that persist its
//! events run on separate tasks. [`JournalWriter`] makes those tasks append
//! in reducer order: each batch carries the state revision it produced and
//! waits until every earlier revision has been written (or given up on).

use crate::action::BookingEvent;
use drivebook_core::journal::{Journal, JournalError, JournalEvent, PendingEntry, Sequence};
use drivebook_runtime::retry::{RetryPolicy, retry_with_backoff};
use std::sync::Arc;
use tokio::sync::watch;

/// Serialises appends to a [`Journal`] by revision.
pub struct JournalWriter {
    journal: Arc<dyn Journal>,
    retry: RetryPolicy,
    /// Highest revision finished so far
    done: watch::Sender<u64>,
}

impl JournalWriter {
    /// Writer whose first batch will be revision 1
    #[must_use]
    pub fn new(journal: Arc<dyn Journal>, retry: RetryPolicy) -> Self {
        let (done, _) = watch::channel(0);
        Self {
            journal,
            retry,
            done,
        }
    }

    /// The underlying journal
    #[must_use]
    pub fn journal(&self) -> &Arc<dyn Journal> {
        &self.journal
    }

    /// Append the events of `revision` once all earlier revisions are done.
    ///
    /// Retries transient failures per the configured [`RetryPolicy`].
    /// The revision counts as done whether or not the append succeeded, so
    /// one failure never blocks later writes.
    ///
    /// # Errors
    ///
    /// Returns the last [`JournalError`] if encoding fails or every attempt
    /// fails.
    pub async fn write(&self, revision: u64, events: &[BookingEvent]) -> Result<Sequence, JournalError> {
        let mut turn = self.done.subscribe();
        // The sender lives in `self`, so this only returns once it is our turn.
        let _ = turn.wait_for(|done| done + 1 >= revision).await;

        let result = match events
            .iter()
            .map(JournalEvent::to_entry)
            .collect::<Result<Vec<PendingEntry>, _>>()
        {
            Ok(entries) => {
                retry_with_backoff(&self.retry, "journal.append", || {
                    self.journal.append(entries.clone())
                })
                .await
            },
            Err(error) => Err(error),
        };

        self.done.send_modify(|done| *done = (*done).max(revision));
        result
    }
}

impl std::fmt::Debug for JournalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWriter")
            .field("retry", &self.retry)
            .field("done", &*self.done.borrow())
            .finish_non_exhaustive()
    }
}
