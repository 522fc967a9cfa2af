use chrono::{DateTime, Utc};
use drivebook_core::journal::{
    Journal, JournalEntry, JournalError, JournalFuture, PendingEntry, Sequence,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

/// PostgreSQL-backed booking journal.
///
/// Appends run in a single transaction, so a batch of events produced by one
/// command is either fully stored or not at all. Sequence numbers come from
/// the `BIGSERIAL` column and may have gaps after a rolled-back transaction;
/// ordering is all replay relies on.
#[derive(Clone, Debug)]
pub struct PostgresJournal {
    pool: PgPool,
}

impl PostgresJournal {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, JournalError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| JournalError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to journal database");
        Ok(Self::from_pool(pool))
    }

    /// Create the `booking_journal` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), JournalError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| JournalError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_sequence(raw: i64) -> Result<Sequence, JournalError> {
    u64::try_from(raw)
        .map(Sequence::new)
        .map_err(|_| JournalError::Database(format!("Negative journal sequence: {raw}")))
}

fn from_sequence(sequence: Sequence) -> Result<i64, JournalError> {
    i64::try_from(sequence.value())
        .map_err(|_| JournalError::Database(format!("Sequence out of range: {sequence}")))
}

fn row_to_entry(row: &PgRow) -> Result<JournalEntry, JournalError> {
    let db = |e: sqlx::Error| JournalError::Database(e.to_string());

    let sequence: i64 = row.try_get("sequence").map_err(db)?;
    let event_type: String = row.try_get("event_type").map_err(db)?;
    let payload: Vec<u8> = row.try_get("payload").map_err(db)?;
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at").map_err(db)?;

    Ok(JournalEntry {
        sequence: to_sequence(sequence)?,
        event_type,
        payload,
        recorded_at,
    })
}

impl Journal for PostgresJournal {
    fn append(&self, entries: Vec<PendingEntry>) -> JournalFuture<'_, Sequence> {
        Box::pin(async move {
            let count = entries.len();
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| JournalError::Database(format!("Failed to begin transaction: {e}")))?;

            let mut last = None;
            for entry in entries {
                let (sequence,): (i64,) = sqlx::query_as(
                    r"
                    INSERT INTO booking_journal (event_type, payload)
                    VALUES ($1, $2)
                    RETURNING sequence
                    ",
                )
                .bind(&entry.event_type)
                .bind(&entry.payload)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| {
                    JournalError::Database(format!("Failed to insert {}: {e}", entry.event_type))
                })?;
                last = Some(sequence);
            }

            tx.commit()
                .await
                .map_err(|e| JournalError::Database(format!("Failed to commit: {e}")))?;

            metrics::counter!("drivebook_journal_entries_total").increment(count as u64);
            tracing::debug!(count, last = ?last, "Journal entries appended");

            match last {
                Some(raw) => to_sequence(raw),
                None => self.head().await.map(Option::unwrap_or_default),
            }
        })
    }

    fn load(&self, after: Option<Sequence>) -> JournalFuture<'_, Vec<JournalEntry>> {
        Box::pin(async move {
            let after = after.map(from_sequence).transpose()?.unwrap_or(0);
            let rows = sqlx::query(
                r"
                SELECT sequence, event_type, payload, recorded_at
                FROM booking_journal
                WHERE sequence > $1
                ORDER BY sequence ASC
                ",
            )
            .bind(after)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| JournalError::Database(format!("Failed to load journal: {e}")))?;

            rows.iter().map(row_to_entry).collect()
        })
    }

    fn head(&self) -> JournalFuture<'_, Option<Sequence>> {
        Box::pin(async move {
            let (max,): (Option<i64>,) =
                sqlx::query_as("SELECT MAX(sequence) FROM booking_journal")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| JournalError::Database(e.to_string()))?;
            max.map(to_sequence).transpose()
        })
    }
}
