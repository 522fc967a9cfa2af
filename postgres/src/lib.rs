//! `PostgreSQL` journal for DriveBook.
//!
//! [`PostgresJournal`] implements the `Journal` trait from `drivebook-core`
//! on top of a single append-only table:
//!
//! ```sql
//! booking_journal(sequence BIGSERIAL PRIMARY KEY, event_type TEXT,
//!                 payload BYTEA, recorded_at TIMESTAMPTZ)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use drivebook_postgres::PostgresJournal;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let journal = PostgresJournal::connect("postgres://localhost/drivebook", 10).await?;
//!     journal.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod journal;

pub use journal::PostgresJournal;
