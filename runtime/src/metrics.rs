//! Prometheus metrics for the store and the booking domain.
//!
//! [`MetricsServer::start`] installs the Prometheus recorder and registers
//! every metric description; the web layer renders the handle on
//! `GET /metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use drivebook_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new();
//! server.start()?;
//! let text = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder owner.
#[derive(Default)]
pub struct MetricsServer {
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server that has not installed its recorder yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if bucket configuration is rejected and
    /// [`MetricsError::Install`] if a different recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus recorder installed");
                Ok(())
            },
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            },
        }
    }

    /// The installed handle, if `start` succeeded.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store
    describe_counter!("store.commands.total", "Actions processed by the store");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside the reducer while holding the state lock"
    );
    describe_counter!(
        "store.effects.executed",
        "Effects executed, labelled by effect type"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
    describe_counter!("store.retry.attempt", "Retried operations");
    describe_counter!("store.retry.exhausted", "Operations that exhausted their retries");

    // Booking
    describe_counter!(
        "drivebook_commands_rejected_total",
        "Booking commands rejected by validation, labelled by reason"
    );
    describe_counter!(
        "drivebook_bookings_total",
        "Slots moved to booked, labelled by class kind and payment"
    );
    describe_counter!(
        "drivebook_cancellations_total",
        "Cancelled bookings, labelled by outcome (free or late)"
    );
    describe_counter!(
        "drivebook_holds_expired_total",
        "Pending holds released because they expired"
    );
    describe_counter!(
        "drivebook_orders_total",
        "Orders by terminal status (paid, cancelled, expired)"
    );
    describe_counter!(
        "drivebook_late_fees_cents_total",
        "Late cancellation fees charged, in cents"
    );
    describe_counter!(
        "drivebook_journal_entries_total",
        "Events written to the durable journal"
    );
    describe_counter!(
        "drivebook_journal_failures_total",
        "Journal appends that failed after retries"
    );
    describe_gauge!(
        "drivebook_notification_subscribers",
        "Live subscribers on the booking notification channel"
    );
}
