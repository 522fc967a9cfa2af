//! Shared state of the HTTP handlers.

use drivebook_booking::BookingStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Handles shared by every request; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The booking store; every command and query goes through it
    pub store: Arc<BookingStore>,
    /// Prometheus renderer, absent when metrics are not installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new application state
    #[must_use]
    pub const fn new(store: Arc<BookingStore>, metrics: Option<PrometheusHandle>) -> Self {
        Self { store, metrics }
    }
}
