//! DriveBook HTTP server.
//!
//! Replays the journal into a fresh booking state, starts the store, and
//! serves the API until Ctrl+C or SIGTERM.

mod config;

use anyhow::Context;
use config::Config;
use drivebook_booking::{
    BookingAction, BookingEnvironment, BookingReducer, BookingState, BookingStore,
    BroadcastNotifier,
};
use drivebook_core::environment::SystemClock;
use drivebook_core::journal::Journal;
use drivebook_postgres::PostgresJournal;
use drivebook_runtime::RetryPolicy;
use drivebook_runtime::metrics::MetricsServer;
use drivebook_testing::InMemoryJournal;
use drivebook_web::{AppState, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,drivebook=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DriveBook server");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        bind = %config.bind_address(),
        durable = config.postgres.is_some(),
        hold_ttl_minutes = config.booking.hold_ttl_minutes,
        free_cancellation_hours = config.booking.free_cancellation_hours,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new();
    if let Err(e) = metrics.start() {
        warn!(error = %e, "Metrics disabled");
    }

    let journal: Arc<dyn Journal> = match &config.postgres {
        Some(postgres) => {
            info!("Connecting to journal database...");
            let journal = PostgresJournal::connect(&postgres.url, postgres.max_connections)
                .await
                .context("journal connection failed")?;
            journal.migrate().await.context("journal migration failed")?;
            info!("Journal database ready");
            Arc::new(journal)
        },
        None => {
            warn!("DATABASE_URL not set, bookings will not survive a restart");
            Arc::new(InMemoryJournal::new())
        },
    };

    let entries = journal.load(None).await.context("journal load failed")?;
    let state = BookingState::replay(&entries).context("journal replay failed")?;

    let booking_config = config
        .booking
        .to_booking_config()
        .context("invalid booking settings")?;
    let env = BookingEnvironment::new(
        Arc::new(SystemClock),
        journal,
        Arc::new(BroadcastNotifier::default()),
        booking_config,
        RetryPolicy::new(),
    );
    let store = Arc::new(BookingStore::new(state, BookingReducer::new(), env));

    // Timers do not survive a restart; the sweep catches anything that
    // lapsed while the process was down.
    spawn_sweeper(
        Arc::clone(&store),
        Duration::from_secs(config.server.sweep_interval),
    );

    let app = build_router(AppState::new(
        Arc::clone(&store),
        metrics.handle().cloned(),
    ));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining effects");
    let timeout = Duration::from_secs(config.server.shutdown_timeout);
    if let Err(e) = store.shutdown(timeout).await {
        // Pending hold and order timers are expected here.
        warn!(error = %e, "Shutdown finished with effects still pending");
    }

    info!("Server stopped");
    Ok(())
}

/// Send `SweepExpired` now and then on every tick.
fn spawn_sweeper(store: Arc<BookingStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match store.send(BookingAction::SweepExpired).await {
                Ok(_) => {},
                Err(e) => {
                    info!(error = %e, "Sweeper stopping");
                    break;
                },
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
