//! Configuration loaded from environment variables.
//!
//! | Variable                      | Default        |
//! |-------------------------------|----------------|
//! | `HOST` / `PORT`               | `0.0.0.0:8080` |
//! | `SHUTDOWN_TIMEOUT_SECS`       | `10`           |
//! | `SWEEP_INTERVAL_SECS`         | `60`           |
//! | `DATABASE_URL`                | unset: in-memory journal |
//! | `DATABASE_MAX_CONNECTIONS`    | `10`           |
//! | `HOLD_TTL_MINUTES`            | `15`           |
//! | `PAYMENT_WINDOW_MINUTES`      | `30`           |
//! | `FREE_CANCELLATION_HOURS`     | `48`           |
//! | `LATE_FEE_CENTS`              | `5000`         |
//! | `MAX_HOLDS_PER_STUDENT`       | `5`            |
//!
//! Booking durations and the hold limit must be at least 1 and at most
//! [`MAX_MINUTES`] minutes, [`MAX_HOURS`] hours and [`MAX_HOLDS`] holds.

use chrono::Duration;
use drivebook_booking::{BookingConfig, CancellationPolicy, Money};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound for hold and payment windows (30 days)
pub const MAX_MINUTES: i64 = 30 * 24 * 60;
/// Upper bound for the free cancellation window (one year)
pub const MAX_HOURS: i64 = 365 * 24;
/// Upper bound for simultaneous holds per student
pub const MAX_HOLDS: usize = 100;

/// Errors while reading configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but does not parse or is out of range
    #[error("Invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server
    pub server: ServerConfig,
    /// Durable journal; `None` runs on an in-memory journal
    pub postgres: Option<PostgresConfig>,
    /// Booking rules
    pub booking: BookingSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Grace period for in-flight effects on shutdown, in seconds
    pub shutdown_timeout: u64,
    /// Interval between expiry sweeps, in seconds
    pub sweep_interval: u64,
}

/// `PostgreSQL` settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
}

/// Booking rule settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSettings {
    /// Pending hold lifetime
    pub hold_ttl_minutes: i64,
    /// Time allowed to pay an order
    pub payment_window_minutes: i64,
    /// Lead time for free cancellation
    pub free_cancellation_hours: i64,
    /// Late cancellation fee
    pub late_fee_cents: u64,
    /// Simultaneous holds per student
    pub max_holds_per_student: usize,
}

impl BookingSettings {
    /// Reducer configuration for these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a duration `chrono` cannot
    /// represent or a hold limit of zero.
    pub fn to_booking_config(self) -> Result<BookingConfig, ConfigError> {
        if self.max_holds_per_student == 0 {
            return Err(invalid("MAX_HOLDS_PER_STUDENT", 0));
        }
        Ok(BookingConfig {
            hold_ttl: minutes("HOLD_TTL_MINUTES", self.hold_ttl_minutes)?,
            payment_window: minutes("PAYMENT_WINDOW_MINUTES", self.payment_window_minutes)?,
            max_holds_per_student: self.max_holds_per_student,
            policy: CancellationPolicy {
                free_window: Duration::try_hours(self.free_cancellation_hours)
                    .filter(|window| *window > Duration::zero())
                    .ok_or_else(|| invalid("FREE_CANCELLATION_HOURS", self.free_cancellation_hours))?,
                late_fee: Money::from_cents(self.late_fee_cents),
            },
        })
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to a value that
    /// does not parse or is out of range. Unset variables fall back to
    /// their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| lookup(key).filter(|value| !value.trim().is_empty());
        let get = |key: &'static str, default| parse_or(key, var(key), default);

        let postgres = match var("DATABASE_URL") {
            Some(url) => Some(PostgresConfig {
                url,
                max_connections: parse_or(
                    "DATABASE_MAX_CONNECTIONS",
                    var("DATABASE_MAX_CONNECTIONS"),
                    10,
                )?,
            }),
            None => None,
        };

        Ok(Self {
            server: ServerConfig {
                host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or("PORT", var("PORT"), 8080)?,
                shutdown_timeout: get("SHUTDOWN_TIMEOUT_SECS", 10)?,
                sweep_interval: get("SWEEP_INTERVAL_SECS", 60)?.max(1),
            },
            postgres,
            booking: BookingSettings {
                hold_ttl_minutes: parse_in(
                    "HOLD_TTL_MINUTES",
                    var("HOLD_TTL_MINUTES"),
                    15,
                    1..=MAX_MINUTES,
                )?,
                payment_window_minutes: parse_in(
                    "PAYMENT_WINDOW_MINUTES",
                    var("PAYMENT_WINDOW_MINUTES"),
                    30,
                    1..=MAX_MINUTES,
                )?,
                free_cancellation_hours: parse_in(
                    "FREE_CANCELLATION_HOURS",
                    var("FREE_CANCELLATION_HOURS"),
                    48,
                    1..=MAX_HOURS,
                )?,
                late_fee_cents: get("LATE_FEE_CENTS", 5_000)?,
                max_holds_per_student: parse_in(
                    "MAX_HOLDS_PER_STUDENT",
                    var("MAX_HOLDS_PER_STUDENT"),
                    5,
                    1..=MAX_HOLDS,
                )?,
            },
        })
    }

    /// `host:port` to bind
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn minutes(key: &'static str, value: i64) -> Result<Duration, ConfigError> {
    Duration::try_minutes(value)
        .filter(|window| *window > Duration::zero())
        .ok_or_else(|| invalid(key, value))
}

/// Like [`parse_or`], also rejecting values outside `range`.
fn parse_in<T>(
    key: &'static str,
    raw: Option<String>,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + ToString,
{
    let value = parse_or(key, raw, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid(key, value))
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
