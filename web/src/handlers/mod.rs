//! HTTP request handlers, grouped by resource.

pub mod health;
pub mod orders;
pub mod slots;
pub mod students;

use crate::error::AppError;
use crate::state::AppState;
use drivebook_booking::{BookingAction, BookingState};

/// Run a command and read its result under the same lock.
///
/// A rejected command comes back as its `last_error`; `read` only runs
/// for accepted commands.
pub(crate) async fn dispatch<T, F>(
    state: &AppState,
    action: BookingAction,
    read: F,
) -> Result<T, AppError>
where
    F: FnOnce(&BookingState) -> T,
{
    let outcome = state
        .store
        .send_and_read(action, |booking| match &booking.last_error {
            Some(error) => Err(error.clone()),
            None => Ok(read(booking)),
        })
        .await?;
    Ok(outcome?)
}

/// An entity an accepted command must have left behind.
pub(crate) fn present<T>(value: Option<T>, what: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::internal(format!("{what} missing after accepted command")))
}
