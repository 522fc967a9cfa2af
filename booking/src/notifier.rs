//! Best-effort change notifications.
//!
//! After each accepted command the booking events are handed to a
//! [`Notifier`]. Delivery failures are logged and never affect the booking.

use crate::action::BookingEvent;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::broadcast;

/// Boxed future returned by [`Notifier::publish`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// Notification delivery failure.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The transport rejected the message
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Publishes booking events to interested parties.
pub trait Notifier: Send + Sync {
    /// Publish one batch of events.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if the transport fails. Callers
    /// log and drop the error.
    fn publish(&self, events: &[BookingEvent]) -> NotifyFuture<'_>;
}

/// In-process notifier over a tokio broadcast channel.
///
/// Slow subscribers lag and lose messages rather than slowing bookings.
#[derive(Clone, Debug)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<BookingEvent>,
}

impl BroadcastNotifier {
    /// Channel buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        let receiver = self.sender.subscribe();
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("drivebook_notification_subscribers")
            .set(self.sender.receiver_count() as f64);
        receiver
    }

    /// Live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, events: &[BookingEvent]) -> NotifyFuture<'_> {
        // No subscribers is not a failure.
        if self.sender.receiver_count() > 0 {
            for event in events {
                let _ = self.sender.send(event.clone());
            }
        }
        Box::pin(async { Ok(()) })
    }
}
