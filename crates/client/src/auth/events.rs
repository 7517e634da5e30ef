//! Session lifecycle events
//!
//! Fire-and-forget fan-out for auth state changes. The client core emits;
//! the UI/router layer subscribes and reacts (e.g. redirect to the login
//! screen). The core never calls into consumers.

use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Auth state change published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The session ended: explicit logout or unrecoverable refresh failure.
    LoggedOut,
}

/// Process-wide auth event channel.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    /// Create a new event channel.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to auth events. Each receiver observes every event emitted
    /// after it subscribed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    /// Emit the logout signal. Succeeds whether or not anyone is listening.
    pub fn emit_logout(&self) {
        let delivered = self.tx.send(AuthEvent::LoggedOut).unwrap_or(0);
        debug!(subscribers = delivered, "logout event emitted");
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_logout() {
        let events = AuthEvents::new();
        let mut rx = events.subscribe();

        events.emit_logout();

        assert_eq!(rx.recv().await.unwrap(), AuthEvent::LoggedOut);
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_panic() {
        let events = AuthEvents::new();
        events.emit_logout();
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let events = AuthEvents::new();
        events.emit_logout();

        let mut rx = events.subscribe();
        assert!(matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }
}
