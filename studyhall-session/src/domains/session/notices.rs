//! User-facing notices raised by the session manager
//!
//! There is at most one active subscriber (the screen currently able to show
//! an alert). Subscribing again replaces the previous subscriber: its
//! [`NoticeSubscription`] drains what it already received and then yields
//! `None`. With no subscriber a notice is logged and dropped, while the
//! `session_terminated` state flag still tells the UI what happened.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Something the UI must show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The server ended this session because the account signed in on
    /// another device. Raised exactly once per forced logout.
    SignedInElsewhere,

    /// A terminal failure on a login or registration screen.
    Alert { title: String, message: String },
}

impl SessionNotice {
    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        SessionNotice::Alert {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Single-subscriber notice channel.
#[derive(Clone, Debug, Default)]
pub struct SessionNotices {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<SessionNotice>>>>,
}

impl SessionNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register as the active subscriber, replacing any previous one.
    pub fn subscribe(&self) -> NoticeSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        if self.slot.lock().replace(sender).is_some() {
            debug!("[SessionNotices] Replaced previous notice subscriber");
        }
        NoticeSubscription { receiver }
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Deliver a notice to the active subscriber. Returns whether it was
    /// delivered.
    pub fn publish(&self, notice: SessionNotice) -> bool {
        let mut slot = self.slot.lock();
        let Some(sender) = slot.as_ref() else {
            warn!("[SessionNotices] No subscriber for notice: {:?}", notice);
            return false;
        };

        match sender.send(notice) {
            Ok(()) => true,
            Err(mpsc::error::SendError(notice)) => {
                warn!(
                    "[SessionNotices] Subscriber went away, dropping notice: {:?}",
                    notice
                );
                *slot = None;
                false
            }
        }
    }
}

/// Receiving end held by the active subscriber. Dropping it unsubscribes.
#[derive(Debug)]
pub struct NoticeSubscription {
    receiver: mpsc::UnboundedReceiver<SessionNotice>,
}

impl NoticeSubscription {
    /// Next notice; `None` once this subscription has been replaced.
    pub async fn recv(&mut self) -> Option<SessionNotice> {
        self.receiver.recv().await
    }

    /// Next already-delivered notice, without waiting.
    pub fn try_recv(&mut self) -> Option<SessionNotice> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscriber_is_dropped() {
        let notices = SessionNotices::new();
        assert!(!notices.has_subscriber());
        assert!(!notices.publish(SessionNotice::SignedInElsewhere));
    }

    #[tokio::test]
    async fn newer_subscriber_replaces_older_one() {
        let notices = SessionNotices::new();
        let mut first = notices.subscribe();
        assert!(notices.publish(SessionNotice::alert("Login failed", "nope")));

        let mut second = notices.subscribe();
        assert!(notices.publish(SessionNotice::SignedInElsewhere));

        assert_eq!(
            first.recv().await,
            Some(SessionNotice::alert("Login failed", "nope"))
        );
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, Some(SessionNotice::SignedInElsewhere));
    }

    #[test]
    fn dropped_subscription_unsubscribes() {
        let notices = SessionNotices::new();
        let subscription = notices.subscribe();
        assert!(notices.has_subscriber());

        drop(subscription);
        assert!(!notices.has_subscriber());
        assert!(!notices.publish(SessionNotice::SignedInElsewhere));
    }
}
