use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// The first event that ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// `disconnect` was called.
    Disconnect,
    /// The read loop hit EOF or a read error.
    ReadClosed,
    /// The write loop stopped, on a write error or channel closure.
    WriteClosed,
    /// The trace loop stopped.
    TraceClosed,
}

/// Single-shot shutdown signal shared by every loop.
///
/// Any number of triggers may fire; only the first one is recorded, and every
/// waiter observes the same value. Triggering never blocks.
#[derive(Debug, Clone)]
pub(crate) struct Shutdown {
    tx: Arc<watch::Sender<Option<ShutdownReason>>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }
}

impl Shutdown {
    /// Fire the signal. Returns `true` if this call was the first trigger.
    pub(crate) fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if first {
            debug!(?reason, "shutdown triggered");
        }
        first
    }

    /// Resolves once any trigger has fired, immediately if one already has.
    pub(crate) async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this cannot fail with a closed channel.
        let _ = rx.wait_for(Option::is_some).await;
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub(crate) fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }
}
