//! Command → handler registry with wildcard fallback.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{error, trace};

use super::client::Client;
use super::message::{Message, WILDCARD};

/// A callback invoked for dispatched messages.
///
/// Handlers run on their own task and talk back through the [`Client`].
/// Closures taking `(&Client, &Message)` implement this directly.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, client: &Client, msg: &Message);
}

impl<F> Handler for F
where
    F: Fn(&Client, &Message) + Send + Sync + 'static,
{
    fn handle(&self, client: &Client, msg: &Message) {
        self(client, msg)
    }
}

/// Maps uppercase command keys to handlers in registration order.
///
/// Append-only: handlers are never removed for the life of the session.
#[derive(Default)]
pub struct Registry {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn Handler>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `command`. Use
    /// [`WILDCARD`] to catch commands nothing else handles.
    pub fn register<H: Handler>(&self, command: &str, handler: H) {
        self.handlers
            .write()
            .entry(command.to_ascii_uppercase())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Handlers for `command`, falling back to the wildcard list when the
    /// command has none. Never both.
    pub fn handlers_for(&self, command: &str) -> Vec<Arc<dyn Handler>> {
        let handlers = self.handlers.read();
        handlers
            .get(command)
            .or_else(|| handlers.get(WILDCARD))
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of registered handlers across all keys.
    pub fn len(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn one task per matching handler, in registration order.
    ///
    /// A panicking handler is logged and contained to its own task. Returns
    /// the number of handlers spawned; zero means the message was dropped.
    pub fn dispatch(&self, client: &Client, msg: Message) -> usize {
        let handlers = self.handlers_for(msg.command());
        if handlers.is_empty() {
            trace!(command = msg.command(), "no handler, dropping message");
            return 0;
        }

        let msg = Arc::new(msg);
        for handler in &handlers {
            let handler = Arc::clone(handler);
            let client = client.clone();
            let msg = Arc::clone(&msg);
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(async { handler.handle(&client, &msg) })
                    .catch_unwind()
                    .await;
                if outcome.is_err() {
                    error!(command = msg.command(), raw = msg.raw(), "handler panicked");
                }
            });
        }
        handlers.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let mut keys: Vec<_> = handlers.keys().collect();
        keys.sort();
        f.debug_struct("Registry").field("commands", &keys).finish()
    }
}
