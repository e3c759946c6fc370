//! Router Lifecycle Events
//!
//! Per-attempt lifecycle notifications for subscribers such as the CLI
//! progress display. The subscriber list is owned by the router instance —
//! there is no global emitter, so parallel routers (and parallel tests)
//! cannot observe each other's events.
//!
//! Each subscriber gets its own unbounded channel; events arrive in
//! emission order. Dropped receivers are pruned on the next emit.

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::config::ProviderKind;

/// A lifecycle notification emitted by the executor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouterEvent {
    /// An attempt against one provider is starting.
    RequestStart {
        /// Request the attempt belongs to
        request_id: String,
        /// Provider being attempted
        provider: ProviderKind,
    },

    /// An attempt against one provider finished.
    RequestComplete {
        /// Request the attempt belongs to
        request_id: String,
        /// Provider that was attempted
        provider: ProviderKind,
        /// Whether the attempt succeeded
        success: bool,
        /// Failure detail when `success` is false
        error: Option<String>,
    },
}

/// Fan-out hub for [`RouterEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<mpsc::UnboundedSender<RouterEvent>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RouterEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber, pruning closed ones.
    pub fn emit(&self, event: RouterEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
