//! Explicit subscriber registration for change notifications

use tokio::sync::mpsc;

/// Fan-out of notifications to every registered subscriber
///
/// Subscribers that dropped their receiver are pruned on the next emit.
#[derive(Debug)]
pub struct EventBus<T> {
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a new subscriber
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&mut self, event: T) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
