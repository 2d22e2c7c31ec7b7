//! Pub/sub transport seam and an in-process implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use teleview_core::{Error, Result};

/// Callback invoked with the raw payload of each delivered message
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Handle returned by [`PubSub::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Push-based topic subscription.
///
/// Handlers may run on a transport-owned thread and may still be running
/// when `unsubscribe` returns; callers gate their own side effects.
pub trait PubSub: Send + Sync {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<SubscriptionId>;

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    fn is_connected(&self) -> bool {
        true
    }
}

type Subscribers = HashMap<String, Vec<(SubscriptionId, MessageHandler)>>;

/// In-process bus that delivers synchronously on the publisher's thread
#[derive(Default)]
pub struct LocalBus {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every handler on `topic`; returns the number of
    /// handlers called.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> usize {
        // handlers run outside the lock so they may (un)subscribe
        let handlers: Vec<MessageHandler> = self
            .lock()
            .get(topic)
            .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PubSub for LocalBus {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<SubscriptionId> {
        if topic.is_empty() {
            return Err(Error::Transport("cannot subscribe to an empty topic".to_string()));
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(topic.to_string()).or_default().push((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut subscribers = self.lock();
        for subs in subscribers.values_mut() {
            subs.retain(|(sid, _)| *sid != id);
        }
        subscribers.retain(|_, subs| !subs.is_empty());
        Ok(())
    }
}
