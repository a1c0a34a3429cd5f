//! Event fan-out to feed subscribers
//!
//! Each subscriber owns an unbounded queue. Publishing serializes the event
//! once and pushes the same text onto every queue without waiting, so a slow
//! subscriber only grows its own backlog. Order within one queue follows
//! publish order; nothing is promised across subscribers.

use log::{debug, error};
use shared::Event;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub type SubscriberId = u64;

/// Serialized event as delivered to subscribers
pub type FeedMessage = Arc<str>;

/// Receiving end handed to a delivery session.
///
/// The session is responsible for calling [`EventHub::unsubscribe`] when it
/// ends; anything still queued at that point is discarded.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<FeedMessage>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event. `None` once the hub dropped this subscriber.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FeedMessage> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::UnboundedSender<FeedMessage>>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::unbounded_channel();

        self.subscribers.write().await.insert(id, sender);
        debug!("Subscriber {} registered", id);

        Subscription { id, receiver }
    }

    /// Returns false if the subscriber was already gone
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} removed", id);
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Queues `event` for every current subscriber and returns how many got it
    pub async fn publish(&self, event: &Event) -> usize {
        let message: FeedMessage = match event.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read().await;
            for (id, sender) in subscribers.iter() {
                if sender.send(Arc::clone(&message)).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        // Receivers dropped without unsubscribing
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in dead {
                subscribers.remove(&id);
                debug!("Pruned subscriber {}", id);
            }
        }

        delivered
    }
}
