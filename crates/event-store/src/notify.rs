use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Result;

/// Fire-and-forget wake-up channel between the event log's producers and
/// its consumers.
///
/// A message names only an event topic; it carries no payload. Consumers
/// re-poll the event log with their own persisted cursor when woken, so a
/// lost or duplicated message costs nothing but latency.
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Publishes a wake-up signal for the given topic.
    async fn publish(&self, topic: &str) -> Result<()>;
}

/// In-memory notification queue for testing and embedding.
#[derive(Clone, Default)]
pub struct InMemoryNotificationQueue {
    messages: Arc<RwLock<Vec<String>>>,
}

impl InMemoryNotificationQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all published topics in order.
    pub async fn messages(&self) -> Vec<String> {
        self.messages.read().await.clone()
    }

    /// Returns the number of published messages.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl NotificationQueue for InMemoryNotificationQueue {
    async fn publish(&self, topic: &str) -> Result<()> {
        self.messages.write().await.push(topic.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_records_topics_in_order() {
        let queue = InMemoryNotificationQueue::new();
        queue.publish("OfferPublished").await.unwrap();
        queue.publish("SubscriptionCreated").await.unwrap();

        assert_eq!(
            queue.messages().await,
            vec!["OfferPublished", "SubscriptionCreated"]
        );
        assert_eq!(queue.message_count().await, 2);
    }
}
