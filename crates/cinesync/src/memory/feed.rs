//! In-memory change feed.
//!
//! One tokio broadcast channel per table, created on first use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use cinesync_core::store::{ChangeEvent, ChangeFeed, Result};

/// Default channel capacity for change notifications.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// In-process change feed, fed by [`super::MemoryStore`] writes.
#[derive(Debug, Clone)]
pub struct MemoryFeed {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>>,
    capacity: usize,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Gets or creates the channel for `table`.
    async fn get_or_create_channel(&self, table: &str) -> broadcast::Sender<ChangeEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(table) {
                return sender.clone();
            }
        }

        let mut channels = self.channels.write().await;

        // Double-check after acquiring write lock
        if let Some(sender) = channels.get(table) {
            return sender.clone();
        }

        let (sender, _) = broadcast::channel(self.capacity);
        channels.insert(table.to_string(), sender.clone());
        sender
    }

    /// Delivers `event` to the subscribers of its table.
    pub async fn publish(&self, event: ChangeEvent) {
        let sender = self.get_or_create_channel(&event.table).await;
        // No receivers is fine: nobody mirrors this table.
        let _ = sender.send(event);
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for MemoryFeed {
    async fn subscribe(&self, table: &str) -> Result<broadcast::Receiver<ChangeEvent>> {
        let sender = self.get_or_create_channel(table).await;
        Ok(sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinesync_core::store::ChangeKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let feed = MemoryFeed::new();
        let mut receiver = feed.subscribe("sala").await.unwrap();

        feed.publish(ChangeEvent::insert("sala", json!({"sala_id": 1})))
            .await;

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.kind, ChangeKind::Insert);
        assert_eq!(received.affected_id("sala_id"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let feed = MemoryFeed::new();
        let mut rooms = feed.subscribe("sala").await.unwrap();
        let mut seats = feed.subscribe("asiento").await.unwrap();

        feed.publish(ChangeEvent::delete("asiento", json!({"asiento_id": 4})))
            .await;

        assert!(seats.recv().await.is_ok());
        assert!(rooms.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let feed = MemoryFeed::new();
        feed.publish(ChangeEvent::insert("rol", json!({"rol_id": 1})))
            .await;
        assert_eq!(feed.channels.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_channel_reuse() {
        let feed = MemoryFeed::new();
        let _first = feed.subscribe("funcion").await.unwrap();
        let _second = feed.subscribe("funcion").await.unwrap();
        assert_eq!(feed.channels.read().await.len(), 1);
    }
}
