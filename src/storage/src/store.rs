use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::cmap::ConcurrentMap;
use crate::error::StoreError;
use crate::types::{sort_by_votes, Topic};

/// Contract between the vote paths and whatever holds the topics.
///
/// The in-process implementation is [`MemoryStore`]; the cache layer and
/// tests substitute their own implementations through this trait.
#[async_trait]
pub trait TopicStore: Send + Sync {
    /// Insert a freshly created topic. Ids are caller-supplied and
    /// assumed unique; inserting an existing id replaces the record.
    async fn create_topic(&self, topic: Topic) -> Result<(), StoreError>;

    /// Add one vote to the topic with this id.
    async fn upvote_topic(&self, id: &str) -> Result<(), StoreError>;

    /// Take one vote from the topic with this id.
    async fn downvote_topic(&self, id: &str) -> Result<(), StoreError>;

    /// The top `page_size` topics, most votes first.
    async fn topics_by_votes(&self, page_size: usize) -> Result<Vec<Topic>, StoreError>;
}

/// In-memory topic store: id -> shared record in a sharded map.
///
/// Records live behind `Arc`, so a lookup hands out a shared handle
/// instead of a copy. Votes go through that handle's atomic counter after
/// the shard lock is already released; the map is only locked long enough
/// to find the record. The counter is therefore never read-modified-
/// written under a lock, and no increment can be lost.
pub struct MemoryStore {
    topics: ConcurrentMap<Arc<Topic>>,
}

impl MemoryStore {
    /// Create an empty store with the default shard count.
    pub fn new() -> Self {
        info!("Initializing in-memory topic store");
        MemoryStore {
            topics: ConcurrentMap::new(),
        }
    }

    /// Create an empty store with a specific shard count (tests).
    pub fn with_shard_count(count: usize) -> Self {
        MemoryStore {
            topics: ConcurrentMap::with_shard_count(count),
        }
    }

    /// Number of stored topics (weakly consistent under writes).
    pub async fn len(&self) -> usize {
        self.topics.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.topics.is_empty().await
    }

    /// Flat id -> topic JSON document, for the debug endpoint.
    pub async fn dump_json(&self) -> serde_json::Result<String> {
        self.topics.to_json().await
    }

    async fn add_votes(&self, id: &str, delta: i64) -> Result<(), StoreError> {
        match self.topics.get(id).await {
            Some(topic) => {
                let count = topic.add_votes(delta);
                debug!("Topic {} now at {} votes", id, count);
                Ok(())
            }
            None => Err(StoreError::TopicNotFound(id.to_string())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TopicStore for MemoryStore {
    async fn create_topic(&self, topic: Topic) -> Result<(), StoreError> {
        let id = topic.id.clone();
        self.topics.set(&id, Arc::new(topic)).await;
        debug!("Created topic {}", id);
        Ok(())
    }

    async fn upvote_topic(&self, id: &str) -> Result<(), StoreError> {
        self.add_votes(id, 1).await
    }

    async fn downvote_topic(&self, id: &str) -> Result<(), StoreError> {
        self.add_votes(id, -1).await
    }

    async fn topics_by_votes(&self, page_size: usize) -> Result<Vec<Topic>, StoreError> {
        let mut topics: Vec<Topic> = self
            .topics
            .entries()
            .await
            .into_iter()
            .map(|(_, topic)| topic.as_ref().clone())
            .collect();
        sort_by_votes(&mut topics);
        topics.truncate(page_size);
        Ok(topics)
    }
}
