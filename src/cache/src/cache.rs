use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::RwLock;

use storage::{sort_by_votes, StoreError, Topic, TopicStore};

use crate::config::CacheConfig;

/// Read-side contract served to the request handlers.
///
/// Same vote signatures as the store plus the ranked page read; handlers
/// hold this instead of the store so every read goes through the cache.
#[async_trait]
pub trait TopicCache: Send + Sync {
    /// Add one vote to topic `id`, in the snapshot and in the store.
    async fn upvote_topic(&self, id: &str) -> Result<(), StoreError>;

    /// Take one vote from topic `id`, in the snapshot and in the store.
    async fn downvote_topic(&self, id: &str) -> Result<(), StoreError>;

    /// The top `page_size` topics by votes, served from the snapshot.
    async fn get_topics(&self, page_size: usize) -> Result<Vec<Topic>, StoreError>;
}

/// The cached snapshot plus the time it was loaded.
///
/// `loaded_at == None` means never loaded, which reads as stale, so the
/// first `get_topics` always goes to the store.
struct Entry {
    topics: HashMap<String, Topic>,
    loaded_at: Option<Instant>,
}

impl Entry {
    fn empty() -> Self {
        Entry {
            topics: HashMap::new(),
            loaded_at: None,
        }
    }

    /// Staleness at a given instant. `now` is a parameter so tests can
    /// probe the boundary without sleeping.
    fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        match self.loaded_at {
            Some(loaded_at) => now.duration_since(loaded_at) >= ttl,
            None => true,
        }
    }
}

/// TTL-gated snapshot over a [`TopicStore`].
///
/// Keeps an id-keyed copy of the store's top topics and serves ranked
/// reads from it until the copy is older than `ttl`; a stale read reloads
/// synchronously. The store fetch runs with no lock held, so a slow store
/// never blocks voters; the swap itself takes the write lock and replaces
/// the snapshot wholesale. If several readers race past the staleness
/// check, each fetches and the last swap wins.
///
/// Votes are a best-effort dual write: the snapshot copy is bumped first
/// (when present), then the store is told. A store failure is returned to
/// the caller but the snapshot bump stays; the next refresh reconciles.
/// Counts read from the snapshot may trail the store by up to one TTL.
pub struct TtlCache {
    store: Arc<dyn TopicStore>,
    entry: RwLock<Entry>,
    config: CacheConfig,
}

impl TtlCache {
    /// Cache over `store` with the default TTL and refresh limit.
    pub fn new(store: Arc<dyn TopicStore>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    pub fn with_config(store: Arc<dyn TopicStore>, config: CacheConfig) -> Self {
        info!(
            "Initializing topic cache (ttl: {:?}, refresh limit: {})",
            config.ttl, config.refresh_limit
        );
        TtlCache {
            store,
            entry: RwLock::new(Entry::empty()),
            config,
        }
    }

    /// Apply `delta` to the snapshot copy of `id`, if one is cached.
    ///
    /// Counters are atomic, so the shared lock is enough; absent ids are
    /// skipped rather than inserted (the next refresh will bring them in).
    async fn bump_snapshot(&self, id: &str, delta: i64) {
        let entry = self.entry.read().await;
        if let Some(topic) = entry.topics.get(id) {
            topic.add_votes(delta);
        }
    }
}

/// Value-copy, sort and truncate a snapshot into one page.
fn page_of(topics: &HashMap<String, Topic>, page_size: usize) -> Vec<Topic> {
    let mut page: Vec<Topic> = topics.values().cloned().collect();
    sort_by_votes(&mut page);
    page.truncate(page_size);
    page
}

#[async_trait]
impl TopicCache for TtlCache {
    async fn upvote_topic(&self, id: &str) -> Result<(), StoreError> {
        self.bump_snapshot(id, 1).await;
        self.store.upvote_topic(id).await
    }

    async fn downvote_topic(&self, id: &str) -> Result<(), StoreError> {
        self.bump_snapshot(id, -1).await;
        self.store.downvote_topic(id).await
    }

    async fn get_topics(&self, page_size: usize) -> Result<Vec<Topic>, StoreError> {
        {
            let entry = self.entry.read().await;
            if !entry.is_stale(Instant::now(), self.config.ttl) {
                return Ok(page_of(&entry.topics, page_size));
            }
        }

        // Stale. Fetch with no lock held; a failed fetch leaves the old
        // snapshot in place and the error goes straight back.
        let fetched = self.store.topics_by_votes(self.config.refresh_limit).await?;
        debug!("Cache refreshed with {} topics", fetched.len());

        let mut entry = self.entry.write().await;
        entry.topics = fetched
            .into_iter()
            .map(|topic| (topic.id.clone(), topic))
            .collect();
        entry.loaded_at = Some(Instant::now());

        Ok(page_of(&entry.topics, page_size))
    }
}
