use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use log::info;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of shards (power of 2 for fast modulo via bitmask)
const DEFAULT_SHARD_COUNT: usize = 32;

/// A single shard holding part of the keyspace
struct Shard<V> {
    items: HashMap<String, V>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Shard {
            items: HashMap::new(),
        }
    }
}

/// String-keyed concurrent map, partitioned into independently locked
/// shards so readers and writers on different keys rarely contend.
///
/// A key is routed to exactly one shard by a stable non-cryptographic
/// hash; the shard count is fixed at construction, so the route never
/// changes for the lifetime of the map. Each operation locks only the
/// owning shard, and only for its own critical section.
///
/// Whole-map operations (`len`, `entries`, `to_json`) visit shards one at
/// a time and are therefore only weakly consistent while writers are
/// active: an entry moved by a concurrent writer can be missed or seen
/// once per visit. Callers that need a coherent view must coordinate
/// above the map.
pub struct ConcurrentMap<V> {
    shards: Vec<RwLock<Shard<V>>>,
    shard_count: usize,
}

impl<V> ConcurrentMap<V> {
    /// Create a map with the default shard count.
    pub fn new() -> Self {
        Self::with_shard_count(DEFAULT_SHARD_COUNT)
    }

    /// Create a map with a specific shard count (rounded up to a power
    /// of 2 so routing stays a single mask).
    pub fn with_shard_count(count: usize) -> Self {
        let count = count.next_power_of_two();
        let shards = (0..count).map(|_| RwLock::new(Shard::new())).collect();

        info!("ConcurrentMap initialized with {} shards", count);

        ConcurrentMap {
            shards,
            shard_count: count,
        }
    }

    /// Calculate which shard a key belongs to.
    ///
    /// `DefaultHasher::new()` always starts from the same state, so a key
    /// maps to the same shard on every call and across restarts.
    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (self.shard_count - 1)
    }

    /// Get read access to the shard owning `key`
    #[inline]
    async fn shard_for(&self, key: &str) -> RwLockReadGuard<'_, Shard<V>> {
        self.shards[self.shard_index(key)].read().await
    }

    /// Get write access to the shard owning `key`
    #[inline]
    async fn shard_for_mut(&self, key: &str) -> RwLockWriteGuard<'_, Shard<V>> {
        self.shards[self.shard_index(key)].write().await
    }

    /// Insert or overwrite the value under `key`.
    pub async fn set(&self, key: &str, value: V) {
        let mut shard = self.shard_for_mut(key).await;
        shard.items.insert(key.to_string(), value);
    }

    /// Look up `key`, cloning the stored value out of the shard.
    pub async fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let shard = self.shard_for(key).await;
        shard.items.get(key).cloned()
    }

    /// Return the value under `key`, inserting `value` first if the key is
    /// absent. The boolean is true when the key already existed.
    ///
    /// The owning shard stays write-locked across the whole
    /// check-then-insert, so two racing callers cannot both insert: one
    /// stores its value, the other gets that value back with `true`.
    pub async fn get_or_insert(&self, key: &str, value: V) -> (V, bool)
    where
        V: Clone,
    {
        let mut shard = self.shard_for_mut(key).await;
        if let Some(existing) = shard.items.get(key) {
            return (existing.clone(), true);
        }
        shard.items.insert(key.to_string(), value.clone());
        (value, false)
    }

    /// Check whether `key` is present.
    pub async fn contains_key(&self, key: &str) -> bool {
        let shard = self.shard_for(key).await;
        shard.items.contains_key(key)
    }

    /// Remove `key`, returning the previous value. Removing an absent key
    /// is a no-op.
    pub async fn remove(&self, key: &str) -> Option<V> {
        let mut shard = self.shard_for_mut(key).await;
        shard.items.remove(key)
    }

    /// Remove `key` only if `pred` accepts the stored value.
    ///
    /// Lookup, predicate and removal all happen under one write lock on
    /// the owning shard, so the checked value is the removed value. A
    /// predicate error aborts the removal and comes back unchanged; the
    /// entry stays put.
    pub async fn remove_if<F, E>(&self, key: &str, pred: F) -> Result<bool, E>
    where
        F: FnOnce(&V) -> Result<bool, E>,
    {
        let mut shard = self.shard_for_mut(key).await;
        let matched = match shard.items.get(key) {
            Some(value) => pred(value)?,
            None => false,
        };
        if matched {
            shard.items.remove(key);
        }
        Ok(matched)
    }

    /// Remove `key` only when the stored value equals `expected`.
    ///
    /// A mismatch or an absent key is not an error: nothing is removed and
    /// `false` comes back.
    pub async fn remove_if_value(&self, key: &str, expected: &V) -> bool
    where
        V: PartialEq,
    {
        let mut shard = self.shard_for_mut(key).await;
        let matched = shard.items.get(key).is_some_and(|value| value == expected);
        if matched {
            shard.items.remove(key);
        }
        matched
    }

    /// Count entries across all shards (weakly consistent under writes).
    pub async fn len(&self) -> usize {
        let mut count = 0;
        for shard in &self.shards {
            let shard = shard.read().await;
            count += shard.items.len();
        }
        count
    }

    /// True when no shard holds any entry.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy out every entry, shard by shard (weakly consistent under
    /// writes, see the type-level note).
    pub async fn entries(&self) -> Vec<(String, V)>
    where
        V: Clone,
    {
        let mut result = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().await;
            for (key, value) in shard.items.iter() {
                result.push((key.clone(), value.clone()));
            }
        }
        result
    }

    /// Flatten the map into one key-ordered JSON object, the form used by
    /// the debug endpoint and logs.
    pub async fn to_json(&self) -> serde_json::Result<String>
    where
        V: Clone + serde::Serialize,
    {
        let flat: BTreeMap<String, V> = self.entries().await.into_iter().collect();
        serde_json::to_string(&flat)
    }
}

impl<V> Default for ConcurrentMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
