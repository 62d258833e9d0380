use std::time::Duration;

/// Default snapshot lifetime
const DEFAULT_TTL_MS: u64 = 1000;
/// Default number of topics pulled from the store on refresh
const DEFAULT_REFRESH_LIMIT: usize = 20;

/// Tuning knobs for the TTL cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a loaded snapshot counts as fresh.
    pub ttl: Duration,
    /// How many top topics a refresh pulls from the store. Independent of
    /// any caller's page size; a page can never exceed this many topics.
    pub refresh_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl: Duration::from_millis(DEFAULT_TTL_MS),
            refresh_limit: DEFAULT_REFRESH_LIMIT,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_refresh_limit(mut self, refresh_limit: usize) -> Self {
        self.refresh_limit = refresh_limit;
        self
    }
}
