// Core modules
pub mod cmap;
pub mod error;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use cmap::ConcurrentMap;
pub use error::StoreError;
pub use store::{MemoryStore, TopicStore};
pub use types::{current_timestamp_ms, sort_by_votes, Topic};
