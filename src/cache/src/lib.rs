// Core modules
pub mod cache;
pub mod config;

// Re-export main types for convenience
pub use cache::{TopicCache, TtlCache};
pub use config::CacheConfig;
