use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

/// Get current timestamp in milliseconds
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A single votable topic.
///
/// `id`, `content` and `created_at_ms` never change after creation. The
/// vote counter is a true atomic: concurrent voters bump it through a
/// shared reference without taking any lock, so no update is ever lost.
#[derive(Debug, Serialize, Deserialize)]
pub struct Topic {
    /// Opaque unique id. The store never generates ids; callers do.
    pub id: String,
    /// User-supplied text, displayed as-is on the ranked page.
    pub content: String,
    votes: AtomicI64,
    /// Creation time in Unix milliseconds.
    pub created_at_ms: u64,
}

impl Topic {
    /// Create a topic with zero votes, timestamped now.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Topic::with_created_at(id, content, current_timestamp_ms())
    }

    /// Create a topic with an explicit creation time (tests, replays).
    pub fn with_created_at(
        id: impl Into<String>,
        content: impl Into<String>,
        created_at_ms: u64,
    ) -> Self {
        Topic {
            id: id.into(),
            content: content.into(),
            votes: AtomicI64::new(0),
            created_at_ms,
        }
    }

    /// Current vote count.
    pub fn votes(&self) -> i64 {
        self.votes.load(Ordering::Relaxed)
    }

    /// Atomically add `delta` votes and return the new count.
    ///
    /// This is the only mutation a topic supports. It takes `&self`, not
    /// `&mut self`, so any number of holders of a shared record can vote
    /// concurrently.
    pub fn add_votes(&self, delta: i64) -> i64 {
        self.votes.fetch_add(delta, Ordering::Relaxed) + delta
    }
}

impl Clone for Topic {
    /// Value-copy: the copy's counter starts at whatever the original held
    /// when the clone was taken, then moves independently.
    fn clone(&self) -> Self {
        Topic {
            id: self.id.clone(),
            content: self.content.clone(),
            votes: AtomicI64::new(self.votes()),
            created_at_ms: self.created_at_ms,
        }
    }
}

/// Sort topics into display order: most votes first; on equal votes the
/// older topic wins, then id, so the order is reproducible run to run.
pub fn sort_by_votes(topics: &mut [Topic]) {
    topics.sort_by(|a, b| {
        b.votes()
            .cmp(&a.votes())
            .then_with(|| a.created_at_ms.cmp(&b.created_at_ms))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_topic_starts_at_zero() {
        let topic = Topic::new("t1", "first post");
        assert_eq!(topic.votes(), 0);
        assert_eq!(topic.id, "t1");
        assert_eq!(topic.content, "first post");
        assert!(topic.created_at_ms > 0);
    }

    #[test]
    fn test_add_votes_returns_new_count() {
        let topic = Topic::new("t1", "x");
        assert_eq!(topic.add_votes(1), 1);
        assert_eq!(topic.add_votes(1), 2);
        assert_eq!(topic.add_votes(-5), -3);
        assert_eq!(topic.votes(), -3);
    }

    #[test]
    fn test_clone_is_a_value_copy() {
        let original = Topic::new("t1", "x");
        original.add_votes(3);

        let copy = original.clone();
        assert_eq!(copy.votes(), 3);

        original.add_votes(1);
        assert_eq!(original.votes(), 4);
        assert_eq!(copy.votes(), 3);
    }

    #[test]
    fn test_sort_by_votes_descending() {
        let mut topics = vec![
            Topic::with_created_at("a", "x", 1),
            Topic::with_created_at("b", "x", 1),
            Topic::with_created_at("c", "x", 1),
        ];
        topics[0].add_votes(1);
        topics[1].add_votes(5);
        topics[2].add_votes(3);

        sort_by_votes(&mut topics);

        let ids: Vec<&str> = topics.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn test_sort_ties_prefer_older_then_id() {
        let mut topics = vec![
            Topic::with_created_at("young", "x", 200),
            Topic::with_created_at("old", "x", 100),
            Topic::with_created_at("b-same-age", "x", 200),
            Topic::with_created_at("a-same-age", "x", 200),
        ];
        for t in &topics {
            t.add_votes(7);
        }

        sort_by_votes(&mut topics);

        let ids: Vec<&str> = topics.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["old", "a-same-age", "b-same-age", "young"]);
    }

    #[test]
    fn test_serializes_with_live_count() {
        let topic = Topic::with_created_at("t1", "hello", 42);
        topic.add_votes(2);

        let json = serde_json::to_string(&topic).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["id"], "t1");
        assert_eq!(parsed["votes"], 2);
        assert_eq!(parsed["created_at_ms"], 42);
    }
}
