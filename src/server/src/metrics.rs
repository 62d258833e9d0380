use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use storage::MemoryStore;

/// Server metrics
#[derive(Clone)]
pub struct Metrics {
    pub total_requests: Arc<AtomicUsize>,
    pub total_page_views: Arc<AtomicUsize>,
    pub total_creates: Arc<AtomicUsize>,
    pub total_upvotes: Arc<AtomicUsize>,
    pub total_downvotes: Arc<AtomicUsize>,
    /// Votes rejected because the topic id was unknown
    pub total_vote_misses: Arc<AtomicUsize>,
    pub start_time: std::time::Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            total_requests: Arc::new(AtomicUsize::new(0)),
            total_page_views: Arc::new(AtomicUsize::new(0)),
            total_creates: Arc::new(AtomicUsize::new(0)),
            total_upvotes: Arc::new(AtomicUsize::new(0)),
            total_downvotes: Arc::new(AtomicUsize::new(0)),
            total_vote_misses: Arc::new(AtomicUsize::new(0)),
            start_time: std::time::Instant::now(),
        }
    }

    /// Generate Prometheus-format metrics
    pub async fn to_prometheus(&self, store: &MemoryStore) -> String {
        let uptime_secs = self.start_time.elapsed().as_secs();
        let topics_count = store.len().await;

        let mut output = String::new();

        // Request metrics
        output.push_str("# HELP tally_requests_total Total number of HTTP requests\n");
        output.push_str("# TYPE tally_requests_total counter\n");
        output.push_str(&format!(
            "tally_requests_total {}\n",
            self.total_requests.load(Ordering::SeqCst)
        ));

        // Operation metrics
        output.push_str("# HELP tally_operations_total Total number of operations by type\n");
        output.push_str("# TYPE tally_operations_total counter\n");
        output.push_str(&format!(
            "tally_operations_total{{type=\"page\"}} {}\n",
            self.total_page_views.load(Ordering::SeqCst)
        ));
        output.push_str(&format!(
            "tally_operations_total{{type=\"create\"}} {}\n",
            self.total_creates.load(Ordering::SeqCst)
        ));
        output.push_str(&format!(
            "tally_operations_total{{type=\"upvote\"}} {}\n",
            self.total_upvotes.load(Ordering::SeqCst)
        ));
        output.push_str(&format!(
            "tally_operations_total{{type=\"downvote\"}} {}\n",
            self.total_downvotes.load(Ordering::SeqCst)
        ));

        output.push_str("# HELP tally_vote_misses_total Votes rejected because the topic id was unknown\n");
        output.push_str("# TYPE tally_vote_misses_total counter\n");
        output.push_str(&format!(
            "tally_vote_misses_total {}\n",
            self.total_vote_misses.load(Ordering::SeqCst)
        ));

        // Storage metrics
        output.push_str("# HELP tally_topics_total Current number of stored topics\n");
        output.push_str("# TYPE tally_topics_total gauge\n");
        output.push_str(&format!("tally_topics_total {}\n", topics_count));

        // Uptime metric
        output.push_str("# HELP tally_uptime_seconds Server uptime in seconds\n");
        output.push_str("# TYPE tally_uptime_seconds counter\n");
        output.push_str(&format!("tally_uptime_seconds {}\n", uptime_secs));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
