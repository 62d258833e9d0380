use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tokio::sync::Barrier;

use cache::{TopicCache, TtlCache};
use storage::{MemoryStore, Topic, TopicStore};

const NUM_TOPICS: usize = 10_000;
const NUM_OPS: usize = 500_000;
const CONTENT_SIZE: usize = 100;
const PAGE_SIZE: usize = 20;

fn generate_content(size: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen_range('a'..='z')).collect()
}

fn topic_id(i: usize) -> String {
    format!("topic:{}", i)
}

async fn benchmark_seed_topics(store: &MemoryStore, name: &str) {
    println!("\n=== Seed Topics ({}) ===", name);

    let content = generate_content(CONTENT_SIZE);
    let start = Instant::now();

    for i in 0..NUM_TOPICS {
        let _ = store.create_topic(Topic::new(topic_id(i), content.clone())).await;
    }

    let elapsed = start.elapsed();
    let ops_per_sec = NUM_TOPICS as f64 / elapsed.as_secs_f64();

    println!("  {} creates in {:?}", NUM_TOPICS, elapsed);
    println!("  {:.0} ops/sec", ops_per_sec);
}

async fn benchmark_concurrent_votes(store: Arc<MemoryStore>, num_tasks: usize, name: &str) {
    println!("\n=== Concurrent Votes ({} tasks) ({}) ===", num_tasks, name);

    let ops_per_task = NUM_OPS / num_tasks;
    let barrier = Arc::new(Barrier::new(num_tasks + 1));

    let mut handles = Vec::new();

    for task_id in 0..num_tasks {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut rng = StdRng::seed_from_u64(task_id as u64);

            for _ in 0..ops_per_task {
                let id = topic_id(rng.gen_range(0..NUM_TOPICS));
                if rng.gen_ratio(1, 5) {
                    // 20% downvotes
                    let _ = store.downvote_topic(&id).await;
                } else {
                    // 80% upvotes
                    let _ = store.upvote_topic(&id).await;
                }
            }
        }));
    }

    let start = Instant::now();
    barrier.wait().await;

    for handle in handles {
        let _ = handle.await;
    }

    let elapsed = start.elapsed();
    let total_ops = ops_per_task * num_tasks;
    let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

    println!("  {} votes in {:?}", total_ops, elapsed);
    println!("  {:.0} ops/sec", ops_per_sec);
}

async fn benchmark_ranked_reads(store: Arc<MemoryStore>, num_tasks: usize, name: &str) {
    println!("\n=== Ranked Reads via Cache ({} tasks) ({}) ===", num_tasks, name);

    let cache = Arc::new(TtlCache::new(Arc::clone(&store) as Arc<dyn TopicStore>));
    let ops_per_task = NUM_OPS / num_tasks;
    let barrier = Arc::new(Barrier::new(num_tasks + 1));

    let mut handles = Vec::new();

    for _ in 0..num_tasks {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;

            for _ in 0..ops_per_task {
                let _ = cache.get_topics(PAGE_SIZE).await;
            }
        }));
    }

    let start = Instant::now();
    barrier.wait().await;

    for handle in handles {
        let _ = handle.await;
    }

    let elapsed = start.elapsed();
    let total_ops = ops_per_task * num_tasks;
    let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

    println!("  {} reads in {:?}", total_ops, elapsed);
    println!("  {:.0} ops/sec", ops_per_sec);
}

async fn benchmark_mixed_workload(store: Arc<MemoryStore>, num_tasks: usize, name: &str) {
    println!(
        "\n=== Mixed Workload (80% reads, 20% votes) ({} tasks) ({}) ===",
        num_tasks, name
    );

    let cache = Arc::new(TtlCache::new(Arc::clone(&store) as Arc<dyn TopicStore>));
    let ops_per_task = NUM_OPS / num_tasks;
    let barrier = Arc::new(Barrier::new(num_tasks + 1));

    let mut handles = Vec::new();

    for task_id in 0..num_tasks {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut rng = StdRng::seed_from_u64(task_id as u64);

            for _ in 0..ops_per_task {
                if rng.gen_ratio(1, 5) {
                    // 20% votes
                    let id = topic_id(rng.gen_range(0..NUM_TOPICS));
                    if rng.gen_ratio(1, 2) {
                        let _ = cache.downvote_topic(&id).await;
                    } else {
                        let _ = cache.upvote_topic(&id).await;
                    }
                } else {
                    // 80% ranked reads
                    let _ = cache.get_topics(PAGE_SIZE).await;
                }
            }
        }));
    }

    let start = Instant::now();
    barrier.wait().await;

    for handle in handles {
        let _ = handle.await;
    }

    let elapsed = start.elapsed();
    let total_ops = ops_per_task * num_tasks;
    let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

    println!("  {} ops in {:?}", total_ops, elapsed);
    println!("  {:.0} ops/sec", ops_per_sec);
}

async fn run_benchmarks(store: Arc<MemoryStore>, name: &str) {
    println!("\n######################################");
    println!("# Benchmarking: {}", name);
    println!("######################################");

    benchmark_seed_topics(&store, name).await;

    // Concurrent benchmarks with different task counts
    for num_tasks in [10, 100, 1000] {
        benchmark_concurrent_votes(Arc::clone(&store), num_tasks, name).await;
        benchmark_ranked_reads(Arc::clone(&store), num_tasks, name).await;
    }

    // Mixed workload with high concurrency
    benchmark_mixed_workload(Arc::clone(&store), 1000, name).await;
}

#[tokio::main]
async fn main() {
    println!("TALLY Voting Benchmark");
    println!("======================");
    println!("Topics: {}", NUM_TOPICS);
    println!("Operations per benchmark: {}", NUM_OPS);
    println!("Content size: {} bytes", CONTENT_SIZE);

    let sharded_store = Arc::new(MemoryStore::with_shard_count(32));
    run_benchmarks(sharded_store, "Sharded (32 shards)").await;

    // Single shard as the contention baseline
    let single_shard_store = Arc::new(MemoryStore::with_shard_count(1));
    run_benchmarks(single_shard_store, "Single shard").await;

    println!("\n######################################");
    println!("# Benchmark Complete");
    println!("######################################");
}
