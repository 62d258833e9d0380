//! HTTP request routing for the voting service.
//!
//! Routes:
//! - GET  /             - ranked topic page (HTML)
//! - POST /create       - create a topic from the `content` form field
//! - POST /upvote       - add a vote to the topic named by the `id` field
//! - POST /downvote     - take a vote from the topic named by the `id` field
//! - GET  /health       - health check endpoint
//! - GET  /metrics      - Prometheus-format metrics
//! - GET  /debug/topics - flat JSON dump of the stored topics

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response, StatusCode};
use log::{debug, error, info};

use cache::TopicCache;
use storage::{MemoryStore, StoreError, Topic, TopicStore};

use crate::form::parse_form;
use crate::metrics::Metrics;
use crate::page::render_page;

/// Topics shown on the ranked page
const PAGE_SIZE: usize = 20;
/// Largest accepted form body
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Shared handles every request handler needs.
///
/// Reads and votes go through the cache; creates and diagnostics go to
/// the store directly, so a fresh topic only becomes visible once the
/// cache refreshes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<dyn TopicCache>,
    pub metrics: Arc<Metrics>,
}

#[derive(Clone, Copy)]
enum Vote {
    Up,
    Down,
}

pub async fn handle_request<B>(
    req: Request<B>,
    state: AppState,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    state.metrics.total_requests.fetch_add(1, Ordering::SeqCst);

    // Handlers that read the body consume the request, so method and path
    // are pulled out first.
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (method, path.as_str()) {
        (Method::GET, "/") => ranked_page(&state).await,
        (Method::POST, "/create") => create_topic(req, &state).await,
        (Method::POST, "/upvote") => vote(req, &state, Vote::Up).await,
        (Method::POST, "/downvote") => vote(req, &state, Vote::Down).await,
        (Method::GET, "/health") => {
            let body = r#"{"status":"healthy"}"#;
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(body)))
                .unwrap()
        }
        (Method::GET, "/metrics") => {
            let prometheus_metrics = state.metrics.to_prometheus(&state.store).await;
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(prometheus_metrics)))
                .unwrap()
        }
        (Method::GET, "/debug/topics") => match state.store.dump_json().await {
            Ok(json) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(json)))
                .unwrap(),
            Err(e) => {
                error!("Failed to serialize topics: {}", e);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        },
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

async fn ranked_page(state: &AppState) -> Response<Full<Bytes>> {
    state.metrics.total_page_views.fetch_add(1, Ordering::SeqCst);

    match state.cache.get_topics(PAGE_SIZE).await {
        Ok(topics) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(Full::new(Bytes::from(render_page(&topics))))
            .unwrap(),
        Err(e) => {
            error!("Failed to load ranked page: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn create_topic<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match read_form_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let fields = parse_form(&body);
    let content = match fields.get("content").map(|c| c.trim()).filter(|c| !c.is_empty()) {
        Some(content) => content.to_string(),
        None => return json_error(StatusCode::BAD_REQUEST, "missing form field: content"),
    };

    let topic = Topic::new(uuid::Uuid::new_v4().to_string(), content);
    info!("Creating topic {}", topic.id);

    // Straight to the store; the cache picks it up on its next refresh.
    match state.store.create_topic(topic).await {
        Ok(()) => {
            state.metrics.total_creates.fetch_add(1, Ordering::SeqCst);
            see_other()
        }
        Err(e) => {
            error!("Failed to create topic: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn vote<B>(req: Request<B>, state: &AppState, direction: Vote) -> Response<Full<Bytes>>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match read_form_body(req).await {
        Ok(body) => body,
        Err(response) => return response,
    };
    let fields = parse_form(&body);
    let id = match fields.get("id").map(|id| id.trim()).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => return json_error(StatusCode::BAD_REQUEST, "missing form field: id"),
    };

    let result = match direction {
        Vote::Up => state.cache.upvote_topic(&id).await,
        Vote::Down => state.cache.downvote_topic(&id).await,
    };

    match result {
        Ok(()) => {
            let counter = match direction {
                Vote::Up => &state.metrics.total_upvotes,
                Vote::Down => &state.metrics.total_downvotes,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            see_other()
        }
        Err(e @ StoreError::TopicNotFound(_)) => {
            state.metrics.total_vote_misses.fetch_add(1, Ordering::SeqCst);
            debug!("Vote on unknown topic: {}", e);
            json_error(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(e) => {
            error!("Vote failed: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Read a form body, capped at [`MAX_FORM_BYTES`]. The error side is the
/// response to send back (413 for an oversized body).
async fn read_form_body<B>(req: Request<B>) -> Result<String, Response<Full<Bytes>>>
where
    B: Body + Send,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limited = Limited::new(req.into_body(), MAX_FORM_BYTES);
    match limited.collect().await {
        Ok(collected) => Ok(String::from_utf8_lossy(&collected.to_bytes()).into_owned()),
        Err(e) if e.is::<LengthLimitError>() => Err(json_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "form body too large",
        )),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            Err(json_error(StatusCode::BAD_REQUEST, "unreadable request body"))
        }
    }
}

/// Redirect back to the ranked page after a state-changing form post.
fn see_other() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header("Location", "/")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cache::{CacheConfig, TtlCache};

    /// State whose cache refreshes on every read, so page tests see the
    /// store as it is.
    fn test_state() -> AppState {
        state_with_ttl(Duration::ZERO)
    }

    fn state_with_ttl(ttl: Duration) -> AppState {
        let store = Arc::new(MemoryStore::new());
        let cache: Arc<dyn TopicCache> = Arc::new(TtlCache::with_config(
            Arc::clone(&store) as Arc<dyn TopicStore>,
            CacheConfig::new().with_ttl(ttl),
        ));
        AppState {
            store,
            cache,
            metrics: Arc::new(Metrics::new()),
        }
    }

    fn get(path: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn post(path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_ranked_page_lists_topics() {
        let state = test_state();
        state
            .store
            .create_topic(Topic::new("t1", "rust for backends"))
            .await
            .unwrap();
        state.store.upvote_topic("t1").await.unwrap();

        let response = handle_request(get("/"), state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["Content-Type"],
            "text/html; charset=utf-8"
        );

        let html = body_text(response).await;
        assert!(html.contains("rust for backends"));
        assert!(html.contains("value=\"t1\""));
    }

    #[tokio::test]
    async fn test_create_then_page_shows_topic() {
        let state = test_state();

        let response = handle_request(post("/create", "content=hello+world"), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["Location"], "/");
        assert_eq!(state.store.len().await, 1);

        let html = body_text(handle_request(get("/"), state.clone()).await.unwrap()).await;
        assert!(html.contains("hello world"));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_content() {
        let state = test_state();

        for body in ["", "content=", "content=++", "other=x"] {
            let response = handle_request(post("/create", body), state.clone())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        }
        assert_eq!(state.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_create_is_invisible_until_cache_refreshes() {
        let state = state_with_ttl(Duration::from_secs(3600));

        // Load the (empty) snapshot, then create past the cache.
        let html = body_text(handle_request(get("/"), state.clone()).await.unwrap()).await;
        assert!(html.contains("No topics yet."));

        handle_request(post("/create", "content=new+topic"), state.clone())
            .await
            .unwrap();

        // Still the old snapshot; the topic exists only in the store.
        let html = body_text(handle_request(get("/"), state.clone()).await.unwrap()).await;
        assert!(html.contains("No topics yet."));
        assert_eq!(state.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upvote_and_downvote() {
        let state = test_state();
        state
            .store
            .create_topic(Topic::new("t1", "x"))
            .await
            .unwrap();

        let response = handle_request(post("/upvote", "id=t1"), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let page = state.store.topics_by_votes(1).await.unwrap();
        assert_eq!(page[0].votes(), 1);

        let response = handle_request(post("/downvote", "id=t1"), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let page = state.store.topics_by_votes(1).await.unwrap();
        assert_eq!(page[0].votes(), 0);

        assert_eq!(state.metrics.total_upvotes.load(Ordering::SeqCst), 1);
        assert_eq!(state.metrics.total_downvotes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_vote_on_unknown_topic() {
        let state = test_state();

        let response = handle_request(post("/upvote", "id=ghost"), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_text(response).await;
        assert!(body.contains("topic not found: ghost"));
        assert_eq!(state.metrics.total_vote_misses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_vote_rejects_missing_id() {
        let state = test_state();

        let response = handle_request(post("/upvote", "nothing=here"), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_form_rejected() {
        let state = test_state();
        let huge = format!("id={}", "a".repeat(MAX_FORM_BYTES + 1));

        let response = handle_request(post("/upvote", &huge), state.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state();

        let response = handle_request(get("/health"), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"healthy"}"#);
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let state = test_state();
        handle_request(get("/"), state.clone()).await.unwrap();

        let response = handle_request(get("/metrics"), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("tally_requests_total"));
        assert!(body.contains("tally_operations_total{type=\"page\"} 1"));
    }

    #[tokio::test]
    async fn test_debug_topics_dump() {
        let state = test_state();
        state
            .store
            .create_topic(Topic::new("t1", "dump me"))
            .await
            .unwrap();

        let response = handle_request(get("/debug/topics"), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let parsed: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(parsed["t1"]["content"], "dump me");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let state = test_state();

        let response = handle_request(get("/nope"), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, r#"{"error":"not found"}"#);
    }

    #[tokio::test]
    async fn test_method_mismatch_is_not_found() {
        let state = test_state();

        let response = handle_request(get("/create"), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
