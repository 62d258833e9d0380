use std::env;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use cache::{CacheConfig, TopicCache, TtlCache};
use storage::{MemoryStore, TopicStore};

use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::routes::{handle_request, AppState};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

pub struct Server {
    state: AppState,
    host: String,
    port: u16,
}

impl Server {
    /// Build a server from `TALLY_*` environment variables, with one
    /// in-memory store and one cache over it shared by all handlers.
    pub fn new() -> Result<Self, ServerError> {
        let host = env::var("TALLY_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port_str = env::var("TALLY_PORT").unwrap_or_else(|_| DEFAULT_PORT.to_string());
        let port = port_str
            .parse::<u16>()
            .map_err(|e| ServerError::InvalidPort(format!("{}: {}", port_str, e)))?;

        let mut cache_config = CacheConfig::new();
        if let Ok(raw) = env::var("TALLY_CACHE_TTL_MS") {
            let ttl_ms = raw.parse::<u64>().map_err(|e| {
                ServerError::InvalidConfig(format!("TALLY_CACHE_TTL_MS={}: {}", raw, e))
            })?;
            cache_config = cache_config.with_ttl(Duration::from_millis(ttl_ms));
        }
        if let Ok(raw) = env::var("TALLY_REFRESH_LIMIT") {
            let refresh_limit = raw.parse::<usize>().map_err(|e| {
                ServerError::InvalidConfig(format!("TALLY_REFRESH_LIMIT={}: {}", raw, e))
            })?;
            cache_config = cache_config.with_refresh_limit(refresh_limit);
        }

        let store = Arc::new(MemoryStore::new());
        let cache: Arc<dyn TopicCache> = Arc::new(TtlCache::with_config(
            Arc::clone(&store) as Arc<dyn TopicStore>,
            cache_config,
        ));

        Ok(Server {
            state: AppState {
                store,
                cache,
                metrics: Arc::new(Metrics::new()),
            },
            host,
            port,
        })
    }

    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("TALLY is running on http://{} ...", addr);

        // Shutdown broadcast channel
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // Spawn signal handler
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                info!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal, stopping server...");
            let _ = shutdown_tx_clone.send(());
        });

        let mut shutdown_rx = shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!("New connection from {}", peer_addr);
                            let state = self.state.clone();
                            tokio::spawn(serve_connection(stream, state));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server...");
                    info!("TALLY server stopped");
                    return Ok(());
                }
            }
        }
    }
}

/// Serve one HTTP/1.1 connection until the peer closes it.
async fn serve_connection(stream: TcpStream, state: AppState) {
    let peer_addr = stream.peer_addr().ok();
    let io = TokioIo::new(stream);

    let service = service_fn(move |req| {
        let state = state.clone();
        async move { handle_request(req, state).await }
    });

    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
        debug!("HTTP connection error from {:?}: {}", peer_addr, e);
    }
}
