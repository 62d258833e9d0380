pub mod error;
pub mod form;
pub mod metrics;
pub mod page;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use error::ServerError;
pub use metrics::Metrics;
pub use routes::AppState;
pub use server::Server;
