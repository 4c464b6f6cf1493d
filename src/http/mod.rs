//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! bound socket (net::listener)
//!     → server.rs (Axum router per facet, middleware, graceful drain)
//!     → handlers.rs (ready, registries, debug, metrics, webhook)
//! ```

pub mod handlers;
pub mod server;

pub use handlers::AppState;
