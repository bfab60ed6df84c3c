//! gangway - container process launcher for HTTP services.
//!
//! Binds an HTTP listener on `$PORT`, serves a built-in application surface
//! through a bounded worker pool, and answers liveness probes on fixed paths.

pub mod config;
pub mod error;
pub mod http;
pub mod launch;
pub mod middleware;
pub mod pool;
pub mod probe;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;
