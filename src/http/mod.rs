//! HTTP server module.
//!
//! This module binds and serves the listeners:
//! - **Main listener**: the application surface plus health paths on `$PORT`
//! - **Companion listener**: health paths only, on `health.port` when set
//!
//! The server includes:
//! - Bind-before-serve, so an unavailable address fails startup
//! - Graceful shutdown on SIGTERM/SIGINT with a bounded drain window
//! - Static file serving for the static application mode

pub mod server;
pub mod shutdown;
pub mod static_files;

pub use server::{serve, Listeners, ServerError, ServerHandles};
