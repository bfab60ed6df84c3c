//! HTTP server startup logic.
//!
//! Listeners are bound synchronously before anything is served so that an
//! address already in use (or a privileged port) fails startup cleanly and no
//! partial listener is left behind.

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use axum::Router;
use axum_server::Handle;

use crate::config::AppConfig;
use crate::routes::{create_health_router, create_router};
use crate::state::AppState;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address '{0}'")]
    Address(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(String),
}

/// Resolve `host:port` into a socket address.
pub fn listen_addr(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let raw = format!("{}:{}", host, port);
    raw.parse().map_err(|_| ServerError::Address(raw))
}

/// Bind a listener in non-blocking mode, ready to hand to the runtime.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ServerError::Bind { addr, source })?;
    Ok(listener)
}

/// The bound main listener and the optional companion health listener.
#[derive(Debug)]
pub struct Listeners {
    pub main: TcpListener,
    pub companion: Option<TcpListener>,
}

impl Listeners {
    /// Bind every listener the configuration asks for.
    ///
    /// If the companion bind fails the main listener is dropped with the error.
    pub fn bind(config: &AppConfig) -> Result<Self, ServerError> {
        let main = bind_listener(listen_addr(&config.http.host, config.http.port)?)?;

        let companion = match config.health.port {
            Some(port) => Some(bind_listener(listen_addr(&config.http.host, port)?)?),
            None => None,
        };

        Ok(Self { main, companion })
    }

    pub fn main_addr(&self) -> std::io::Result<SocketAddr> {
        self.main.local_addr()
    }

    pub fn companion_addr(&self) -> Option<std::io::Result<SocketAddr>> {
        self.companion.as_ref().map(|l| l.local_addr())
    }
}

/// Shutdown handles for each server, triggered together.
#[derive(Clone, Default)]
pub struct ServerHandles {
    pub main: Handle,
    pub companion: Handle,
}

impl ServerHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting connections and drain in-flight requests for up to `grace`.
    pub fn graceful_shutdown(&self, grace: Duration) {
        self.main.graceful_shutdown(Some(grace));
        self.companion.graceful_shutdown(Some(grace));
    }
}

/// Serve the main listener, and the companion listener when present.
///
/// This function blocks until every server shuts down or one fails.
pub async fn serve(
    state: AppState,
    listeners: Listeners,
    handles: ServerHandles,
) -> Result<(), ServerError> {
    let keep_alive = state.config.http.keep_alive;
    let app = create_router(state.clone());

    tracing::info!(
        addr = ?listeners.main.local_addr().ok(),
        mode = %state.config.app.mode,
        pool_size = state.pool.capacity(),
        timeout_seconds = state.config.workers.timeout_seconds,
        keep_alive,
        "Starting HTTP server"
    );

    let main = serve_listener(listeners.main, app, keep_alive, handles.main);

    match listeners.companion {
        Some(companion) => {
            tracing::info!(
                addr = ?companion.local_addr().ok(),
                paths = ?state.config.health.paths,
                "Starting companion health responder"
            );
            let health = create_health_router(state);
            let companion = serve_listener(companion, health, keep_alive, handles.companion);
            futures::future::try_join(main, companion).await.map(|_| ())
        }
        None => main.await,
    }
}

async fn serve_listener(
    listener: TcpListener,
    app: Router,
    keep_alive: bool,
    handle: Handle,
) -> Result<(), ServerError> {
    let mut server = axum_server::from_tcp(listener).handle(handle);

    if !keep_alive {
        server.http_builder().http1().keep_alive(false);
    }

    server
        .serve(app.into_make_service())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))
}
