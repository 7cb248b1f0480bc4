//! Bind, serve, and drain on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use doodle_core::config::NetworkConfig;
use doodle_core::signal::Signal;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Listen address for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host or IP to bind.
    pub host: String,
    /// TCP port; `0` picks a free one.
    pub port: u16,
}

impl From<&NetworkConfig> for ServerConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            host: network.host.clone(),
            port: network.port,
        }
    }
}

impl ServerConfig {
    /// The configured `host:port` as a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the pair is not a valid address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|e| ServerError::Bind(format!("invalid address {raw}: {e}")))
    }
}

/// Serve the router until `shutdown` is raised, then let open
/// connections finish.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or taken, and
/// [`ServerError::Serve`] if the accept loop fails.
pub async fn start_server(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: Arc<Signal>,
) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    info!(%addr, "Doodle server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    info!("Doodle server stopped");
    Ok(())
}

/// Errors starting or running the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The address is invalid or could not be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// The accept loop failed.
    #[error("serve error: {0}")]
    Serve(String),
}
