//! Server startup helper for the engine binary.
//!
//! [`spawn_server`] launches the HTTP + `WebSocket` server on a
//! background Tokio task so the binary can wait for a shutdown signal
//! alongside it.

use std::sync::Arc;

use doodle_core::signal::Signal;
use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError, start_server};
use crate::state::AppState;

/// Spawn the HTTP server on a background Tokio task.
///
/// The address is validated before the task is spawned so obvious
/// misconfiguration fails startup instead of surfacing in a log line.
/// Bind and serve errors inside the task are logged.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if `config` does not form a valid
/// socket address.
pub fn spawn_server(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: Arc<Signal>,
) -> Result<JoinHandle<()>, ServerError> {
    let addr = config.socket_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = start_server(&config, state, shutdown).await {
            tracing::error!(error = %e, "Doodle server exited with error");
        }
    });

    tracing::info!(%addr, "Doodle server spawned on background task");

    Ok(handle)
}
