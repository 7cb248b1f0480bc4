//! Server binary for the Doodle drawing-and-guessing game.
//!
//! Wires the coordination layer to its collaborators and the HTTP +
//! `WebSocket` server, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `DOODLE_CONFIG` or `doodle-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the classifier and archiver
//! 4. Launch the coordinator and its background loops
//! 5. Spawn the HTTP server
//! 6. Wait for `Ctrl-C`, then drain everything

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use doodle_core::Coordinator;
use doodle_core::collaborators::{Archiver, Classifier, FileArchiver, MockClassifier};
use doodle_core::config::{GameConfig, LogFormat, LoggingConfig};
use doodle_core::signal::Signal;
use doodle_server::{AppState, ServerConfig, spawn_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file read when `DOODLE_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "doodle-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging or server startup fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember where it
    //    came from and report after step 2.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("doodle-engine starting");
    info!(
        source = %source,
        host = config.network.host,
        port = config.network.port,
        timer_max = config.timer.max_value,
        prediction_interval_ms = config.prediction.interval_ms,
        pool_size = config.workers.pool_size,
        rounds = config.rounds.len(),
        "Configuration loaded"
    );

    // 3. Collaborators.
    warn!("Using mock classifier, predictions are canned");
    let classifier: Arc<dyn Classifier> = Arc::new(MockClassifier::default());
    let archiver: Arc<dyn Archiver> = Arc::new(FileArchiver::new(config.history.dir.clone()));
    info!(dir = %config.history.dir.display(), "Archiving canvases to history directory");

    // 4. Coordinator and background loops.
    let shutdown = Arc::new(Signal::new());
    let (coordinator, tasks) = Coordinator::launch(&config, classifier, archiver, &shutdown);

    // 5. HTTP + WebSocket server.
    let server = spawn_server(
        ServerConfig::from(&config.network),
        Arc::new(AppState::new(coordinator)),
        Arc::clone(&shutdown),
    )
    .map_err(EngineError::from)?;

    // 6. Run until Ctrl-C.
    tokio::signal::ctrl_c().await.map_err(EngineError::from)?;
    info!("Shutdown requested");
    shutdown.set();

    tasks.join().await;
    if let Err(e) = server.await {
        warn!(error = %e, "Server task failed");
    }
    info!("doodle-engine stopped");
    Ok(())
}

/// Where the configuration came from.
enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults(path) => write!(f, "defaults ({} not found)", path.display()),
        }
    }
}

/// Load configuration from `DOODLE_CONFIG` or `doodle-config.yaml`.
///
/// A missing file falls back to defaults; environment overrides and
/// validation apply either way.
fn load_config() -> Result<(GameConfig, ConfigSource), EngineError> {
    let path = std::env::var_os("DOODLE_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        let config = GameConfig::from_file(&path)?;
        Ok((config, ConfigSource::File(path)))
    } else {
        let mut config = GameConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, ConfigSource::Defaults(path)))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log level {:?}: {e}", logging.level),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = match logging.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| EngineError::Logging {
        message: format!("{e}"),
    })
}
