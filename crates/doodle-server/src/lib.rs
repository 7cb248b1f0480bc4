//! HTTP and `WebSocket` surface for the Doodle server.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/listener`): the single persistent
//!   connection every front end (canvas, admin, display) uses to send
//!   canvas updates and commands and to receive broadcasts
//! - **Status endpoint** (`/api/status`): current game state, listener
//!   count and staged ranking as JSON
//! - **Minimal HTML status page** (`GET /`)
//!
//! All game logic lives in `doodle-core`; this crate only moves frames
//! between sockets and the [`Coordinator`](doodle_core::Coordinator).

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::spawn_server;
pub use state::AppState;
