//! Shared application state for the HTTP handlers.

use std::sync::Arc;

use doodle_core::Coordinator;

/// State shared by every route, held behind an `Arc`.
#[derive(Debug)]
pub struct AppState {
    /// Entry point into the coordination layer.
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    /// Wrap a running coordinator.
    pub const fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}
