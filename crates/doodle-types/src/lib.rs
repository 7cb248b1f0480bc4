//! Shared type definitions for the Doodle drawing-and-guessing server.
//!
//! This crate is the single source of truth for everything that crosses
//! a component or wire boundary: the game state broadcast to every
//! listener, the ranked classifier output, and the JSON messages
//! exchanged over the persistent listener connection.
//!
//! # Modules
//!
//! - [`game`] -- Game phase, game state and the static round catalog entry
//! - [`prediction`] -- Classifier results and the staged top-k ranking
//! - [`messages`] -- Client commands and server broadcast events

pub mod game;
pub mod messages;
pub mod prediction;

// Re-export all public types at crate root for convenience.
pub use game::{GameState, Phase, RoundDefinition};
pub use messages::{
    ClientMessage, ClientRole, Command, CommandPayload, FinalResults, ImagePayload, ServerEvent,
    TimerSource,
};
pub use prediction::{PredictionResult, StagedPrediction, TOP_K};
