//! Real-time coordination layer for the Doodle drawing-and-guessing game.
//!
//! Input clients stream canvas updates, a classifier periodically ranks
//! what was drawn, and every connected client receives the same stream
//! of game state, timer and result events.
//!
//! # Modules
//!
//! - [`canvas`] -- Latest-canvas store with a coalescing change signal.
//! - [`prediction`] -- Rate-limited inference loop and the staged ranking.
//! - [`game`] -- Phase state machine and command dispatch.
//! - [`countdown`] -- The singleton countdown task.
//! - [`broadcast`] -- Listener registry and event fan-out.
//! - [`coordinator`] -- Routes client messages; builds and launches
//!   everything.
//! - [`collaborators`] -- [`Classifier`] and [`Archiver`] traits.
//! - [`config`] -- Configuration loading from `doodle-config.yaml`.
//! - [`signal`], [`cadence`], [`pool`] -- Concurrency building blocks.
//!
//! [`Classifier`]: collaborators::Classifier
//! [`Archiver`]: collaborators::Archiver

pub mod broadcast;
pub mod cadence;
pub mod canvas;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod countdown;
pub mod game;
pub mod pool;
pub mod prediction;
pub mod signal;

pub use coordinator::{BackgroundTasks, Coordinator, MessageOutcome, StatusSnapshot};
