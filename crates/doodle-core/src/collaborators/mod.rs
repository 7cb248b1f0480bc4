//! Opaque collaborators the coordination layer calls out to.
//!
//! - [`classifier`] -- [`Classifier`] trait: image bytes to ranked labels
//! - [`archive`] -- [`Archiver`] trait: persist a canvas with game context
//!
//! Both traits are synchronous. Callers run them on the
//! [`WorkerPool`](crate::pool::WorkerPool), never on a coordination task.

pub mod archive;
pub mod classifier;

pub use archive::{ArchiveError, ArchiveReason, Archiver, FileArchiver};
pub use classifier::{Classifier, ClassifierError, MockClassifier};
