//! Canvas archiving.
//!
//! When a countdown expires, or an operator asks for it, the current
//! canvas is persisted together with the round it belongs to. The
//! [`Archiver`] trait is the seam; [`FileArchiver`] writes one image
//! file per call into a history directory.
//!
//! File names encode the context:
//! `20250101_120000_R2_T1_konpaku_youmu_auto.png` during a round, and
//! `20250101_120000_MANUAL_SAVE_IDLE.png` when no round is active.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use doodle_types::GameState;

use crate::canvas::CanvasSnapshot;

/// Why a canvas is being archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveReason {
    /// The countdown expired naturally.
    Auto,
    /// An operator requested a save.
    Manual,
}

impl ArchiveReason {
    /// Lowercase name used in file names and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ArchiveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while archiving.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// There is nothing drawn to save.
    #[error("canvas is empty")]
    EmptyCanvas,

    /// Writing the file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The file or directory being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Persists a canvas snapshot with its game context.
pub trait Archiver: Send + Sync {
    /// Save `snapshot`, returning where it was written.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::EmptyCanvas`] for a blank snapshot, or an
    /// implementation-specific failure.
    fn save(
        &self,
        snapshot: &CanvasSnapshot,
        context: &GameState,
        reason: ArchiveReason,
    ) -> Result<PathBuf, ArchiveError>;
}

/// Writes archived canvases as image files into one directory.
#[derive(Debug, Clone)]
pub struct FileArchiver {
    dir: PathBuf,
}

impl FileArchiver {
    /// Create an archiver writing into `dir`. The directory is created
    /// on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The history directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Archiver for FileArchiver {
    fn save(
        &self,
        snapshot: &CanvasSnapshot,
        context: &GameState,
        reason: ArchiveReason,
    ) -> Result<PathBuf, ArchiveError> {
        if snapshot.is_blank() {
            return Err(ArchiveError::EmptyCanvas);
        }

        std::fs::create_dir_all(&self.dir).map_err(|source| ArchiveError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self
            .dir
            .join(archive_file_name(Local::now(), &snapshot.mime_type, context, reason));
        std::fs::write(&path, &snapshot.bytes).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

/// Build the archive file name for a snapshot taken at `now`.
pub fn archive_file_name(
    now: DateTime<Local>,
    mime_type: &str,
    context: &GameState,
    reason: ArchiveReason,
) -> String {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    let extension = if mime_type.contains("jpeg") || mime_type.contains("jpg") {
        ".jpg"
    } else {
        ".png"
    };

    if context.is_round_active() {
        format!(
            "{timestamp}_R{}_T{}_{}_{reason}{extension}",
            context.round_num, context.try_num, context.target_label
        )
    } else {
        format!("{timestamp}_MANUAL_SAVE_IDLE{extension}")
    }
}
