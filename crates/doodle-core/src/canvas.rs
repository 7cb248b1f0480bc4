//! Latest-canvas staging store.
//!
//! [`CanvasStore`] keeps exactly one [`CanvasSnapshot`]: the most recent
//! drawing accepted from an input client. Updates arrive as data URLs,
//! are decoded here, and atomically replace the previous snapshot. Each
//! distinct update raises a change signal that the inference scheduler
//! waits on. The signal coalesces: any number of updates between two
//! waits wake the waiter once.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use doodle_types::ImagePayload;
use tokio::sync::{Notify, RwLock};

/// Media types accepted on `canvas_update`.
pub const SUPPORTED_MEDIA_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

/// Reasons a `canvas_update` payload is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CanvasError {
    /// The payload does not start with `data:`.
    #[error("payload is not a data URL")]
    MissingScheme,

    /// No `,` separates the header from the payload.
    #[error("data URL has no payload separator")]
    MissingSeparator,

    /// The header does not declare base64 encoding.
    #[error("data URL is not base64 encoded")]
    NotBase64,

    /// The media type is not one of [`SUPPORTED_MEDIA_TYPES`].
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The payload is not valid base64 or decodes to nothing.
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
}

/// A decoded canvas image.
///
/// The blank snapshot (no bytes, no media type) stands for a cleared
/// canvas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanvasSnapshot {
    /// Decoded image bytes.
    pub bytes: Vec<u8>,
    /// Media type of `bytes`.
    pub mime_type: String,
}

impl CanvasSnapshot {
    /// The cleared canvas.
    pub const fn blank() -> Self {
        Self {
            bytes: Vec::new(),
            mime_type: String::new(),
        }
    }

    /// Whether this is the cleared canvas.
    pub fn is_blank(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Wire form for an `image` event; `None` for the cleared canvas.
    pub fn image_payload(&self) -> Option<ImagePayload> {
        if self.is_blank() {
            return None;
        }
        Some(ImagePayload {
            media_type: self.mime_type.clone(),
            base64: STANDARD.encode(&self.bytes),
        })
    }
}

/// Decode a `data:<media-type>;base64,<payload>` URL.
///
/// The empty string decodes to [`CanvasSnapshot::blank`].
pub fn decode_data_url(encoded: &str) -> Result<CanvasSnapshot, CanvasError> {
    if encoded.is_empty() {
        return Ok(CanvasSnapshot::blank());
    }

    let rest = encoded
        .strip_prefix("data:")
        .ok_or(CanvasError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(CanvasError::MissingSeparator)?;

    let mut params = header.split(';');
    let mime_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(CanvasError::NotBase64);
    }
    if !SUPPORTED_MEDIA_TYPES.contains(&mime_type.as_str()) {
        return Err(CanvasError::UnsupportedMediaType(mime_type));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| CanvasError::InvalidPayload(e.to_string()))?;
    if bytes.is_empty() {
        return Err(CanvasError::InvalidPayload(String::from("empty image")));
    }

    Ok(CanvasSnapshot { bytes, mime_type })
}

/// Result of an accepted canvas update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasUpdate {
    /// The snapshot was replaced; carries the new snapshot.
    Changed(Arc<CanvasSnapshot>),
    /// The update was identical to the current snapshot.
    Unchanged,
}

/// Holds the single latest canvas snapshot.
#[derive(Debug)]
pub struct CanvasStore {
    /// The current snapshot. Replaced, never edited.
    latest: RwLock<Arc<CanvasSnapshot>>,

    /// Coalescing change signal. `notify_one` stores at most one permit.
    changed: Notify,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasStore {
    /// Create a store holding the blank canvas.
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(Arc::new(CanvasSnapshot::blank())),
            changed: Notify::new(),
        }
    }

    /// Decode `encoded` and make it the latest snapshot.
    ///
    /// On error the previous snapshot is kept and no signal is raised.
    pub async fn update(&self, encoded: &str) -> Result<CanvasUpdate, CanvasError> {
        let snapshot = decode_data_url(encoded)?;
        Ok(self.replace(snapshot).await)
    }

    /// Replace the snapshot with the blank canvas.
    pub async fn clear(&self) -> CanvasUpdate {
        self.replace(CanvasSnapshot::blank()).await
    }

    /// The latest snapshot (blank if nothing was drawn).
    pub async fn latest(&self) -> Arc<CanvasSnapshot> {
        Arc::clone(&*self.latest.read().await)
    }

    /// Wait for the next change signal and consume it.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    async fn replace(&self, snapshot: CanvasSnapshot) -> CanvasUpdate {
        let mut latest = self.latest.write().await;
        if **latest == snapshot {
            return CanvasUpdate::Unchanged;
        }
        let snapshot = Arc::new(snapshot);
        *latest = Arc::clone(&snapshot);
        drop(latest);
        self.changed.notify_one();
        CanvasUpdate::Changed(snapshot)
    }
}
