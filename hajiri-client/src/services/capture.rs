//! Camera frame capture
//!
//! A [`FrameSource`] stands in for the live camera. The recognition cycle
//! asks it for a short burst of stills; any frame the source fails to produce
//! is skipped, so a stalled camera simply yields a shorter batch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hajiri_common::config::CaptureConfig;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, ClientResult};

/// Anything that can hand over a still image on demand
pub trait FrameSource: Send {
    /// Grab one frame as a `data:image/...;base64,` URL or bare base64
    ///
    /// Returns `None` when the camera has nothing to offer right now.
    fn capture_frame(&mut self) -> Option<String>;
}

/// Capture up to `frame_count` frames, pausing after each one produced
///
/// Data-URL prefixes are stripped so the result is ready for the
/// recognition endpoint. Not cancellable once started.
pub async fn capture_burst(source: &mut dyn FrameSource, settings: &CaptureConfig) -> Vec<String> {
    let mut frames = Vec::with_capacity(settings.frame_count);

    for attempt in 0..settings.frame_count {
        let Some(frame) = source.capture_frame() else {
            tracing::debug!(attempt, "Camera produced no frame, skipping");
            continue;
        };

        frames.push(strip_data_url_prefix(&frame).to_string());

        if !settings.frame_interval().is_zero() {
            tokio::time::sleep(settings.frame_interval()).await;
        }
    }

    tracing::debug!(
        captured = frames.len(),
        requested = settings.frame_count,
        "Capture burst finished"
    );
    frames
}

/// Remove a leading `data:image/<kind>;base64,` if present
///
/// `<kind>` must be word characters (`jpeg`, `png`, ...); anything else is
/// returned unchanged.
pub fn strip_data_url_prefix(frame: &str) -> &str {
    if let Some(rest) = frame.strip_prefix("data:image/") {
        if let Some((kind, payload)) = rest.split_once(";base64,") {
            let is_word = !kind.is_empty()
                && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if is_word {
                return payload;
            }
        }
    }
    frame
}

/// Encode raw image bytes as a data URL
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode a frame (data URL or bare base64) back to bytes
pub fn decode_frame(frame: &str) -> ClientResult<Vec<u8>> {
    STANDARD
        .decode(strip_data_url_prefix(frame).trim())
        .map_err(|e| ClientError::Validation(format!("Frame is not valid base64: {}", e)))
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Frames read from image files, one file per capture
///
/// Stands in for a webcam when frames were taken by another program.
pub struct FileFrameSource {
    pending: VecDeque<PathBuf>,
}

impl FileFrameSource {
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            pending: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Every JPEG/PNG in `dir`, in file-name order
    pub fn from_dir(dir: &Path) -> ClientResult<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && mime_for(path).is_some())
            .collect();
        paths.sort();

        if paths.is_empty() {
            tracing::warn!(dir = %dir.display(), "No image files found for capture");
        }
        Ok(Self::from_paths(paths))
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for FileFrameSource {
    fn capture_frame(&mut self) -> Option<String> {
        let path = self.pending.pop_front()?;
        let mime = mime_for(&path).unwrap_or("image/jpeg");

        match std::fs::read(&path) {
            Ok(bytes) => Some(to_data_url(mime, &bytes)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read frame");
                None
            }
        }
    }
}
