//! Media sources and playable handles
//!
//! A [`MediaSource`] turns a locator into a [`PlayableHandle`]. Loads are
//! blocking and run on cache loader threads, never on the session thread.

use super::Locator;
use crate::{Result, TheatreError};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Container format detected from the clip header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaFormat {
    Mp4,
    WebM,
    Ogg,
}

impl MediaFormat {
    /// Detect the container from the first bytes of a file
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            Some(MediaFormat::Mp4)
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            Some(MediaFormat::WebM)
        } else if bytes.starts_with(b"OggS") {
            Some(MediaFormat::Ogg)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::WebM => "video/webm",
            MediaFormat::Ogg => "video/ogg",
        }
    }
}

/// A loaded clip, ready to attach to a video slot
///
/// Cloning is cheap; the clip bytes are shared.
#[derive(Clone, Debug)]
pub struct PlayableHandle {
    locator: Locator,
    format: MediaFormat,
    data: Arc<[u8]>,
}

impl PlayableHandle {
    /// Wrap decoded bytes, rejecting empty or unrecognised clips
    pub fn from_bytes(locator: Locator, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(TheatreError::AssetLoadError(format!("{} is empty", locator)));
        }
        let format = MediaFormat::sniff(&bytes).ok_or_else(|| {
            TheatreError::AssetLoadError(format!("{} is not a supported video container", locator))
        })?;
        Ok(Self {
            locator,
            format,
            data: bytes.into(),
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fetches and decodes clips
pub trait MediaSource: Send + Sync {
    /// Load the clip behind `locator`. Called from a loader thread.
    fn load(&self, locator: &Locator) -> Result<PlayableHandle>;
}

/// Loads clips from a directory on disk
#[derive(Clone, Debug)]
pub struct FileMediaSource {
    root: PathBuf,
}

impl FileMediaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a locator under the root; absolute paths and `..` are refused
    pub fn resolve(&self, locator: &Locator) -> Result<PathBuf> {
        let relative = Path::new(locator.as_str());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(TheatreError::AssetLoadError(format!(
                "{} escapes the asset root",
                locator
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl MediaSource for FileMediaSource {
    fn load(&self, locator: &Locator) -> Result<PlayableHandle> {
        let path = self.resolve(locator)?;
        let bytes = fs::read(&path).map_err(|e| {
            TheatreError::AssetLoadError(format!("{}: {}", path.display(), e))
        })?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        PlayableHandle::from_bytes(locator.clone(), bytes)
    }
}
