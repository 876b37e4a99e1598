//! Clip catalog, media sources and the per-state clip cache

pub mod cache;
pub mod catalog;
pub mod source;

pub use cache::{AssetCache, LoadOutcome, LoadStatus};
pub use catalog::{AssetCatalog, Locator};
pub use source::{FileMediaSource, MediaFormat, MediaSource, PlayableHandle};
