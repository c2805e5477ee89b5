//! # Content Generation
//!
//! On-demand thumbnails and viewable renditions for filetag assets, cached on
//! disk under the asset's derived content identity.
//!
//! - **Registry**: converters keyed by exact (source mime, destination mime)
//!   pairs, one registry for thumbnails and one for viewables
//! - **Adapters**: ffmpeg, ImageMagick, Poppler, LibreOffice and an
//!   in-process raster path, all behind the [`Converter`] trait
//! - **Generator**: runs a converter once per artifact, writes atomically and
//!   collapses concurrent duplicate requests
//! - **Manager**: preference lists per media category, pure cache reads and
//!   retention pruning
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ContentManager                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  preference lists ──► first_success ──► ContentGenerator        │
//! │                                            │         │          │
//! │                                            ▼         ▼          │
//! │                             ConverterSet lookup   PathResolver  │
//! │                                    │                  │         │
//! │                                    ▼                  ▼         │
//! │               Converter (ToolCommand | image)   AssetStore      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cache layout:
//!
//! ```text
//! {cache_root}/{identity}/Thumbnail.{ext}
//! {temp_cache_root}/{identity}/Viewable.{ext}
//! ```

// Conversion building blocks
pub mod converter;
pub mod error;
pub mod exec;
pub mod locator;
pub mod mime;
pub mod pipe;
pub mod registry;

// Tool adapters and their registration
pub mod adapters;
pub mod setup;

// Cache and generation
pub mod config;
pub mod fallback;
pub mod generator;
pub mod inflight;
pub mod manager;
pub mod resolver;

pub use config::{ContentConfig, RetentionPolicy, ToolsConfig};
pub use converter::{Converter, SharedConverter, from_fn};
pub use error::{ContentError, Result};
pub use exec::ToolCommand;
pub use generator::ContentGenerator;
pub use locator::{ToolKind, ToolLocator};
pub use manager::{CachedContent, ContentManager, MediaCategory, thumbnail_mimes};
pub use mime::MimeType;
pub use pipe::pipe;
pub use registry::{ConversionKey, ConverterRegistry, ConverterSet};
pub use resolver::{ContentKind, PathResolver};
pub use setup::{Format, FormatList, SelfMapPolicy, register_formats};

// Re-export the store seam for convenience
pub use filetag_asset_store::{AssetCatalog, AssetId, AssetStore, ContentId, SourceAsset};
