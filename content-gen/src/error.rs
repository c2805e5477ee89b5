//! Error types for content generation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use filetag_asset_store::{AssetId, StoreError};
use thiserror::Error;

use crate::locator::ToolKind;
use crate::mime::MimeType;

/// Result type alias for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Errors that can occur while generating or resolving content.
#[derive(Error, Debug)]
pub enum ContentError {
    /// No converter can produce this pair.
    #[error("unsupported conversion: {source_mime} -> {dest_mime}")]
    UnsupportedConversion {
        source_mime: MimeType,
        dest_mime: MimeType,
    },

    /// External tool reported a failure.
    #[error("{tool} failed: {message}")]
    ToolFailure { tool: String, message: String },

    /// External tool did not finish in time.
    #[error("{tool} timed out after {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    /// External tool is not installed or not configured.
    #[error("tool unavailable: {0}")]
    ToolUnavailable(ToolKind),

    /// Raster library failed to decode or encode.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Source file of a known asset is gone.
    #[error("source file missing for asset {asset_id}: {}", path.display())]
    SourceMissing { asset_id: AssetId, path: PathBuf },

    /// Unknown asset id.
    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    /// A pipe needs at least two stages.
    #[error("piping requires at least 2 converters, got {0}")]
    InvalidPipe(usize),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Asset store error.
    #[error("store error: {0}")]
    Store(StoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error produced once and handed to every caller waiting on the same generation.
    #[error(transparent)]
    Shared(Arc<ContentError>),
}

impl ContentError {
    /// Whether the fallback loop may move on to the next candidate.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnsupportedConversion { .. }
            | Self::ToolFailure { .. }
            | Self::ToolTimeout { .. }
            | Self::ToolUnavailable(_)
            | Self::Image(_) => true,
            Self::Shared(inner) => inner.is_recoverable(),
            _ => false,
        }
    }

    /// Take back an error shared between callers, unwrapping it when this was the last holder.
    pub(crate) fn from_shared(shared: Arc<ContentError>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(Self::Shared)
    }

    pub(crate) fn tool_failure(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for ContentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AssetNotFound(id) => Self::AssetNotFound(id),
            other => Self::Store(other),
        }
    }
}
