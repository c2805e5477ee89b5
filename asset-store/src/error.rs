//! Error types for the asset store.

use thiserror::Error;

use crate::model::AssetId;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the asset store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No asset with this id.
    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),

    /// Failed to write the catalog file.
    #[error("failed to write catalog: {0}")]
    WriteFile(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
