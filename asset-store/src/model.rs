//! Catalog records.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a source asset, assigned by the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub i64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a derived content identity. Names the asset's cache directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub i64);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An original file tracked by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAsset {
    /// Asset id.
    pub id: AssetId,

    /// Location of the file on disk.
    pub path: PathBuf,

    /// Mime type recorded when the file was indexed.
    pub mime: String,
}

impl SourceAsset {
    /// Create a new source asset record.
    pub fn new(id: AssetId, path: impl Into<PathBuf>, mime: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            mime: mime.into(),
        }
    }
}

/// Stable secondary identity of an asset, one-to-one with [`SourceAsset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedContentIdentity {
    /// Identity id.
    pub id: ContentId,

    /// The asset this identity belongs to.
    pub asset_id: AssetId,

    /// When the identity was first requested.
    pub created_at: DateTime<Utc>,
}
