//! # Asset Store
//!
//! Read side of the filetag metadata store as seen by the content cache.
//!
//! - **Source assets**: the original files tracked by the server, with their
//!   path and mime type.
//! - **Derived content identities**: a stable secondary id per asset, created
//!   lazily and used only to name cache directories. Renaming or moving the
//!   source never changes it.
//!
//! The [`AssetStore`] trait is the seam the content generator depends on.
//! [`AssetCatalog`] is the bundled implementation, either purely in memory or
//! persisted to a single JSON file.

pub mod catalog;
pub mod error;
pub mod model;

pub use catalog::AssetCatalog;
pub use error::{Result, StoreError};
pub use model::{AssetId, ContentId, DerivedContentIdentity, SourceAsset};

use async_trait::async_trait;

/// Access to source assets and their derived content identities.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch a source asset by id. `Ok(None)` when the id is unknown.
    async fn asset(&self, id: AssetId) -> Result<Option<SourceAsset>>;

    /// The derived identity of an asset, if one was already created.
    async fn find_identity(&self, asset_id: AssetId) -> Result<Option<DerivedContentIdentity>>;

    /// Return the derived identity for an asset, creating it on first use.
    ///
    /// Fails with [`StoreError::AssetNotFound`] when the asset does not exist.
    async fn get_or_create_identity(&self, asset_id: AssetId) -> Result<DerivedContentIdentity>;
}
