//! Content identity and cache path resolution.
//!
//! Cache paths are a pure function of the asset's derived content identity,
//! the content kind and the destination mime:
//!
//! ```text
//! {cache_root}/{identity}/Thumbnail.{ext}
//! {temp_cache_root}/{identity}/Viewable.{ext}
//! ```
//!
//! Nothing here touches the cache directories; creating them is the
//! generator's job.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetag_asset_store::{AssetId, AssetStore, ContentId, SourceAsset};
use serde::{Deserialize, Serialize};

use crate::config::ContentConfig;
use crate::error::{ContentError, Result};
use crate::mime::MimeType;

/// The two kinds of derived content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Bounded-size rendition, kept in the durable tier.
    Thumbnail,

    /// Full-fidelity rendition, kept in the temporary tier.
    Viewable,
}

impl ContentKind {
    /// File stem of artifacts of this kind.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Thumbnail => "Thumbnail",
            Self::Viewable => "Viewable",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thumbnail => f.write_str("thumbnail"),
            Self::Viewable => f.write_str("viewable"),
        }
    }
}

/// Maps asset ids to source files, identities and cache paths.
#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn AssetStore>,
    cache_root: PathBuf,
    temp_cache_root: PathBuf,
}

impl PathResolver {
    pub fn new(store: Arc<dyn AssetStore>, config: &ContentConfig) -> Self {
        Self {
            store,
            cache_root: config.cache_root.clone(),
            temp_cache_root: config.temp_cache_root.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    /// Root of the tier holding `kind`.
    pub fn root(&self, kind: ContentKind) -> &Path {
        match kind {
            ContentKind::Thumbnail => &self.cache_root,
            ContentKind::Viewable => &self.temp_cache_root,
        }
    }

    /// The source asset, or [`ContentError::AssetNotFound`].
    pub async fn source_asset(&self, asset_id: AssetId) -> Result<SourceAsset> {
        self.store
            .asset(asset_id)
            .await?
            .ok_or(ContentError::AssetNotFound(asset_id))
    }

    pub async fn source_file_path(&self, asset_id: AssetId) -> Result<PathBuf> {
        Ok(self.source_asset(asset_id).await?.path)
    }

    /// Derived content identity, created on first use.
    pub async fn content_identity(&self, asset_id: AssetId) -> Result<ContentId> {
        Ok(self.store.get_or_create_identity(asset_id).await?.id)
    }

    pub async fn cache_directory(&self, asset_id: AssetId) -> Result<PathBuf> {
        self.directory(asset_id, ContentKind::Thumbnail).await
    }

    pub async fn temp_cache_directory(&self, asset_id: AssetId) -> Result<PathBuf> {
        self.directory(asset_id, ContentKind::Viewable).await
    }

    /// Directory holding artifacts of `kind` for an asset.
    pub async fn directory(&self, asset_id: AssetId, kind: ContentKind) -> Result<PathBuf> {
        let identity = self.content_identity(asset_id).await?;
        Ok(self.directory_for(identity, kind))
    }

    /// Path of the `kind` artifact with extension `ext`.
    pub async fn file_path(
        &self,
        asset_id: AssetId,
        kind: ContentKind,
        ext: &str,
    ) -> Result<PathBuf> {
        let identity = self.content_identity(asset_id).await?;
        Ok(self.file_path_for(identity, kind, ext))
    }

    /// Path of the `kind` artifact for `mime`, using its canonical extension.
    pub async fn artifact_path(
        &self,
        asset_id: AssetId,
        kind: ContentKind,
        mime: &MimeType,
    ) -> Result<PathBuf> {
        self.file_path(asset_id, kind, &mime.extension()).await
    }

    /// Like [`PathResolver::directory`], but never creates an identity.
    /// `None` means nothing was ever generated for the asset.
    pub async fn existing_directory(
        &self,
        asset_id: AssetId,
        kind: ContentKind,
    ) -> Result<Option<PathBuf>> {
        Ok(self
            .store
            .find_identity(asset_id)
            .await?
            .map(|identity| self.directory_for(identity.id, kind)))
    }

    fn directory_for(&self, identity: ContentId, kind: ContentKind) -> PathBuf {
        self.root(kind).join(identity.to_string())
    }

    fn file_path_for(&self, identity: ContentId, kind: ContentKind, ext: &str) -> PathBuf {
        self.directory_for(identity, kind).join(artifact_file_name(kind, ext))
    }
}

/// `Thumbnail.webp`, `Viewable.mp4`, ...
pub fn artifact_file_name(kind: ContentKind, ext: &str) -> String {
    format!("{}.{}", kind.file_stem(), ext.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::{image, video};
    use filetag_asset_store::AssetCatalog;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn resolver(root: &Path) -> (PathResolver, Arc<AssetCatalog>) {
        let catalog = Arc::new(AssetCatalog::in_memory());
        catalog
            .insert(SourceAsset::new(AssetId(5), "/media/clip.mp4", "video/mp4"))
            .await
            .unwrap();
        let resolver = PathResolver::new(catalog.clone(), &ContentConfig::new(root));
        (resolver, catalog)
    }

    #[tokio::test]
    async fn test_paths_are_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(temp_dir.path()).await;

        let first = resolver
            .file_path(AssetId(5), ContentKind::Thumbnail, "webp")
            .await
            .unwrap();
        let second = resolver
            .artifact_path(AssetId(5), ContentKind::Thumbnail, &image::WEBP)
            .await
            .unwrap();
        assert_eq!(first, second);

        let identity = resolver.content_identity(AssetId(5)).await.unwrap();
        assert_eq!(
            first,
            temp_dir
                .path()
                .join("cache")
                .join(identity.to_string())
                .join("Thumbnail.webp")
        );
    }

    #[tokio::test]
    async fn test_tiers() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(temp_dir.path()).await;

        let viewable = resolver
            .artifact_path(AssetId(5), ContentKind::Viewable, &video::OGG)
            .await
            .unwrap();
        assert!(viewable.starts_with(temp_dir.path().join("temporary")));
        assert!(viewable.ends_with("Viewable.ogv"));
        assert_eq!(
            resolver.cache_directory(AssetId(5)).await.unwrap().file_name(),
            resolver.temp_cache_directory(AssetId(5)).await.unwrap().file_name()
        );
    }

    #[tokio::test]
    async fn test_path_computation_creates_no_directories() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(temp_dir.path()).await;
        resolver
            .file_path(AssetId(5), ContentKind::Viewable, "webm")
            .await
            .unwrap();
        assert!(!temp_dir.path().join("cache").exists());
        assert!(!temp_dir.path().join("temporary").exists());
    }

    #[tokio::test]
    async fn test_unknown_asset() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(temp_dir.path()).await;
        assert!(matches!(
            resolver.source_file_path(AssetId(99)).await,
            Err(ContentError::AssetNotFound(AssetId(99)))
        ));
        assert!(matches!(
            resolver.content_identity(AssetId(99)).await,
            Err(ContentError::AssetNotFound(AssetId(99)))
        ));
    }

    #[tokio::test]
    async fn test_existing_directory_does_not_create_identity() {
        let temp_dir = TempDir::new().unwrap();
        let (resolver, catalog) = resolver(temp_dir.path()).await;

        let dir = resolver
            .existing_directory(AssetId(5), ContentKind::Thumbnail)
            .await
            .unwrap();
        assert_eq!(dir, None);
        assert!(catalog.find_identity(AssetId(5)).await.unwrap().is_none());

        let created = resolver.cache_directory(AssetId(5)).await.unwrap();
        let dir = resolver
            .existing_directory(AssetId(5), ContentKind::Thumbnail)
            .await
            .unwrap();
        assert_eq!(dir, Some(created));
    }
}
