//! Catalog of source assets and their derived content identities.
//!
//! The catalog keeps everything in memory and, when opened from a path,
//! rewrites the whole JSON file after every mutation. A mutation whose save
//! fails is rolled back, so memory never runs ahead of the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::AssetStore;
use crate::error::{Result, StoreError};
use crate::model::{AssetId, ContentId, DerivedContentIdentity, SourceAsset};

/// On-disk representation of the catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    assets: Vec<SourceAsset>,
    identities: Vec<DerivedContentIdentity>,
}

#[derive(Debug, Default)]
struct CatalogState {
    assets: HashMap<AssetId, SourceAsset>,
    identities: HashMap<AssetId, DerivedContentIdentity>,
}

impl CatalogState {
    fn next_asset_id(&self) -> AssetId {
        AssetId(self.assets.keys().map(|id| id.0).max().unwrap_or(0) + 1)
    }

    fn next_content_id(&self) -> ContentId {
        ContentId(
            self.identities
                .values()
                .map(|identity| identity.id.0)
                .max()
                .unwrap_or(0)
                + 1,
        )
    }

    fn to_file(&self) -> CatalogFile {
        let mut assets: Vec<SourceAsset> = self.assets.values().cloned().collect();
        assets.sort_by_key(|asset| asset.id);
        let mut identities: Vec<DerivedContentIdentity> =
            self.identities.values().cloned().collect();
        identities.sort_by_key(|identity| identity.id);
        CatalogFile { assets, identities }
    }
}

/// Asset catalog, in memory or persisted to a JSON file.
pub struct AssetCatalog {
    state: RwLock<CatalogState>,

    /// Path for persistent storage.
    path: Option<PathBuf>,
}

impl AssetCatalog {
    /// Create an empty catalog that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            path: None,
        }
    }

    /// Open a catalog persisted at `path`, loading it if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = CatalogState::default();

        if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let file: CatalogFile = serde_json::from_str(&content)?;
            for asset in file.assets {
                state.assets.insert(asset.id, asset);
            }
            for identity in file.identities {
                state.identities.insert(identity.asset_id, identity);
            }
            info!(
                "Loaded {} assets and {} content identities from {}",
                state.assets.len(),
                state.identities.len(),
                path.display()
            );
        }

        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Path of the backing file, if persisted.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace an asset record with a known id.
    pub async fn insert(&self, asset: SourceAsset) -> Result<()> {
        let mut state = self.state.write().await;
        debug!("Catalog insert: asset {} ({})", asset.id, asset.mime);
        let id = asset.id;
        let previous = state.assets.insert(id, asset);
        if let Err(e) = self.save(&state).await {
            match previous {
                Some(previous) => state.assets.insert(id, previous),
                None => state.assets.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Add a new asset, assigning the next free id.
    pub async fn import(
        &self,
        path: impl Into<PathBuf>,
        mime: impl Into<String>,
    ) -> Result<SourceAsset> {
        let mut state = self.state.write().await;
        let asset = SourceAsset::new(state.next_asset_id(), path, mime);
        state.assets.insert(asset.id, asset.clone());
        if let Err(e) = self.save(&state).await {
            state.assets.remove(&asset.id);
            return Err(e);
        }
        info!("Imported asset {}: {}", asset.id, asset.path.display());
        Ok(asset)
    }

    /// List all assets ordered by id.
    pub async fn assets(&self) -> Vec<SourceAsset> {
        let state = self.state.read().await;
        let mut assets: Vec<SourceAsset> = state.assets.values().cloned().collect();
        assets.sort_by_key(|asset| asset.id);
        assets
    }

    /// Persist the catalog if it has a backing file.
    async fn save(&self, state: &CatalogState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&state.to_file())?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StoreError::WriteFile(format!("{}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StoreError::WriteFile(format!("{}: {e}", path.display())))?;

        debug!("Saved catalog to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl AssetStore for AssetCatalog {
    async fn asset(&self, id: AssetId) -> Result<Option<SourceAsset>> {
        Ok(self.state.read().await.assets.get(&id).cloned())
    }

    async fn find_identity(&self, asset_id: AssetId) -> Result<Option<DerivedContentIdentity>> {
        Ok(self.state.read().await.identities.get(&asset_id).cloned())
    }

    async fn get_or_create_identity(&self, asset_id: AssetId) -> Result<DerivedContentIdentity> {
        if let Some(identity) = self.state.read().await.identities.get(&asset_id) {
            return Ok(identity.clone());
        }

        let mut state = self.state.write().await;
        // Another caller may have created it between the two locks.
        if let Some(identity) = state.identities.get(&asset_id) {
            return Ok(identity.clone());
        }
        if !state.assets.contains_key(&asset_id) {
            return Err(StoreError::AssetNotFound(asset_id));
        }

        let identity = DerivedContentIdentity {
            id: state.next_content_id(),
            asset_id,
            created_at: Utc::now(),
        };
        state.identities.insert(asset_id, identity.clone());
        // An identity that never reached disk could be handed to another
        // asset after a restart.
        if let Err(e) = self.save(&state).await {
            state.identities.remove(&asset_id);
            return Err(e);
        }

        debug!("Created content identity {} for asset {asset_id}", identity.id);
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_identity_is_created_once() {
        let catalog = AssetCatalog::in_memory();
        catalog
            .insert(SourceAsset::new(AssetId(7), "/photos/a.png", "image/png"))
            .await
            .unwrap();

        let first = catalog.get_or_create_identity(AssetId(7)).await.unwrap();
        let second = catalog.get_or_create_identity(AssetId(7)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.asset_id, AssetId(7));
    }

    #[tokio::test]
    async fn test_identity_for_unknown_asset() {
        let catalog = AssetCatalog::in_memory();
        let err = catalog.get_or_create_identity(AssetId(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::AssetNotFound(AssetId(1))));
        assert!(catalog.find_identity(AssetId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identities_are_distinct() {
        let catalog = AssetCatalog::in_memory();
        let a = catalog.import("/a.mp4", "video/mp4").await.unwrap();
        let b = catalog.import("/b.mp4", "video/mp4").await.unwrap();

        let ia = catalog.get_or_create_identity(a.id).await.unwrap();
        let ib = catalog.get_or_create_identity(b.id).await.unwrap();

        assert_ne!(ia.id, ib.id);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");

        let identity = {
            let catalog = AssetCatalog::open(&path).await.unwrap();
            let asset = catalog.import("/docs/report.pdf", "application/pdf").await.unwrap();
            assert_eq!(asset.id, AssetId(1));
            catalog.get_or_create_identity(asset.id).await.unwrap()
        };

        let reopened = AssetCatalog::open(&path).await.unwrap();
        let asset = reopened.asset(AssetId(1)).await.unwrap().unwrap();
        assert_eq!(asset.mime, "application/pdf");
        assert_eq!(
            reopened.get_or_create_identity(AssetId(1)).await.unwrap(),
            identity
        );
    }

    #[tokio::test]
    async fn test_import_assigns_sequential_ids() {
        let catalog = AssetCatalog::in_memory();
        catalog
            .insert(SourceAsset::new(AssetId(41), "/x.psd", "image/vnd.adobe.photoshop"))
            .await
            .unwrap();
        let next = catalog.import("/y.png", "image/png").await.unwrap();
        assert_eq!(next.id, AssetId(42));
        assert_eq!(catalog.assets().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.json");
        let blocker = temp_dir.path().join("catalog.json.tmp");
        let catalog = AssetCatalog::open(&path).await.unwrap();

        std::fs::create_dir(&blocker).unwrap();
        let err = catalog
            .insert(SourceAsset::new(AssetId(1), "/a.png", "image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WriteFile(_)));
        assert!(catalog.asset(AssetId(1)).await.unwrap().is_none());
        assert!(catalog.import("/b.png", "image/png").await.is_err());
        assert!(catalog.assets().await.is_empty());

        std::fs::remove_dir(&blocker).unwrap();
        let asset = catalog.import("/c.png", "image/png").await.unwrap();

        std::fs::create_dir(&blocker).unwrap();
        assert!(catalog.get_or_create_identity(asset.id).await.is_err());
        assert!(catalog.find_identity(asset.id).await.unwrap().is_none());

        std::fs::remove_dir(&blocker).unwrap();
        let identity = catalog.get_or_create_identity(asset.id).await.unwrap();
        assert_eq!(identity.id, ContentId(1));

        let reopened = AssetCatalog::open(&path).await.unwrap();
        assert_eq!(reopened.find_identity(asset.id).await.unwrap(), Some(identity));
    }
}
