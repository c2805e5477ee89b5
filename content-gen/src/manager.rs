//! Request-facing façade over the generator and the cache.
//!
//! The manager knows which renditions a browser can use for each media
//! category, in order of preference, and hides recoverable conversion
//! failures: callers only learn whether something usable exists.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use filetag_asset_store::{AssetId, AssetStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{ContentConfig, RetentionPolicy};
use crate::error::{ContentError, Result};
use crate::generator::ContentGenerator;
use crate::locator::ToolLocator;
use crate::mime::{MimeType, application, audio, image, video};
use crate::registry::ConverterSet;
use crate::resolver::{ContentKind, PathResolver, artifact_file_name};

/// Broad kind of media, deciding which viewable formats are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    /// Order in which categories are tried when any viewable will do.
    pub const ANY_ORDER: [MediaCategory; 4] =
        [Self::Image, Self::Audio, Self::Video, Self::Document];

    /// Classify a mime. `None` for mimes no viewable can be made of.
    pub fn of(mime: &MimeType) -> Option<Self> {
        match mime.top_level() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            _ if [
                application::PDF,
                application::POSTSCRIPT,
                application::MSWORD,
                application::DOCX,
                application::ODT,
                application::ODP,
                application::ODS,
            ]
            .contains(mime) =>
            {
                Some(Self::Document)
            }
            _ => None,
        }
    }

    /// Acceptable viewable mimes, most preferred first.
    pub fn viewable_mimes(self) -> Vec<MimeType> {
        match self {
            Self::Image => vec![image::WEBP, image::GIF, image::PNG, image::JPEG],
            Self::Video => vec![video::WEBM, video::MP4],
            Self::Audio => vec![audio::OGG, audio::MPEG],
            Self::Document => vec![application::PDF],
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

/// Acceptable thumbnail mimes, most preferred first.
pub fn thumbnail_mimes() -> Vec<MimeType> {
    vec![image::WEBP, image::GIF, image::JPEG]
}

/// A rendition that exists in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedContent {
    pub path: PathBuf,
    pub mime: MimeType,
    pub category: MediaCategory,
}

/// Entry point for serving derived content.
pub struct ContentManager {
    generator: ContentGenerator,
    tools: ToolLocator,
    thumbnail_retention: RetentionPolicy,
    viewable_retention: RetentionPolicy,
}

impl ContentManager {
    /// Locate tools, register every available converter and build a manager.
    pub fn from_config(store: Arc<dyn AssetStore>, config: &ContentConfig) -> Result<Self> {
        let tools = ToolLocator::discover(&config.tools)?;
        let converters = ConverterSet::build(&tools, config);
        Ok(Self::with_converters(store, config, converters, tools))
    }

    /// Build a manager around an explicit converter set.
    pub fn with_converters(
        store: Arc<dyn AssetStore>,
        config: &ContentConfig,
        converters: ConverterSet,
        tools: ToolLocator,
    ) -> Self {
        let resolver = PathResolver::new(store, config);
        Self {
            generator: ContentGenerator::new(resolver, Arc::new(converters)),
            tools,
            thumbnail_retention: config.thumbnail_retention,
            viewable_retention: config.viewable_retention,
        }
    }

    pub fn generator(&self) -> &ContentGenerator {
        &self.generator
    }

    pub fn tools(&self) -> &ToolLocator {
        &self.tools
    }

    fn resolver(&self) -> &PathResolver {
        self.generator.resolver()
    }

    /// Generate the most preferred thumbnail that can be made.
    pub async fn generate_thumbnails(&self, asset_id: AssetId) -> Result<bool> {
        let generated = self
            .generator
            .generate_first_thumbnail(asset_id, &thumbnail_mimes())
            .await?;
        Ok(generated.is_some())
    }

    /// Generate the most preferred viewable of `category`.
    pub async fn generate_viewable(
        &self,
        asset_id: AssetId,
        category: MediaCategory,
    ) -> Result<bool> {
        let generated = self
            .generator
            .generate_first_viewable(asset_id, &category.viewable_mimes())
            .await?;
        Ok(generated.is_some())
    }

    /// Generate a viewable of whatever category works first.
    pub async fn generate_viewable_any(&self, asset_id: AssetId) -> Result<bool> {
        let generated = self
            .generator
            .generate_first_viewable(asset_id, &viewable_candidates())
            .await?;
        Ok(generated.is_some())
    }

    /// Existing thumbnails, most preferred first. Never generates.
    pub async fn thumbnail_paths(&self, asset_id: AssetId) -> Result<Vec<PathBuf>> {
        let found = self.existing(asset_id, ContentKind::Thumbnail).await?;
        Ok(found.into_iter().map(|content| content.path).collect())
    }

    /// Existing viewables, most preferred first. Never generates.
    pub async fn viewable_paths(&self, asset_id: AssetId) -> Result<Vec<PathBuf>> {
        let found = self.existing(asset_id, ContentKind::Viewable).await?;
        Ok(found.into_iter().map(|content| content.path).collect())
    }

    /// Most preferred existing thumbnail.
    pub async fn cached_thumbnail(&self, asset_id: AssetId) -> Result<Option<CachedContent>> {
        let found = self.existing(asset_id, ContentKind::Thumbnail).await?;
        Ok(found.into_iter().next())
    }

    /// Most preferred existing viewable.
    pub async fn cached_viewable(&self, asset_id: AssetId) -> Result<Option<CachedContent>> {
        let found = self.existing(asset_id, ContentKind::Viewable).await?;
        Ok(found.into_iter().next())
    }

    /// Most preferred existing viewable of `category`, ignoring viewables of
    /// other categories that may rank higher.
    pub async fn cached_viewable_of(
        &self,
        asset_id: AssetId,
        category: MediaCategory,
    ) -> Result<Option<CachedContent>> {
        let found = self.existing(asset_id, ContentKind::Viewable).await?;
        Ok(found.into_iter().find(|content| content.category == category))
    }

    /// Cached viewable of `category`, generating one on a miss.
    pub async fn ensure_viewable_of(
        &self,
        asset_id: AssetId,
        category: MediaCategory,
    ) -> Result<Option<CachedContent>> {
        if let Some(cached) = self.cached_viewable_of(asset_id, category).await? {
            debug!("{category} viewable cache hit for asset {asset_id}");
            return Ok(Some(cached));
        }
        if !self.generate_viewable(asset_id, category).await? {
            return Ok(None);
        }
        self.cached_viewable_of(asset_id, category).await
    }

    /// Category of the asset's source file, if a viewable can be made of it.
    pub async fn source_category(&self, asset_id: AssetId) -> Result<Option<MediaCategory>> {
        let asset = self.resolver().source_asset(asset_id).await?;
        Ok(MediaCategory::of(&MimeType::new(&asset.mime)))
    }

    /// Cached thumbnail, generating one on a miss. `None` when nothing can
    /// be produced.
    pub async fn ensure_thumbnail(&self, asset_id: AssetId) -> Result<Option<CachedContent>> {
        if let Some(cached) = self.cached_thumbnail(asset_id).await? {
            debug!("Thumbnail cache hit for asset {asset_id}");
            return Ok(Some(cached));
        }
        if !self.generate_thumbnails(asset_id).await? {
            return Ok(None);
        }
        self.cached_thumbnail(asset_id).await
    }

    /// Cached viewable, generating one on a miss.
    pub async fn ensure_viewable(&self, asset_id: AssetId) -> Result<Option<CachedContent>> {
        if let Some(cached) = self.cached_viewable(asset_id).await? {
            debug!("Viewable cache hit for asset {asset_id}");
            return Ok(Some(cached));
        }
        if !self.generate_viewable_any(asset_id).await? {
            return Ok(None);
        }
        self.cached_viewable(asset_id).await
    }

    async fn existing(&self, asset_id: AssetId, kind: ContentKind) -> Result<Vec<CachedContent>> {
        // Unknown assets are an error even though no path would exist.
        self.resolver().source_asset(asset_id).await?;

        let Some(dir) = self.resolver().existing_directory(asset_id, kind).await? else {
            return Ok(Vec::new());
        };

        let candidates = match kind {
            ContentKind::Thumbnail => thumbnail_mimes(),
            ContentKind::Viewable => viewable_candidates(),
        };

        let mut found: Vec<CachedContent> = Vec::new();
        for mime in candidates {
            let Some(category) = MediaCategory::of(&mime) else {
                continue;
            };
            let path = dir.join(artifact_file_name(kind, &mime.extension()));
            if found.iter().any(|content| content.path == path) {
                continue;
            }
            if tokio::fs::try_exists(&path).await? {
                found.push(CachedContent {
                    path,
                    mime,
                    category,
                });
            }
        }
        Ok(found)
    }

    /// Remove artifacts older than their tier's retention. Returns the number
    /// of files removed.
    pub async fn prune_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for (kind, policy) in [
            (ContentKind::Thumbnail, self.thumbnail_retention),
            (ContentKind::Viewable, self.viewable_retention),
        ] {
            let Some(max_age) = policy.max_age() else {
                continue;
            };
            let max_age = TimeDelta::from_std(max_age)
                .map_err(|e| ContentError::Config(format!("{kind} retention: {e}")))?;
            let cutoff = Utc::now() - max_age;
            let root = self.resolver().root(kind).to_path_buf();

            let count = tokio::task::spawn_blocking(move || prune_tier(&root, kind, cutoff))
                .await
                .map_err(std::io::Error::other)??;
            if count > 0 {
                info!("Pruned {count} expired {kind} artifacts");
            }
            removed += count;
        }
        Ok(removed)
    }
}

/// Every viewable mime, in "any" order.
fn viewable_candidates() -> Vec<MimeType> {
    let mut candidates: Vec<MimeType> = Vec::new();
    for category in MediaCategory::ANY_ORDER {
        for mime in category.viewable_mimes() {
            if !candidates.contains(&mime) {
                candidates.push(mime);
            }
        }
    }
    candidates
}

fn prune_tier(root: &Path, kind: ContentKind, cutoff: DateTime<Utc>) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }

    let prefix = format!("{}.", kind.file_stem());
    let mut removed = 0;
    // {root}/{identity}/{artifact}
    for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable cache entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file()
            || !entry.file_name().to_string_lossy().starts_with(&prefix)
        {
            continue;
        }

        let modified: DateTime<Utc> = entry
            .metadata()
            .map_err(std::io::Error::from)?
            .modified()?
            .into();
        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed expired {}", entry.path().display());
                removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(dir) = entry.path().parent() {
            // Only succeeds once the directory is empty.
            let _ = std::fs::remove_dir(dir);
        }
    }
    Ok(removed)
}
