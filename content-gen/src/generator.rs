//! Producing derived content for an asset.

use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use filetag_asset_store::{AssetId, SourceAsset};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::converter::SharedConverter;
use crate::error::{ContentError, Result};
use crate::fallback::first_success;
use crate::inflight::InFlight;
use crate::mime::MimeType;
use crate::registry::{ConverterRegistry, ConverterSet};
use crate::resolver::{ContentKind, PathResolver};

type GenerationKey = (AssetId, ContentKind, MimeType);

/// Runs converters and stores their output in the cache.
pub struct ContentGenerator {
    resolver: PathResolver,
    converters: Arc<ConverterSet>,
    inflight: InFlight<GenerationKey, bool>,
}

impl ContentGenerator {
    pub fn new(resolver: PathResolver, converters: Arc<ConverterSet>) -> Self {
        Self {
            resolver,
            converters,
            inflight: InFlight::new(),
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn converters(&self) -> &ConverterSet {
        &self.converters
    }

    fn registry(&self, kind: ContentKind) -> &ConverterRegistry {
        match kind {
            ContentKind::Thumbnail => &self.converters.thumbnail,
            ContentKind::Viewable => &self.converters.viewable,
        }
    }

    /// Generate the thumbnail of an asset in `dest`.
    ///
    /// `Ok(false)` when no converter handles the pair; nothing is created in
    /// that case.
    pub async fn generate_thumbnail(&self, asset_id: AssetId, dest: &MimeType) -> Result<bool> {
        self.generate(asset_id, ContentKind::Thumbnail, dest).await
    }

    /// Generate the viewable of an asset in `dest`.
    pub async fn generate_viewable(&self, asset_id: AssetId, dest: &MimeType) -> Result<bool> {
        self.generate(asset_id, ContentKind::Viewable, dest).await
    }

    /// Generate the first thumbnail mime that succeeds.
    pub async fn generate_first_thumbnail(
        &self,
        asset_id: AssetId,
        mimes: &[MimeType],
    ) -> Result<Option<MimeType>> {
        self.generate_first(asset_id, ContentKind::Thumbnail, mimes).await
    }

    /// Generate the first viewable mime that succeeds.
    pub async fn generate_first_viewable(
        &self,
        asset_id: AssetId,
        mimes: &[MimeType],
    ) -> Result<Option<MimeType>> {
        self.generate_first(asset_id, ContentKind::Viewable, mimes).await
    }

    /// Attempt every thumbnail mime, returning one outcome per mime.
    pub async fn generate_each_thumbnail(
        &self,
        asset_id: AssetId,
        mimes: &[MimeType],
    ) -> Vec<(MimeType, Result<bool>)> {
        self.generate_each(asset_id, ContentKind::Thumbnail, mimes).await
    }

    /// Attempt every viewable mime, returning one outcome per mime.
    pub async fn generate_each_viewable(
        &self,
        asset_id: AssetId,
        mimes: &[MimeType],
    ) -> Vec<(MimeType, Result<bool>)> {
        self.generate_each(asset_id, ContentKind::Viewable, mimes).await
    }

    pub async fn generate_first(
        &self,
        asset_id: AssetId,
        kind: ContentKind,
        mimes: &[MimeType],
    ) -> Result<Option<MimeType>> {
        first_success(mimes.iter().cloned(), |dest| {
            let dest = dest.clone();
            async move { self.generate(asset_id, kind, &dest).await }
        })
        .await
    }

    pub async fn generate_each(
        &self,
        asset_id: AssetId,
        kind: ContentKind,
        mimes: &[MimeType],
    ) -> Vec<(MimeType, Result<bool>)> {
        let mut outcomes = Vec::with_capacity(mimes.len());
        for dest in mimes {
            let outcome = self.generate(asset_id, kind, dest).await;
            outcomes.push((dest.clone(), outcome));
        }
        outcomes
    }

    /// Generate one artifact. Concurrent calls for the same asset, kind and
    /// mime share a single conversion.
    pub async fn generate(
        &self,
        asset_id: AssetId,
        kind: ContentKind,
        dest: &MimeType,
    ) -> Result<bool> {
        let asset = self.resolver.source_asset(asset_id).await?;
        let source_mime = MimeType::new(&asset.mime);

        let Some(converter) = self.registry(kind).lookup(&source_mime, dest) else {
            debug!("No {kind} converter for {source_mime} -> {dest}");
            return Ok(false);
        };

        let path = self.resolver.artifact_path(asset_id, kind, dest).await?;
        self.inflight
            .run((asset_id, kind, dest.clone()), || {
                self.produce(&asset, kind, converter, &path)
            })
            .await
    }

    async fn produce(
        &self,
        asset: &SourceAsset,
        kind: ContentKind,
        converter: SharedConverter,
        path: &Path,
    ) -> Result<bool> {
        let start = Instant::now();
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let input = match tokio::fs::read(&asset.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ContentError::SourceMissing {
                    asset_id: asset.id,
                    path: asset.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Converting asset {} with {}", asset.id, converter.describe());
        let output = converter.convert(&input).await?;
        drop(input);

        let size = output.len();
        write_atomic(path, output).await?;
        info!(
            "Generated {kind} for asset {} ({size} bytes) at {} in {}ms",
            asset.id,
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(true)
    }
}

/// Write through a temporary file in the destination directory, then rename
/// into place. Readers see either the old file or the complete new one.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            )
        })?;
        // Retention pruning may have removed the directory since `produce`
        // created it.
        std::fs::create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::converter::from_fn;
    use crate::mime::image;
    use filetag_asset_store::{AssetCatalog, AssetStore};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn setup(
        root: &Path,
        converters: ConverterSet,
    ) -> (ContentGenerator, Arc<AssetCatalog>) {
        let catalog = Arc::new(AssetCatalog::in_memory());
        let source = root.join("source.png");
        std::fs::write(&source, b"png bytes").unwrap();
        catalog
            .insert(SourceAsset::new(AssetId(1), source, "image/png"))
            .await
            .unwrap();
        let resolver = PathResolver::new(catalog.clone(), &ContentConfig::new(root));
        (ContentGenerator::new(resolver, Arc::new(converters)), catalog)
    }

    #[tokio::test]
    async fn test_write_survives_directory_removed_during_conversion() {
        let temp_dir = TempDir::new().unwrap();
        let tier_root = ContentConfig::new(temp_dir.path()).temp_cache_root;
        let mut set = ConverterSet::new();
        let pruned = tier_root.clone();
        set.viewable.register(
            image::PNG,
            image::WEBP,
            from_fn("prune then copy", move |input| {
                std::fs::remove_dir_all(&pruned).unwrap();
                Ok(input.to_vec())
            }),
        );
        let (generator, _catalog) = setup(temp_dir.path(), set).await;

        assert!(generator.generate_viewable(AssetId(1), &image::WEBP).await.unwrap());
        let path = generator
            .resolver()
            .artifact_path(AssetId(1), ContentKind::Viewable, &image::WEBP)
            .await
            .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_unregistered_pair_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (generator, catalog) = setup(temp_dir.path(), ConverterSet::new()).await;

        assert!(!generator.generate_viewable(AssetId(1), &image::WEBP).await.unwrap());
        assert!(!temp_dir.path().join("temporary").exists());
        assert!(catalog.find_identity(AssetId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generates_into_the_durable_tier() {
        let temp_dir = TempDir::new().unwrap();
        let mut set = ConverterSet::new();
        set.thumbnail.register(
            image::PNG,
            image::WEBP,
            from_fn("upper", |input| Ok(input.to_ascii_uppercase())),
        );
        let (generator, _) = setup(temp_dir.path(), set).await;

        assert!(generator.generate_thumbnail(AssetId(1), &image::WEBP).await.unwrap());
        let path = generator
            .resolver()
            .artifact_path(AssetId(1), ContentKind::Thumbnail, &image::WEBP)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PNG BYTES".to_vec());

        // No stray temporary files next to the artifact.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_no_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let mut set = ConverterSet::new();
        set.thumbnail.register(
            image::PNG,
            image::GIF,
            from_fn("broken", |_| Err(ContentError::tool_failure("magick", "corrupt"))),
        );
        let (generator, _) = setup(temp_dir.path(), set).await;

        let err = generator
            .generate_thumbnail(AssetId(1), &image::GIF)
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        let path = generator
            .resolver()
            .artifact_path(AssetId(1), ContentKind::Thumbnail, &image::GIF)
            .await
            .unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let mut set = ConverterSet::new();
        set.viewable
            .register(image::PNG, image::PNG, from_fn("copy", |input| Ok(input.to_vec())));
        let (generator, _) = setup(temp_dir.path(), set).await;
        std::fs::remove_file(temp_dir.path().join("source.png")).unwrap();

        let err = generator
            .generate_viewable(AssetId(1), &image::PNG)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::SourceMissing { asset_id: AssetId(1), .. }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_unknown_asset() {
        let temp_dir = TempDir::new().unwrap();
        let (generator, _) = setup(temp_dir.path(), ConverterSet::new()).await;
        let err = generator
            .generate_thumbnail(AssetId(404), &image::WEBP)
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::AssetNotFound(AssetId(404))));
    }

    #[tokio::test]
    async fn test_generate_each_reports_every_mime() {
        let temp_dir = TempDir::new().unwrap();
        let mut set = ConverterSet::new();
        set.thumbnail
            .register(image::PNG, image::JPEG, from_fn("ok", |input| Ok(input.to_vec())));
        set.thumbnail.register(
            image::PNG,
            image::GIF,
            from_fn("fails", |_| Err(ContentError::tool_failure("image", "nope"))),
        );
        let (generator, _) = setup(temp_dir.path(), set).await;

        let outcomes = generator
            .generate_each_thumbnail(AssetId(1), &[image::WEBP, image::GIF, image::JPEG])
            .await;
        let summary: Vec<(MimeType, Option<bool>)> = outcomes
            .into_iter()
            .map(|(mime, outcome)| (mime, outcome.ok()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (image::WEBP, Some(false)),
                (image::GIF, None),
                (image::JPEG, Some(true)),
            ]
        );
    }
}
