//! `filetag-content`: manage the filetag thumbnail and viewable cache.
//!
//! ```bash
//! filetag-content import ~/Pictures/cover.psd
//! filetag-content thumbnail 1
//! filetag-content viewable 1 --category image
//! filetag-content paths 1
//! filetag-content prune
//! ```
//!
//! Logs go to stderr and are controlled with `RUST_LOG` (default `info`).

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use filetag_asset_store::{AssetCatalog, AssetId};
use filetag_content_gen::{
    CachedContent, ContentKind, ContentManager, MediaCategory, MimeType, ToolKind,
};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "filetag-content")]
#[command(about = "Generate and inspect derived content for filetag assets", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to {config_dir}/filetag/content.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a file as a source asset
    Import {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Mime type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Return a cached thumbnail, generating one if needed
    Thumbnail {
        #[arg(value_name = "ASSET_ID")]
        asset_id: i64,
    },

    /// Return a cached viewable, generating one if needed
    Viewable {
        #[arg(value_name = "ASSET_ID")]
        asset_id: i64,

        /// Only consider formats of this category
        #[arg(long, value_enum)]
        category: Option<Category>,
    },

    /// List cached artifacts of an asset without generating anything
    Paths {
        #[arg(value_name = "ASSET_ID")]
        asset_id: i64,
    },

    /// Show where each external tool was found
    Tools,

    /// List every registered conversion
    Formats,

    /// Remove artifacts past their retention
    Prune,
}

#[derive(Clone, Copy, ValueEnum)]
enum Category {
    Image,
    Video,
    Audio,
    Document,
}

impl From<Category> for MediaCategory {
    fn from(category: Category) -> Self {
        match category {
            Category::Image => MediaCategory::Image,
            Category::Video => MediaCategory::Video,
            Category::Audio => MediaCategory::Audio,
            Category::Document => MediaCategory::Document,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref()).await?;
    run(cli.command, config).await
}

async fn run(command: Command, config: CliConfig) -> anyhow::Result<()> {
    let catalog = Arc::new(
        AssetCatalog::open(&config.catalog_path)
            .await
            .with_context(|| format!("failed to open catalog {}", config.catalog_path.display()))?,
    );

    let manager = || {
        ContentManager::from_config(catalog.clone(), &config.content)
            .context("failed to set up converters")
    };

    match command {
        Command::Import { path, mime } => import(&catalog, &path, mime).await,
        Command::Thumbnail { asset_id } => {
            let thumbnail = manager()?.ensure_thumbnail(AssetId(asset_id)).await?;
            print_content(thumbnail, "thumbnail");
            Ok(())
        }
        Command::Viewable { asset_id, category } => {
            let manager = manager()?;
            let asset_id = AssetId(asset_id);
            let viewable = match category {
                Some(category) => manager.ensure_viewable_of(asset_id, category.into()).await?,
                // Prefer the source's own category, then anything.
                None => match manager.source_category(asset_id).await? {
                    Some(category) => match manager.ensure_viewable_of(asset_id, category).await? {
                        Some(viewable) => Some(viewable),
                        None => manager.ensure_viewable(asset_id).await?,
                    },
                    None => manager.ensure_viewable(asset_id).await?,
                },
            };
            print_content(viewable, "viewable");
            Ok(())
        }
        Command::Paths { asset_id } => {
            let manager = manager()?;
            let asset_id = AssetId(asset_id);
            for path in manager.thumbnail_paths(asset_id).await? {
                println!("{}\t{}", ContentKind::Thumbnail, path.display());
            }
            for path in manager.viewable_paths(asset_id).await? {
                println!("{}\t{}", ContentKind::Viewable, path.display());
            }
            Ok(())
        }
        Command::Tools => {
            let manager = manager()?;
            for kind in ToolKind::ALL {
                match manager.tools().require(kind) {
                    Ok(path) => println!("{kind}\t{}", path.display()),
                    Err(e) => println!("{kind}\t{e}"),
                }
            }
            Ok(())
        }
        Command::Formats => {
            let manager = manager()?;
            let converters = manager.generator().converters();
            for (kind, registry) in [
                (ContentKind::Thumbnail, &converters.thumbnail),
                (ContentKind::Viewable, &converters.viewable),
            ] {
                for pair in registry.pairs() {
                    println!("{kind}\t{pair}");
                }
            }
            Ok(())
        }
        Command::Prune => {
            let removed = manager()?.prune_expired().await?;
            println!("removed {removed} expired artifacts");
            Ok(())
        }
    }
}

async fn import(catalog: &AssetCatalog, path: &Path, mime: Option<String>) -> anyhow::Result<()> {
    let path = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("cannot import {}", path.display()))?;

    let mime = match mime {
        Some(mime) => MimeType::new(mime),
        None => {
            let Some(mime) = path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(MimeType::from_extension)
            else {
                bail!("cannot guess the mime type of {}; pass --mime", path.display());
            };
            mime
        }
    };

    let asset = catalog.import(path, mime.as_str()).await?;
    println!("{}\t{}\t{}", asset.id, asset.mime, asset.path.display());
    Ok(())
}

fn print_content(content: Option<CachedContent>, what: &str) {
    match content {
        Some(content) => println!(
            "{}\t{}\t{}",
            content.category,
            content.mime,
            content.path.display()
        ),
        None => println!("no {what} available"),
    }
}
