//! CLI configuration file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use filetag_content_gen::ContentConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Content configuration plus the location of the asset catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON file holding source assets and content identities.
    pub catalog_path: PathBuf,

    #[serde(flatten)]
    pub content: ContentConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("filetag");
        Self {
            catalog_path: data_dir.join("catalog.json"),
            content: ContentConfig::default(),
        }
    }
}

/// `{config_dir}/filetag/content.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("filetag").join("content.toml"))
}

/// Load `explicit` if given (it must exist), otherwise the default file if
/// present, otherwise built-in defaults.
pub async fn load(explicit: Option<&Path>) -> anyhow::Result<CliConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => path,
            _ => {
                debug!("No configuration file; using defaults");
                return Ok(CliConfig::default());
            }
        },
    };

    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = parse(&content).with_context(|| format!("invalid config {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn parse(content: &str) -> anyhow::Result<CliConfig> {
    Ok(toml::from_str(content)?)
}
