//! Configuration for content generation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::locator::ToolKind;

/// Configuration for the content cache and its converters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Durable cache root; thumbnails live here.
    pub cache_root: PathBuf,

    /// Temporary cache root; viewables live here.
    pub temp_cache_root: PathBuf,

    /// Thumbnail bounding box width.
    pub thumbnail_width: u32,

    /// Thumbnail bounding box height.
    pub thumbnail_height: u32,

    /// Upper bound for a single external tool invocation.
    pub tool_timeout_secs: u64,

    /// Retention applied to the durable tier.
    pub thumbnail_retention: RetentionPolicy,

    /// Retention applied to the temporary tier.
    pub viewable_retention: RetentionPolicy,

    /// Explicit tool locations. Tools not listed are searched on `PATH`.
    pub tools: ToolsConfig,
}

impl ContentConfig {
    /// Create a configuration rooted at `root`, with `cache/` and `temporary/` below it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cache_root: root.join("cache"),
            temp_cache_root: root.join("temporary"),
            thumbnail_width: 128,
            thumbnail_height: 128,
            tool_timeout_secs: 60,
            thumbnail_retention: RetentionPolicy::Forever,
            viewable_retention: RetentionPolicy::MaxAge {
                max_age_secs: 7 * 24 * 60 * 60,
            },
            tools: ToolsConfig::default(),
        }
    }

    /// Set the thumbnail bounding box.
    pub fn with_thumbnail_size(mut self, width: u32, height: u32) -> Self {
        self.thumbnail_width = width;
        self.thumbnail_height = height;
        self
    }

    /// Set the external tool timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Pin a tool to an explicit path.
    pub fn with_tool(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.tools.set(kind, path.into());
        self
    }

    /// Set the retention of the temporary tier.
    pub fn with_viewable_retention(mut self, policy: RetentionPolicy) -> Self {
        self.viewable_retention = policy;
        self
    }

    /// External tool timeout as a duration.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Thumbnail bounding box as `(width, height)`.
    pub fn thumbnail_size(&self) -> (u32, u32) {
        (self.thumbnail_width, self.thumbnail_height)
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self::new(
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("filetag"),
        )
    }
}

/// Explicit locations for external tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: Option<PathBuf>,
    pub pdftoppm: Option<PathBuf>,
    pub soffice: Option<PathBuf>,
    pub magick: Option<PathBuf>,
}

impl ToolsConfig {
    /// Configured path for a tool.
    pub fn get(&self, kind: ToolKind) -> Option<&Path> {
        match kind {
            ToolKind::Ffmpeg => self.ffmpeg.as_deref(),
            ToolKind::Pdftoppm => self.pdftoppm.as_deref(),
            ToolKind::Soffice => self.soffice.as_deref(),
            ToolKind::Magick => self.magick.as_deref(),
        }
    }

    /// Set the path for a tool.
    pub fn set(&mut self, kind: ToolKind, path: PathBuf) {
        let slot = match kind {
            ToolKind::Ffmpeg => &mut self.ffmpeg,
            ToolKind::Pdftoppm => &mut self.pdftoppm,
            ToolKind::Soffice => &mut self.soffice,
            ToolKind::Magick => &mut self.magick,
        };
        *slot = Some(path);
    }
}

/// How long generated artifacts in a cache tier are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Never pruned.
    #[default]
    Forever,

    /// Pruned once older than `max_age_secs`.
    MaxAge { max_age_secs: u64 },
}

impl RetentionPolicy {
    /// Maximum age, if any.
    pub fn max_age(&self) -> Option<Duration> {
        match self {
            Self::Forever => None,
            Self::MaxAge { max_age_secs } => Some(Duration::from_secs(*max_age_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_creation() {
        let config = ContentConfig::new("/srv/filetag")
            .with_thumbnail_size(256, 200)
            .with_tool_timeout(Duration::from_secs(5))
            .with_tool(ToolKind::Ffmpeg, "/opt/ffmpeg/bin/ffmpeg");

        assert_eq!(config.cache_root, Path::new("/srv/filetag/cache"));
        assert_eq!(config.temp_cache_root, Path::new("/srv/filetag/temporary"));
        assert_eq!(config.thumbnail_size(), (256, 200));
        assert_eq!(config.tool_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.tools.get(ToolKind::Ffmpeg),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(config.tools.get(ToolKind::Soffice), None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ContentConfig = toml::from_str(
            r#"
            cache_root = "/data/cache"
            tool_timeout_secs = 10

            [viewable_retention.max_age]
            max_age_secs = 3600

            [tools]
            magick = "/usr/local/bin/magick"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_root, Path::new("/data/cache"));
        assert_eq!(config.thumbnail_size(), (128, 128));
        assert_eq!(config.tool_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.viewable_retention.max_age(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(config.thumbnail_retention, RetentionPolicy::Forever);
        assert_eq!(
            config.tools.get(ToolKind::Magick),
            Some(Path::new("/usr/local/bin/magick"))
        );
    }
}
