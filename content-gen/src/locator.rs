//! Locating external conversion tools.
//!
//! Tools are resolved once at startup. Adapters receive the resolved path and
//! never search on their own; a tool that cannot be found simply means its
//! adapter is not registered.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ToolsConfig;
use crate::error::{ContentError, Result};

/// External tools the adapters know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Audio/video transcoder.
    Ffmpeg,

    /// Poppler PDF rasterizer.
    Pdftoppm,

    /// LibreOffice headless converter.
    Soffice,

    /// ImageMagick.
    Magick,
}

impl ToolKind {
    /// Every tool, in discovery order.
    pub const ALL: [ToolKind; 4] = [Self::Ffmpeg, Self::Pdftoppm, Self::Soffice, Self::Magick];

    /// Binary names searched on `PATH`, most preferred first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Self::Ffmpeg => &["ffmpeg"],
            Self::Pdftoppm => &["pdftoppm"],
            Self::Soffice => &["soffice", "libreoffice"],
            Self::Magick => &["magick", "convert"],
        }
    }

    /// Name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ffmpeg => "ffmpeg",
            Self::Pdftoppm => "pdftoppm",
            Self::Soffice => "soffice",
            Self::Magick => "magick",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    tools: BTreeMap<ToolKind, PathBuf>,
}

impl ToolLocator {
    /// A locator with no tools. Only in-process adapters will be available.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve every tool from explicit configuration or `PATH`.
    ///
    /// A configured path that does not exist is a configuration error; a tool
    /// that is neither configured nor on `PATH` is only logged.
    pub fn discover(config: &ToolsConfig) -> Result<Self> {
        let mut locator = Self::empty();

        for kind in ToolKind::ALL {
            if let Some(path) = config.get(kind) {
                if !path.is_file() {
                    return Err(ContentError::Config(format!(
                        "{kind} configured at {} but no such file",
                        path.display()
                    )));
                }
                info!("Using configured {kind}: {}", path.display());
                locator.tools.insert(kind, path.to_path_buf());
                continue;
            }

            match kind
                .candidates()
                .iter()
                .find_map(|name| which::which(name).ok())
            {
                Some(path) => {
                    info!("Found {kind}: {}", path.display());
                    locator.tools.insert(kind, path);
                }
                None => warn!("{kind} not found on PATH; its conversions are disabled"),
            }
        }

        Ok(locator)
    }

    /// Register a tool path directly.
    pub fn with_tool(mut self, kind: ToolKind, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(kind, path.into());
        self
    }

    /// Path of a tool, if available.
    pub fn get(&self, kind: ToolKind) -> Option<&Path> {
        self.tools.get(&kind).map(PathBuf::as_path)
    }

    /// Path of a tool, or [`ContentError::ToolUnavailable`].
    pub fn require(&self, kind: ToolKind) -> Result<&Path> {
        self.get(kind).ok_or(ContentError::ToolUnavailable(kind))
    }

    /// Iterate over resolved tools.
    pub fn iter(&self) -> impl Iterator<Item = (ToolKind, &Path)> {
        self.tools.iter().map(|(kind, path)| (*kind, path.as_path()))
    }
}
