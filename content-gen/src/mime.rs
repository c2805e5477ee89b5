//! Mime types and their canonical file extensions.
//!
//! Cache file names are derived from the destination mime, so the mapping
//! must be stable: `image/jpeg` is always stored as `.jpeg`, `audio/ogg` as
//! `.oga`. Mimes missing from the table fall back to `mime_guess`, then to
//! the subtype.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A mime type such as `image/webp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeType(Cow<'static, str>);

impl MimeType {
    /// Wrap a static mime string.
    pub const fn from_static(mime: &'static str) -> Self {
        Self(Cow::Borrowed(mime))
    }

    /// Wrap an owned mime string. Parameters (`; charset=...`) are dropped
    /// and the result is lower-cased.
    pub fn new(mime: impl AsRef<str>) -> Self {
        let essence = mime.as_ref().split(';').next().unwrap_or_default().trim();
        Self(Cow::Owned(essence.to_ascii_lowercase()))
    }

    /// The mime string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Top-level type, e.g. `image`.
    pub fn top_level(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Subtype, e.g. `webp`.
    pub fn subtype(&self) -> &str {
        self.0.split_once('/').map(|(_, sub)| sub).unwrap_or_default()
    }

    /// Canonical extension used for cache file names, without the dot.
    pub fn extension(&self) -> String {
        if let Some((ext, _)) = KNOWN.iter().find(|(_, mime)| *mime == self.as_str()) {
            return (*ext).to_string();
        }
        if let Some(ext) = mime_guess::get_mime_extensions_str(self.as_str())
            .and_then(|exts| exts.first())
        {
            return (*ext).to_string();
        }
        self.subtype().to_string()
    }

    /// Guess the mime type of an extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if let Some((_, mime)) = KNOWN.iter().find(|(known, _)| *known == ext) {
            return Some(Self::from_static(mime));
        }
        if let Some((_, mime)) = ALIASES.iter().find(|(alias, _)| *alias == ext) {
            return Some(Self::from_static(mime));
        }
        mime_guess::from_ext(&ext).first_raw().map(Self::from_static)
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MimeType {
    fn from(mime: &str) -> Self {
        Self::new(mime)
    }
}

impl From<String> for MimeType {
    fn from(mime: String) -> Self {
        Self::new(mime)
    }
}

/// Canonical extension for each mime the cache knows about. Extension → mime
/// lookups also start here, so audio/video containers are resolved to the
/// video variant unless an adapter overrides it.
const KNOWN: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("bmp", "image/bmp"),
    ("tiff", "image/tiff"),
    ("jpeg", "image/jpeg"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("psd", "image/vnd.adobe.photoshop"),
    ("xcf", "image/x-xcf"),
    ("webm", "video/webm"),
    ("ogv", "video/ogg"),
    ("mp4", "video/mp4"),
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("oga", "audio/ogg"),
    ("weba", "audio/webm"),
    ("flac", "audio/flac"),
    ("pdf", "application/pdf"),
    ("ai", "application/postscript"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
];

/// Extra spellings accepted when guessing from an extension.
const ALIASES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("tif", "image/tiff"),
    ("ogg", "audio/ogg"),
    ("mpeg", "video/mpeg"),
];

pub mod image {
    use super::MimeType;

    pub const PNG: MimeType = MimeType::from_static("image/png");
    pub const BMP: MimeType = MimeType::from_static("image/bmp");
    pub const TIFF: MimeType = MimeType::from_static("image/tiff");
    pub const JPEG: MimeType = MimeType::from_static("image/jpeg");
    pub const WEBP: MimeType = MimeType::from_static("image/webp");
    pub const GIF: MimeType = MimeType::from_static("image/gif");
    pub const PSD: MimeType = MimeType::from_static("image/vnd.adobe.photoshop");
    pub const XCF: MimeType = MimeType::from_static("image/x-xcf");
}

pub mod video {
    use super::MimeType;

    pub const WEBM: MimeType = MimeType::from_static("video/webm");
    pub const OGG: MimeType = MimeType::from_static("video/ogg");
    pub const MP4: MimeType = MimeType::from_static("video/mp4");
    pub const MPEG: MimeType = MimeType::from_static("video/mpeg");
}

pub mod audio {
    use super::MimeType;

    pub const WAV: MimeType = MimeType::from_static("audio/wav");
    pub const MPEG: MimeType = MimeType::from_static("audio/mpeg");
    pub const MP4: MimeType = MimeType::from_static("audio/mp4");
    pub const AAC: MimeType = MimeType::from_static("audio/aac");
    pub const OGG: MimeType = MimeType::from_static("audio/ogg");
    pub const WEBM: MimeType = MimeType::from_static("audio/webm");
    pub const FLAC: MimeType = MimeType::from_static("audio/flac");
}

pub mod application {
    use super::MimeType;

    pub const PDF: MimeType = MimeType::from_static("application/pdf");
    pub const POSTSCRIPT: MimeType = MimeType::from_static("application/postscript");
    pub const MSWORD: MimeType = MimeType::from_static("application/msword");
    pub const DOCX: MimeType = MimeType::from_static(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    );
    pub const ODT: MimeType = MimeType::from_static("application/vnd.oasis.opendocument.text");
    pub const ODP: MimeType =
        MimeType::from_static("application/vnd.oasis.opendocument.presentation");
    pub const ODS: MimeType =
        MimeType::from_static("application/vnd.oasis.opendocument.spreadsheet");
}
