//! Startup registration of every adapter into the two registries.
//!
//! Registration order is fixed; a later adapter replaces an earlier one for
//! the same exact pair.

use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::adapters::{
    FfmpegAdapter, MagickAdapter, OfficeAdapter, PopplerAdapter, RasterAdapter, ffmpeg, magick,
    office, poppler, raster,
};
use crate::config::ContentConfig;
use crate::converter::SharedConverter;
use crate::error::Result;
use crate::locator::{ToolKind, ToolLocator};
use crate::mime::{MimeType, audio};
use crate::registry::{ConverterRegistry, ConverterSet};

/// A tool-facing format name paired with its mime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Name the tools understand, e.g. `jpg`.
    pub name: String,

    pub mime: MimeType,
}

impl Format {
    pub fn new(name: impl Into<String>, mime: MimeType) -> Self {
        Self {
            name: name.into(),
            mime,
        }
    }

    /// Format for an extension, with the mime from the extension table.
    pub fn from_extension(ext: &str) -> Option<Self> {
        MimeType::from_extension(ext).map(|mime| Self::new(ext, mime))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mime)
    }
}

/// Ordered list of formats an adapter reads or writes.
#[derive(Debug, Clone, Default)]
pub struct FormatList(Vec<Format>);

impl FormatList {
    /// Formats for extensions, in order. Unknown extensions are dropped.
    pub fn from_extensions(names: &[&str]) -> Self {
        Self::with_overrides(names, &[])
    }

    /// Like [`FormatList::from_extensions`], but names listed in `overrides`
    /// take the given mime instead of the table's.
    pub fn with_overrides(names: &[&str], overrides: &[(&str, MimeType)]) -> Self {
        let formats = names
            .iter()
            .filter_map(|name| {
                if let Some((_, mime)) = overrides.iter().find(|(over, _)| over == name) {
                    return Some(Format::new(*name, mime.clone()));
                }
                let format = Format::from_extension(name);
                if format.is_none() {
                    warn!("No mime known for format {name}; skipping it");
                }
                format
            })
            .collect();
        Self(formats)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What to do when a source and destination share a mime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfMapPolicy {
    /// Register and warn.
    Allow,

    /// Register with a debug message only.
    AllowQuietly,

    /// Do not register.
    Skip,
}

/// Register `factory(source, dest)` for every source × destination pair, in
/// declaration order. Returns the number of pairs registered.
///
/// A factory error skips that pair only.
pub fn register_formats<F>(
    registry: &mut ConverterRegistry,
    sources: &FormatList,
    dests: &FormatList,
    policy: SelfMapPolicy,
    factory: F,
) -> usize
where
    F: Fn(&Format, &Format) -> Result<SharedConverter>,
{
    let mut registered = 0;
    for source in sources.iter() {
        for dest in dests.iter() {
            if source.mime == dest.mime {
                match policy {
                    SelfMapPolicy::Skip => {
                        debug!("Skipping self-mapping {source} -> {dest}");
                        continue;
                    }
                    SelfMapPolicy::Allow => {
                        warn!("Registering self-mapping {source} -> {dest}");
                    }
                    SelfMapPolicy::AllowQuietly => {
                        debug!("Registering self-mapping {source} -> {dest}");
                    }
                }
            }

            match factory(source, dest) {
                Ok(converter) => {
                    registry.register(source.mime.clone(), dest.mime.clone(), converter);
                    registered += 1;
                }
                Err(e) => warn!("Cannot convert {source} -> {dest}: {e}"),
            }
        }
    }
    registered
}

impl ConverterSet {
    /// Register every adapter whose tool is available.
    pub fn build(locator: &ToolLocator, config: &ContentConfig) -> Self {
        let mut set = Self::new();
        let size = config.thumbnail_size();
        let timeout = config.tool_timeout();

        let av = with_tool(locator, ToolKind::Ffmpeg, |path| {
            FfmpegAdapter::new(path, size, timeout)
        });
        let docs = with_tool(locator, ToolKind::Soffice, |path| {
            OfficeAdapter::new(path, size, timeout)
        });
        let layered = with_tool(locator, ToolKind::Magick, |path| {
            MagickAdapter::new(path, size, timeout)
        });
        let pdf = with_tool(locator, ToolKind::Pdftoppm, |path| {
            PopplerAdapter::new(path, size, timeout)
        });
        let raster = RasterAdapter::new(size, timeout);

        let video_formats = FormatList::from_extensions(ffmpeg::VIDEO_FORMATS);
        let audio_formats =
            FormatList::with_overrides(ffmpeg::AUDIO_FORMATS, &[("webm", audio::WEBM)]);

        // Viewables.
        let viewable = &mut set.viewable;
        match &av {
            Some(av) => {
                register_formats(
                    viewable,
                    &audio_formats,
                    &audio_formats,
                    SelfMapPolicy::Allow,
                    |s, d| av.viewable(s, d),
                );
                register_formats(
                    viewable,
                    &video_formats,
                    &video_formats,
                    SelfMapPolicy::Allow,
                    |s, d| av.viewable(s, d),
                );
            }
            None => warn!("ffmpeg unavailable: no audio or video viewables"),
        }
        match &docs {
            Some(docs) => {
                register_formats(
                    viewable,
                    &FormatList::from_extensions(office::SOURCE_FORMATS),
                    &FormatList::from_extensions(office::VIEWABLE_FORMATS),
                    SelfMapPolicy::Allow,
                    |s, d| docs.viewable(s, d),
                );
            }
            None => warn!("soffice unavailable: no document viewables"),
        }
        register_formats(
            viewable,
            &FormatList::from_extensions(raster::STILL_VIEWABLE_SOURCES),
            &FormatList::from_extensions(raster::DEST_FORMATS),
            SelfMapPolicy::Allow,
            |_, d| raster.viewable(d),
        );
        // Replaces the still webp -> gif entry registered just above.
        register_formats(
            viewable,
            &FormatList::from_extensions(raster::ANIMATED_SOURCES),
            &FormatList::from_extensions(&["gif"]),
            SelfMapPolicy::Allow,
            |_, d| raster.animated_viewable(d),
        );
        match &layered {
            Some(layered) => {
                register_formats(
                    viewable,
                    &FormatList::from_extensions(magick::SOURCE_FORMATS),
                    &FormatList::from_extensions(magick::VIEWABLE_FORMATS),
                    SelfMapPolicy::Allow,
                    |s, d| layered.viewable(s, d),
                );
            }
            None => warn!("magick unavailable: no layered image viewables"),
        }

        // Thumbnails.
        let thumbnail = &mut set.thumbnail;
        if let Some(av) = &av {
            register_formats(
                thumbnail,
                &video_formats,
                &FormatList::from_extensions(ffmpeg::THUMBNAIL_FORMATS),
                SelfMapPolicy::AllowQuietly,
                |s, d| av.thumbnail(s, d),
            );
        }
        if let Some(docs) = &docs {
            register_formats(
                thumbnail,
                &FormatList::from_extensions(office::SOURCE_FORMATS),
                &FormatList::from_extensions(office::THUMBNAIL_FORMATS),
                SelfMapPolicy::AllowQuietly,
                |s, d| docs.thumbnail(s, d),
            );
        }
        register_formats(
            thumbnail,
            &FormatList::from_extensions(raster::SOURCE_FORMATS),
            &FormatList::from_extensions(raster::DEST_FORMATS),
            SelfMapPolicy::AllowQuietly,
            |_, d| raster.thumbnail(d),
        );
        if let Some(layered) = &layered {
            register_formats(
                thumbnail,
                &FormatList::from_extensions(magick::SOURCE_FORMATS),
                &FormatList::from_extensions(magick::THUMBNAIL_FORMATS),
                SelfMapPolicy::AllowQuietly,
                |s, d| layered.thumbnail(s, d),
            );
        }
        match &pdf {
            Some(pdf) => {
                register_formats(
                    thumbnail,
                    &FormatList::from_extensions(poppler::SOURCE_FORMATS),
                    &FormatList::from_extensions(poppler::THUMBNAIL_FORMATS),
                    SelfMapPolicy::AllowQuietly,
                    |_, d| pdf.thumbnail(d),
                );
            }
            None => warn!("pdftoppm unavailable: no PDF thumbnails"),
        }

        info!(
            "Registered {} thumbnail and {} viewable conversions",
            set.thumbnail.len(),
            set.viewable.len()
        );
        set
    }
}

fn with_tool<A>(
    locator: &ToolLocator,
    kind: ToolKind,
    build: impl FnOnce(&Path) -> A,
) -> Option<A> {
    match locator.require(kind) {
        Ok(path) => Some(build(path)),
        Err(e) => {
            debug!("{e}");
            None
        }
    }
}
