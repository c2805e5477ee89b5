//! ImageMagick adapter for layered sources (PSD, XCF).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::CommandConverter;
use crate::converter::SharedConverter;
use crate::error::Result;
use crate::exec::ToolCommand;
use crate::setup::Format;

/// Formats ImageMagick reads for us.
pub const SOURCE_FORMATS: &[&str] = &["psd", "xcf"];

/// Thumbnail outputs.
pub const THUMBNAIL_FORMATS: &[&str] = &["webp", "png", "bmp", "jpg", "gif"];

/// Viewable outputs.
pub const VIEWABLE_FORMATS: &[&str] = &["webp", "png", "jpg", "gif"];

#[derive(Debug, Clone)]
pub struct MagickAdapter {
    program: PathBuf,
    thumbnail_size: (u32, u32),
    timeout: Duration,
}

impl MagickAdapter {
    pub fn new(program: &Path, thumbnail_size: (u32, u32), timeout: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            thumbnail_size,
            timeout,
        }
    }

    /// Flattened, bounded rendition.
    pub fn thumbnail(&self, source: &Format, dest: &Format) -> Result<SharedConverter> {
        let (width, height) = self.thumbnail_size;
        Ok(CommandConverter::shared(self.command(
            source,
            dest,
            Some(format!("{width}x{height}>")),
        )))
    }

    /// Flattened, full-size rendition.
    pub fn viewable(&self, source: &Format, dest: &Format) -> Result<SharedConverter> {
        Ok(CommandConverter::shared(self.command(source, dest, None)))
    }

    fn command(&self, source: &Format, dest: &Format, geometry: Option<String>) -> ToolCommand {
        let mut command = ToolCommand::new(&self.program)
            .with_timeout(self.timeout)
            // Only the composite of the first image in the file.
            .arg(format!("{}:-[0]", source.name))
            .arg("-flatten");
        if let Some(geometry) = geometry {
            command = command.arg("-thumbnail").arg(geometry);
        }
        command.arg(format!("{}:-", dest.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_thumbnail_command_line() {
        let adapter = MagickAdapter::new(
            Path::new("/usr/bin/magick"),
            (128, 96),
            Duration::from_secs(10),
        );
        let command = adapter.command(
            &Format::from_extension("psd").unwrap(),
            &Format::from_extension("jpg").unwrap(),
            Some("128x96>".to_string()),
        );
        assert_eq!(
            command.arg_list(),
            vec!["psd:-[0]", "-flatten", "-thumbnail", "128x96>", "jpg:-"]
        );
    }

    #[test]
    fn test_converters_describe_the_program() {
        let adapter = MagickAdapter::new(
            Path::new("/opt/im/convert"),
            (128, 128),
            Duration::from_secs(10),
        );
        let converter = adapter
            .viewable(
                &Format::from_extension("xcf").unwrap(),
                &Format::from_extension("webp").unwrap(),
            )
            .unwrap();
        assert_eq!(converter.describe(), "/opt/im/convert");
    }
}
