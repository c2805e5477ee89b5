//! Poppler adapter: first page of a PDF as a raster thumbnail.
//!
//! `pdftoppm` writes PNG and JPEG itself. Other outputs are produced by
//! piping its PNG through the raster adapter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::{CommandConverter, RasterAdapter};
use crate::converter::SharedConverter;
use crate::error::Result;
use crate::exec::ToolCommand;
use crate::mime::{self, MimeType};
use crate::pipe::pipe;
use crate::setup::Format;

pub const SOURCE_FORMATS: &[&str] = &["pdf", "ai"];

pub const THUMBNAIL_FORMATS: &[&str] = &["png", "jpg", "webp", "bmp", "gif"];

#[derive(Debug, Clone)]
pub struct PopplerAdapter {
    program: PathBuf,
    thumbnail_size: (u32, u32),
    timeout: Duration,
    raster: RasterAdapter,
}

impl PopplerAdapter {
    pub fn new(program: &Path, thumbnail_size: (u32, u32), timeout: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            thumbnail_size,
            timeout,
            raster: RasterAdapter::new(thumbnail_size, timeout),
        }
    }

    /// First page, scaled so its long side matches the thumbnail bound.
    pub fn thumbnail(&self, dest: &Format) -> Result<SharedConverter> {
        match native_flag(&dest.mime) {
            Some(flag) => Ok(CommandConverter::shared(self.command(flag))),
            None => pipe(vec![
                CommandConverter::shared(self.command("-png")),
                self.raster.thumbnail(dest)?,
            ]),
        }
    }

    fn command(&self, output_flag: &str) -> ToolCommand {
        let (width, height) = self.thumbnail_size;
        ToolCommand::new(&self.program)
            .with_timeout(self.timeout)
            .args(["-f", "1", "-l", "1", "-singlefile", "-scale-to"])
            .arg(width.max(height).to_string())
            .arg(output_flag)
            // Read the document from stdin; with no output root the page goes to stdout.
            .arg("-")
    }
}

fn native_flag(dest: &MimeType) -> Option<&'static str> {
    if *dest == mime::image::PNG {
        Some("-png")
    } else if *dest == mime::image::JPEG {
        Some("-jpeg")
    } else {
        None
    }
}
