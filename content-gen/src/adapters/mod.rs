//! Converter adapters, one per conversion tool.
//!
//! Each adapter knows which formats its tool reads and writes and builds a
//! thumbnail or viewable converter for a given pair. Registration into the
//! registries happens in [`crate::setup`].

pub mod ffmpeg;
pub mod magick;
pub mod office;
pub mod poppler;
pub mod raster;

pub use ffmpeg::FfmpegAdapter;
pub use magick::MagickAdapter;
pub use office::OfficeAdapter;
pub use poppler::PopplerAdapter;
pub use raster::RasterAdapter;

use std::sync::Arc;

use async_trait::async_trait;

use crate::converter::{Converter, SharedConverter};
use crate::error::Result;
use crate::exec::ToolCommand;

/// Converter that pipes bytes through one external command.
pub struct CommandConverter {
    command: ToolCommand,
}

impl CommandConverter {
    /// Wrap a command as a shared converter.
    pub fn shared(command: ToolCommand) -> SharedConverter {
        Arc::new(Self { command })
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.command.run(input).await
    }

    fn describe(&self) -> String {
        self.command.program().display().to_string()
    }
}

/// Largest size that keeps the aspect ratio and fits in `bound`. Never upscales.
pub(crate) fn fit_within(width: u32, height: u32, bound: (u32, u32)) -> (u32, u32) {
    let (max_w, max_h) = bound;
    if width <= max_w && height <= max_h {
        return (width, height);
    }
    let scale = f64::min(
        f64::from(max_w) / f64::from(width),
        f64::from(max_h) / f64::from(height),
    );
    let fit = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (fit(width), fit(height))
}
