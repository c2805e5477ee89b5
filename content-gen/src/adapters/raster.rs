//! In-process raster conversion with the `image` crate.
//!
//! Decoding and encoding are CPU bound, so every conversion runs on the
//! blocking pool and is bounded by the same timeout as external tools.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::webp::WebPDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, Frame, ImageFormat};

use crate::adapters::fit_within;
use crate::converter::{Converter, SharedConverter};
use crate::error::{ContentError, Result};
use crate::mime::MimeType;
use crate::setup::Format;

const TOOL: &str = "image";

/// Raster formats decoded natively.
pub const SOURCE_FORMATS: &[&str] = &["webp", "png", "bmp", "jpg", "gif", "tiff"];

/// Still viewable sources; gif goes through the animated path instead.
pub const STILL_VIEWABLE_SOURCES: &[&str] = &["webp", "png", "bmp", "jpg", "tiff"];

/// Sources whose frames are all kept. The only animated output is gif.
pub const ANIMATED_SOURCES: &[&str] = &["webp", "gif"];

/// Raster formats encoded natively.
pub const DEST_FORMATS: &[&str] = &["webp", "png", "bmp", "jpg", "gif"];

/// Adapter for the in-process raster library.
#[derive(Debug, Clone)]
pub struct RasterAdapter {
    thumbnail_size: (u32, u32),
    timeout: Duration,
}

impl RasterAdapter {
    /// Create a raster adapter.
    pub fn new(thumbnail_size: (u32, u32), timeout: Duration) -> Self {
        Self {
            thumbnail_size,
            timeout,
        }
    }

    /// Bounded-size still image in `dest`'s format.
    pub fn thumbnail(&self, dest: &Format) -> Result<SharedConverter> {
        self.converter(dest, Mode::Still(Some(self.thumbnail_size)))
    }

    /// Full-size still image in `dest`'s format.
    pub fn viewable(&self, dest: &Format) -> Result<SharedConverter> {
        self.converter(dest, Mode::Still(None))
    }

    /// Full-size animation, every frame kept, looping forever. GIF output only.
    /// A WebP source without animation is converted as a still image.
    pub fn animated_viewable(&self, dest: &Format) -> Result<SharedConverter> {
        self.converter(dest, Mode::Animated)
    }

    fn converter(&self, dest: &Format, mode: Mode) -> Result<SharedConverter> {
        let target = encoder_format(&dest.mime)?;
        if matches!(mode, Mode::Animated) && target != ImageFormat::Gif {
            return Err(ContentError::UnsupportedConversion {
                source_mime: crate::mime::image::GIF,
                dest_mime: dest.mime.clone(),
            });
        }
        Ok(Arc::new(RasterConverter {
            target,
            mode,
            timeout: self.timeout,
        }))
    }
}

fn encoder_format(mime: &MimeType) -> Result<ImageFormat> {
    match ImageFormat::from_mime_type(mime.as_str()) {
        Some(
            format @ (ImageFormat::WebP
            | ImageFormat::Png
            | ImageFormat::Bmp
            | ImageFormat::Jpeg
            | ImageFormat::Gif
            | ImageFormat::Tiff),
        ) => Ok(format),
        _ => Err(ContentError::UnsupportedConversion {
            source_mime: MimeType::from_static("image/*"),
            dest_mime: mime.clone(),
        }),
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// First frame only, optionally bounded.
    Still(Option<(u32, u32)>),

    /// Every frame, full size.
    Animated,
}

struct RasterConverter {
    target: ImageFormat,
    mode: Mode,
    timeout: Duration,
}

#[async_trait]
impl Converter for RasterConverter {
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        let input = input.to_vec();
        let target = self.target;
        let mode = self.mode;
        let task = tokio::task::spawn_blocking(move || match mode {
            Mode::Still(bound) => transcode_still(&input, target, bound),
            Mode::Animated => transcode_animated(&input),
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ContentError::tool_failure(TOOL, join_err.to_string())),
            Err(_) => Err(ContentError::ToolTimeout {
                tool: TOOL.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    fn describe(&self) -> String {
        match self.mode {
            Mode::Still(_) => format!("{TOOL}:{:?}", self.target),
            Mode::Animated => format!("{TOOL}:{:?} animated", self.target),
        }
    }
}

fn transcode_still(
    input: &[u8],
    target: ImageFormat,
    bound: Option<(u32, u32)>,
) -> Result<Vec<u8>> {
    let mut img = image::load_from_memory(input)?;

    if let Some(bound) = bound {
        let (width, height) = fit_within(img.width(), img.height(), bound);
        if (width, height) != (img.width(), img.height()) {
            img = img.resize(width, height, FilterType::Lanczos3);
        }
    }

    // Encoders only accept 8-bit buffers, and JPEG/BMP have no alpha channel.
    let img = match target {
        ImageFormat::Jpeg | ImageFormat::Bmp => DynamicImage::ImageRgb8(img.to_rgb8()),
        ImageFormat::WebP | ImageFormat::Gif | ImageFormat::Png => {
            DynamicImage::ImageRgba8(img.to_rgba8())
        }
        _ => img,
    };

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, target)?;
    Ok(out.into_inner())
}

fn transcode_animated(input: &[u8]) -> Result<Vec<u8>> {
    let frames: Vec<Frame> = match image::guess_format(input)? {
        ImageFormat::WebP => {
            let decoder = WebPDecoder::new(Cursor::new(input))?;
            if !decoder.has_animation() {
                return transcode_still(input, ImageFormat::Gif, None);
            }
            decoder.into_frames().collect_frames()?
        }
        _ => GifDecoder::new(Cursor::new(input))?
            .into_frames()
            .collect_frames()?,
    };

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(frames)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::image as mime_image;
    use image::{GenericImageView, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn adapter() -> RasterAdapter {
        RasterAdapter::new((128, 128), Duration::from_secs(30))
    }

    fn format(name: &str) -> Format {
        Format::from_extension(name).unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_png_to_bounded_jpeg() {
        let converter = adapter().thumbnail(&format("jpg")).unwrap();
        let output = converter.convert(&png(640, 320)).await.unwrap();

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
        let thumb = image::load_from_memory(&output).unwrap();
        assert_eq!(thumb.dimensions(), (128, 64));
    }

    #[tokio::test]
    async fn test_small_images_are_not_upscaled() {
        let converter = adapter().thumbnail(&format("webp")).unwrap();
        let output = converter.convert(&png(40, 30)).await.unwrap();
        let thumb = image::load_from_memory(&output).unwrap();
        assert_eq!(thumb.dimensions(), (40, 30));
    }

    #[tokio::test]
    async fn test_viewable_keeps_full_size() {
        let converter = adapter().viewable(&format("gif")).unwrap();
        let output = converter.convert(&png(300, 200)).await.unwrap();
        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Gif);
        assert_eq!(image::load_from_memory(&output).unwrap().dimensions(), (300, 200));
    }

    #[tokio::test]
    async fn test_animated_gif_keeps_frames() {
        let mut source = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut source);
            for shade in [0u8, 128, 255] {
                let buffer = RgbaImage::from_pixel(16, 16, Rgba([shade, shade, shade, 255]));
                encoder.encode_frame(Frame::new(buffer)).unwrap();
            }
        }

        let converter = adapter().animated_viewable(&format("gif")).unwrap();
        let output = converter.convert(&source).await.unwrap();

        let frames = GifDecoder::new(Cursor::new(output.as_slice()))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_still_webp_on_the_animated_path() {
        let mut source = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(24, 12, Rgba([0, 90, 180, 255])))
            .write_to(&mut source, ImageFormat::WebP)
            .unwrap();

        let converter = adapter().animated_viewable(&format("gif")).unwrap();
        assert_eq!(converter.describe(), "image:Gif animated");
        let output = converter.convert(source.get_ref()).await.unwrap();

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Gif);
        let frames = GifDecoder::new(Cursor::new(output.as_slice()))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].buffer().dimensions(), (24, 12));
    }

    #[tokio::test]
    async fn test_garbage_input_is_recoverable() {
        let converter = adapter().thumbnail(&format("png")).unwrap();
        let err = converter.convert(b"not an image").await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unencodable_destination() {
        let err = adapter()
            .thumbnail(&Format::new("pdf", crate::mime::application::PDF))
            .err()
            .unwrap();
        assert!(matches!(err, ContentError::UnsupportedConversion { .. }));
        assert!(adapter().animated_viewable(&Format::new("png", mime_image::PNG)).is_err());
    }
}
