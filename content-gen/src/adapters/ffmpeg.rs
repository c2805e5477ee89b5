//! ffmpeg adapter for audio and video.
//!
//! Input is always read from `pipe:0` and output written to `pipe:1`, so
//! output containers must be streamable. MP4 output is fragmented for that
//! reason; MP4 input whose index sits at the end of the file cannot be read
//! from a pipe and fails as a tool error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::CommandConverter;
use crate::converter::SharedConverter;
use crate::error::{ContentError, Result};
use crate::exec::ToolCommand;
use crate::mime::{self, MimeType};
use crate::setup::Format;

pub const VIDEO_FORMATS: &[&str] = &["webm", "ogv", "mp4"];

pub const AUDIO_FORMATS: &[&str] = &["webm", "oga", "mp3", "wav"];

pub const THUMBNAIL_FORMATS: &[&str] = &["webp", "png", "bmp", "jpg"];

/// Keep stderr for real errors only.
const QUIET: [&str; 3] = ["-hide_banner", "-loglevel", "error"];

#[derive(Debug, Clone)]
pub struct FfmpegAdapter {
    program: PathBuf,
    thumbnail_size: (u32, u32),
    timeout: Duration,
}

impl FfmpegAdapter {
    pub fn new(program: &Path, thumbnail_size: (u32, u32), timeout: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            thumbnail_size,
            timeout,
        }
    }

    /// First video frame, scaled to fit the thumbnail bound.
    pub fn thumbnail(&self, source: &Format, dest: &Format) -> Result<SharedConverter> {
        let codec = image_codec(&dest.mime).ok_or_else(|| unsupported(source, dest))?;
        let (width, height) = self.thumbnail_size;
        let command = self
            .input()
            .args(["-frames:v", "1", "-vf"])
            .arg(format!(
                "scale=w={width}:h={height}:force_original_aspect_ratio=decrease"
            ))
            .args(["-c:v", codec, "-f", "image2pipe", "pipe:1"]);
        Ok(CommandConverter::shared(command))
    }

    /// Re-encode into a browser-playable container.
    pub fn viewable(&self, source: &Format, dest: &Format) -> Result<SharedConverter> {
        let output: &[&str] = match dest.mime.as_str() {
            "video/webm" => &["-c:v", "libvpx-vp9", "-c:a", "libopus", "-f", "webm"],
            "video/ogg" => &["-c:v", "libtheora", "-c:a", "libvorbis", "-f", "ogg"],
            "video/mp4" => &[
                "-c:v",
                "libx264",
                "-c:a",
                "aac",
                "-movflags",
                "frag_keyframe+empty_moov",
                "-f",
                "mp4",
            ],
            "audio/webm" => &["-vn", "-c:a", "libopus", "-f", "webm"],
            "audio/ogg" => &["-vn", "-c:a", "libvorbis", "-f", "ogg"],
            "audio/mpeg" => &["-vn", "-c:a", "libmp3lame", "-f", "mp3"],
            "audio/wav" => &["-vn", "-f", "wav"],
            _ => return Err(unsupported(source, dest)),
        };
        Ok(CommandConverter::shared(
            self.input().args(output.iter().copied()).arg("pipe:1"),
        ))
    }

    fn input(&self) -> ToolCommand {
        ToolCommand::new(&self.program)
            .with_timeout(self.timeout)
            .args(QUIET)
            .args(["-i", "pipe:0"])
    }
}

fn image_codec(dest: &MimeType) -> Option<&'static str> {
    [
        (mime::image::WEBP, "libwebp"),
        (mime::image::PNG, "png"),
        (mime::image::BMP, "bmp"),
        (mime::image::JPEG, "mjpeg"),
    ]
    .into_iter()
    .find(|(mime, _)| mime == dest)
    .map(|(_, codec)| codec)
}

fn unsupported(source: &Format, dest: &Format) -> ContentError {
    ContentError::UnsupportedConversion {
        source_mime: source.mime.clone(),
        dest_mime: dest.mime.clone(),
    }
}
