//! LibreOffice adapter for office documents.
//!
//! `soffice` cannot read stdin or write stdout, so each conversion gets a
//! private scratch directory holding the input, the output and a throwaway
//! user profile (concurrent instances sharing a profile block each other).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::RasterAdapter;
use crate::converter::{Converter, SharedConverter};
use crate::error::{ContentError, Result};
use crate::exec::ToolCommand;
use crate::pipe::pipe;
use crate::setup::Format;

pub const SOURCE_FORMATS: &[&str] = &["doc", "docx", "odt", "odp", "ods"];

pub const THUMBNAIL_FORMATS: &[&str] = &["webp", "png", "bmp", "jpg", "gif"];

pub const VIEWABLE_FORMATS: &[&str] = &["pdf"];

#[derive(Debug, Clone)]
pub struct OfficeAdapter {
    program: PathBuf,
    timeout: Duration,
    raster: RasterAdapter,
}

impl OfficeAdapter {
    pub fn new(program: &Path, thumbnail_size: (u32, u32), timeout: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            timeout,
            raster: RasterAdapter::new(thumbnail_size, timeout),
        }
    }

    /// First page rendered to PNG by soffice, then bounded by the raster adapter.
    pub fn thumbnail(&self, source: &Format, dest: &Format) -> Result<SharedConverter> {
        pipe(vec![
            self.converter(source, "png"),
            self.raster.thumbnail(dest)?,
        ])
    }

    /// The whole document as `dest` (PDF).
    pub fn viewable(&self, source: &Format, dest: &Format) -> Result<SharedConverter> {
        Ok(self.converter(source, &dest.name))
    }

    fn converter(&self, source: &Format, target: &str) -> SharedConverter {
        Arc::new(OfficeConverter {
            program: self.program.clone(),
            source_ext: source.name.clone(),
            target: target.to_string(),
            timeout: self.timeout,
        })
    }
}

struct OfficeConverter {
    program: PathBuf,
    source_ext: String,
    target: String,
    timeout: Duration,
}

impl OfficeConverter {
    fn command(&self, scratch: &Path, input: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .with_timeout(self.timeout)
            .arg(format!(
                "-env:UserInstallation=file://{}",
                scratch.join("profile").display()
            ))
            .args(["--headless", "--convert-to"])
            .arg(&self.target)
            .arg("--outdir")
            .arg(scratch.as_os_str())
            .arg(input.as_os_str())
            // soffice prints progress and font warnings; the exit status decides.
            .tolerate_stderr()
    }
}

#[async_trait]
impl Converter for OfficeConverter {
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>> {
        let scratch = tempfile::Builder::new()
            .prefix("filetag-office-")
            .tempdir()?;
        let source = scratch.path().join(format!("source.{}", self.source_ext));
        tokio::fs::write(&source, input).await?;

        self.command(scratch.path(), &source).run(&[]).await?;

        let output = scratch.path().join(format!("source.{}", self.target));
        match tokio::fs::read(&output).await {
            Ok(bytes) => {
                debug!("soffice produced {} bytes of {}", bytes.len(), self.target);
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ContentError::tool_failure(
                "soffice",
                format!("no {} output produced", self.target),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("{} --convert-to {}", self.program.display(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn adapter(program: &Path) -> OfficeAdapter {
        OfficeAdapter::new(program, (128, 128), Duration::from_secs(5))
    }

    #[test]
    fn test_command_line() {
        let converter = OfficeConverter {
            program: PathBuf::from("/usr/bin/soffice"),
            source_ext: "docx".to_string(),
            target: "pdf".to_string(),
            timeout: Duration::from_secs(5),
        };
        let command = converter.command(Path::new("/tmp/x"), Path::new("/tmp/x/source.docx"));
        assert_eq!(
            command.arg_list(),
            vec![
                "-env:UserInstallation=file:///tmp/x/profile",
                "--headless",
                "--convert-to",
                "pdf",
                "--outdir",
                "/tmp/x",
                "/tmp/x/source.docx",
            ]
        );
    }

    #[test]
    fn test_thumbnail_is_piped() {
        let converter = adapter(Path::new("/usr/bin/soffice"))
            .thumbnail(
                &Format::from_extension("odt").unwrap(),
                &Format::from_extension("jpg").unwrap(),
            )
            .unwrap();
        assert_eq!(
            converter.describe(),
            "/usr/bin/soffice --convert-to png | image:Jpeg"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_output_is_tool_failure() {
        // `true` accepts any arguments, exits 0 and writes nothing.
        let converter = adapter(Path::new("/bin/true"))
            .viewable(
                &Format::from_extension("odt").unwrap(),
                &Format::from_extension("pdf").unwrap(),
            )
            .unwrap();
        let err = converter.convert(b"document").await.unwrap_err();
        assert!(matches!(err, ContentError::ToolFailure { .. }));
    }
}
