//! Running external tools with a byte-stream contract.
//!
//! The source bytes are written to the tool's stdin, stdout is captured as
//! the converted bytes, and anything on stderr counts as a failure unless the
//! command opts out. Every run is bounded by a timeout; the child is killed
//! when the timeout fires.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ContentError, Result};

/// What to do with non-empty stderr when the tool exits successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrPolicy {
    /// Treat any diagnostic output as failure.
    Fail,

    /// Log it and keep the output.
    Log,
}

/// A single external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Name used in logs and errors.
    tool: String,

    program: PathBuf,

    args: Vec<OsString>,

    timeout: Duration,

    stderr: StderrPolicy,
}

impl ToolCommand {
    /// Create a command for `program`, named after its file stem.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let tool = program
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            tool,
            program,
            args: Vec::new(),
            timeout: Duration::from_secs(60),
            stderr: StderrPolicy::Fail,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Keep the output even when the tool writes diagnostics.
    pub fn tolerate_stderr(mut self) -> Self {
        self.stderr = StderrPolicy::Log;
        self
    }

    /// Program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as display strings.
    pub fn arg_list(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Run the tool, feeding `input` on stdin and returning stdout.
    pub async fn run(&self, input: &[u8]) -> Result<Vec<u8>> {
        let start = Instant::now();
        debug!("Running {}: {}", self.tool, self.arg_list().join(" "));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ContentError::tool_failure(&self.tool, format!("failed to start: {e}")))?;

        let stdin = child.stdin.take();
        let input = input.to_vec();
        let tool = self.tool.clone();
        // Fed from its own task so a tool that fills its stdout pipe before
        // draining stdin cannot deadlock us.
        let feeder = tokio::spawn(async move {
            let Some(mut stdin) = stdin else {
                return;
            };
            if let Err(e) = stdin.write_all(&input).await {
                // Tools such as ffmpeg stop reading once they have what they need.
                if e.kind() != ErrorKind::BrokenPipe {
                    debug!("{tool}: failed to write stdin: {e}");
                }
            }
        });

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output
                .map_err(|e| ContentError::tool_failure(&self.tool, format!("failed to wait: {e}")))?,
            Err(_) => {
                feeder.abort();
                warn!("{} timed out after {:?}", self.tool, self.timeout);
                return Err(ContentError::ToolTimeout {
                    tool: self.tool.clone(),
                    timeout: self.timeout,
                });
            }
        };
        let _ = feeder.await;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(ContentError::tool_failure(&self.tool, message));
        }
        if !stderr.is_empty() {
            match self.stderr {
                StderrPolicy::Fail => return Err(ContentError::tool_failure(&self.tool, stderr)),
                StderrPolicy::Log => warn!("{}: {stderr}", self.tool),
            }
        }

        debug!(
            "{} produced {} bytes in {}ms",
            self.tool,
            output.stdout.len(),
            start.elapsed().as_millis()
        );
        Ok(output.stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_stdout_is_captured() {
        let output = ToolCommand::new("cat").run(b"raw bytes").await.unwrap();
        assert_eq!(output, b"raw bytes".to_vec());
    }

    #[tokio::test]
    async fn test_stderr_is_failure() {
        let err = sh("printf partial; echo 'bad header' >&2")
            .run(b"")
            .await
            .unwrap_err();
        match err {
            ContentError::ToolFailure { tool, message } => {
                assert_eq!(tool, "sh");
                assert_eq!(message, "bad header");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_tolerated_stderr_keeps_output() {
        let output = sh("echo 'just a warning' >&2; printf ok")
            .tolerate_stderr()
            .run(b"")
            .await
            .unwrap();
        assert_eq!(output, b"ok".to_vec());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let err = sh("exit 3").tolerate_stderr().run(b"").await.unwrap_err();
        assert!(matches!(err, ContentError::ToolFailure { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_timeout_kills_the_tool() {
        let start = Instant::now();
        let err = sh("sleep 5")
            .with_timeout(Duration::from_millis(100))
            .run(b"")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentError::ToolTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_early_exit_does_not_hang() {
        let input = vec![0u8; 4 * 1024 * 1024];
        let output = sh("head -c 4").run(&input).await.unwrap();
        assert_eq!(output.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = ToolCommand::new("/no/such/tool").run(b"").await.unwrap_err();
        assert!(matches!(err, ContentError::ToolFailure { .. }));
    }
}
