//! External tool execution.
//!
//! Every `ffmpeg`/`ffprobe` call in the workspace goes through
//! [`ToolRunner::run`]: build a [`ToolInvocation`], hand it to a runner,
//! get back captured streams and the exit code. [`ProcessRunner`] is the
//! real implementation; tests substitute their own runner.
//!
//! A non-zero exit is *not* an error at this layer. Callers decide what
//! an exit code means and turn it into their own error type.

use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default wall-clock limit for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// A fully-specified external command.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Bytes written to the child's stdin, which is then closed.
    pub stdin: Option<Vec<u8>>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value following the first occurrence of `flag`, e.g. the path after `-i`.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Last positional argument; for ffmpeg this is the output path.
    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failures to run a tool at all (as opposed to a tool exiting non-zero).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{program} could not be started: {source}")]
    NotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {elapsed_ms}ms")]
    Timeout { program: String, elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs external tools. Shared across concurrent segment tasks.
#[async_trait::async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// [`ToolRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait::async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: ToolInvocation) -> Result<ToolOutput, ToolError> {
        let ToolInvocation {
            program,
            args,
            stdin,
            timeout,
        } = invocation;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();

        let mut child = cmd.spawn().map_err(|source| ToolError::NotFound {
            program: program.clone(),
            source,
        })?;

        // Feed stdin from its own task so a chatty stderr can't deadlock
        // against a large stdin payload.
        let stdin_task = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(bytes)) => Some(tokio::spawn(async move {
                // The tool may close stdin early once it has read enough.
                let _ = pipe.write_all(&bytes).await;
                drop(pipe);
            })),
            _ => None,
        };

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        // On timeout `child` is dropped with `kill_on_drop(true)`.
        let wait_result = tokio::time::timeout(timeout, child.wait()).await;

        if let Some(task) = stdin_task {
            task.abort();
        }

        match wait_result {
            Ok(Ok(status)) => {
                let stdout_bytes = stdout_task.await.unwrap_or_default();
                let stderr_bytes = stderr_task.await.unwrap_or_default();
                Ok(ToolOutput {
                    stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                    exit_code: status.code().unwrap_or(-1),
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(ToolError::Io(e)),
            Err(_elapsed) => Err(ToolError::Timeout {
                program,
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn builder_collects_args() {
        let inv = ToolInvocation::new("ffmpeg")
            .arg("-y")
            .args(["-i", "in.png"])
            .arg("out.mp4");
        assert_eq!(inv.args, vec!["-y", "-i", "in.png", "out.mp4"]);
        assert_eq!(inv.flag_value("-i"), Some("in.png"));
        assert_eq!(inv.last_arg(), Some("out.mp4"));
        assert_eq!(inv.flag_value("-missing"), None);
    }

    #[test]
    fn display_joins_program_and_args() {
        let inv = ToolInvocation::new("ffprobe").args(["-v", "error"]);
        assert_eq!(inv.to_string(), "ffprobe -v error");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_from_stdin() {
        let inv = ToolInvocation::new("sh")
            .args(["-c", "cat"])
            .stdin(b"hello tool".to_vec());
        let out = ProcessRunner.run(inv).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hello tool");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let inv = ToolInvocation::new("sh").args(["-c", "echo broken >&2; exit 3"]);
        let out = ProcessRunner.run(inv).await.unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "broken");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_the_child() {
        let inv = ToolInvocation::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(100));
        let err = ProcessRunner.run(inv).await.unwrap_err();
        assert_matches!(err, ToolError::Timeout { .. });
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let inv = ToolInvocation::new("storyreel-definitely-not-a-binary");
        let err = ProcessRunner.run(inv).await.unwrap_err();
        assert_matches!(err, ToolError::NotFound { .. });
    }
}
