// file: src/utils/process.rs
// version: 1.0.0
// guid: 13ac4c0f-7ee7-471a-82fb-640207fe7db1

//! External tool execution
//!
//! Every collaborator binary (tar, genisoimage, ovftool) is driven through the
//! [`CommandRunner`] trait. The local implementation streams child output
//! line by line into `tracing`; percentage progress lines are drawn on an
//! `indicatif` bar instead so they never reach the log file.

use crate::error::OvaDeployError;
use crate::Result;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const REDACTED: &str = "********";
/// Trailing stderr lines kept for error reports
const STDERR_TAIL: usize = 20;

/// A single external command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Log child output at info instead of debug
    pub echo: bool,
    redactions: Vec<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            echo: false,
            redactions: Vec::new(),
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

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Hide a secret from every rendering of this invocation and its output
    pub fn redact(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.redactions.push(secret);
        }
        self
    }

    /// Replace every registered secret in `text`
    pub fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Longest first so an encoded form containing the raw one is fully hidden
        let mut secrets: Vec<&String> = self.redactions.iter().collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        for secret in secrets {
            out = out.replace(secret.as_str(), REDACTED);
        }
        out
    }

    /// Command line safe for logs
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        self.scrub(&line)
    }
}

/// Captured result of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for running external tools
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a non-zero exit is an error
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Runs tools as local child processes
#[derive(Debug, Default, Clone)]
pub struct LocalRunner;

impl LocalRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl CommandRunner for LocalRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        let command_line = invocation.display();
        info!("Running: {}", command_line);

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OvaDeployError::ToolNotFound(invocation.program.clone())
                } else {
                    OvaDeployError::IoError(e)
                }
            })?;

        let progress = ProgressBar::hidden();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdout_lines, stderr_lines) = tokio::join!(
            drain_lines(stdout, invocation, &progress, false),
            drain_lines(stderr, invocation, &progress, true),
        );
        let status = child.wait().await?;
        progress.finish_and_clear();

        let stdout_lines = stdout_lines?;
        let stderr_lines = stderr_lines?;

        if !status.success() {
            let start = stderr_lines.len().saturating_sub(STDERR_TAIL);
            let mut tail = stderr_lines[start..].join("\n");
            if tail.is_empty() {
                // ovftool reports its errors on stdout
                let start = stdout_lines.len().saturating_sub(STDERR_TAIL);
                tail = stdout_lines[start..].join("\n");
            }
            return Err(OvaDeployError::ProcessError {
                command: command_line,
                exit_code: status.code(),
                stderr: tail,
            });
        }

        debug!("{} exited successfully", invocation.program);
        Ok(ToolOutput {
            exit_code: status.code(),
            stdout: stdout_lines.join("\n"),
            stderr: stderr_lines.join("\n"),
        })
    }
}

/// Matches transient percentage lines such as `Disk progress: 42%`
fn progress_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)progress:\s*(\d{1,3})\s*%").ok())
        .as_ref()
}

/// Percentage carried by a progress line, if it is one
pub fn progress_percent(line: &str) -> Option<u64> {
    progress_pattern()?
        .captures(line)
        .and_then(|c| c[1].parse::<u64>().ok())
        .map(|p| p.min(100))
}

async fn drain_lines<R>(
    pipe: Option<R>,
    invocation: &ToolInvocation,
    progress: &ProgressBar,
    is_stderr: bool,
) -> Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(Vec::new());
    };

    let mut lines = BufReader::new(pipe).lines();
    let mut kept = Vec::new();

    while let Some(line) = lines.next_line().await? {
        let line = invocation.scrub(line.trim_end());
        if line.is_empty() {
            continue;
        }

        if let Some(percent) = progress_percent(&line) {
            if progress.length().is_none() {
                progress.set_length(100);
                progress.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                progress.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
            }
            progress.set_position(percent);
            progress.set_message(invocation.program.clone());
            continue;
        }

        match (invocation.echo, is_stderr) {
            (true, true) => warn!(tool = %invocation.program, "{}", line),
            (true, false) => info!(tool = %invocation.program, "{}", line),
            (false, _) => debug!(tool = %invocation.program, "{}", line),
        }
        kept.push(line);
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_redacts_secrets() {
        // Arrange
        let invocation = ToolInvocation::new("ovftool")
            .arg("--powerOn")
            .arg("vi://root:p%40ss@esx01")
            .redact("p@ss")
            .redact("p%40ss");

        // Act
        let line = invocation.display();

        // Assert
        assert_eq!(line, "ovftool --powerOn vi://root:********@esx01");
        assert!(!line.contains("p@ss"));
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let invocation = ToolInvocation::new("tar").arg("-xf").redact("");
        assert_eq!(invocation.display(), "tar -xf");
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent("Disk progress: 42%"), Some(42));
        assert_eq!(progress_percent("Disk Transfer Progress: 100 %"), Some(100));
        assert_eq!(progress_percent("Transfer Completed"), None);
        assert_eq!(progress_percent("Opening OVA source: image.ova"), None);
    }

    #[tokio::test]
    async fn test_local_runner_captures_output() {
        let runner = LocalRunner::new();
        let invocation = ToolInvocation::new("sh").args(["-c", "echo hello; echo oops >&2"]);

        let output = runner.run(&invocation).await.unwrap();

        assert_eq!(output.stdout, "hello");
        assert_eq!(output.stderr, "oops");
        assert_eq!(output.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_local_runner_filters_progress_lines() {
        let runner = LocalRunner::new();
        let invocation = ToolInvocation::new("sh")
            .args(["-c", "echo 'Disk progress: 10%'; echo 'Disk progress: 90%'; echo done"]);

        let output = runner.run(&invocation).await.unwrap();

        assert_eq!(output.stdout, "done");
    }

    #[tokio::test]
    async fn test_local_runner_non_zero_exit() {
        let runner = LocalRunner::new();
        let invocation = ToolInvocation::new("sh").args(["-c", "echo broken >&2; exit 3"]);

        let result = runner.run(&invocation).await;

        match result {
            Err(OvaDeployError::ProcessError {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("Expected ProcessError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_runner_missing_tool() {
        let runner = LocalRunner::new();
        let invocation = ToolInvocation::new("ova-deploy-no-such-tool-12345");

        let result = runner.run(&invocation).await;

        assert!(matches!(result, Err(OvaDeployError::ToolNotFound(_))));
    }
}
