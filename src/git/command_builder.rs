//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing Git commands so that
//! every subprocess the tracker spawns gets the same timeout handling, logging and
//! error shape. Exit status is the only structured signal git gives us; on failure the
//! combined stdout and stderr are attached to the error for diagnostics.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::DEFAULT_GIT_TIMEOUT;
use crate::core::TrackerError;
use crate::utils::platform::get_git_command;

/// Builder for constructing and executing Git commands.
///
/// # Examples
///
/// ```rust,no_run
/// use repotracker::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::new()
///     .args(["rev-parse", "HEAD"])
///     .current_dir("/path/to/mirror")
///     .with_context("acme/widget")
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Default Configuration
///
/// - **Timeout**: 5 minutes ([`DEFAULT_GIT_TIMEOUT`])
/// - **Working directory**: passed to git with `-C` when set
/// - **Environment**: inherits from the parent process; commands that talk to a remote
///   add `GIT_TERMINAL_PROMPT=0` so a credential prompt fails fast instead of hanging
///   a worker
#[derive(Debug, Clone)]
pub struct GitCommand {
    /// Command arguments to pass to Git (e.g., ["clone", "url", "path"])
    args: Vec<String>,

    /// Working directory for command execution
    current_dir: Option<PathBuf>,

    /// Environment variables to set for the Git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for command completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional context string for log messages (typically the remote URL)
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: Some(DEFAULT_GIT_TIMEOUT),
            context: None,
        }
    }
}

/// Output from a Git command
#[derive(Debug, Clone)]
pub struct GitCommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    /// Standard output from the Git command
    pub stdout: String,
    /// Standard error output from the Git command
    pub stderr: String,
}

impl GitCommandOutput {
    /// Whether git exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, the diagnostic text attached to failures.
    #[must_use]
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

impl GitCommand {
    /// Creates a new Git command builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for Git command execution.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument to the Git command.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments to the Git command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the Git command execution.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context for logging (e.g., the remote URL of the mirror)
    ///
    /// Concurrent workers interleave their log lines; the context tells them apart:
    /// ```text
    /// (https://github.com/acme/widget) Executing command: git -C /tmp/... pull --ff-only
    /// ```
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The git invocation as shown in errors, without the `-C <dir>` prefix.
    #[must_use]
    pub fn display_command(&self) -> String {
        format!("git {}", self.args.join(" "))
    }

    fn log_prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Runs the command and returns its output whatever the exit status.
    ///
    /// Only a failure to spawn git, or hitting the timeout, is an error here. Use
    /// this for commands whose exit code carries an answer, such as
    /// `merge-base --is-ancestor`.
    pub async fn execute_unchecked(&self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            // -C keeps git independent of the process's current directory
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        cmd.args(&full_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        let prefix = self.log_prefix();
        tracing::debug!(
            target: "git",
            "{}Executing command: {} {}",
            prefix,
            git_command,
            full_args.join(" ")
        );

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        anyhow::Error::from(TrackerError::GitNotFound)
                    } else {
                        anyhow::Error::from(e)
                            .context(format!("Failed to execute {}", self.display_command()))
                    }
                })?
            } else {
                tracing::warn!(
                    target: "git",
                    "{}Command timed out after {} seconds: {}",
                    prefix,
                    duration.as_secs(),
                    self.display_command()
                );
                return Err(TrackerError::GitCommandError {
                    command: self.display_command(),
                    output: format!(
                        "Git command timed out after {} seconds. This may indicate:\n\
                        - Network connectivity issues\n\
                        - Authentication prompts waiting for input\n\
                        - Large repository operations taking too long",
                        duration.as_secs()
                    ),
                }
                .into());
            }
        } else {
            output_future
                .await
                .with_context(|| format!("Failed to execute {}", self.display_command()))?
        };

        let result = GitCommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        let elapsed = start.elapsed();
        let operation = self.args.first().map_or("unknown", String::as_str);
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "{}Git {} took {:.2}s", prefix, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "{}Git {} took {}ms", prefix, operation, elapsed.as_millis());
        }

        Ok(result)
    }

    /// Execute the command, failing with [`TrackerError::GitCommandError`] on a
    /// non-zero exit.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let output = self.execute_unchecked().await?;

        if !output.success() {
            tracing::debug!(
                target: "git",
                "{}Command failed with exit code: {:?}",
                self.log_prefix(),
                output.code
            );
            let combined = output.combined();
            if !combined.trim().is_empty() {
                tracing::debug!(target: "git", "{}Error: {}", self.log_prefix(), combined.trim());
            }
            return Err(TrackerError::GitCommandError {
                command: self.display_command(),
                output: combined,
            }
            .into());
        }

        Ok(output)
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and check for success
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

// Convenience builders for the operations the tracker performs

/// Makes git fail instead of prompting for credentials; mirrors sync unattended.
const TERMINAL_PROMPT_ENV: &str = "GIT_TERMINAL_PROMPT";

impl GitCommand {
    /// Create a full clone of `url` into `target`
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        Self::new()
            .args(["clone", "--quiet", url])
            .arg(target.as_ref().display().to_string())
            .env(TERMINAL_PROMPT_ENV, "0")
    }

    /// Fetch the remote's default branch and tags, then fast-forward onto it
    pub fn pull_fast_forward() -> Self {
        Self::new()
            .args(["pull", "--ff-only", "--quiet", "--tags", "origin", "HEAD"])
            .env(TERMINAL_PROMPT_ENV, "0")
    }

    /// Resolve a revision to the commit it names; exits 1 when it does not exist
    pub fn verify_commit(revision: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", &format!("{revision}^{{commit}}")])
    }

    /// Exit 0 when `ancestor` is an ancestor of `descendant`, 1 when it is not
    pub fn is_ancestor(ancestor: &str, descendant: &str) -> Self {
        Self::new().args(["merge-base", "--is-ancestor", ancestor, descendant])
    }

    /// Log `range` as NUL-separated `hash, tag decorations, commit time, title` records
    pub fn log_records(range: &str) -> Self {
        Self::new().args([
            "log",
            "--pretty=format:%H%x00%D%x00%ct%x00%s",
            "--decorate=short",
            "--decorate-refs=refs/tags",
            range,
        ])
    }

    /// Create a command printing the installed git version
    pub fn version() -> Self {
        Self::new().arg("--version")
    }
}
