//! Git operations wrapper for repotracker
//!
//! This module provides an async wrapper around the system `git` command. Mirrors are
//! plain clones driven through the CLI rather than an embedded Git library, so existing
//! git configuration (proxies, `insteadOf` rewrites, credential helpers) applies to
//! every remote the tracker touches.
//!
//! Every operation is a subprocess built with [`GitCommand`], which supplies the
//! timeout, logging and error shape. [`GitRepo`] only adds the repository path and the
//! interpretation of exit codes for the queries whose answer *is* the exit code.
//!
//! # Examples
//!
//! ```rust,no_run
//! use repotracker::git::GitRepo;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = GitRepo::clone("https://github.com/acme/widget", "/tmp/mirror", None).await?;
//! repo.pull_fast_forward().await?;
//!
//! if let Some(pinned) = repo.resolve_commit("v1.2.3").await? {
//!     let behind = repo.is_ancestor(&pinned, "HEAD").await?;
//!     println!("update available: {behind}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

use crate::core::TrackerError;
use crate::git::command_builder::GitCommand;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A Git repository handle providing async operations via CLI commands.
///
/// The struct holds the repository path and the per-command timeout; all state is
/// queried from git directly.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    timeout: Option<Duration>,
    context: Option<String>,
}

impl GitRepo {
    /// Creates a handle for an existing local repository.
    ///
    /// This does not verify that the path contains a repository.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timeout: Some(crate::constants::DEFAULT_GIT_TIMEOUT),
            context: None,
        }
    }

    /// Overrides the timeout applied to every command run against this repository.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the context shown in git log lines (typically the remote URL).
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn command(&self, cmd: GitCommand) -> GitCommand {
        let cmd = cmd.current_dir(&self.path).with_timeout(self.timeout);
        match &self.context {
            Some(ctx) => cmd.with_context(ctx.clone()),
            None => cmd,
        }
    }

    /// Performs a full clone of `url` into `target`.
    ///
    /// `target` must be absent or empty.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::GitCommandError`] carrying the combined git output if the
    /// URL is unreachable, authentication is required, or the target is not empty.
    pub async fn clone(
        url: &str,
        target: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let target = target.as_ref();
        GitCommand::clone(url, target)
            .with_timeout(timeout)
            .with_context(url)
            .execute_success()
            .await?;

        Ok(Self::new(target).with_timeout(timeout).with_context(url))
    }

    /// Fetches the remote's default branch with tags and fast-forwards onto it.
    ///
    /// Fails if the local branch has diverged, which never happens for a mirror that
    /// only ever fast-forwards.
    pub async fn pull_fast_forward(&self) -> Result<()> {
        self.command(GitCommand::pull_fast_forward()).execute_success().await
    }

    /// Resolves `revision` (hash, tag, branch, `HEAD`) to a full commit hash.
    ///
    /// Returns `Ok(None)` when the revision does not name a commit in this repository.
    pub async fn resolve_commit(&self, revision: &str) -> Result<Option<String>> {
        let output = self.command(GitCommand::verify_commit(revision)).execute_unchecked().await?;
        match output.code {
            Some(0) => Ok(Some(output.stdout.trim().to_string())),
            Some(1) | Some(128) => Ok(None),
            _ => Err(TrackerError::GitCommandError {
                command: GitCommand::verify_commit(revision).display_command(),
                output: output.combined(),
            }
            .into()),
        }
    }

    /// Returns whether `ancestor` is an ancestor of (or equal to) `descendant`.
    ///
    /// `git merge-base --is-ancestor` answers with its exit code: 0 for yes, 1 for no.
    /// Any other status is an error.
    pub async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let cmd = GitCommand::is_ancestor(ancestor, descendant);
        let shown = cmd.display_command();
        let output = self.command(cmd).execute_unchecked().await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(TrackerError::GitCommandError {
                command: shown,
                output: output.combined(),
            }
            .into()),
        }
    }

    /// Returns the raw NUL-separated log records for `range`.
    ///
    /// Records are `hash \0 decorations \0 commit-time \0 title`, one per line,
    /// newest first. With `max_count` only the first that many commits are listed.
    pub async fn log_records(&self, range: &str, max_count: Option<usize>) -> Result<String> {
        let mut cmd = GitCommand::log_records(range);
        if let Some(max) = max_count {
            cmd = cmd.arg(format!("--max-count={max}"));
        }
        let output = self.command(cmd).execute().await?;
        Ok(output.stdout)
    }
}

/// Fails with [`TrackerError::GitNotFound`] unless git can be executed; returns the
/// version banner otherwise.
pub async fn ensure_git_available() -> Result<String> {
    let version = GitCommand::version()
        .execute_stdout()
        .await
        .map_err(|_| anyhow::Error::from(TrackerError::GitNotFound))?;
    tracing::debug!(target: "git", "Using {}", version);
    Ok(version)
}
