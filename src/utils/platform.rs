//! Platform-specific helpers.
//!
//! The tracker shells out to the system `git` binary and accepts user-supplied
//! directories for the cache root and report output, so it needs the git executable
//! name for the current platform and shell-style expansion of configured paths.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Returns the name of the git executable for the current platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Resolves a configured path, expanding `~` and environment variables.
///
/// # Examples
///
/// ```rust,no_run
/// use repotracker::utils::platform::resolve_path;
///
/// # fn example() -> anyhow::Result<()> {
/// let cache = resolve_path("~/.cache/repotracker")?;
/// let reports = resolve_path("$HOME/reports")?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the path references an undefined environment variable or
/// the home directory cannot be determined.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path)
        .with_context(|| format!("Failed to expand path: {path}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
