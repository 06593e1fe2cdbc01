//! Run configuration
//!
//! A [`TrackerConfig`] carries every knob of a tracking run. Values come from, in
//! increasing precedence:
//!
//! 1. Built-in defaults
//! 2. A TOML file given with `--config` (or `REPOTRACKER_CONFIG`)
//! 3. Command-line flags (and their environment variables, e.g. `REPOTRACKER_CACHE_DIR`)
//!
//! # Configuration File
//!
//! ```toml
//! cache_dir = "~/.cache/repotracker"
//! output_dir = "./reports"
//! max_concurrency = 20
//! git_timeout_secs = 300        # 0 disables the timeout
//! empty_revision = "always"     # or "skip"
//! max_unpinned_commits = 50
//! format = "markdown"           # or "json"
//! ```
//!
//! Unknown keys are rejected so typos do not silently fall back to defaults.

use crate::constants::{
    DEFAULT_CACHE_DIR_NAME, DEFAULT_GIT_TIMEOUT, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_UNPINNED_COMMITS, DEFAULT_REPORTS_DIR_NAME,
};
use crate::core::TrackerError;
use crate::report::ReportFormat;
use crate::tracker::EmptyRevisionPolicy;
use crate::utils::platform::resolve_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings of one tracking run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Root of the mirror cache; `~` and `$VARS` are expanded
    pub cache_dir: Option<String>,
    /// Directory reports are written to; defaults to `<cache root>/reports`
    pub output_dir: Option<String>,
    /// Number of dependencies processed concurrently
    pub max_concurrency: usize,
    /// Timeout of a single git command in seconds; 0 disables it
    pub git_timeout_secs: u64,
    /// Handling of dependencies without a pinned revision
    pub empty_revision: EmptyRevisionPolicy,
    /// Commits listed for an unpinned dependency
    pub max_unpinned_commits: usize,
    /// Report format
    pub format: ReportFormat,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            output_dir: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            git_timeout_secs: DEFAULT_GIT_TIMEOUT.as_secs(),
            empty_revision: EmptyRevisionPolicy::default(),
            max_unpinned_commits: DEFAULT_MAX_UNPINNED_COMMITS,
            format: ReportFormat::default(),
        }
    }
}

impl TrackerConfig {
    /// Loads the configuration file at `path`, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// [`TrackerError::ConfigError`] if an explicitly given file does not exist; TOML
    /// errors are returned with the file path as context.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Loads a configuration file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrackerError::ConfigError {
                    message: format!("config file not found: {}", path.display()),
                }
                .into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()));
            }
        };

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Rejects values no run can work with.
    ///
    /// # Errors
    ///
    /// [`TrackerError::ConfigError`] for a zero concurrency or commit limit.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(TrackerError::ConfigError {
                message: "max_concurrency must be at least 1".to_string(),
            }
            .into());
        }
        if self.max_unpinned_commits == 0 {
            return Err(TrackerError::ConfigError {
                message: "max_unpinned_commits must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Resolved cache root; `<system temp dir>/repotracker` unless configured.
    pub fn cache_root(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => resolve_path(dir),
            None => Ok(std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)),
        }
    }

    /// Resolved report directory; `<cache root>/reports` unless configured.
    pub fn reports_dir(&self) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => resolve_path(dir),
            None => Ok(self.cache_root()?.join(DEFAULT_REPORTS_DIR_NAME)),
        }
    }

    /// Per-command git timeout, `None` when disabled.
    #[must_use]
    pub const fn git_timeout(&self) -> Option<Duration> {
        if self.git_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.git_timeout_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.max_concurrency, 20);
        assert_eq!(config.git_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.empty_revision, EmptyRevisionPolicy::AlwaysUpdate);
        assert_eq!(config.max_unpinned_commits, 50);
        assert_eq!(config.format, ReportFormat::Markdown);
        assert_eq!(config.cache_root().unwrap(), std::env::temp_dir().join("repotracker"));
        assert_eq!(
            config.reports_dir().unwrap(),
            std::env::temp_dir().join("repotracker").join("reports")
        );
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("repotracker.toml");
        std::fs::write(
            &path,
            r#"
            cache_dir = "/var/cache/repotracker"
            max_concurrency = 4
            git_timeout_secs = 0
            empty_revision = "skip"
            format = "json"
            "#,
        )
        .unwrap();

        let config = TrackerConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.git_timeout(), None);
        assert_eq!(config.empty_revision, EmptyRevisionPolicy::Skip);
        assert_eq!(config.format, ReportFormat::Json);
        assert_eq!(config.max_unpinned_commits, 50);
        assert_eq!(
            config.reports_dir().unwrap(),
            PathBuf::from("/var/cache/repotracker").join("reports")
        );
    }

    #[tokio::test]
    async fn test_load_none_is_default() {
        assert_eq!(TrackerConfig::load(None).await.unwrap(), TrackerConfig::default());
    }

    #[tokio::test]
    async fn test_missing_explicit_file() {
        let temp = TempDir::new().unwrap();
        let err = TrackerConfig::load(Some(&temp.path().join("absent.toml"))).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::ConfigError { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "max_concurency = 4\n").unwrap();

        let err = TrackerConfig::load_from(&path).await.unwrap_err();
        assert!(err.downcast_ref::<toml::de::Error>().is_some());
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = TrackerConfig {
            max_concurrency: 0,
            ..TrackerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::ConfigError { message }) if message.contains("max_concurrency")
        ));
    }

    #[test]
    fn test_output_dir_expansion() {
        let config = TrackerConfig {
            output_dir: Some("$PATH/reports".to_string()),
            ..TrackerConfig::default()
        };
        let expected = PathBuf::from(format!("{}/reports", std::env::var("PATH").unwrap()));
        assert_eq!(config.reports_dir().unwrap(), expected);
    }
}
