//! Command-line interface for repotracker.
//!
//! One command: read the external repositories of a Bazel workspace, bring a local
//! mirror of each up to date, and write a changelog report for every dependency whose
//! pinned revision is behind upstream.
//!
//! # Usage
//!
//! ```bash
//! # Pipe the query straight in
//! bazel query --output=jsonproto '//external:all' | repotracker
//!
//! # Read a saved query, keep mirrors in a persistent cache, write JSON
//! repotracker --file deps.json --cache-dir ~/.cache/repotracker --format json
//!
//! # Only report dependencies that pin a revision
//! repotracker --file deps.json --empty-revision skip --concurrency 8
//! ```
//!
//! # Exit Status
//!
//! `0` when the run completed, even if individual dependencies failed (they are
//! logged and listed in the final summary). `1` when the run could not start: the
//! input could not be read or parsed, the configuration is invalid, or git is
//! missing.
//!
//! # Environment Variables
//!
//! - `REPOTRACKER_CONFIG`: configuration file, same as `--config`
//! - `REPOTRACKER_CACHE_DIR`: mirror cache root, same as `--cache-dir`
//! - `REPOTRACKER_NO_PROGRESS`: disable the progress bar
//! - `RUST_LOG`: log filter; takes precedence over `--verbose`/`--quiet`

use crate::cache::MirrorCache;
use crate::config::TrackerConfig;
use crate::models::RunSummary;
use crate::query::{STDIN_SOURCE, load_records};
use crate::report::{FileReporter, ReportFormat};
use crate::resolver::{GoImportResolver, RuleResolver};
use crate::tracker::{EmptyRevisionPolicy, Tracker};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// Track upstream updates of third-party Bazel dependencies.
#[derive(Parser, Debug)]
#[command(
    name = "repotracker",
    about = "Track upstream updates of third-party build dependencies",
    version,
    long_about = "Reads `bazel query --output=jsonproto //external:all`, mirrors every dependency's \
                  repository and writes a changelog report for each dependency that is behind upstream."
)]
pub struct Cli {
    /// Query output to read; `-` for standard input
    #[arg(short, long, value_name = "PATH", default_value = STDIN_SOURCE)]
    file: String,

    /// Number of dependencies processed concurrently
    #[arg(short = 'j', long, value_name = "N")]
    concurrency: Option<usize>,

    /// Root directory of the mirror cache
    #[arg(long, value_name = "DIR", env = "REPOTRACKER_CACHE_DIR")]
    cache_dir: Option<String>,

    /// Directory reports are written to [default: <cache dir>/reports]
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Report format
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,

    /// What to do with dependencies that do not pin a revision
    #[arg(long, value_enum, value_name = "POLICY")]
    empty_revision: Option<EmptyRevisionPolicy>,

    /// Timeout of a single git command in seconds; 0 disables it
    #[arg(long, value_name = "SECS")]
    git_timeout: Option<u64>,

    /// Commits listed for a dependency without a pinned revision
    #[arg(long, value_name = "N")]
    max_unpinned_commits: Option<usize>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", env = "REPOTRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Cli {
    /// Default log filter for the verbosity flags; `RUST_LOG` overrides it.
    #[must_use]
    pub const fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// Applies the command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut TrackerConfig) {
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(n) = self.concurrency {
            config.max_concurrency = n;
        }
        if let Some(secs) = self.git_timeout {
            config.git_timeout_secs = secs;
        }
        if let Some(policy) = self.empty_revision {
            config.empty_revision = policy;
        }
        if let Some(n) = self.max_unpinned_commits {
            config.max_unpinned_commits = n;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
    }

    /// Builds the effective configuration: file (if any), then flags, then validation.
    pub async fn load_config(&self) -> Result<TrackerConfig> {
        let mut config = TrackerConfig::load(self.config.as_deref()).await?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Runs the tracker.
    ///
    /// # Errors
    ///
    /// Only run-fatal errors are returned; per-dependency failures end up in the
    /// returned [`RunSummary`].
    pub async fn execute(self) -> Result<RunSummary> {
        let config = self.load_config().await?;
        let loaded = load_records(&self.file).await?;
        if loaded.ignored > 0 {
            tracing::info!("Ignoring {} rules of unsupported classes", loaded.ignored);
        }
        crate::git::ensure_git_available().await?;

        let cache_root = config.cache_root()?;
        let reports_dir = config.reports_dir()?;
        tracing::debug!("Cache root is {}", cache_root.display());

        let cache = MirrorCache::new(cache_root, config.git_timeout());
        let sink = FileReporter::new(&reports_dir, config.format)?;
        let tracker = Tracker::new(&config, cache, RuleResolver::new(GoImportResolver::new()), sink)
            .with_progress(!self.no_progress);

        let summary = tracker.run(loaded.records).await;
        for failure in &summary.failures {
            tracing::warn!("{}: failed at {}: {}", failure.name, failure.stage, failure.cause);
        }
        if summary.updated > 0 {
            tracing::info!("Reports written to {}", reports_dir.display());
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TrackerError;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["repotracker"]).unwrap();
        assert_eq!(cli.file, "-");
        assert_eq!(cli.log_filter(), "info");
        assert!(!cli.no_progress);
    }

    #[test]
    fn test_verbosity() {
        let cli = Cli::try_parse_from(["repotracker", "-v"]).unwrap();
        assert_eq!(cli.log_filter(), "debug");
        let cli = Cli::try_parse_from(["repotracker", "--quiet"]).unwrap();
        assert_eq!(cli.log_filter(), "error");
        assert!(Cli::try_parse_from(["repotracker", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "repotracker",
            "--file",
            "deps.json",
            "-j",
            "4",
            "--cache-dir",
            "/tmp/mirrors",
            "--output-dir",
            "/tmp/out",
            "--format",
            "json",
            "--empty-revision",
            "skip",
            "--git-timeout",
            "0",
            "--max-unpinned-commits",
            "10",
        ])
        .unwrap();

        let mut config = TrackerConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.cache_dir.as_deref(), Some("/tmp/mirrors"));
        assert_eq!(config.output_dir.as_deref(), Some("/tmp/out"));
        assert_eq!(config.format, ReportFormat::Json);
        assert_eq!(config.empty_revision, EmptyRevisionPolicy::Skip);
        assert_eq!(config.git_timeout(), None);
        assert_eq!(config.max_unpinned_commits, 10);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        assert!(Cli::try_parse_from(["repotracker", "--empty-revision", "never"]).is_err());
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_config_error() {
        let cli = Cli::try_parse_from(["repotracker", "--concurrency", "0"]).unwrap();
        let err = cli.load_config().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::ConfigError { .. })
        ));
    }
}
