//! repotracker - upstream update tracking for third-party build dependencies
//!
//! Large Bazel workspaces pin hundreds of external repositories: Go packages by import
//! path, HTTP archives by download URL, git repositories by remote. repotracker finds
//! out which of them are behind upstream and writes a changelog for each one.
//!
//! # Pipeline
//!
//! ```text
//! bazel query ──► DependencyRecord ──► RepoCoordinate ──► Mirror ──► update? ──► Changelog ──► report
//!   [query]         [models]            [resolver]         [cache]    [tracker]    [tracker]     [report]
//! ```
//!
//! Every dependency runs through the stages on its own; a failure in one dependency
//! is logged and recorded, never fatal to the run.
//!
//! # Core Modules
//!
//! - [`query`] - Reads `bazel query --output=jsonproto` output into dependency records
//! - [`resolver`] - Maps records to a canonical `{url, revision}`: import path
//!   discovery and archive URL patterns
//! - [`cache`] - One local git mirror per remote, with per-mirror locking
//! - [`tracker`] - Update detection, changelog extraction and the worker pool
//! - [`report`] - Markdown and JSON changelog reports
//!
//! ## Supporting Modules
//!
//! - [`git`] - Async wrapper over the system `git` binary
//! - [`config`] - TOML configuration and defaults
//! - [`cli`] - Command-line interface
//! - [`core`] - Error types and user-facing error rendering
//! - [`models`] - Data types shared between the stages
//! - [`utils`] - Progress bar and platform helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use repotracker::cache::MirrorCache;
//! use repotracker::config::TrackerConfig;
//! use repotracker::query::load_records;
//! use repotracker::report::FileReporter;
//! use repotracker::resolver::{GoImportResolver, RuleResolver};
//! use repotracker::tracker::Tracker;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = TrackerConfig::default();
//! let records = load_records("deps.json").await?;
//!
//! let cache = MirrorCache::new(config.cache_root()?, config.git_timeout());
//! let sink = FileReporter::new(config.reports_dir()?, config.format)?;
//! let tracker = Tracker::new(&config, cache, RuleResolver::new(GoImportResolver::new()), sink);
//!
//! let summary = tracker.run(records.records).await;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod models;
pub mod query;
pub mod report;
pub mod resolver;
pub mod tracker;
pub mod utils;

// Test utilities module - public when test-utils feature is enabled
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
