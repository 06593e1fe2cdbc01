//! Global constants used throughout the repotracker codebase.
//!
//! This module contains timeout durations, concurrency defaults, and other
//! numeric constants that are used across multiple modules.

use std::time::Duration;

/// Default timeout for a single Git subprocess (5 minutes).
///
/// Clones of large repositories dominate the run time, so the default is
/// generous. A hung `git` process is reported as a failure of the stage that
/// spawned it once this elapses.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of dependencies checked concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

/// Upper bound of commits listed for a dependency that never pinned a revision.
pub const DEFAULT_MAX_UNPINNED_COMMITS: usize = 50;

/// Capacity of the queue between the record producer and the workers.
///
/// The queue only needs to keep the workers busy, so twice the worker count
/// is plenty; this is the floor for very small pools.
pub const MIN_QUEUE_CAPACITY: usize = 16;

/// Name of the directory created under the system temp dir when no cache
/// root is configured.
pub const DEFAULT_CACHE_DIR_NAME: &str = "repotracker";

/// Name of the reports directory created under the cache root when no output
/// directory is configured.
pub const DEFAULT_REPORTS_DIR_NAME: &str = "reports";

/// Separator between fields of one `git log` record.
pub const LOG_FIELD_SEPARATOR: char = '\0';

/// Timeout for the `?go-get=1` lookup of an import path (30 seconds).
pub const IMPORT_PATH_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);
