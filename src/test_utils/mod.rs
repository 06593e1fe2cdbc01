//! Test utilities for repotracker
//!
//! Helpers shared by unit tests and the integration suite: logging setup and a
//! [`TestGit`] wrapper that builds fixture repositories with the real `git` binary.
//!
//! The module is compiled for `cfg(test)` and behind the `test-utils` feature so the
//! integration tests in `tests/` can reach it.

pub mod git_helper;

pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` the given level is used, otherwise
/// `RUST_LOG` is honoured; with neither, tests run without a subscriber.
///
/// ```bash
/// RUST_LOG=repotracker=debug,git=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
