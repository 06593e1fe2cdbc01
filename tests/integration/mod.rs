//! Integration test suite for repotracker
//!
//! End-to-end tests of the tracking pipeline and the command-line binary. Upstream
//! repositories are local fixture repositories built with the real `git` binary, so
//! the suite needs no network access.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! cargo nextest run --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cache_behavior**: Mirror reuse and idempotent sync across runs
//! - **cli**: Binary exit status, report output and progress flags
//! - **isolation**: One failing dependency never affects its siblings
//! - **pipeline**: Full runs from query output to report files

mod common;

mod cache_behavior;
mod cli;
mod isolation;
mod pipeline;
