//! Core types shared by every stage of the tracker.
//!
//! Currently this is the error taxonomy; see [`error`] for the variants and the
//! user-facing rendering of run-fatal failures.

pub mod error;

pub use error::{ErrorContext, TrackerError, user_friendly_error};
