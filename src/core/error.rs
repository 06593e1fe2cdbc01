//! Error handling for repotracker
//!
//! This module provides the typed error taxonomy of the tracking pipeline and the
//! user-friendly error reporting used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can tell failure kinds apart
//! 2. **User-friendly messages** with actionable suggestions for run-fatal failures
//!
//! # Architecture
//!
//! - [`TrackerError`] - Enumerated error types for every failure the pipeline names
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! Functions throughout the crate return [`anyhow::Result`]; a [`TrackerError`] travels
//! inside the `anyhow::Error` and is recovered with `downcast_ref` where the kind
//! matters (stage logging, tests, [`user_friendly_error`]).
//!
//! # Error Categories
//!
//! - **Resolution**: [`TrackerError::ResolutionFailed`], [`TrackerError::UnsupportedHost`],
//!   [`TrackerError::NoRecognizedUrl`], [`TrackerError::UnsupportedRuleClass`]
//! - **Mirror**: [`TrackerError::SyncFailed`], [`TrackerError::GitCommandError`],
//!   [`TrackerError::GitNotFound`]
//! - **History**: [`TrackerError::RevisionNotFound`], [`TrackerError::MalformedLogRecord`]
//! - **Run setup**: [`TrackerError::ConfigError`], [`TrackerError::InputError`]
//!
//! # Examples
//!
//! ```rust,no_run
//! use repotracker::core::{TrackerError, user_friendly_error};
//!
//! let error = anyhow::Error::from(TrackerError::GitNotFound);
//! if let Some(TrackerError::GitNotFound) = error.downcast_ref::<TrackerError>() {
//!     user_friendly_error(error).display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Every failure kind the tracking pipeline distinguishes.
///
/// Variants below the resolution stage are local to one dependency: the
/// orchestrator logs them and moves on. Only [`ConfigError`] and [`InputError`]
/// abort a run.
///
/// [`ConfigError`]: TrackerError::ConfigError
/// [`InputError`]: TrackerError::InputError
#[derive(Error, Debug, Clone)]
pub enum TrackerError {
    /// The canonical repository of a dependency could not be determined.
    #[error("Cannot resolve repository for '{name}': {reason}")]
    ResolutionFailed {
        /// Import path or rule name of the dependency
        name: String,
        /// Why resolution failed
        reason: String,
    },

    /// An import path resolved to a version control system other than git.
    #[error("Import path '{import_path}' is hosted with unsupported VCS '{vcs}'; want git")]
    UnsupportedHost {
        /// The import path that was resolved
        import_path: String,
        /// The VCS reported for it (e.g. "hg", "bzr")
        vcs: String,
    },

    /// None of the candidate archive URLs matched a registered host pattern.
    #[error("No recognized repository URL for '{name}'")]
    NoRecognizedUrl {
        /// Rule name of the archive dependency
        name: String,
    },

    /// The build query contained a rule class the tracker does not understand.
    #[error("Unsupported rule class '{rule_class}' for '{name}'")]
    UnsupportedRuleClass {
        /// Rule name
        name: String,
        /// Rule class as reported by the build query
        rule_class: String,
    },

    /// Cloning or refreshing a mirror exited with a non-zero status.
    #[error("Failed to sync mirror of {url}: `{command}` failed with output: {}", .output.trim())]
    SyncFailed {
        /// Remote URL of the mirror
        url: String,
        /// The git invocation that failed
        command: String,
        /// Combined stdout and stderr of the failed command
        output: String,
    },

    /// The pinned revision does not exist in the mirror's history.
    #[error("Revision '{revision}' not found in {url}")]
    RevisionNotFound {
        /// Remote URL of the mirror
        url: String,
        /// The pinned revision that could not be found
        revision: String,
    },

    /// A `git log` record did not match the fixed four-field layout.
    #[error("Malformed log record {record:?}: {reason}")]
    MalformedLogRecord {
        /// The offending record, as emitted by git
        record: String,
        /// What was wrong with it
        reason: String,
    },

    /// A git command returned a non-zero exit code.
    #[error("Git operation failed: {command}: {}", .output.trim())]
    GitCommandError {
        /// The git invocation, without the `-C <dir>` prefix
        command: String,
        /// Combined stdout and stderr of the command
        output: String,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// The dependency enumeration could not be read or parsed.
    #[error("Cannot read dependency records from {source_name}: {reason}")]
    InputError {
        /// File path, or "stdin"
        source_name: String,
        /// Why reading or parsing failed
        reason: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

/// Error wrapper carrying a user-facing suggestion and extra details.
///
/// Run-fatal errors are converted into an `ErrorContext` by [`user_friendly_error`]
/// and printed by `main` before exiting with a non-zero status.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: TrackerError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: TrackerError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions where the kind is known.
///
/// Known [`TrackerError`] variants get tailored suggestions, TOML syntax errors are
/// reported as configuration errors, and anything else is wrapped in
/// [`TrackerError::Other`] with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(tracker_error) = error.downcast_ref::<TrackerError>() {
        return create_error_context(tracker_error.clone());
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(TrackerError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the configuration file passed with --config")
        .with_details("TOML parsing errors are usually caused by missing quotes or mismatched brackets");
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(TrackerError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check the permissions of the cache and output directories");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(TrackerError::Other {
        message,
    })
}

fn create_error_context(error: TrackerError) -> ErrorContext {
    match &error {
        TrackerError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ or your package manager (e.g., 'brew install git', 'apt install git')")
            .with_details("repotracker keeps local git mirrors of every dependency and needs git in your PATH"),

        TrackerError::InputError { .. } => ErrorContext::new(error)
            .with_suggestion("Generate the input with 'bazel query --output=jsonproto //external:all' and pass it with --file, or pipe it to stdin with --file -")
            .with_details("Both a single QueryResult object and newline-delimited targets are accepted"),

        TrackerError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check the values passed on the command line and in the --config file"),

        TrackerError::SyncFailed { output, .. } => {
            let details = output.trim().to_string();
            ErrorContext::new(error)
                .with_suggestion("Check the repository URL and your network connection, or remove the mirror directory to force a fresh clone")
                .with_details(details)
        }

        TrackerError::GitCommandError { output, .. } => {
            let details = output.trim().to_string();
            ErrorContext::new(error)
                .with_suggestion("Try running the git command manually in the mirror directory for more details")
                .with_details(details)
        }

        _ => ErrorContext::new(error),
    }
}
