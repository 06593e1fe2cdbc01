//! Small cross-cutting helpers: platform quirks, path expansion and progress output.

pub mod platform;
pub mod progress;

pub use platform::{get_git_command, is_windows, resolve_path};
pub use progress::ProgressBar;
