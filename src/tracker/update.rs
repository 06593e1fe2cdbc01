//! Update detection
//!
//! A dependency has an update when the remote head is strictly ahead of the pinned
//! revision: the two resolve to different commits and the pin is an ancestor of the
//! head. A pin that is not an ancestor (a side branch, or history that was rewritten)
//! is not reported as an update.

use crate::cache::MirrorQuery;
use crate::core::TrackerError;
use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What to do with dependencies that do not pin a revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmptyRevisionPolicy {
    /// Treat the dependency as updated and report the latest history.
    #[default]
    #[serde(rename = "always")]
    #[value(name = "always")]
    AlwaysUpdate,
    /// Skip the dependency before update detection.
    Skip,
}

/// Whether `head` is strictly ahead of `pinned` in the queried mirror.
///
/// An empty `pinned` is decided by `policy` without touching the mirror.
///
/// # Errors
///
/// [`TrackerError::RevisionNotFound`] if `pinned` (or `head`) is not a commit of the
/// mirror, or a git error if the ancestry check itself fails.
pub async fn has_update(
    query: &MirrorQuery,
    pinned: &str,
    head: &str,
    policy: EmptyRevisionPolicy,
) -> Result<bool> {
    if pinned.is_empty() {
        return Ok(policy == EmptyRevisionPolicy::AlwaysUpdate);
    }

    let pinned_commit = resolve(query, pinned).await?;
    let head_commit = resolve(query, head).await?;
    if pinned_commit == head_commit {
        tracing::debug!("{}: {} is the latest commit", query.url(), pinned);
        return Ok(false);
    }

    query.is_ancestor(&pinned_commit, &head_commit).await
}

async fn resolve(query: &MirrorQuery, revision: &str) -> Result<String> {
    query.resolve_commit(revision).await?.ok_or_else(|| {
        TrackerError::RevisionNotFound {
            url: query.url().to_string(),
            revision: revision.to_string(),
        }
        .into()
    })
}
