//! Shared data models for the tracking pipeline
//!
//! The types here flow between the pipeline stages: [`DependencyRecord`]s come out of
//! the build query, the resolver turns them into [`RepoCoordinate`]s, the cache and
//! history stages produce [`Commit`]s, and every dependency with an update ends up as
//! one [`Changelog`] for the report sink. [`RunSummary`] is the terminal account of a
//! run.

use crate::cache::Mirror;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A third-party dependency as declared in the build manifest.
///
/// Closed over the three declaration forms the tracker understands; every form keeps
/// the declared rule name for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyRecord {
    /// A language package identified by its import path (`go_repository`).
    Package {
        /// Declared rule name
        name: String,
        /// Import path, e.g. `golang.org/x/tools`
        import_path: String,
        /// Pinned commit or tag; empty when unpinned
        revision: String,
    },
    /// A source archive downloaded over HTTP (`http_archive`).
    Archive {
        /// Declared rule name
        name: String,
        /// Candidate download URLs, in declaration order
        urls: Vec<String>,
    },
    /// A repository referenced by its remote (`git_repository`).
    Direct {
        /// Declared rule name
        name: String,
        /// Fetchable remote URL
        remote: String,
        /// Pinned commit or tag; empty when unpinned
        revision: String,
    },
}

impl DependencyRecord {
    /// Declared rule name of the dependency.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Package {
                name,
                ..
            }
            | Self::Archive {
                name,
                ..
            }
            | Self::Direct {
                name,
                ..
            } => name,
        }
    }
}

impl fmt::Display for DependencyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package {
                name,
                import_path,
                ..
            } => write!(f, "{name} ({import_path})"),
            Self::Archive {
                name,
                ..
            } => write!(f, "{name}"),
            Self::Direct {
                name,
                remote,
                ..
            } => write!(f, "{name} ({remote})"),
        }
    }
}

/// Canonical identity of a dependency: where it lives and which revision is pinned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinate {
    /// Fetchable remote URL
    pub url: String,
    /// Pinned revision; empty means the remote's default branch
    pub revision: String,
}

impl RepoCoordinate {
    /// Creates a coordinate from a remote and a revision.
    pub fn new(url: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: revision.into(),
        }
    }

    /// Whether no revision is pinned.
    #[must_use]
    pub fn is_unpinned(&self) -> bool {
        self.revision.is_empty()
    }
}

impl fmt::Display for RepoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{}@{}", self.url, self.revision)
        }
    }
}

/// One commit of a changelog, with the tags that point at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit hash
    pub hash: String,
    /// Tag names decorating the commit, in git's order
    pub tags: Vec<String>,
    /// Committer time
    pub timestamp: DateTime<Utc>,
    /// First line of the commit message
    pub title: String,
}

impl Commit {
    /// Abbreviated hash as shown in reports.
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.hash.get(..6).unwrap_or(&self.hash)
    }
}

/// Commits between a dependency's pinned revision and the remote head.
#[derive(Debug, Clone)]
pub struct Changelog {
    /// Declared rule name of the dependency
    pub name: String,
    /// Where the dependency lives and what it pins
    pub coordinate: RepoCoordinate,
    /// Mirror the history was read from
    pub mirror: Mirror,
    /// New commits, newest first
    pub commits: Vec<Commit>,
}

impl Changelog {
    /// Browsable base URL of the repository, without a trailing `.git`.
    #[must_use]
    pub fn web_url(&self) -> &str {
        let url = self.coordinate.url.trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url)
    }

    /// Link to a single commit.
    #[must_use]
    pub fn commit_url(&self, hash: &str) -> String {
        format!("{}/commit/{hash}", self.web_url())
    }

    /// Link to the release page of a tag.
    #[must_use]
    pub fn tag_url(&self, tag: &str) -> String {
        format!("{}/releases/tag/{tag}", self.web_url())
    }
}

/// Pipeline stage a dependency failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Declaration → canonical coordinate
    Resolve,
    /// Clone or refresh of the mirror
    Sync,
    /// Ancestry check of the pinned revision
    Detect,
    /// Commit log extraction
    Extract,
    /// Report rendering and writing
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Sync => "sync",
            Self::Detect => "detect",
            Self::Extract => "extract",
            Self::Report => "report",
        };
        f.write_str(name)
    }
}

/// A dependency that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Declared rule name
    pub name: String,
    /// Stage that failed
    pub stage: Stage,
    /// Error message including its cause chain
    pub cause: String,
}

/// Terminal account of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Dependencies taken from the queue
    pub total: usize,
    /// Dependencies with a changelog reported
    pub updated: usize,
    /// Dependencies whose pin is the remote head (or ahead of it)
    pub up_to_date: usize,
    /// Unpinned dependencies skipped by policy
    pub skipped_unpinned: usize,
    /// Dependencies that failed, in completion order
    pub failures: Vec<Failure>,
}

impl RunSummary {
    /// Whether any dependency failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Failures recorded for `name`.
    pub fn failures_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Failure> + 'a {
        self.failures.iter().filter(move |f| f.name == name)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dependencies: {} updated, {} up to date, {} unpinned skipped, {} failed",
            self.total,
            self.updated,
            self.up_to_date,
            self.skipped_unpinned,
            self.failures.len()
        )
    }
}
