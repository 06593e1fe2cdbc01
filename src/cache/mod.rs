//! Local mirror cache for dependency repositories
//!
//! The cache keeps one full git clone per distinct remote URL under a cache root that
//! is owned by the [`MirrorCache`] for its whole lifetime. Dependencies pinning the
//! same remote at different revisions share the mirror.
//!
//! # Cache Layout
//!
//! ```text
//! {root}/
//! ├── github_com/
//! │   ├── acme_widget/          # mirror of https://github.com/acme/widget
//! │   └── golang_tools/         # mirror of https://github.com/golang/tools.git
//! ├── go_googlesource_com/
//! │   └── net/
//! └── .locks/                   # cross-process locks, one per mirror
//!     └── github_com_acme_widget.lock
//! ```
//!
//! Host and path are sanitized by collapsing every run of non-word characters into a
//! single `_`. The mapping is deterministic; two distinct URLs that sanitize to the
//! same directory share it.
//!
//! # Sync Policy
//!
//! [`MirrorCache::acquire`] brings a mirror up to date before any query runs against
//! it: an absent or empty directory is cloned, anything else gets a
//! `git pull --ff-only` of the remote's default branch. Every acquire refreshes; there
//! is no "already fetched this run" shortcut.
//!
//! # Concurrency
//!
//! Each mirror directory has an async `RwLock` stored in a `DashMap`:
//! - **Sync** (clone or pull) holds the write half, plus a [`CacheLock`] file lock
//!   against other processes sharing the root. At most one sync per mirror runs at a
//!   time; syncs of different mirrors never wait on each other.
//! - **Queries** go through a [`MirrorQuery`], which holds the read half for its
//!   lifetime. Queries run concurrently with each other but never with a sync of the
//!   same mirror.

pub mod lock;

use crate::core::TrackerError;
use crate::git::GitRepo;
use anyhow::{Context, Result};
use dashmap::DashMap;
use regex::Regex;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};

pub use lock::CacheLock;

static PATH_UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w]+").expect("static regex is valid"));

static SCP_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[^@/]+@)?([^:/]+):(.+)$").expect("static regex is valid"));

/// Host component used for remotes that live on the local file system.
const LOCAL_HOST: &str = "local";

/// Replaces every run of non-word characters with a single `_`.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    PATH_UNSAFE_RE.replace_all(raw, "_").into_owned()
}

/// Splits a remote into the `(host, path)` pair the cache layout is derived from.
///
/// Accepts URLs with a host (`https://`, `ssh://`, `git://`), `file://` URLs and plain
/// paths (host [`LOCAL_HOST`]), and scp-like `git@host:owner/repo` remotes.
fn split_remote(url: &str) -> (String, String) {
    if Path::new(url).is_absolute() {
        return (LOCAL_HOST.to_string(), url.to_string());
    }
    if let Ok(parsed) = Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            let host = match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            return (host, parsed.path().to_string());
        }
        if parsed.scheme() == "file" {
            return (LOCAL_HOST.to_string(), parsed.path().to_string());
        }
    }
    if let Some(caps) = SCP_LIKE_RE.captures(url) {
        return (caps[1].to_string(), caps[2].to_string());
    }
    (LOCAL_HOST.to_string(), url.to_string())
}

/// A synced local copy of one remote repository.
///
/// Handed out by [`MirrorCache::acquire`]; the local path stays private to the cache
/// and is only reachable through [`MirrorCache::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    url: String,
    key: String,
    path: PathBuf,
}

impl Mirror {
    /// Remote URL this mirror tracks.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Location of the mirror relative to the cache root, as `host/path`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Counters describing the sync activity of a [`MirrorCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Mirrors created with `git clone`
    pub clones: usize,
    /// Mirrors refreshed with `git pull`
    pub fetches: usize,
    /// Highest number of simultaneous syncs ever observed on a single mirror
    pub peak_syncs_per_mirror: usize,
}

#[derive(Default)]
struct SyncCounters {
    clones: AtomicUsize,
    fetches: AtomicUsize,
    peak_syncs_per_mirror: AtomicUsize,
}

#[derive(Default)]
struct MirrorSlot {
    lock: Arc<RwLock<()>>,
    syncing: AtomicUsize,
}

/// Tracks in-flight syncs of one mirror for [`SyncStats::peak_syncs_per_mirror`].
struct SyncingGuard<'a> {
    slot: &'a MirrorSlot,
}

impl<'a> SyncingGuard<'a> {
    fn enter(slot: &'a MirrorSlot, counters: &SyncCounters) -> Self {
        let now = slot.syncing.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_syncs_per_mirror.fetch_max(now, Ordering::SeqCst);
        Self {
            slot,
        }
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.slot.syncing.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owner of the cache root and of every mirror beneath it.
///
/// Cloning is cheap and clones share locks and counters, so one cache can be handed to
/// every worker of a run.
///
/// # Examples
///
/// ```rust,no_run
/// use repotracker::cache::MirrorCache;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let cache = MirrorCache::new(PathBuf::from("/tmp/repotracker"), None);
/// let mirror = cache.acquire("https://github.com/acme/widget").await?;
/// let query = cache.query(&mirror).await;
/// let head = query.resolve_commit("HEAD").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MirrorCache {
    root: PathBuf,
    git_timeout: Option<Duration>,
    slots: Arc<DashMap<PathBuf, Arc<MirrorSlot>>>,
    counters: Arc<SyncCounters>,
}

impl MirrorCache {
    /// Creates a cache rooted at `root`. Nothing is touched on disk until the first
    /// [`acquire`](Self::acquire).
    ///
    /// `git_timeout` bounds every git subprocess run against the mirrors (`None` for no
    /// timeout).
    #[must_use]
    pub fn new(root: PathBuf, git_timeout: Option<Duration>) -> Self {
        Self {
            root,
            git_timeout,
            slots: Arc::new(DashMap::new()),
            counters: Arc::new(SyncCounters::default()),
        }
    }

    /// Returns the cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the sync counters.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        SyncStats {
            clones: self.counters.clones.load(Ordering::SeqCst),
            fetches: self.counters.fetches.load(Ordering::SeqCst),
            peak_syncs_per_mirror: self.counters.peak_syncs_per_mirror.load(Ordering::SeqCst),
        }
    }

    /// Relative `host/path` key of the mirror for `url`.
    ///
    /// # Errors
    ///
    /// Fails with [`TrackerError::ResolutionFailed`] if the URL has no repository path
    /// (e.g. `https://github.com/`).
    pub fn mirror_key(url: &str) -> Result<String> {
        let (host, path) = split_remote(url);
        let path = path.trim_start_matches('/').trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let host = sanitize_component(&host);
        let path = sanitize_component(path);
        if host.is_empty() || path.is_empty() || path == "_" {
            return Err(TrackerError::ResolutionFailed {
                name: url.to_string(),
                reason: "remote URL has no repository path".to_string(),
            }
            .into());
        }
        Ok(format!("{host}/{path}"))
    }

    /// Local directory of the mirror for `url`.
    pub fn mirror_path(&self, url: &str) -> Result<PathBuf> {
        let key = Self::mirror_key(url)?;
        Ok(key.split('/').fold(self.root.clone(), |dir, part| dir.join(part)))
    }

    fn slot(&self, path: &Path) -> Arc<MirrorSlot> {
        self.slots.entry(path.to_path_buf()).or_default().clone()
    }

    /// Syncs the mirror of `url` and returns a handle to it.
    ///
    /// Clones into an absent or empty directory, otherwise fast-forwards the existing
    /// clone. Concurrent calls for the same mirror are serialized; a query handle held
    /// elsewhere delays the sync until it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::SyncFailed`] with the failed command and its combined
    /// output if git exits non-zero or times out.
    pub async fn acquire(&self, url: &str) -> Result<Mirror> {
        let key = Self::mirror_key(url)?;
        let path = self.mirror_path(url)?;
        let slot = self.slot(&path);

        let _write = slot.lock.write().await;
        let _file_lock = CacheLock::acquire(&self.root, &sanitize_component(&key))
            .await
            .with_context(|| format!("Failed to lock mirror of {url}"))?;
        let _syncing = SyncingGuard::enter(&slot, &self.counters);

        tracing::debug!(
            target: "repotracker::cache",
            "{}: Cache directory is {}",
            url,
            path.display()
        );
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create mirror directory: {}", path.display()))?;

        if is_dir_empty(&path).await? {
            tracing::info!(target: "repotracker::cache", "{}: Cloning into cache", url);
            GitRepo::clone(url, &path, self.git_timeout)
                .await
                .map_err(|e| into_sync_failed(url, e))?;
            self.counters.clones.fetch_add(1, Ordering::SeqCst);
        } else {
            tracing::debug!(target: "repotracker::cache", "{}: Fetching updates", url);
            self.repo(url, &path).pull_fast_forward().await.map_err(|e| into_sync_failed(url, e))?;
            self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        }

        Ok(Mirror {
            url: url.to_string(),
            key,
            path,
        })
    }

    /// Opens a read-only query handle on an already synced mirror.
    ///
    /// The handle blocks syncs of the same mirror until dropped; it never triggers a
    /// sync itself.
    pub async fn query(&self, mirror: &Mirror) -> MirrorQuery {
        let slot = self.slot(&mirror.path);
        let guard = Arc::clone(&slot.lock).read_owned().await;
        MirrorQuery {
            _guard: guard,
            url: mirror.url.clone(),
            repo: self.repo(&mirror.url, &mirror.path),
        }
    }

    /// Mirror handle for `url` without syncing it.
    #[cfg(test)]
    pub(crate) fn detached_mirror(&self, url: &str) -> Result<Mirror> {
        Ok(Mirror {
            url: url.to_string(),
            key: Self::mirror_key(url)?,
            path: self.mirror_path(url)?,
        })
    }

    fn repo(&self, url: &str, path: &Path) -> GitRepo {
        GitRepo::new(path).with_timeout(self.git_timeout).with_context(url)
    }
}

/// Read access to a synced mirror.
///
/// Holds the mirror's read lock: any number of queries may be alive at once, but a
/// sync of the same mirror waits until all of them are dropped.
pub struct MirrorQuery {
    _guard: OwnedRwLockReadGuard<()>,
    url: String,
    repo: GitRepo,
}

impl MirrorQuery {
    /// Remote URL of the queried mirror.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolves a revision to its commit hash, `None` if the mirror does not have it.
    pub async fn resolve_commit(&self, revision: &str) -> Result<Option<String>> {
        self.repo.resolve_commit(revision).await
    }

    /// Whether `ancestor` is an ancestor of (or equal to) `descendant`.
    pub async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        self.repo.is_ancestor(ancestor, descendant).await
    }

    /// Raw NUL-separated log records for `range`, newest first.
    pub async fn log_records(&self, range: &str, max_count: Option<usize>) -> Result<String> {
        self.repo.log_records(range, max_count).await
    }
}

fn into_sync_failed(url: &str, error: anyhow::Error) -> anyhow::Error {
    match error.downcast_ref::<TrackerError>() {
        Some(TrackerError::GitCommandError {
            command,
            output,
        }) => TrackerError::SyncFailed {
            url: url.to_string(),
            command: command.clone(),
            output: output.clone(),
        }
        .into(),
        _ => error,
    }
}

async fn is_dir_empty(path: &Path) -> Result<bool> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("Failed to read directory: {}", path.display()))?;
    Ok(entries.next_entry().await?.is_none())
}
