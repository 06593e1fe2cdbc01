//! Cross-process file locking for mirror directories.
//!
//! The in-process per-URL lock in [`MirrorCache`](super::MirrorCache) serializes syncs
//! between workers of one run. Two runs sharing a cache root (say, a cron job and a
//! developer) are serialized by these OS-level locks instead. Locks are released when
//! the [`CacheLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive file lock on one mirror.
pub struct CacheLock {
    _file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquires an exclusive lock named `key` under `{cache_dir}/.locks/`.
    ///
    /// The blocking `flock` runs on the blocking thread pool so a contended lock does
    /// not stall the runtime. There is no timeout: the call waits until the holder
    /// releases the lock.
    ///
    /// # Lock File Location
    ///
    /// ```text
    /// {cache_dir}/.locks/{key}.lock
    /// ```
    ///
    /// # Errors
    ///
    /// Fails if the locks directory or lock file cannot be created, or the file system
    /// does not support locking.
    pub async fn acquire(cache_dir: &Path, key: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir).await.with_context(|| {
            format!("Failed to create locks directory: {}", locks_dir.display())
        })?;

        let lock_path = locks_dir.join(format!("{key}.lock"));
        let lock_path_clone = lock_path.clone();
        let key = key.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive().with_context(|| format!("Failed to acquire lock for: {key}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "repotracker::cache", "Acquired lock {}", lock_path.display());

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Closing the file releases the lock as well; unlocking explicitly surfaces errors
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self._file) {
            tracing::warn!(
                target: "repotracker::cache",
                "Failed to unlock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
