//! Tracking run orchestration
//!
//! A [`Tracker`] pushes every dependency record through the same pipeline:
//!
//! 1. **Resolve**: record → [`RepoCoordinate`] ([`RuleResolver`])
//! 2. **Sync**: clone or refresh the mirror ([`MirrorCache::acquire`])
//! 3. **Detect**: is the remote head ahead of the pin ([`update::has_update`])
//! 4. **Extract**: commits since the pin ([`changelog::commit_log`]), only on update
//! 5. **Report**: hand the [`Changelog`] to the [`ReportSink`]
//!
//! # Concurrency
//!
//! A producer task fills a bounded `mpsc` queue and closes it when the records run
//! out. A fixed number of worker tasks share the receiver; each worker takes one
//! record, runs all five stages for it, and only then takes the next. The number of
//! workers therefore bounds the number of pipelines, and git processes, in flight.
//!
//! # Failure isolation
//!
//! A failing stage ends the pipeline of that one dependency. The failure is logged
//! with the dependency name and stage, recorded in the [`RunSummary`], and the worker
//! moves on. Nothing a single dependency does can cancel its siblings.

pub mod changelog;
pub mod update;

pub use update::EmptyRevisionPolicy;

use crate::cache::MirrorCache;
use crate::config::TrackerConfig;
use crate::constants::MIN_QUEUE_CAPACITY;
use crate::models::{Changelog, DependencyRecord, Failure, RunSummary, Stage};
use crate::report::ReportSink;
use crate::resolver::{ImportPathResolver, RuleResolver};
use crate::utils::progress::ProgressBar;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Revision the pin is compared against: the mirror's checked-out default branch.
const HEAD: &str = "HEAD";

/// How one dependency left the pipeline.
#[derive(Debug)]
enum Outcome {
    Updated,
    UpToDate,
    SkippedUnpinned,
    Failed(Failure),
}

struct Shared<R, S> {
    cache: MirrorCache,
    resolver: RuleResolver<R>,
    sink: S,
    empty_revision: EmptyRevisionPolicy,
    max_unpinned_commits: usize,
}

impl<R: ImportPathResolver, S: ReportSink> Shared<R, S> {
    async fn process(&self, record: &DependencyRecord) -> Outcome {
        match self.run_stages(record).await {
            Ok(outcome) => outcome,
            Err((stage, error)) => {
                tracing::error!(
                    target: "repotracker::tracker",
                    "{}: {} stage failed: {:#}",
                    record.name(),
                    stage,
                    error
                );
                Outcome::Failed(Failure {
                    name: record.name().to_string(),
                    stage,
                    cause: format!("{error:#}"),
                })
            }
        }
    }

    async fn run_stages(
        &self,
        record: &DependencyRecord,
    ) -> Result<Outcome, (Stage, anyhow::Error)> {
        let name = record.name();

        let coordinate =
            self.resolver.resolve(record).await.map_err(|e| (Stage::Resolve, e))?;
        tracing::debug!(target: "repotracker::tracker", "{}: Resolved to {}", name, coordinate);

        if coordinate.is_unpinned() && self.empty_revision == EmptyRevisionPolicy::Skip {
            tracing::info!(target: "repotracker::tracker", "{}: No pinned revision, skipped", name);
            return Ok(Outcome::SkippedUnpinned);
        }

        let mirror = self.cache.acquire(&coordinate.url).await.map_err(|e| (Stage::Sync, e))?;

        let commits = {
            let query = self.cache.query(&mirror).await;
            let updated =
                update::has_update(&query, &coordinate.revision, HEAD, self.empty_revision)
                    .await
                    .map_err(|e| (Stage::Detect, e))?;
            if !updated {
                tracing::info!(target: "repotracker::tracker", "{}: Up to date", name);
                return Ok(Outcome::UpToDate);
            }
            changelog::commit_log(&query, &coordinate.revision, HEAD, self.max_unpinned_commits)
                .await
                .map_err(|e| (Stage::Extract, e))?
        };
        tracing::info!(target: "repotracker::tracker", "{}: {} new commits", name, commits.len());

        let changelog = Changelog {
            name: name.to_string(),
            coordinate,
            mirror,
            commits,
        };
        self.sink.report(&changelog).await.map_err(|e| (Stage::Report, e))?;
        Ok(Outcome::Updated)
    }
}

/// Runs the tracking pipeline over a set of dependency records.
///
/// # Examples
///
/// ```rust,no_run
/// use repotracker::cache::MirrorCache;
/// use repotracker::config::TrackerConfig;
/// use repotracker::report::{FileReporter, ReportFormat};
/// use repotracker::resolver::{GoImportResolver, RuleResolver};
/// use repotracker::tracker::Tracker;
///
/// # async fn example(records: Vec<repotracker::models::DependencyRecord>) -> anyhow::Result<()> {
/// let config = TrackerConfig::default();
/// let cache = MirrorCache::new(config.cache_root()?, config.git_timeout());
/// let sink = FileReporter::new(config.reports_dir()?, ReportFormat::Markdown)?;
/// let tracker = Tracker::new(&config, cache, RuleResolver::new(GoImportResolver::new()), sink);
///
/// let summary = tracker.run(records).await;
/// println!("{summary}");
/// # Ok(())
/// # }
/// ```
pub struct Tracker<R, S> {
    shared: Arc<Shared<R, S>>,
    max_concurrency: usize,
    show_progress: bool,
}

impl<R, S> Tracker<R, S>
where
    R: ImportPathResolver + 'static,
    S: ReportSink + 'static,
{
    /// Creates a tracker from the run configuration and its collaborators.
    pub fn new(
        config: &TrackerConfig,
        cache: MirrorCache,
        resolver: RuleResolver<R>,
        sink: S,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                resolver,
                sink,
                empty_revision: config.empty_revision,
                max_unpinned_commits: config.max_unpinned_commits,
            }),
            max_concurrency: config.max_concurrency.max(1),
            show_progress: true,
        }
    }

    /// Enables or disables the progress bar.
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// The mirror cache used by this tracker.
    #[must_use]
    pub fn cache(&self) -> &MirrorCache {
        &self.shared.cache
    }

    /// Processes every record and returns the run summary.
    ///
    /// Per-dependency failures never abort the run; they are listed in
    /// [`RunSummary::failures`].
    pub async fn run<I>(&self, records: I) -> RunSummary
    where
        I: IntoIterator<Item = DependencyRecord>,
    {
        let records: Vec<DependencyRecord> = records.into_iter().collect();
        let total = records.len();
        let workers = self.max_concurrency.min(total).max(1);

        let progress =
            if self.show_progress { ProgressBar::new(total as u64) } else { ProgressBar::hidden() };
        progress.set_prefix("Tracking");

        tracing::info!(
            target: "repotracker::tracker",
            "Tracking {} dependencies with {} workers",
            total,
            workers
        );

        let (tx, rx) = mpsc::channel((workers * 2).max(MIN_QUEUE_CAPACITY));
        let producer = tokio::spawn(async move {
            for record in records {
                if tx.send(record).await.is_err() {
                    break;
                }
            }
        });

        let rx = Arc::new(Mutex::new(rx));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let rx = Arc::clone(&rx);
                let shared = Arc::clone(&self.shared);
                let progress = progress.clone();
                tokio::spawn(async move {
                    let mut outcomes = Vec::new();
                    loop {
                        let next = rx.lock().await.recv().await;
                        let Some(record) = next else {
                            break;
                        };
                        progress.set_message(record.name());
                        outcomes.push(shared.process(&record).await);
                        progress.inc(1);
                    }
                    outcomes
                })
            })
            .collect();

        let mut summary = RunSummary::default();
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        summary.total += 1;
                        match outcome {
                            Outcome::Updated => summary.updated += 1,
                            Outcome::UpToDate => summary.up_to_date += 1,
                            Outcome::SkippedUnpinned => summary.skipped_unpinned += 1,
                            Outcome::Failed(failure) => summary.failures.push(failure),
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(target: "repotracker::tracker", "Worker task failed: {}", e);
                }
            }
        }
        if let Err(e) = producer.await {
            tracing::error!(target: "repotracker::tracker", "Record producer failed: {}", e);
        }

        progress.finish_and_clear();

        let stats = self.shared.cache.stats();
        tracing::debug!(
            target: "repotracker::tracker",
            "Mirror syncs: {} clones, {} fetches, peak {} per mirror",
            stats.clones,
            stats.fetches,
            stats.peak_syncs_per_mirror
        );
        tracing::info!(target: "repotracker::tracker", "{}", summary);
        summary
    }
}
