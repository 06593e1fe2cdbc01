//! Fixture upstreams and query output builders shared by the integration tests.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::Result;
use repotracker::cache::MirrorCache;
use repotracker::config::TrackerConfig;
use repotracker::models::DependencyRecord;
use repotracker::report::FileReporter;
use repotracker::resolver::{GoImportResolver, RuleResolver};
use repotracker::test_utils::TestGit;
use repotracker::tracker::Tracker;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An upstream repository with a linear history.
pub struct Upstream {
    pub git: TestGit,
    /// Commit hashes, oldest first
    pub commits: Vec<String>,
}

impl Upstream {
    /// Creates `root/name` with `count` commits titled `"{name} change {i}"`.
    pub fn create(root: &Path, name: &str, count: usize) -> Result<Self> {
        let git = TestGit::new(root.join(name));
        git.init()?;
        git.config_user()?;
        let mut commits = Vec::with_capacity(count);
        for i in 1..=count {
            commits.push(git.commit_file("CHANGES", &format!("{i}\n"), &format!("{name} change {i}"))?);
        }
        Ok(Self {
            git,
            commits,
        })
    }

    /// Adds one more commit and returns its hash.
    pub fn advance(&mut self, title: &str) -> Result<String> {
        let hash = self.git.commit_file("CHANGES", &format!("{title}\n"), title)?;
        self.commits.push(hash.clone());
        Ok(hash)
    }

    pub fn url(&self) -> String {
        self.git.url()
    }

    pub fn head(&self) -> &str {
        self.commits.last().map_or("", String::as_str)
    }
}

/// A `git_repository` record pinned to `revision`.
pub fn direct(name: &str, remote: &str, revision: &str) -> DependencyRecord {
    DependencyRecord::Direct {
        name: name.to_string(),
        remote: remote.to_string(),
        revision: revision.to_string(),
    }
}

/// One `RULE` target of `bazel query --output=jsonproto`.
pub fn git_repository_target(name: &str, remote: &str, commit: &str) -> Value {
    json!({
        "type": "RULE",
        "rule": {
            "name": format!("//external:{name}"),
            "ruleClass": "git_repository",
            "location": "/workspace/WORKSPACE:1:1",
            "attribute": [
                { "name": "commit", "type": "STRING", "stringValue": commit, "explicitlySpecified": true },
                { "name": "remote", "type": "STRING", "stringValue": remote, "explicitlySpecified": true }
            ]
        }
    })
}

/// A complete query result with the given targets.
pub fn query_result(targets: Vec<Value>) -> String {
    json!({ "target": targets }).to_string()
}

/// Where the file reporter puts the markdown report of `name` for `remote`.
pub fn markdown_report(out: &Path, remote: &str, name: &str) -> Result<PathBuf> {
    let key = MirrorCache::mirror_key(remote)?;
    let dir = key.split('/').fold(out.to_path_buf(), |dir, part| dir.join(part));
    Ok(dir.join(format!("{name}.md")))
}

/// A tracker writing markdown reports, with its cache and output below `temp`.
pub struct Harness {
    pub temp: TempDir,
    pub config: TrackerConfig,
}

impl Harness {
    pub fn new() -> Result<Self> {
        repotracker::test_utils::init_test_logging(None);
        let temp = TempDir::new()?;
        let config = TrackerConfig {
            cache_dir: Some(temp.path().join("cache").display().to_string()),
            output_dir: Some(temp.path().join("reports").display().to_string()),
            max_concurrency: 4,
            ..TrackerConfig::default()
        };
        Ok(Self {
            temp,
            config,
        })
    }

    pub fn upstreams(&self) -> PathBuf {
        self.temp.path().join("upstream")
    }

    pub fn reports(&self) -> PathBuf {
        self.temp.path().join("reports")
    }

    pub fn tracker(&self) -> Result<Tracker<GoImportResolver, FileReporter>> {
        let cache = MirrorCache::new(self.config.cache_root()?, self.config.git_timeout());
        let sink = FileReporter::new(self.config.reports_dir()?, self.config.format)?;
        Ok(Tracker::new(&self.config, cache, RuleResolver::new(GoImportResolver::new()), sink)
            .with_progress(false))
    }
}
