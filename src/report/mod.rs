//! Changelog reports
//!
//! The tracker hands every [`Changelog`] to a [`ReportSink`] exactly once. The bundled
//! [`FileReporter`] renders it to a markdown file through a `tera` template, or to
//! JSON, below an output directory that mirrors the cache layout:
//!
//! ```text
//! {output_dir}/github_com/acme_widget/com_github_acme_widget.md
//! ```
//!
//! The markdown is meant to be pasted into an issue or pull request:
//!
//! ```text
//! # https://github.com/acme/widget
//! <details><summary>There are 2 new commits.</summary><p>
//!
//! - [`5d2fd3`](https://github.com/acme/widget/commit/5d2fd3cc...) Release 2 (🏷 [v2](https://github.com/acme/widget/releases/tag/v2))
//! - [`a41c0e`](https://github.com/acme/widget/commit/a41c0e9d...) Fix parser
//! </p></details>
//! ```

use crate::models::Changelog;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tera::Tera;

/// Characters other than these are replaced in report file names.
static FILE_NAME_UNSAFE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]+").expect("static regex is valid"));

/// Sequence number of temp files written by this process.
static TEMP_FILE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Name of the built-in markdown template; the `.md` suffix keeps autoescaping off.
const MARKDOWN_TEMPLATE: &str = "changelog.md";

const MARKDOWN_SOURCE: &str = "# {{ url }}
<details><summary>There are {{ commits | length }} new commits.</summary><p>
{% for commit in commits %}
- [`{{ commit.hash | short_hash }}`]({{ commit.url }}) {{ commit.title }}
{%- if commit.tags %} (🏷{% for tag in commit.tags %} [{{ tag.name }}]({{ tag.url }}){% endfor %}){% endif %}
{%- endfor %}
</p></details>
";

/// Destination of finished changelogs.
pub trait ReportSink: Send + Sync {
    /// Publishes one changelog.
    fn report(&self, changelog: &Changelog) -> impl Future<Output = Result<()>> + Send;
}

/// Output format of [`FileReporter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown rendered from the built-in template
    #[default]
    Markdown,
    /// Pretty-printed JSON
    Json,
}

impl ReportFormat {
    /// File extension used for reports in this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

/// Serializable view of a changelog with all links resolved.
#[derive(Debug, Serialize)]
pub struct ReportView {
    /// Declared rule name
    pub name: String,
    /// Browsable repository URL
    pub url: String,
    /// Pinned revision; empty when unpinned
    pub revision: String,
    /// New commits, newest first
    pub commits: Vec<CommitView>,
}

/// One commit of a [`ReportView`].
#[derive(Debug, Serialize)]
pub struct CommitView {
    /// Full hash
    pub hash: String,
    /// Link to the commit
    pub url: String,
    /// First line of the message
    pub title: String,
    /// Committer time
    pub timestamp: DateTime<Utc>,
    /// Tags pointing at the commit
    pub tags: Vec<TagView>,
}

/// A tag with its release link.
#[derive(Debug, Serialize)]
pub struct TagView {
    /// Tag name
    pub name: String,
    /// Link to the release page
    pub url: String,
}

impl From<&Changelog> for ReportView {
    fn from(changelog: &Changelog) -> Self {
        let commits = changelog
            .commits
            .iter()
            .map(|commit| CommitView {
                hash: commit.hash.clone(),
                url: changelog.commit_url(&commit.hash),
                title: commit.title.clone(),
                timestamp: commit.timestamp,
                tags: commit
                    .tags
                    .iter()
                    .map(|tag| TagView {
                        name: tag.clone(),
                        url: changelog.tag_url(tag),
                    })
                    .collect(),
            })
            .collect();

        Self {
            name: changelog.name.clone(),
            url: changelog.web_url().to_string(),
            revision: changelog.coordinate.revision.clone(),
            commits,
        }
    }
}

fn short_hash_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let hash = value.as_str().ok_or_else(|| tera::Error::msg("short_hash expects a string"))?;
    Ok(tera::Value::String(hash.chars().take(6).collect()))
}

/// Writes one report file per changelog.
pub struct FileReporter {
    output_dir: PathBuf,
    format: ReportFormat,
    tera: Tera,
}

impl FileReporter {
    /// Creates a reporter writing below `output_dir`.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in template does not parse.
    pub fn new(output_dir: impl Into<PathBuf>, format: ReportFormat) -> Result<Self> {
        let mut tera = Tera::default();
        tera.register_filter("short_hash", short_hash_filter);
        tera.add_raw_template(MARKDOWN_TEMPLATE, MARKDOWN_SOURCE)
            .context("Failed to parse the changelog template")?;

        Ok(Self {
            output_dir: output_dir.into(),
            format,
            tera,
        })
    }

    /// Directory reports are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Report file location for `changelog`.
    #[must_use]
    pub fn report_path(&self, changelog: &Changelog) -> PathBuf {
        let dir = changelog
            .mirror
            .key()
            .split('/')
            .fold(self.output_dir.clone(), |dir, part| dir.join(part));
        dir.join(format!("{}.{}", report_file_stem(&changelog.name), self.format.extension()))
    }

    /// Renders `changelog` in the configured format.
    pub fn render(&self, changelog: &Changelog) -> Result<String> {
        let view = ReportView::from(changelog);
        match self.format {
            ReportFormat::Markdown => {
                let context = tera::Context::from_serialize(&view)
                    .context("Failed to build template context")?;
                self.tera
                    .render(MARKDOWN_TEMPLATE, &context)
                    .with_context(|| format!("Failed to render report for {}", changelog.name))
            }
            ReportFormat::Json => {
                let mut json = serde_json::to_string_pretty(&view)?;
                json.push('\n');
                Ok(json)
            }
        }
    }
}

impl ReportSink for FileReporter {
    async fn report(&self, changelog: &Changelog) -> Result<()> {
        let content = self.render(changelog)?;
        let path = self.report_path(changelog);
        write_atomically(&path, content.as_bytes()).await?;
        tracing::info!("{}: Report written to {}", changelog.name, path.display());
        Ok(())
    }
}

/// File name stem for a rule name; `-` and `.` are kept so `a-b` and `a_b` stay apart.
fn report_file_stem(name: &str) -> String {
    let stem = FILE_NAME_UNSAFE_RE.replace_all(name, "_");
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() { "_".to_string() } else { stem.to_string() }
}

/// Writes through a sibling temp file and a rename, so readers never see a partial report.
///
/// Every call gets its own temp file, so concurrent writers never share one.
async fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let temp_path = parent.join(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_FILE_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    tokio::fs::write(&temp_path, content)
        .await
        .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        tokio::fs::remove_file(&temp_path).await.ok();
        return Err(e)
            .with_context(|| format!("Failed to rename temp file to: {}", path.display()));
    }
    Ok(())
}
