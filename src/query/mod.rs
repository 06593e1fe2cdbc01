//! Dependency records from `bazel query`
//!
//! The tracker reads the external repositories of a Bazel workspace from
//!
//! ```bash
//! bazel query --output=jsonproto '//external:all'
//! ```
//!
//! which is one `QueryResult` object (`{"target": [...]}`). The streamed variant
//! (`--output=streamed_jsonproto`) prints one `Target` object per line; both are
//! accepted, and may even be mixed.
//!
//! Only `RULE` targets are considered. Supported rule classes:
//!
//! | rule class | record | attributes |
//! |---|---|---|
//! | `go_repository` | [`DependencyRecord::Package`] | `importpath`, `commit`/`tag` |
//! | `git_repository`, `new_git_repository` | [`DependencyRecord::Direct`] | `remote`, `commit`/`tag` |
//! | `http_archive`, `new_http_archive` | [`DependencyRecord::Archive`] | `urls`, or `url` |
//!
//! Anything else is counted as ignored.

use crate::core::TrackerError;
use crate::models::DependencyRecord;
use anyhow::Result;
use serde::Deserialize;
use tokio::io::AsyncReadExt;

/// Source name that selects standard input.
pub const STDIN_SOURCE: &str = "-";

const EXTERNAL_PREFIX: &str = "//external:";

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    target: Vec<Target>,
}

#[derive(Debug, Deserialize)]
struct Target {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    rule: Option<Rule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Rule {
    name: String,
    #[serde(alias = "rule_class")]
    rule_class: String,
    #[serde(default)]
    attribute: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Attribute {
    name: String,
    #[serde(default, alias = "string_value")]
    string_value: Option<String>,
    #[serde(default, alias = "string_list_value")]
    string_list_value: Option<Vec<String>>,
}

/// Records read from one query output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryRecords {
    /// Supported dependency declarations, in input order
    pub records: Vec<DependencyRecord>,
    /// Rules of an unsupported class
    pub ignored: usize,
}

/// Reads and parses the query output at `source`, or standard input for `-`.
///
/// # Errors
///
/// [`TrackerError::InputError`] when the source cannot be read or is not valid query
/// output. This ends the run.
pub async fn load_records(source: &str) -> Result<QueryRecords> {
    let (source_name, text) = if source == STDIN_SOURCE {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await.map_err(|e| {
            TrackerError::InputError {
                source_name: "stdin".to_string(),
                reason: e.to_string(),
            }
        })?;
        ("stdin".to_string(), text)
    } else {
        let text = tokio::fs::read_to_string(source).await.map_err(|e| {
            TrackerError::InputError {
                source_name: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        (source.to_string(), text)
    };

    parse_records(&text, &source_name)
}

/// Parses query output that was already read.
pub fn parse_records(text: &str, source_name: &str) -> Result<QueryRecords> {
    let input_error = |reason: String| TrackerError::InputError {
        source_name: source_name.to_string(),
        reason,
    };

    let mut targets = Vec::new();
    for value in serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>() {
        let value = value.map_err(|e| input_error(e.to_string()))?;
        if value.get("target").is_some() {
            let result: QueryResult =
                serde_json::from_value(value).map_err(|e| input_error(e.to_string()))?;
            targets.extend(result.target);
        } else {
            let target: Target =
                serde_json::from_value(value).map_err(|e| input_error(e.to_string()))?;
            targets.push(target);
        }
    }

    let mut loaded = QueryRecords::default();
    for rule in targets.into_iter().filter(|t| t.kind == "RULE").filter_map(|t| t.rule) {
        match rule_to_record(&rule) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                tracing::debug!("{}", e);
                loaded.ignored += 1;
            }
        }
    }

    tracing::debug!(
        "Read {} dependency records from {} ({} ignored)",
        loaded.records.len(),
        source_name,
        loaded.ignored
    );
    Ok(loaded)
}

impl Rule {
    fn short_name(&self) -> &str {
        self.name.strip_prefix(EXTERNAL_PREFIX).unwrap_or(&self.name)
    }

    /// Last non-empty string value among the attributes called one of `names`.
    fn string(&self, names: &[&str]) -> String {
        self.attribute
            .iter()
            .filter(|a| names.contains(&a.name.as_str()))
            .filter_map(|a| a.string_value.as_deref())
            .filter(|v| !v.is_empty())
            .next_back()
            .unwrap_or_default()
            .to_string()
    }

    /// Archive URLs; a non-empty `urls` list wins over a single `url`.
    fn urls(&self) -> Vec<String> {
        let list = self
            .attribute
            .iter()
            .filter(|a| a.name == "urls")
            .filter_map(|a| a.string_list_value.clone())
            .filter(|l| !l.is_empty())
            .next_back();
        list.unwrap_or_else(|| {
            let single = self.string(&["url"]);
            if single.is_empty() { Vec::new() } else { vec![single] }
        })
    }
}

fn rule_to_record(rule: &Rule) -> Result<DependencyRecord, TrackerError> {
    let name = rule.short_name().to_string();
    match rule.rule_class.as_str() {
        "go_repository" => Ok(DependencyRecord::Package {
            name,
            import_path: rule.string(&["importpath"]),
            revision: rule.string(&["commit", "tag"]),
        }),
        "git_repository" | "new_git_repository" => Ok(DependencyRecord::Direct {
            name,
            remote: rule.string(&["remote"]),
            revision: rule.string(&["commit", "tag"]),
        }),
        "http_archive" | "new_http_archive" => Ok(DependencyRecord::Archive {
            name,
            urls: rule.urls(),
        }),
        other => Err(TrackerError::UnsupportedRuleClass {
            name,
            rule_class: other.to_string(),
        }),
    }
}
