//! Commit history extraction
//!
//! History comes from `git log` with a fixed record layout, one commit per line and
//! fields separated by NUL:
//!
//! ```text
//! <hash> \0 <decorations> \0 <commit time, unix seconds> \0 <title>
//! ```
//!
//! Decorations are restricted to tags (`--decorate-refs=refs/tags`), so the second
//! field looks like `tag: v1.2.0, tag: v1.2` or is empty.

use crate::cache::MirrorQuery;
use crate::constants::LOG_FIELD_SEPARATOR;
use crate::core::TrackerError;
use crate::models::Commit;
use anyhow::Result;
use chrono::DateTime;

const TAG_PREFIX: &str = "tag: ";

/// Commits reachable from `to` but not from `from`, newest first.
///
/// With an empty `from` the whole history of `to` is listed, capped at
/// `max_unpinned_commits`.
pub async fn commit_log(
    query: &MirrorQuery,
    from: &str,
    to: &str,
    max_unpinned_commits: usize,
) -> Result<Vec<Commit>> {
    let text = if from.is_empty() {
        query.log_records(to, Some(max_unpinned_commits)).await?
    } else {
        query.log_records(&format!("{from}..{to}"), None).await?
    };
    parse_log(&text)
}

/// Parses `git log` output in the record layout described in the module docs.
///
/// Order is preserved. Any malformed record fails the whole call.
///
/// # Errors
///
/// [`TrackerError::MalformedLogRecord`] for a record without exactly four fields, with
/// an empty hash, or with a timestamp that is not a valid number of seconds.
pub fn parse_log(text: &str) -> Result<Vec<Commit>> {
    text.lines().filter(|line| !line.is_empty()).map(parse_record).collect()
}

fn parse_record(line: &str) -> Result<Commit> {
    let malformed = |reason: String| TrackerError::MalformedLogRecord {
        record: line.to_string(),
        reason,
    };

    let fields: Vec<&str> = line.split(LOG_FIELD_SEPARATOR).collect();
    let [hash, decorations, timestamp, title] = fields.as_slice() else {
        return Err(malformed(format!("expected 4 fields, found {}", fields.len())).into());
    };
    if hash.is_empty() {
        return Err(malformed("empty commit hash".to_string()).into());
    }

    let seconds: i64 =
        timestamp.trim().parse().map_err(|e| malformed(format!("bad timestamp {timestamp:?}: {e}")))?;
    let timestamp = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| malformed(format!("timestamp {seconds} out of range")))?;

    Ok(Commit {
        hash: (*hash).to_string(),
        tags: parse_tags(decorations),
        timestamp,
        title: (*title).to_string(),
    })
}

/// Decoration entries in emission order, with any `tag: ` prefix stripped.
fn parse_tags(decorations: &str) -> Vec<String> {
    if decorations.is_empty() {
        return Vec::new();
    }
    decorations
        .split(", ")
        .map(|item| item.strip_prefix(TAG_PREFIX).unwrap_or(item).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MirrorCache;
    use crate::test_utils::TestGit;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_parse_log_records() {
        let text = "c3\0tag: v2.0.0, tag: v2\01700000200\0Release 2\n\
                    c2\0\01700000100\0Fix: handle a, b, and c\n\
                    c1\0tag: v1\01700000000\0Initial commit\n";
        let commits = parse_log(text).unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].hash, "c3");
        assert_eq!(commits[0].tags, vec!["v2.0.0", "v2"]);
        assert_eq!(commits[0].timestamp, Utc.timestamp_opt(1_700_000_200, 0).unwrap());
        assert_eq!(commits[0].title, "Release 2");

        assert!(commits[1].tags.is_empty());
        assert_eq!(commits[1].title, "Fix: handle a, b, and c");

        assert_eq!(commits[2].tags, vec!["v1"]);
    }

    #[test]
    fn test_parse_log_empty() {
        assert!(parse_log("").unwrap().is_empty());
        assert!(parse_log("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_log_missing_field_fails_whole_call() {
        let text = "c2\0\01700000100\0ok\nc1\0tag: v1\01700000000\n";
        let err = parse_log(text).unwrap_err();
        match err.downcast_ref::<TrackerError>() {
            Some(TrackerError::MalformedLogRecord {
                record,
                reason,
            }) => {
                assert!(record.starts_with("c1"));
                assert!(reason.contains("found 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_log_extra_field() {
        assert!(parse_log("c1\0\0100\0title\0extra").is_err());
    }

    #[test]
    fn test_parse_log_bad_timestamp() {
        let err = parse_log("c1\0\0yesterday\0title").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::MalformedLogRecord { .. })
        ));
        assert!(parse_log(&format!("c1\0\0{}\0title", i64::MAX)).is_err());
    }

    #[test]
    fn test_parse_tags_keeps_every_decoration() {
        assert_eq!(parse_tags("HEAD -> main, tag: v1"), vec!["HEAD -> main", "v1"]);

        let commits = parse_log("c1\0HEAD -> main, tag: v1\0100\0t").unwrap();
        assert_eq!(commits[0].tags, vec!["HEAD -> main", "v1"]);
    }

    #[tokio::test]
    async fn test_commit_log_from_mirror() {
        let temp = TempDir::new().unwrap();
        let upstream = TestGit::new(temp.path().join("upstream"));
        upstream.init().unwrap();
        upstream.config_user().unwrap();
        upstream.commit_file("a", "1", "first").unwrap();
        upstream.tag("v1").unwrap();
        let second = upstream.commit_file("a", "2", "second").unwrap();
        let third = upstream.commit_file("a", "3", "third").unwrap();
        upstream.tag("v2").unwrap();
        upstream.tag("v2.0").unwrap();

        let cache = MirrorCache::new(temp.path().join("cache"), None);
        let mirror = cache.acquire(&upstream.url()).await.unwrap();
        let query = cache.query(&mirror).await;

        let commits = commit_log(&query, "v1", "HEAD", 50).await.unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, third);
        assert_eq!(commits[0].title, "third");
        let mut tags = commits[0].tags.clone();
        tags.sort();
        assert_eq!(tags, vec!["v2", "v2.0"]);
        assert_eq!(commits[1].hash, second);
        assert!(commits[1].tags.is_empty());

        let unpinned = commit_log(&query, "", "HEAD", 2).await.unwrap();
        assert_eq!(unpinned.len(), 2);
        assert_eq!(unpinned[0].hash, third);
    }
}
