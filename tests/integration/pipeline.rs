use anyhow::Result;
use repotracker::models::DependencyRecord;
use repotracker::tracker::EmptyRevisionPolicy;
use tokio::fs;

use crate::common::{Harness, Upstream, direct, markdown_report};

#[tokio::test]
async fn test_outdated_dependency_gets_markdown_report() -> Result<()> {
    let harness = Harness::new()?;
    let upstream = Upstream::create(&harness.upstreams(), "alpha", 3)?;
    upstream.git.tag("v3")?;

    let tracker = harness.tracker()?;
    let summary = tracker.run(vec![direct("alpha", &upstream.url(), &upstream.commits[0])]).await;

    assert_eq!(summary.total, 1);
    assert_eq!(summary.updated, 1);
    assert!(!summary.has_failures(), "unexpected failures: {:?}", summary.failures);

    let report = markdown_report(&harness.reports(), &upstream.url(), "alpha")?;
    let content = fs::read_to_string(&report).await?;
    assert!(content.contains("There are 2 new commits."), "report was:\n{content}");
    assert!(content.contains("alpha change 3"));
    assert!(content.contains("alpha change 2"));
    assert!(!content.contains("alpha change 1"), "the pinned commit is not new");
    assert!(content.contains(&upstream.commits[2][..6]));
    assert!(content.contains("[v3]"));

    // Newest first
    let newest = content.find("alpha change 3").unwrap();
    let older = content.find("alpha change 2").unwrap();
    assert!(newest < older);
    Ok(())
}

#[tokio::test]
async fn test_pinned_to_head_is_up_to_date() -> Result<()> {
    let harness = Harness::new()?;
    let upstream = Upstream::create(&harness.upstreams(), "beta", 2)?;

    let tracker = harness.tracker()?;
    let summary = tracker.run(vec![direct("beta", &upstream.url(), upstream.head())]).await;

    assert_eq!(summary.up_to_date, 1);
    assert_eq!(summary.updated, 0);
    assert!(!markdown_report(&harness.reports(), &upstream.url(), "beta")?.exists());
    Ok(())
}

#[tokio::test]
async fn test_tag_pin_is_resolved() -> Result<()> {
    let harness = Harness::new()?;
    let mut upstream = Upstream::create(&harness.upstreams(), "gamma", 1)?;
    upstream.git.tag("v1.0.0")?;
    upstream.advance("gamma fix")?;

    let tracker = harness.tracker()?;
    let summary = tracker.run(vec![direct("gamma", &upstream.url(), "v1.0.0")]).await;

    assert_eq!(summary.updated, 1, "failures: {:?}", summary.failures);
    let content =
        fs::read_to_string(markdown_report(&harness.reports(), &upstream.url(), "gamma")?).await?;
    assert!(content.contains("There are 1 new commits."));
    assert!(content.contains("gamma fix"));
    Ok(())
}

#[tokio::test]
async fn test_unpinned_history_is_capped() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.config.max_unpinned_commits = 2;
    let upstream = Upstream::create(&harness.upstreams(), "delta", 5)?;

    let tracker = harness.tracker()?;
    let summary = tracker.run(vec![direct("delta", &upstream.url(), "")]).await;

    assert_eq!(summary.updated, 1);
    let content =
        fs::read_to_string(markdown_report(&harness.reports(), &upstream.url(), "delta")?).await?;
    assert!(content.contains("There are 2 new commits."), "report was:\n{content}");
    assert!(content.contains("delta change 5"));
    assert!(content.contains("delta change 4"));
    assert!(!content.contains("delta change 3"));
    Ok(())
}

#[tokio::test]
async fn test_unpinned_skipped_by_policy() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.config.empty_revision = EmptyRevisionPolicy::Skip;
    let upstream = Upstream::create(&harness.upstreams(), "epsilon", 2)?;

    let tracker = harness.tracker()?;
    let summary = tracker.run(vec![direct("epsilon", &upstream.url(), "")]).await;

    assert_eq!(summary.skipped_unpinned, 1);
    assert_eq!(tracker.cache().stats().clones, 0, "skipped dependencies are never synced");
    Ok(())
}

#[tokio::test]
async fn test_query_output_drives_the_run() -> Result<()> {
    let harness = Harness::new()?;
    let upstream = Upstream::create(&harness.upstreams(), "zeta", 2)?;
    let query = crate::common::query_result(vec![
        crate::common::git_repository_target("zeta", &upstream.url(), &upstream.commits[0]),
        serde_json::json!({
            "type": "RULE",
            "rule": { "name": "//external:bind_me", "ruleClass": "bind", "attribute": [] }
        }),
    ]);

    let loaded = repotracker::query::parse_records(&query, "inline")?;
    assert_eq!(loaded.ignored, 1);
    assert!(matches!(&loaded.records[..], [DependencyRecord::Direct { name, .. }] if name == "zeta"));

    let summary = harness.tracker()?.run(loaded.records).await;
    assert_eq!(summary.updated, 1, "failures: {:?}", summary.failures);
    Ok(())
}
