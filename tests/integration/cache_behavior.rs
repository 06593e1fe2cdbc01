use anyhow::Result;
use repotracker::cache::MirrorCache;
use tokio::fs;

use crate::common::{Harness, Upstream, direct, markdown_report};

#[tokio::test]
async fn test_second_run_reuses_mirrors() -> Result<()> {
    let harness = Harness::new()?;
    let mut upstream = Upstream::create(&harness.upstreams(), "reuse", 2)?;
    let pin = upstream.commits[0].clone();

    let first = harness.tracker()?;
    let summary = first.run(vec![direct("reuse", &upstream.url(), &pin)]).await;
    assert_eq!(summary.updated, 1);
    assert_eq!(first.cache().stats().clones, 1);

    let mirror_dir = first.cache().mirror_path(&upstream.url())?;
    assert!(mirror_dir.join(".git").exists());

    upstream.advance("reuse follow-up")?;

    let second = harness.tracker()?;
    let summary = second.run(vec![direct("reuse", &upstream.url(), &pin)]).await;
    assert_eq!(summary.updated, 1, "failures: {:?}", summary.failures);
    assert_eq!(second.cache().stats().clones, 0, "existing mirror must be refreshed in place");
    assert_eq!(second.cache().stats().fetches, 1);

    let content =
        fs::read_to_string(markdown_report(&harness.reports(), &upstream.url(), "reuse")?).await?;
    assert!(content.contains("There are 2 new commits."));
    assert!(content.contains("reuse follow-up"));
    Ok(())
}

#[tokio::test]
async fn test_repeated_acquire_is_idempotent() -> Result<()> {
    let harness = Harness::new()?;
    let upstream = Upstream::create(&harness.upstreams(), "stable", 3)?;
    let cache = MirrorCache::new(harness.config.cache_root()?, None);

    let first = cache.acquire(&upstream.url()).await?;
    let head_after_first = cache.query(&first).await.resolve_commit("HEAD").await?;

    let second = cache.acquire(&upstream.url()).await?;
    let head_after_second = cache.query(&second).await.resolve_commit("HEAD").await?;

    assert_eq!(first, second);
    assert_eq!(head_after_first.as_deref(), Some(upstream.head()));
    assert_eq!(head_after_first, head_after_second);
    assert_eq!(cache.stats().clones, 1);
    assert_eq!(cache.stats().fetches, 1);
    Ok(())
}

#[tokio::test]
async fn test_dependencies_sharing_a_remote_share_one_mirror() -> Result<()> {
    let harness = Harness::new()?;
    let upstream = Upstream::create(&harness.upstreams(), "shared", 4)?;
    let records = (0..6).map(|i| direct(&format!("shared_{i}"), &upstream.url(), &upstream.commits[i % 3]));

    let tracker = harness.tracker()?;
    let summary = tracker.run(records).await;

    assert_eq!(summary.updated, 6, "failures: {:?}", summary.failures);
    let stats = tracker.cache().stats();
    assert_eq!(stats.clones, 1);
    assert_eq!(stats.fetches, 5);
    assert_eq!(stats.peak_syncs_per_mirror, 1);
    Ok(())
}
