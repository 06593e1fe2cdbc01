use anyhow::Result;
use repotracker::models::{DependencyRecord, Stage};

use crate::common::{Harness, Upstream, direct, markdown_report};

#[tokio::test]
async fn test_failed_sync_does_not_affect_siblings() -> Result<()> {
    let harness = Harness::new()?;
    let mut records = Vec::new();
    let mut upstreams = Vec::new();
    for i in 0..5 {
        let name = format!("dep{i}");
        let upstream = Upstream::create(&harness.upstreams(), &name, 2)?;
        records.push(direct(&name, &upstream.url(), &upstream.commits[0]));
        upstreams.push((name, upstream));
    }
    let missing = harness.upstreams().join("does-not-exist");
    records.insert(2, direct("broken", &missing.display().to_string(), "abc123"));

    let tracker = harness.tracker()?;
    let summary = tracker.run(records).await;

    assert_eq!(summary.total, 6);
    assert_eq!(summary.updated, 5, "failures: {:?}", summary.failures);
    assert_eq!(summary.failures.len(), 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.name, "broken");
    assert_eq!(failure.stage, Stage::Sync);
    assert!(failure.cause.contains("clone"), "cause was: {}", failure.cause);
    assert!(failure.cause.contains("fatal:"), "git output missing from cause: {}", failure.cause);

    for (name, upstream) in &upstreams {
        let report = markdown_report(&harness.reports(), &upstream.url(), name)?;
        assert!(report.exists(), "missing report for {name}");
    }
    Ok(())
}

#[tokio::test]
async fn test_each_stage_failure_is_attributed() -> Result<()> {
    let harness = Harness::new()?;
    let good = Upstream::create(&harness.upstreams(), "good", 2)?;

    let records = vec![
        direct("good", &good.url(), &good.commits[0]),
        direct("ghost", &good.url(), "no-such-tag"),
        DependencyRecord::Archive {
            name: "tarball".to_string(),
            urls: vec!["https://downloads.example.org/tarball-1.0.tar.gz".to_string()],
        },
    ];

    let summary = harness.tracker()?.run(records).await;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failures.len(), 2);
    assert_eq!(summary.failures_of("ghost").next().map(|f| f.stage), Some(Stage::Detect));
    assert_eq!(summary.failures_of("tarball").next().map(|f| f.stage), Some(Stage::Resolve));
    Ok(())
}
