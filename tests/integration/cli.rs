use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::common::{Upstream, git_repository_target, markdown_report, query_result};

fn repotracker(temp: &TempDir) -> Result<Command> {
    let mut cmd = Command::cargo_bin("repotracker")?;
    cmd.env_remove("RUST_LOG")
        .env_remove("REPOTRACKER_CONFIG")
        .env("NO_COLOR", "1")
        .arg("--cache-dir")
        .arg(temp.path().join("cache"))
        .arg("--output-dir")
        .arg(temp.path().join("reports"));
    Ok(cmd)
}

#[test]
fn test_version() -> Result<()> {
    Command::cargo_bin("repotracker")?
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("repotracker"));
    Ok(())
}

#[test]
fn test_malformed_input_fails_the_run() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("deps.json");
    std::fs::write(&input, "{ this is not json")?;

    repotracker(&temp)?
        .arg("--no-progress")
        .arg("--file")
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Cannot read dependency records"));
    Ok(())
}

#[test]
fn test_missing_input_fails_the_run() -> Result<()> {
    let temp = TempDir::new()?;

    repotracker(&temp)?
        .arg("--no-progress")
        .arg("--file")
        .arg(temp.path().join("absent.json"))
        .assert()
        .failure()
        .code(1);
    Ok(())
}

#[test]
fn test_missing_config_file_fails_the_run() -> Result<()> {
    let temp = TempDir::new()?;

    repotracker(&temp)?
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("config file not found"));
    Ok(())
}

#[test]
fn test_run_writes_report() -> Result<()> {
    let temp = TempDir::new()?;
    let upstream = Upstream::create(&temp.path().join("upstream"), "omega", 3)?;
    let input = temp.path().join("deps.json");
    std::fs::write(
        &input,
        query_result(vec![git_repository_target("omega", &upstream.url(), &upstream.commits[0])]),
    )?;

    repotracker(&temp)?.arg("--no-progress").arg("--file").arg(&input).assert().success();

    let report = markdown_report(&temp.path().join("reports"), &upstream.url(), "omega")?;
    let content = std::fs::read_to_string(report)?;
    assert!(content.contains("There are 2 new commits."), "report was:\n{content}");
    Ok(())
}

#[test]
fn test_dependency_failure_keeps_exit_status_zero() -> Result<()> {
    let temp = TempDir::new()?;
    let missing = temp.path().join("upstream/missing").display().to_string();

    repotracker(&temp)?
        .arg("--no-progress")
        .arg("--quiet")
        .write_stdin(query_result(vec![git_repository_target("broken", &missing, "abc123")]))
        .assert()
        .success()
        .stderr(predicate::str::contains("broken"));
    Ok(())
}

#[test]
fn test_no_progress_environment_variable() -> Result<()> {
    let temp = TempDir::new()?;
    let upstream = Upstream::create(&temp.path().join("upstream"), "quiet", 2)?;

    repotracker(&temp)?
        .env("REPOTRACKER_NO_PROGRESS", "1")
        .arg("--format")
        .arg("json")
        .write_stdin(query_result(vec![git_repository_target(
            "quiet",
            &upstream.url(),
            &upstream.commits[0],
        )]))
        .assert()
        .success();

    let markdown = markdown_report(&temp.path().join("reports"), &upstream.url(), "quiet")?;
    let json = markdown.with_extension("json");
    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(json)?)?;
    assert_eq!(report["commits"].as_array().map(Vec::len), Some(1));
    Ok(())
}
