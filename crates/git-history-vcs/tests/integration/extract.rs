// Copyright 2026 Oxide Computer Company

//! End-to-end extraction from real repositories.

use crate::repo::{TestRepo, output_files};
use anyhow::{Context, Result};
use git_history::{ObjectKind, check_history, load_history};
use git_history_vcs::{ExtractError, HistoryConfig, extract};

fn return_only(repo: &TestRepo) -> HistoryConfig {
    HistoryConfig {
        repo_path: repo.path(),
        no_output: true,
        return_history: true,
        ..HistoryConfig::default()
    }
}

#[tokio::test]
async fn test_three_commits_and_annotated_tag() -> Result<()> {
    let mut repo = TestRepo::init()?;
    let first = repo.commit("first")?;
    let second = repo.commit("second")?;
    let third = repo.commit("third")?;
    repo.annotated_tag("v1", "HEAD~1", "release 1")?;

    let history = extract(&return_only(&repo))
        .await?
        .context("return mode yields a history")?;

    let ids: Vec<_> = history.commits.iter().map(|c| c.id).collect();
    assert_eq!(ids, [third, second, first], "newest first");
    assert_eq!(history.commits[0].parents, [second]);
    assert_eq!(history.commits[1].parents, [first]);
    assert!(history.commits[2].parents.is_empty(), "root commit");
    assert_eq!(history.commits[2].message, "first");
    assert_eq!(history.commits[0].author.user.name, "Test User");
    assert_eq!(history.commits[0].author.user.email, "test@example.com");
    assert_eq!(
        history.commits[0].author.date.to_rfc3339(),
        "2024-01-03T12:00:00+01:00"
    );
    assert!(history.commits.iter().all(|c| c.signature.is_none()));

    // The tip carries `HEAD -> main`, the middle commit the tag.
    assert_eq!(history.commits[0].decorations, ["HEAD"]);
    assert_eq!(history.commits[1].tags, ["v1"]);
    assert_eq!(history.symbolic.get("HEAD").map(String::as_str), Some("main"));

    let main = &history.refs.heads["main"];
    assert_eq!(main.id, third);
    assert!(main.head, "main is checked out");

    let tag = &history.refs.tags["v1"];
    assert_eq!(tag.kind, ObjectKind::Tag);
    assert_eq!(tag.target_kind, Some(ObjectKind::Commit));
    assert_eq!(tag.target, Some(second));
    assert_eq!(tag.commit(), Some(second));
    assert_eq!(tag.message.as_deref(), Some("release 1"));
    let tagger = tag.tagger.as_ref().context("annotated tags have a tagger")?;
    assert_eq!(tagger.user.email, "test@example.com");
    assert_eq!(tagger.date.to_rfc3339(), "2024-01-03T18:00:00+01:00");

    assert!(history.refs.remotes.is_empty());
    assert!(history.refs.stash.is_none());

    let report = check_history(&history);
    assert!(report.is_ok(), "{:?}", report.failures);
    assert_eq!(report.stats.annotated_tags, 1);
    Ok(())
}

#[tokio::test]
async fn test_upstream_branch() -> Result<()> {
    let mut repo = TestRepo::init()?;
    repo.commit("first")?;
    let tip = repo.commit("second")?;
    repo.git(&["config", "remote.origin.url", "."])?;
    repo.git(&[
        "config",
        "remote.origin.fetch",
        "+refs/heads/*:refs/remotes/origin/*",
    ])?;
    repo.git(&["config", "branch.main.remote", "origin"])?;
    repo.git(&["config", "branch.main.merge", "refs/heads/main"])?;
    repo.git(&["update-ref", "refs/remotes/origin/main", "HEAD"])?;

    let history = extract(&return_only(&repo))
        .await?
        .context("return mode yields a history")?;

    let main = &history.refs.heads["main"];
    assert_eq!(main.upstream.as_deref(), Some("origin/main"));
    let tracking = &history.refs.remotes["origin"]["main"];
    assert_eq!(tracking.id, tip);
    assert!(!tracking.head);
    assert!(
        history.commits[0].decorations.contains(&"origin/main".to_owned()),
        "{:?}",
        history.commits[0].decorations
    );

    let report = check_history(&history);
    assert!(report.is_ok(), "{:?}", report.failures);
    assert_eq!(report.stats.tracking_branches, 1);
    assert_eq!(report.stats.remote_branches.get("origin"), Some(&1));
    Ok(())
}

#[tokio::test]
async fn test_written_file_matches_returned_history() -> Result<()> {
    let mut repo = TestRepo::init()?;
    repo.commit("first")?;
    repo.commit("second")?;
    repo.git(&["branch", "topic", "HEAD~1"])?;
    repo.git(&["tag", "light"])?;

    let output = repo.output("history.json");
    let config = HistoryConfig {
        repo_path: repo.path(),
        output_path: output.clone(),
        return_history: true,
        ..HistoryConfig::default()
    };
    let history = extract(&config).await?.context("return mode")?;

    assert_eq!(output_files(&output), [output.clone()]);
    let text = std::fs::read_to_string(&output)?;
    assert!(text.starts_with("{\"commits\":["), "{text}");
    assert!(text.ends_with('}'), "{text}");

    let loaded = load_history(&output)?;
    assert_eq!(loaded, history);
    assert_eq!(loaded.refs.heads.len(), 2);
    assert_eq!(loaded.refs.tags["light"].kind, ObjectKind::Commit);
    Ok(())
}

#[tokio::test]
async fn test_output_without_return() -> Result<()> {
    let mut repo = TestRepo::init()?;
    repo.commit("only")?;
    let output = repo.output("history.json");
    let config = HistoryConfig {
        repo_path: repo.path(),
        output_path: output.clone(),
        ..HistoryConfig::default()
    };
    assert!(extract(&config).await?.is_none());

    let loaded = load_history(&output)?;
    assert_eq!(loaded.commits.len(), 1);
    assert!(check_history(&loaded).is_ok());
    Ok(())
}

#[tokio::test]
async fn test_no_output_writes_nothing() -> Result<()> {
    let mut repo = TestRepo::init()?;
    repo.commit("only")?;
    let output = repo.output("history.json");
    let config = HistoryConfig {
        repo_path: repo.path(),
        output_path: output.clone(),
        no_output: true,
        ..HistoryConfig::default()
    };
    assert!(extract(&config).await?.is_none());
    assert!(!output.exists(), "no file may be created");
    Ok(())
}

#[tokio::test]
async fn test_missing_repository_is_fatal() -> Result<()> {
    let repo = TestRepo::init()?;
    let config = HistoryConfig {
        repo_path: repo.output("does-not-exist"),
        output_path: repo.output("history.json"),
        ..HistoryConfig::default()
    };
    let err = extract(&config).await.expect_err("git cannot run there");
    assert!(matches!(err, ExtractError::GitFailed { .. }), "{err:?}");
    Ok(())
}
