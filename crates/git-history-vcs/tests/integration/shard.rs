// Copyright 2026 Oxide Computer Company

//! Output spread over several files.

use crate::repo::{TestRepo, output_files};
use anyhow::{Context, Result};
use git_history::{ShardLimits, check_history, load_history};
use git_history_vcs::{HistoryConfig, extract};
use serde_json::Value;

#[tokio::test]
async fn test_tags_overflow_into_satellite_files() -> Result<()> {
    let mut repo = TestRepo::init()?;
    repo.commit("first")?;
    repo.commit("second")?;
    for name in ["a", "b", "c"] {
        repo.git(&["tag", name])?;
    }

    let output = repo.output("history.json");
    let config = HistoryConfig {
        repo_path: repo.path(),
        output_path: output.clone(),
        return_history: true,
        // No tag fits next to the commits; one tag per satellite.
        limits: ShardLimits {
            ceiling: 1024 * 1024,
            per_ref: 4 * 1024 * 1024,
            tolerance: 0,
        },
        ..HistoryConfig::default()
    };
    let history = extract(&config).await?.context("return mode")?;

    let files = output_files(&output);
    assert_eq!(
        files,
        [
            output.clone(),
            repo.output("history-1.json"),
            repo.output("history-2.json"),
            repo.output("history-3.json"),
        ]
    );

    // Satellites hold only tags, in name order.
    for (file, tag) in files[1..].iter().zip(["a", "b", "c"]) {
        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(file)?)?;
        let object = value.as_object().context("satellite is an object")?;
        assert_eq!(object.len(), 1, "{file}: {value}");
        let tags = object["tags"].as_object().context("tags object")?;
        assert_eq!(tags.keys().collect::<Vec<_>>(), [tag], "{file}");
    }

    // The primary file has everything else, including an empty tag map.
    let primary: Value =
        serde_json::from_str(&std::fs::read_to_string(&output)?)?;
    assert_eq!(primary["tags"], serde_json::json!({}));
    assert_eq!(primary["commits"].as_array().map(Vec::len), Some(2));

    let loaded = load_history(&output)?;
    assert_eq!(loaded, history, "the files reassemble the history");
    assert_eq!(loaded.refs.tags.len(), 3);
    let report = check_history(&loaded);
    assert!(report.is_ok(), "{:?}", report.failures);
    Ok(())
}

#[tokio::test]
async fn test_small_ceiling_round_trips() -> Result<()> {
    let mut repo = TestRepo::init()?;
    for n in 0..20 {
        repo.commit(&format!("commit {n}"))?;
    }
    repo.git(&["tag", "-a", "v1", "-m", "one", "HEAD~5"])?;

    let output = repo.output("history.json");
    let config = HistoryConfig {
        repo_path: repo.path(),
        output_path: output.clone(),
        return_history: true,
        limits: ShardLimits { ceiling: 64, per_ref: 1, tolerance: 0 },
        ..HistoryConfig::default()
    };
    let history = extract(&config).await?.context("return mode")?;
    assert_eq!(history.commits.len(), 20);

    // The exact count depends on how git's output was chunked, but the
    // commits never fit in one file.
    let files = output_files(&output);
    assert!(files.len() >= 2, "{files:?}");
    assert_eq!(files[1], repo.output("history-1.json"));
    let loaded = load_history(&output)?;
    assert_eq!(loaded, history);
    assert!(check_history(&loaded).is_ok());
    Ok(())
}
