//! JSON artifacts for finished runs, batches and one-off backtests.
//!
//! Every run is written twice: once under a timestamped name that is never
//! overwritten, and once as `last_run.json` for tooling that only wants the
//! latest result. Backtests follow the same scheme with `last_backtest.json`.

use crate::domain::evaluation::EvaluationResult;
use crate::domain::outcomes::{BatchReport, OptimizationResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const LAST_RUN_FILE: &str = "last_run.json";
const LAST_BACKTEST_FILE: &str = "last_backtest.json";

pub struct JsonArtifactStore {
    dir: PathBuf,
}

impl JsonArtifactStore {
    /// Creates the directory if it does not exist yet
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create artifact directory {:?}", dir))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the timestamped file
    pub fn save_run(&self, result: &OptimizationResult) -> Result<PathBuf> {
        let name = format!(
            "run_{}_{}.json",
            sanitize(&result.instrument),
            stamp(result.finished_at)
        );
        let path = self.dir.join(name);
        write_json(&path, result)?;
        write_json(&self.dir.join(LAST_RUN_FILE), result)?;
        info!(
            "ArtifactStore: saved run {} for {} to {:?}",
            result.run_id, result.instrument, path
        );
        Ok(path)
    }

    pub fn save_batch(&self, report: &BatchReport) -> Result<PathBuf> {
        let path = self
            .dir
            .join(format!("batch_{}.json", stamp(report.started_at)));
        write_json(&path, report)?;
        info!(
            "ArtifactStore: saved batch {} ({} instruments) to {:?}",
            report.run_id, report.total, path
        );
        Ok(path)
    }

    pub fn save_evaluation(&self, result: &EvaluationResult) -> Result<PathBuf> {
        let name = format!(
            "backtest_{}_{}.json",
            sanitize(&result.instrument),
            stamp(Utc::now())
        );
        let path = self.dir.join(name);
        write_json(&path, result)?;
        write_json(&self.dir.join(LAST_BACKTEST_FILE), result)?;
        info!(
            "ArtifactStore: saved backtest of '{}' on {} to {:?}",
            result.variant_id, result.instrument, path
        );
        Ok(path)
    }

    pub fn load_last_run(&self) -> Result<Option<OptimizationResult>> {
        let path = self.dir.join(LAST_RUN_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).context("Failed to read last run file")?;
        let result = serde_json::from_str(&content).context("Failed to parse last run JSON")?;
        Ok(Some(result))
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// Keeps instrument symbols like `^GSPC` or `BRK.B` usable as file names
fn sanitize(instrument: &str) -> String {
    instrument
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;

    // Atomic write: write to temp file then rename
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).context("Failed to write temp file")?;
    fs::rename(&temp_path, path).context("Failed to rename temp file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcomes::{GlobalBest, InstrumentOutcome, RoundRecord};
    use crate::domain::workflow::WorkflowVariant;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn temp_store() -> JsonArtifactStore {
        let dir = std::env::temp_dir().join(format!("stratflow_artifacts_{}", Uuid::new_v4()));
        JsonArtifactStore::new(dir).unwrap()
    }

    fn result(instrument: &str) -> OptimizationResult {
        let variant = WorkflowVariant::registered("momentum", "momentum");
        OptimizationResult {
            run_id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            initial_variant: "technical".to_string(),
            initial_score: 0.5,
            best_variant: variant,
            best_score: 0.61,
            best_evaluation: None,
            history: vec![RoundRecord::completed(1, "momentum", 0.61, 0.61, 0.61, true)],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_run_writes_timestamped_and_last_run() {
        let store = temp_store();
        let saved = result("^GSPC");
        let path = store.save_run(&saved).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run__GSPC_"), "{}", name);
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let last = store.load_last_run().unwrap().unwrap();
        assert_eq!(last.run_id, saved.run_id);
        assert_eq!(last.history.len(), 1);

        fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_last_run_is_overwritten() {
        let store = temp_store();
        store.save_run(&result("AAPL")).unwrap();
        let second = result("TSLA");
        store.save_run(&second).unwrap();

        let last = store.load_last_run().unwrap().unwrap();
        assert_eq!(last.instrument, "TSLA");

        fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_save_batch() {
        let store = temp_store();
        let run = result("AAPL");
        let mut results = BTreeMap::new();
        results.insert(
            "AAPL".to_string(),
            InstrumentOutcome::Succeeded {
                result: Box::new(run.clone()),
            },
        );
        let report = BatchReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            duration_ms: 12,
            batches: vec![vec!["AAPL".to_string()]],
            results,
            global_best: Some(GlobalBest {
                instrument: "AAPL".to_string(),
                score: run.best_score,
                variant: run.best_variant,
            }),
            succeeded: 1,
            total: 1,
            average_score: 0.61,
        };

        let path = store.save_batch(&report).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["results"]["AAPL"]["status"], "succeeded");
        assert_eq!(json["global_best"]["instrument"], "AAPL");

        fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_save_evaluation_writes_last_backtest() {
        let store = temp_store();
        let evaluation = EvaluationResult {
            variant_id: "momentum".to_string(),
            instrument: "BRK.B".to_string(),
            score: 0.6,
            win_rate: 0.6,
            wins: 3,
            total_trades: 5,
            total_return: 0.02,
            average_return: 0.004,
            sharpe_ratio: 0.3,
            steps_evaluated: 5,
            skipped_steps: 0,
            synthetic_data: false,
            trades: Vec::new(),
            fallback: None,
        };

        let path = store.save_evaluation(&evaluation).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("backtest_BRK_B_"), "{}", name);

        let content = fs::read_to_string(store.dir().join(LAST_BACKTEST_FILE)).unwrap();
        let last: EvaluationResult = serde_json::from_str(&content).unwrap();
        assert_eq!(last.variant_id, "momentum");
        assert_eq!(last.total_trades, 5);
        assert!((last.score - 0.6).abs() < 1e-12);

        fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn test_missing_last_run() {
        let store = temp_store();
        assert!(store.load_last_run().unwrap().is_none());
        fs::remove_dir_all(store.dir()).ok();
    }
}
