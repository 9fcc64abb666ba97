//! Records produced by optimization runs and batches.

use crate::domain::evaluation::EvaluationResult;
use crate::domain::workflow::WorkflowVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoundOutcome {
    Completed {
        candidate_id: String,
        score: f64,
        current_score: f64,
        best_score: f64,
        accepted: bool,
    },
    Failed {
        error: String,
    },
}

/// One entry per round, in round order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RoundOutcome,
}

impl RoundRecord {
    pub fn completed(
        round: usize,
        candidate_id: impl Into<String>,
        score: f64,
        current_score: f64,
        best_score: f64,
        accepted: bool,
    ) -> Self {
        Self {
            round,
            timestamp: Utc::now(),
            outcome: RoundOutcome::Completed {
                candidate_id: candidate_id.into(),
                score,
                current_score,
                best_score,
                accepted,
            },
        }
    }

    pub fn failed(round: usize, error: impl Into<String>) -> Self {
        Self {
            round,
            timestamp: Utc::now(),
            outcome: RoundOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RoundOutcome::Failed { .. })
    }

    pub fn best_score(&self) -> Option<f64> {
        match self.outcome {
            RoundOutcome::Completed { best_score, .. } => Some(best_score),
            RoundOutcome::Failed { .. } => None,
        }
    }

    pub fn accepted(&self) -> bool {
        matches!(self.outcome, RoundOutcome::Completed { accepted: true, .. })
    }
}

/// Result of optimizing one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: Uuid,
    pub instrument: String,
    pub initial_variant: String,
    pub initial_score: f64,
    pub best_variant: WorkflowVariant,
    pub best_score: f64,
    pub best_evaluation: Option<EvaluationResult>,
    pub history: Vec<RoundRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationResult {
    pub fn failed_rounds(&self) -> usize {
        self.history.iter().filter(|r| r.is_failed()).count()
    }

    pub fn accepted_rounds(&self) -> usize {
        self.history.iter().filter(|r| r.accepted()).count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstrumentOutcome {
    Succeeded { result: Box<OptimizationResult> },
    Failed { reason: String },
}

impl InstrumentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InstrumentOutcome::Succeeded { .. })
    }

    pub fn result(&self) -> Option<&OptimizationResult> {
        match self {
            InstrumentOutcome::Succeeded { result } => Some(result),
            InstrumentOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalBest {
    pub instrument: String,
    pub score: f64,
    pub variant: WorkflowVariant,
}

/// Aggregate over a multi-instrument batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub batches: Vec<Vec<String>>,
    pub results: BTreeMap<String, InstrumentOutcome>,
    pub global_best: Option<GlobalBest>,
    pub succeeded: usize,
    pub total: usize,
    /// Mean best score over successful instruments only
    pub average_score: f64,
}
