use crate::domain::signals::Signal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Score returned when the series is too short to evaluate
pub const INSUFFICIENT_DATA_SCORE: f64 = 0.0;

/// Score returned when evaluation breaks internally
pub const NEUTRAL_SCORE: f64 = 0.5;

/// One backtest step as seen by the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub signal: Signal,
    pub confidence: f64,
    pub actual_return: f64,
    pub realized_return: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EvaluationFallback {
    InsufficientData { available: usize, required: usize },
    Internal { detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub variant_id: String,
    pub instrument: String,
    /// Fitness used by search and acceptance; currently the win rate
    pub score: f64,
    pub win_rate: f64,
    pub wins: usize,
    pub total_trades: usize,
    pub total_return: f64,
    pub average_return: f64,
    pub sharpe_ratio: f64,
    pub steps_evaluated: usize,
    pub skipped_steps: usize,
    pub synthetic_data: bool,
    pub trades: Vec<TradeRecord>,
    pub fallback: Option<EvaluationFallback>,
}

impl EvaluationResult {
    pub fn fallback(
        variant_id: impl Into<String>,
        instrument: impl Into<String>,
        score: f64,
        reason: EvaluationFallback,
    ) -> Self {
        Self {
            variant_id: variant_id.into(),
            instrument: instrument.into(),
            score,
            win_rate: 0.0,
            wins: 0,
            total_trades: 0,
            total_return: 0.0,
            average_return: 0.0,
            sharpe_ratio: 0.0,
            steps_evaluated: 0,
            skipped_steps: 0,
            synthetic_data: false,
            trades: Vec::new(),
            fallback: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}
