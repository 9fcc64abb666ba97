pub mod backtest;

pub use backtest::BacktestEvaluator;

use crate::domain::evaluation::EvaluationResult;
use crate::domain::workflow::WorkflowVariant;
use async_trait::async_trait;

/// Scores a variant on one instrument.
///
/// The backtest implementation never returns `Err`; the variant only
/// exists so search and rounds can be exercised against failing scorers.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(
        &self,
        variant: &WorkflowVariant,
        instrument: &str,
    ) -> anyhow::Result<EvaluationResult>;
}
