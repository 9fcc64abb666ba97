//! Walk-forward backtest evaluator.
//!
//! For each step `i` in `lookback..lookback + horizon` the variant sees bars
//! `0..=i` only and is scored against the move from close `i` to close
//! `i + 1`. Holds are kept in the trade tail but never counted as trades.
//!
//! The evaluator never fails past its boundary: short series score
//! [`INSUFFICIENT_DATA_SCORE`], anything unexpected (including a panicking
//! variant) scores [`NEUTRAL_SCORE`].

use crate::application::catalog::VariantCatalog;
use crate::application::evaluation::Evaluator;
use crate::application::panic_message;
use crate::config::EvaluatorSettings;
use crate::domain::evaluation::{
    EvaluationFallback, EvaluationResult, INSUFFICIENT_DATA_SCORE, NEUTRAL_SCORE, TradeRecord,
};
use crate::domain::market_data::BarSeries;
use crate::domain::ports::{SeriesSource, StepContext, Workflow};
use crate::domain::workflow::WorkflowVariant;
use anyhow::bail;
use async_trait::async_trait;
use futures::FutureExt;
use statrs::statistics::Statistics;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BacktestEvaluator {
    catalog: Arc<VariantCatalog>,
    source: Arc<dyn SeriesSource>,
    settings: EvaluatorSettings,
}

impl BacktestEvaluator {
    pub fn new(
        catalog: Arc<VariantCatalog>,
        source: Arc<dyn SeriesSource>,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            catalog,
            source,
            settings,
        }
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    /// Scores `variant` on an already loaded series.
    pub async fn evaluate_series(
        &self,
        variant: &WorkflowVariant,
        series: Arc<BarSeries>,
    ) -> EvaluationResult {
        let required = self.settings.required_bars();
        if series.len() < required {
            warn!(
                "Evaluator: {} has {} bars, need {} for '{}'",
                series.instrument,
                series.len(),
                required,
                variant.id
            );
            let mut result = EvaluationResult::fallback(
                &variant.id,
                &series.instrument,
                INSUFFICIENT_DATA_SCORE,
                EvaluationFallback::InsufficientData {
                    available: series.len(),
                    required,
                },
            );
            result.synthetic_data = series.synthetic;
            return result;
        }

        let workflow = match self.catalog.resolve(variant) {
            Ok(w) => w,
            Err(e) => return self.internal_fallback(variant, &series, e.to_string()),
        };

        let outcome = AssertUnwindSafe(self.walk_forward(workflow, variant, &series))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => self.internal_fallback(variant, &series, e.to_string()),
            Err(payload) => {
                self.internal_fallback(variant, &series, panic_message(payload.as_ref()))
            }
        }
    }

    async fn walk_forward(
        &self,
        workflow: Arc<dyn Workflow>,
        variant: &WorkflowVariant,
        series: &Arc<BarSeries>,
    ) -> anyhow::Result<EvaluationResult> {
        let start = self.settings.lookback;
        let end = start + self.settings.horizon;

        let mut trades: Vec<TradeRecord> = Vec::with_capacity(self.settings.horizon);
        let mut returns: Vec<f64> = Vec::new();
        let mut wins = 0usize;
        let mut skipped = 0usize;

        for i in start..end {
            let ctx = StepContext::new(&series.instrument, Arc::clone(series), i);
            let prediction = match workflow.run(&ctx).await {
                Ok(p) if p.confidence.is_finite() => p,
                Ok(_) => {
                    debug!("Evaluator: step {} of '{}' gave no usable confidence", i, variant.id);
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    debug!("Evaluator: step {} of '{}' skipped: {}", i, variant.id, e);
                    skipped += 1;
                    continue;
                }
            };

            let today = &series.bars[i];
            let next = &series.bars[i + 1];
            if !(today.close.is_finite() && today.close > 0.0 && next.close.is_finite()) {
                bail!("invalid close around index {} ({} -> {})", i, today.close, next.close);
            }

            let actual_return = (next.close - today.close) / today.close;
            let realized_return = prediction.signal.realized_return(actual_return);
            let directional = prediction.signal.is_directional();
            let correct = directional && realized_return > 0.0;

            if directional {
                returns.push(realized_return);
                if correct {
                    wins += 1;
                }
            }

            trades.push(TradeRecord {
                date: today.date,
                signal: prediction.signal,
                confidence: prediction.confidence,
                actual_return,
                realized_return,
                correct,
            });
        }

        let total_trades = returns.len();
        let win_rate = if total_trades > 0 {
            wins as f64 / total_trades as f64
        } else {
            0.0
        };
        let total_return: f64 = returns.iter().sum();
        let average_return = if total_trades > 0 {
            total_return / total_trades as f64
        } else {
            0.0
        };
        let std_dev = returns.iter().population_std_dev();
        let sharpe_ratio = if std_dev.is_finite() && std_dev > 0.0 {
            average_return / std_dev
        } else {
            0.0
        };

        let tail_start = trades.len().saturating_sub(self.settings.trade_tail);
        let trades = trades.split_off(tail_start);

        debug!(
            "Evaluator: '{}' on {}: {}/{} wins, sharpe {:.3}, {} skipped",
            variant.id, series.instrument, wins, total_trades, sharpe_ratio, skipped
        );

        Ok(EvaluationResult {
            variant_id: variant.id.clone(),
            instrument: series.instrument.clone(),
            score: win_rate,
            win_rate,
            wins,
            total_trades,
            total_return,
            average_return,
            sharpe_ratio,
            steps_evaluated: self.settings.horizon - skipped,
            skipped_steps: skipped,
            synthetic_data: series.synthetic,
            trades,
            fallback: None,
        })
    }

    fn internal_fallback(
        &self,
        variant: &WorkflowVariant,
        series: &BarSeries,
        detail: String,
    ) -> EvaluationResult {
        warn!(
            "Evaluator: '{}' on {} fell back to neutral score: {}",
            variant.id, series.instrument, detail
        );
        let mut result = EvaluationResult::fallback(
            &variant.id,
            &series.instrument,
            NEUTRAL_SCORE,
            EvaluationFallback::Internal { detail },
        );
        result.synthetic_data = series.synthetic;
        result
    }
}

#[async_trait]
impl Evaluator for BacktestEvaluator {
    async fn evaluate(
        &self,
        variant: &WorkflowVariant,
        instrument: &str,
    ) -> anyhow::Result<EvaluationResult> {
        let series = self.source.series(instrument, self.settings.period).await;
        Ok(self.evaluate_series(variant, series).await)
    }
}
