//! Built-in catalog entries.
//!
//! Four declarative templates cover the technical, sentiment, combined and
//! lightweight pipelines. Two price-action callables are registered by name.

use crate::domain::errors::StepError;
use crate::domain::ports::{StepContext, Workflow};
use crate::domain::signals::{Prediction, Signal};
use crate::domain::workflow::{PromptStyle, StepKind, WorkflowSpec, WorkflowVariant};
use async_trait::async_trait;

pub fn technical_template() -> WorkflowSpec {
    WorkflowSpec::new(vec![
        StepKind::FetchBars,
        StepKind::TechnicalAnalysis,
        StepKind::Predict,
    ])
}

pub fn sentiment_template() -> WorkflowSpec {
    WorkflowSpec {
        confidence_threshold: 0.55,
        ..WorkflowSpec::new(vec![
            StepKind::FetchNews,
            StepKind::SentimentAnalysis,
            StepKind::Predict,
        ])
    }
}

pub fn full_template() -> WorkflowSpec {
    WorkflowSpec {
        prompt: PromptStyle::MultiFactor,
        ..WorkflowSpec::new(vec![
            StepKind::FetchBars,
            StepKind::TechnicalAnalysis,
            StepKind::FetchNews,
            StepKind::SentimentAnalysis,
            StepKind::Predict,
        ])
    }
}

pub fn quick_template() -> WorkflowSpec {
    WorkflowSpec {
        confidence_threshold: 0.55,
        ..technical_template()
    }
}

pub fn builtin_templates() -> Vec<WorkflowVariant> {
    vec![
        WorkflowVariant::declarative("technical", technical_template()),
        WorkflowVariant::declarative("sentiment", sentiment_template()),
        WorkflowVariant::declarative("full", full_template()),
        WorkflowVariant::declarative("quick", quick_template()),
    ]
}

fn closes_tail(ctx: &StepContext, needed: usize, step: &str) -> Result<Vec<f64>, StepError> {
    let history = ctx.history();
    if history.len() < needed {
        return Err(StepError::InsufficientHistory {
            step: step.to_string(),
            available: history.len(),
            required: needed,
        });
    }
    Ok(history[history.len() - needed..]
        .iter()
        .map(|b| b.close)
        .collect())
}

fn relative_change(from: f64, to: f64, step: &str) -> Result<f64, StepError> {
    if from <= 0.0 || !from.is_finite() || !to.is_finite() {
        return Err(StepError::Provider {
            step: step.to_string(),
            reason: format!("invalid close {}", from),
        });
    }
    Ok((to - from) / from)
}

/// Follows the move over the last `window` bars
pub struct MomentumWorkflow {
    window: usize,
}

impl MomentumWorkflow {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Default for MomentumWorkflow {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Workflow for MomentumWorkflow {
    async fn run(&self, ctx: &StepContext) -> Result<Prediction, StepError> {
        let closes = closes_tail(ctx, self.window + 1, "momentum")?;
        let change = relative_change(closes[0], closes[self.window], "momentum")?;
        let signal = if change > 0.0 {
            Signal::Buy
        } else if change < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        };
        Ok(Prediction::new(
            signal,
            0.5 + (change.abs() * 10.0).min(0.5),
            format!("{}-bar change {:+.2}%", self.window, change * 100.0),
        ))
    }
}

/// Fades the most recent daily move
pub struct ContrarianWorkflow;

#[async_trait]
impl Workflow for ContrarianWorkflow {
    async fn run(&self, ctx: &StepContext) -> Result<Prediction, StepError> {
        let closes = closes_tail(ctx, 2, "contrarian")?;
        let change = relative_change(closes[0], closes[1], "contrarian")?;
        let signal = if change > 0.0 {
            Signal::Sell
        } else if change < 0.0 {
            Signal::Buy
        } else {
            Signal::Hold
        };
        Ok(Prediction::new(
            signal,
            0.5 + (change.abs() * 20.0).min(0.5),
            format!("fading last move {:+.2}%", change * 100.0),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::{Bar, BarSeries, Period};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn ctx(closes: &[f64]) -> StepContext {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        let series = Arc::new(BarSeries::new("TEST", Period::ThreeMonths, bars));
        StepContext::new("TEST", series, closes.len() - 1)
    }

    #[test]
    fn test_builtin_template_ids() {
        let ids: Vec<_> = builtin_templates().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["technical", "sentiment", "full", "quick"]);
    }

    #[tokio::test]
    async fn test_momentum_follows_window_change() {
        let workflow = MomentumWorkflow::new(3);
        let up = workflow.run(&ctx(&[100.0, 101.0, 99.0, 102.0])).await.unwrap();
        assert_eq!(up.signal, Signal::Buy);

        let down = workflow.run(&ctx(&[100.0, 101.0, 99.0, 98.0])).await.unwrap();
        assert_eq!(down.signal, Signal::Sell);

        assert!(matches!(
            workflow.run(&ctx(&[100.0, 101.0])).await,
            Err(StepError::InsufficientHistory { .. })
        ));
    }

    #[tokio::test]
    async fn test_contrarian_fades_last_move() {
        let p = ContrarianWorkflow.run(&ctx(&[100.0, 101.0])).await.unwrap();
        assert_eq!(p.signal, Signal::Sell);
        assert!((p.confidence - 0.7).abs() < 1e-9);

        let p = ContrarianWorkflow.run(&ctx(&[100.0, 99.0])).await.unwrap();
        assert_eq!(p.signal, Signal::Buy);
    }
}
