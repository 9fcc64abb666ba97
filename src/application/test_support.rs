//! Deterministic collaborators shared by unit tests.

use crate::application::catalog::{Toolbox, VariantCatalog};
use crate::application::evaluation::Evaluator;
use crate::domain::evaluation::EvaluationResult;
use crate::domain::market_data::{Bar, BarSeries, Period};
use crate::domain::ports::{NewsFeed, SentimentScorer};
use crate::domain::signals::{Headline, SentimentReading};
use crate::domain::workflow::WorkflowVariant;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct NoNews;

#[async_trait]
impl NewsFeed for NoNews {
    async fn fetch_headlines(&self, _instrument: &str) -> anyhow::Result<Vec<Headline>> {
        Ok(Vec::new())
    }
}

pub struct NeutralScorer;

impl SentimentScorer for NeutralScorer {
    fn score(&self, _headlines: &[Headline]) -> anyhow::Result<SentimentReading> {
        Ok(SentimentReading::neutral())
    }
}

pub fn toolbox() -> Arc<Toolbox> {
    Arc::new(Toolbox::new(Arc::new(NoNews), Arc::new(NeutralScorer)))
}

pub fn builtin_catalog() -> Arc<VariantCatalog> {
    Arc::new(VariantCatalog::with_builtins(toolbox()).unwrap())
}

/// Daily series whose move into bar k is +1% for odd k and -1% for even k
pub fn alternating_series(instrument: &str, n: usize) -> Arc<BarSeries> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut close = 100.0;
    let mut bars = Vec::with_capacity(n);
    for k in 0..n {
        if k > 0 {
            close *= if k % 2 == 1 { 1.01 } else { 0.99 };
        }
        bars.push(Bar {
            date: start + chrono::Duration::days(k as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        });
    }
    Arc::new(BarSeries::new(instrument, Period::OneYear, bars))
}

/// Scores variants from a lookup table.
///
/// Ids may be listed exactly or by prefix before the first `+`, so derived
/// variants inherit their root's score unless listed themselves. Unknown
/// ids are an error.
pub struct TableEvaluator {
    scores: HashMap<String, f64>,
    pub calls: AtomicUsize,
}

impl TableEvaluator {
    pub fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for TableEvaluator {
    async fn evaluate(
        &self,
        variant: &WorkflowVariant,
        instrument: &str,
    ) -> anyhow::Result<EvaluationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let root = variant.id.split('+').next().unwrap_or_default();
        let score = self
            .scores
            .get(&variant.id)
            .or_else(|| self.scores.get(root))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no score for {}", variant.id))?;

        let result = EvaluationResult {
            variant_id: variant.id.clone(),
            instrument: instrument.to_string(),
            score,
            win_rate: score,
            wins: 0,
            total_trades: 0,
            total_return: 0.0,
            average_return: 0.0,
            sharpe_ratio: 0.0,
            steps_evaluated: 0,
            skipped_steps: 0,
            synthetic_data: false,
            trades: Vec::new(),
            fallback: None,
        };
        Ok(result)
    }
}

/// Always fails
pub struct BrokenEvaluator;

#[async_trait]
impl Evaluator for BrokenEvaluator {
    async fn evaluate(
        &self,
        _variant: &WorkflowVariant,
        _instrument: &str,
    ) -> anyhow::Result<EvaluationResult> {
        anyhow::bail!("evaluator offline")
    }
}
