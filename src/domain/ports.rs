use crate::domain::errors::StepError;
use crate::domain::market_data::{Bar, BarSeries, Period};
use crate::domain::signals::{Headline, Prediction, SentimentReading};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Raw daily bar provider (remote API, CSV file, ...)
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn fetch_bars(&self, instrument: &str, period: Period) -> Result<Vec<Bar>>;
}

/// Bar history that always resolves, falling back to generated data when
/// the underlying provider cannot deliver.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn series(&self, instrument: &str, period: Period) -> Arc<BarSeries>;
}

#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn fetch_headlines(&self, instrument: &str) -> Result<Vec<Headline>>;
}

pub trait SentimentScorer: Send + Sync {
    fn score(&self, headlines: &[Headline]) -> Result<SentimentReading>;
}

#[derive(Debug, Clone)]
pub struct GenerationConstraints {
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConstraints {
    fn default() -> Self {
        Self {
            system_prompt: "You select trading workflow variants. Reply with one identifier only."
                .to_string(),
            max_tokens: 32,
            temperature: 0.2,
        }
    }
}

/// Free-text generation backend (hosted LLM or scripted stand-in)
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    async fn propose(&self, prompt: &str, constraints: &GenerationConstraints) -> Result<String>;
}

/// What a workflow sees at one backtest step.
///
/// Only bars up to and including `cutoff` are reachable through
/// [`StepContext::history`].
#[derive(Debug, Clone)]
pub struct StepContext {
    pub instrument: String,
    series: Arc<BarSeries>,
    cutoff: usize,
}

impl StepContext {
    pub fn new(instrument: impl Into<String>, series: Arc<BarSeries>, cutoff: usize) -> Self {
        let cutoff = cutoff.min(series.len().saturating_sub(1));
        Self {
            instrument: instrument.into(),
            series,
            cutoff,
        }
    }

    pub fn history(&self) -> &[Bar] {
        if self.series.is_empty() {
            return &[];
        }
        &self.series.bars[..=self.cutoff]
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.history().last()
    }
}

/// A catalog entry's prediction logic
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn run(&self, ctx: &StepContext) -> Result<Prediction, StepError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(n: usize) -> Arc<BarSeries> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| Bar {
                date: start + chrono::Duration::days(i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 1000.0,
            })
            .collect();
        Arc::new(BarSeries::new("TEST", Period::ThreeMonths, bars))
    }

    #[test]
    fn test_history_stops_at_cutoff() {
        let ctx = StepContext::new("TEST", series(20), 5);
        assert_eq!(ctx.history().len(), 6);
        assert_eq!(ctx.latest().map(|b| b.close), Some(105.0));
    }

    #[test]
    fn test_cutoff_is_clamped_to_series() {
        let ctx = StepContext::new("TEST", series(3), 10);
        assert_eq!(ctx.history().len(), 3);

        let empty = StepContext::new("TEST", series(0), 0);
        assert!(empty.history().is_empty());
    }
}
