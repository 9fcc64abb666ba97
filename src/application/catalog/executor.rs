//! Interpreter for declarative workflow bodies.

use crate::application::analysis::{
    RuleBasedPredictor, TechnicalAnalyzer, apply_confidence_threshold, blend_confidence,
};
use crate::domain::errors::StepError;
use crate::domain::market_data::Bar;
use crate::domain::ports::{NewsFeed, SentimentScorer, StepContext, Workflow};
use crate::domain::signals::{Headline, Prediction, SentimentReading, TechnicalSummary};
use crate::domain::workflow::{PromptStyle, StepKind, WorkflowSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Providers shared by every declarative workflow in a catalog
pub struct Toolbox {
    pub news: Arc<dyn NewsFeed>,
    pub sentiment: Arc<dyn SentimentScorer>,
}

impl Toolbox {
    pub fn new(news: Arc<dyn NewsFeed>, sentiment: Arc<dyn SentimentScorer>) -> Self {
        Self { news, sentiment }
    }
}

#[derive(Default)]
struct StepState<'a> {
    bars: Option<&'a [Bar]>,
    technical: Option<TechnicalSummary>,
    headlines: Option<Vec<Headline>>,
    sentiment: Option<SentimentReading>,
    prediction: Option<Prediction>,
}

pub struct DeclarativeWorkflow {
    spec: WorkflowSpec,
    toolbox: Arc<Toolbox>,
}

impl DeclarativeWorkflow {
    pub fn new(spec: WorkflowSpec, toolbox: Arc<Toolbox>) -> Self {
        Self { spec, toolbox }
    }

    async fn execute_step<'a>(
        &self,
        step: StepKind,
        ctx: &'a StepContext,
        state: &mut StepState<'a>,
    ) -> Result<(), StepError> {
        match step {
            StepKind::FetchBars => {
                state.bars = Some(ctx.history());
            }
            StepKind::TechnicalAnalysis => {
                let bars = state.bars.ok_or_else(|| missing(step, "bars"))?;
                state.technical = Some(TechnicalAnalyzer::analyze(bars)?);
            }
            StepKind::FetchNews => {
                let headlines = self
                    .toolbox
                    .news
                    .fetch_headlines(&ctx.instrument)
                    .await
                    .map_err(|e| provider(step, e))?;
                state.headlines = Some(headlines);
            }
            StepKind::SentimentAnalysis => {
                let headlines = state
                    .headlines
                    .as_deref()
                    .ok_or_else(|| missing(step, "headlines"))?;
                let reading = self
                    .toolbox
                    .sentiment
                    .score(headlines)
                    .map_err(|e| provider(step, e))?;
                state.sentiment = Some(reading);
            }
            StepKind::Predict => {
                state.prediction = Some(RuleBasedPredictor::predict(
                    state.technical.as_ref(),
                    state.sentiment.as_ref(),
                    self.spec.prompt,
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Workflow for DeclarativeWorkflow {
    async fn run(&self, ctx: &StepContext) -> Result<Prediction, StepError> {
        let mut state = StepState::default();
        for step in &self.spec.steps {
            self.execute_step(*step, ctx, &mut state).await?;
        }

        let mut prediction = state.prediction.ok_or(StepError::NoPrediction)?;

        if self.spec.ensemble {
            // Second opinion from technicals alone; skipped when history is too short
            match TechnicalAnalyzer::analyze(ctx.history()) {
                Ok(summary) => {
                    let light =
                        RuleBasedPredictor::predict(Some(&summary), None, PromptStyle::Standard);
                    prediction = blend_confidence(prediction, &light);
                }
                Err(e) => debug!("Executor: ensemble light analysis skipped: {}", e),
            }
        }

        Ok(apply_confidence_threshold(
            prediction,
            self.spec.confidence_threshold,
        ))
    }
}

fn missing(step: StepKind, what: &str) -> StepError {
    StepError::MissingInput {
        step: step.as_str().to_string(),
        missing: what.to_string(),
    }
}

fn provider(step: StepKind, err: anyhow::Error) -> StepError {
    StepError::Provider {
        step: step.as_str().to_string(),
        reason: err.to_string(),
    }
}
