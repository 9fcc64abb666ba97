//! Explicit handle over one configured optimization setup.
//!
//! A session owns the evaluators, the event bus and the stop signal, so a
//! caller can run single instruments or batches, watch progress, and stop
//! everything from another task.

use crate::application::catalog::VariantCatalog;
use crate::application::evaluation::{BacktestEvaluator, Evaluator};
use crate::application::optimization::optimizer::{
    Optimizer, OptimizerContext, validate_instrument,
};
use crate::application::optimization::{BatchScheduler, OptimizerRunner, StopSignal};
use crate::config::OptimizerSettings;
use crate::domain::errors::ConfigError;
use crate::domain::evaluation::EvaluationResult;
use crate::domain::events::{EventListener, LoggingListener, OptimizationEvent};
use crate::domain::outcomes::{BatchReport, OptimizationResult};
use crate::domain::ports::{GenerationConstraints, SeriesSource, TextGenerationService};
use crate::infrastructure::observability::{Metrics, MetricsListener};
use crate::infrastructure::{BroadcastListener, EventBus, JsonArtifactStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

const STREAM_CAPACITY: usize = 256;

/// Collaborators a session is built from
pub struct Services {
    pub catalog: Arc<VariantCatalog>,
    pub series: Arc<dyn SeriesSource>,
    pub generation: Option<Arc<dyn TextGenerationService>>,
    pub constraints: GenerationConstraints,
}

impl Services {
    pub fn new(catalog: Arc<VariantCatalog>, series: Arc<dyn SeriesSource>) -> Self {
        Self {
            catalog,
            series,
            generation: None,
            constraints: GenerationConstraints::default(),
        }
    }

    pub fn with_generation(
        mut self,
        service: Arc<dyn TextGenerationService>,
        constraints: GenerationConstraints,
    ) -> Self {
        self.generation = Some(service);
        self.constraints = constraints;
        self
    }
}

pub struct OptimizationSession {
    settings: Arc<OptimizerSettings>,
    ctx: OptimizerContext,
    full_evaluator: Arc<BacktestEvaluator>,
    series: Arc<dyn SeriesSource>,
    stream: Arc<BroadcastListener>,
    metrics: Metrics,
    store: Option<JsonArtifactStore>,
}

impl OptimizationSession {
    pub async fn create(
        settings: OptimizerSettings,
        services: Services,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        if services.catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        if !services.catalog.contains(&settings.initial_variant) {
            return Err(ConfigError::UnknownVariant {
                id: settings.initial_variant.clone(),
            });
        }

        let search_evaluator = Arc::new(BacktestEvaluator::new(
            Arc::clone(&services.catalog),
            Arc::clone(&services.series),
            settings.quick_eval.clone(),
        ));
        let full_evaluator = Arc::new(BacktestEvaluator::new(
            Arc::clone(&services.catalog),
            Arc::clone(&services.series),
            settings.full_eval.clone(),
        ));

        let metrics = Metrics::new().map_err(|e| ConfigError::InvalidParameter {
            field: "metrics".to_string(),
            reason: e.to_string(),
        })?;
        let stream = Arc::new(BroadcastListener::new(STREAM_CAPACITY));
        let events = EventBus::new();
        events.subscribe(Arc::new(LoggingListener)).await;
        events
            .subscribe(Arc::new(MetricsListener::new(metrics.clone())))
            .await;
        events.subscribe(stream.clone()).await;

        let store = match &settings.artifacts_dir {
            Some(dir) => Some(JsonArtifactStore::new(dir).map_err(|e| {
                ConfigError::InvalidParameter {
                    field: "artifacts_dir".to_string(),
                    reason: format!("{:#}", e),
                }
            })?),
            None => None,
        };

        let ctx = OptimizerContext {
            catalog: services.catalog,
            search_evaluator: search_evaluator as Arc<dyn Evaluator>,
            evaluator: full_evaluator.clone() as Arc<dyn Evaluator>,
            generation: services.generation,
            constraints: services.constraints,
            events,
            stop: StopSignal::new(),
        };

        info!(
            "Session: ready with {} variants, {} rounds, generation {}",
            ctx.catalog.len(),
            settings.max_rounds,
            if ctx.generation.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            settings: Arc::new(settings),
            ctx,
            full_evaluator,
            series: services.series,
            stream,
            metrics,
            store,
        })
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<VariantCatalog> {
        &self.ctx.catalog
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Optimizes one instrument. Only pre-flight problems are errors.
    pub async fn run_single(&self, instrument: &str) -> Result<OptimizationResult, ConfigError> {
        let mut optimizer = Optimizer::new(instrument, &self.settings, self.ctx.clone())?;
        let result = optimizer.run().await;

        if let Some(store) = &self.store
            && let Err(e) = store.save_run(&result)
        {
            warn!("Session: could not save run for {}: {:#}", instrument, e);
        }
        Ok(result)
    }

    pub async fn run_batch(&self, instruments: &[String]) -> Result<BatchReport, ConfigError> {
        let runner = Arc::new(OptimizerRunner::new(
            Arc::clone(&self.settings),
            self.ctx.clone(),
        ));
        let scheduler = BatchScheduler::new(
            runner,
            self.settings.max_concurrent,
            self.ctx.events.clone(),
            self.ctx.stop.clone(),
        )?;
        let report = scheduler.run(instruments).await?;

        if let Some(store) = &self.store
            && let Err(e) = store.save_batch(&report)
        {
            warn!("Session: could not save batch report: {:#}", e);
        }
        Ok(report)
    }

    /// One standard-horizon backtest of a catalog variant
    pub async fn evaluate(
        &self,
        instrument: &str,
        variant_id: &str,
    ) -> Result<EvaluationResult, ConfigError> {
        validate_instrument(instrument)?;
        let variant =
            self.ctx
                .catalog
                .get(variant_id)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownVariant {
                    id: variant_id.to_string(),
                })?;

        let period = self.full_evaluator.settings().period;
        let series = self.series.series(instrument, period).await;
        let result = self.full_evaluator.evaluate_series(&variant, series).await;

        if let Some(store) = &self.store
            && let Err(e) = store.save_evaluation(&result)
        {
            warn!("Session: could not save backtest for {}: {:#}", instrument, e);
        }
        Ok(result)
    }

    /// Rounds and batches already running finish; nothing new starts
    pub fn stop(&self) {
        info!("Session: stop requested");
        self.ctx.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.ctx.stop.is_stopped()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.ctx.stop.clone()
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.ctx.events.subscribe(listener).await;
    }

    /// Receives every event published after this call
    pub fn stream(&self) -> broadcast::Receiver<OptimizationEvent> {
        self.stream.receiver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{alternating_series, builtin_catalog};
    use crate::domain::market_data::{BarSeries, Period};
    use crate::domain::outcomes::RoundOutcome;
    use async_trait::async_trait;

    struct FixedSource(Arc<BarSeries>);

    #[async_trait]
    impl SeriesSource for FixedSource {
        async fn series(&self, _instrument: &str, _period: Period) -> Arc<BarSeries> {
            Arc::clone(&self.0)
        }
    }

    fn settings(rounds: usize) -> OptimizerSettings {
        let mut settings = OptimizerSettings {
            max_rounds: rounds,
            seed: Some(7),
            max_concurrent: 2,
            ..OptimizerSettings::default()
        };
        settings.search.simulations = 4;
        settings
    }

    fn services() -> Services {
        Services::new(
            builtin_catalog(),
            Arc::new(FixedSource(alternating_series("ALT", 120))),
        )
    }

    #[tokio::test]
    async fn test_run_single_fills_history() {
        let session = OptimizationSession::create(settings(2), services())
            .await
            .unwrap();
        let mut stream = session.stream();

        let result = session.run_single("AAPL").await.unwrap();

        assert_eq!(result.history.len(), 2);
        assert!(result.best_score >= result.initial_score);
        assert!(matches!(
            stream.try_recv(),
            Ok(OptimizationEvent::RunStarted { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_before_run_records_stopped_rounds() {
        let session = OptimizationSession::create(settings(3), services())
            .await
            .unwrap();
        session.stop();
        assert!(session.is_stopped());

        let result = session.run_single("AAPL").await.unwrap();
        assert_eq!(result.history.len(), 3);
        assert!(result.history.iter().all(|r| matches!(
            &r.outcome,
            RoundOutcome::Failed { error } if error == "stopped"
        )));
        assert_eq!(result.best_variant.id, "technical");
    }

    #[tokio::test]
    async fn test_stopped_batch_reports_every_instrument() {
        let session = OptimizationSession::create(settings(1), services())
            .await
            .unwrap();
        session.stop();

        let instruments: Vec<String> = ["AAPL", "MSFT", "TSLA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = session.run_batch(&instruments).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 0);
        assert!(report.global_best.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_initial_variant() {
        let mut settings = settings(1);
        settings.initial_variant = "nope".to_string();
        let err = OptimizationSession::create(settings, services())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnknownVariant { id } if id == "nope"));
    }

    #[tokio::test]
    async fn test_evaluate_single_variant() {
        let session = OptimizationSession::create(settings(1), services())
            .await
            .unwrap();

        let result = session.evaluate("ALT", "momentum").await.unwrap();
        assert_eq!(result.variant_id, "momentum");
        assert!((0.0..=1.0).contains(&result.score));

        assert!(matches!(
            session.evaluate("ALT", "missing").await,
            Err(ConfigError::UnknownVariant { .. })
        ));
        assert!(matches!(
            session.evaluate("not a symbol", "momentum").await,
            Err(ConfigError::InvalidInstrument { .. })
        ));
    }

    #[tokio::test]
    async fn test_evaluate_saves_backtest_artifact() {
        let dir = std::env::temp_dir().join(format!(
            "stratflow_session_{}",
            uuid::Uuid::new_v4()
        ));
        let mut settings = settings(1);
        settings.artifacts_dir = Some(dir.clone());
        let session = OptimizationSession::create(settings, services())
            .await
            .unwrap();

        let result = session.evaluate("ALT", "technical").await.unwrap();

        let saved = JsonArtifactStore::new(&dir).unwrap();
        let content = std::fs::read_to_string(saved.dir().join("last_backtest.json")).unwrap();
        let last: EvaluationResult = serde_json::from_str(&content).unwrap();
        assert_eq!(last.variant_id, "technical");
        assert_eq!(last.total_trades, result.total_trades);
        assert_eq!(last.trades.len(), result.trades.len());
        let backtests = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("backtest_ALT_"))
            .count();
        assert_eq!(backtests, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_metrics_follow_events() {
        let session = OptimizationSession::create(settings(2), services())
            .await
            .unwrap();
        session.run_single("AAPL").await.unwrap();

        let rounds = &session.metrics().rounds_total;
        let counted: f64 = ["accepted", "rejected", "failed"]
            .iter()
            .map(|o| rounds.with_label_values(&[*o]).get())
            .sum();
        assert_eq!(counted, 2.0);
    }
}
