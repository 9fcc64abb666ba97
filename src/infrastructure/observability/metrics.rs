//! Prometheus metrics for optimization runs
//!
//! All metrics use the `stratflow_` prefix and are fed from the event bus.

use crate::domain::events::{EventListener, OptimizationEvent};
use prometheus::{
    CounterVec, GaugeVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGaugeVec},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Rounds by outcome (accepted, rejected, failed)
    pub rounds_total: CounterVec,
    /// Best score so far per instrument
    pub best_score: GenericGaugeVec<AtomicF64>,
    /// Finished instruments by status (succeeded, failed)
    pub instruments_total: CounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let rounds_total = CounterVec::new(
            Opts::new("stratflow_rounds_total", "Optimizer rounds by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(rounds_total.clone()))?;

        let best_score = GaugeVec::new(
            Opts::new(
                "stratflow_best_score",
                "Best win rate observed per instrument (0-1)",
            ),
            &["instrument"],
        )?;
        registry.register(Box::new(best_score.clone()))?;

        let instruments_total = CounterVec::new(
            Opts::new(
                "stratflow_instruments_total",
                "Instruments finished by the scheduler, by status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(instruments_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            rounds_total,
            best_score,
            instruments_total,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}

/// Keeps [`Metrics`] in step with the event stream
pub struct MetricsListener {
    metrics: Metrics,
}

impl MetricsListener {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl EventListener for MetricsListener {
    fn on_event(&self, event: &OptimizationEvent) {
        match event {
            OptimizationEvent::RunStarted {
                instrument,
                initial_score,
                ..
            } => self
                .metrics
                .best_score
                .with_label_values(&[instrument.as_str()])
                .set(*initial_score),
            OptimizationEvent::RoundCompleted {
                instrument,
                best_score,
                accepted,
                ..
            } => {
                let outcome = if *accepted { "accepted" } else { "rejected" };
                self.metrics.rounds_total.with_label_values(&[outcome]).inc();
                self.metrics
                    .best_score
                    .with_label_values(&[instrument.as_str()])
                    .set(*best_score);
            }
            OptimizationEvent::RoundFailed { .. } => {
                self.metrics.rounds_total.with_label_values(&["failed"]).inc()
            }
            OptimizationEvent::RunFinished { .. } => self
                .metrics
                .instruments_total
                .with_label_values(&["succeeded"])
                .inc(),
            OptimizationEvent::InstrumentFailed { .. } => self
                .metrics
                .instruments_total
                .with_label_values(&["failed"])
                .inc(),
            OptimizationEvent::BatchStarted { .. } | OptimizationEvent::BatchFinished { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(instrument: &str, best: f64, accepted: bool) -> OptimizationEvent {
        OptimizationEvent::RoundCompleted {
            instrument: instrument.to_string(),
            round: 1,
            candidate_id: "quick".to_string(),
            score: best,
            current_score: best,
            best_score: best,
            accepted,
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.rounds_total.with_label_values(&["accepted"]).inc();
        assert!(metrics.render().contains("stratflow_rounds_total"));
    }

    #[test]
    fn test_round_outcomes_are_counted() {
        let listener = MetricsListener::new(Metrics::new().unwrap());
        listener.on_event(&completed("AAPL", 0.6, true));
        listener.on_event(&completed("AAPL", 0.6, false));
        listener.on_event(&completed("AAPL", 0.6, false));
        listener.on_event(&OptimizationEvent::RoundFailed {
            instrument: "AAPL".to_string(),
            round: 4,
            error: "stopped".to_string(),
        });

        let rounds = &listener.metrics().rounds_total;
        assert_eq!(rounds.with_label_values(&["accepted"]).get(), 1.0);
        assert_eq!(rounds.with_label_values(&["rejected"]).get(), 2.0);
        assert_eq!(rounds.with_label_values(&["failed"]).get(), 1.0);
    }

    #[test]
    fn test_best_score_per_instrument() {
        let listener = MetricsListener::new(Metrics::new().unwrap());
        listener.on_event(&completed("AAPL", 0.55, true));
        listener.on_event(&completed("AAPL", 0.72, true));
        listener.on_event(&completed("TSLA", 0.48, false));

        let output = listener.metrics().render();
        assert!(output.contains("stratflow_best_score{instrument=\"AAPL\"} 0.72"));
        assert!(output.contains("stratflow_best_score{instrument=\"TSLA\"} 0.48"));
    }

    #[test]
    fn test_instrument_status() {
        let listener = MetricsListener::new(Metrics::new().unwrap());
        listener.on_event(&OptimizationEvent::RunFinished {
            instrument: "AAPL".to_string(),
            best_variant: "quick".to_string(),
            best_score: 0.7,
        });
        listener.on_event(&OptimizationEvent::InstrumentFailed {
            instrument: "BAD".to_string(),
            reason: "boom".to_string(),
        });

        let instruments = &listener.metrics().instruments_total;
        assert_eq!(instruments.with_label_values(&["succeeded"]).get(), 1.0);
        assert_eq!(instruments.with_label_values(&["failed"]).get(), 1.0);
    }
}
