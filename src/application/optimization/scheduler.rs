//! Multi-instrument scheduling with bounded concurrency.
//!
//! Instruments are cut into sequential batches of `max_concurrent`. Every
//! run in a batch is its own task; the next batch starts only once the
//! whole batch has settled. A failing or panicking instrument is recorded
//! and never touches its neighbours.

use crate::application::optimization::optimizer::{Optimizer, OptimizerContext};
use crate::application::optimization::{STOPPED_REASON, StopSignal};
use crate::application::panic_message;
use crate::config::OptimizerSettings;
use crate::domain::errors::ConfigError;
use crate::domain::events::OptimizationEvent;
use crate::domain::outcomes::{BatchReport, GlobalBest, InstrumentOutcome, OptimizationResult};
use crate::infrastructure::EventBus;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Optimizes one instrument end to end
#[async_trait]
pub trait InstrumentRunner: Send + Sync {
    async fn optimize(&self, instrument: &str, stop: StopSignal) -> Result<OptimizationResult>;
}

/// Builds a fresh [`Optimizer`] per instrument from shared settings
pub struct OptimizerRunner {
    settings: Arc<OptimizerSettings>,
    ctx: OptimizerContext,
}

impl OptimizerRunner {
    pub fn new(settings: Arc<OptimizerSettings>, ctx: OptimizerContext) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl InstrumentRunner for OptimizerRunner {
    async fn optimize(&self, instrument: &str, stop: StopSignal) -> Result<OptimizationResult> {
        let mut ctx = self.ctx.clone();
        ctx.stop = stop;
        let mut optimizer = Optimizer::new(instrument, &self.settings, ctx)?;
        Ok(optimizer.run().await)
    }
}

pub struct BatchScheduler {
    runner: Arc<dyn InstrumentRunner>,
    max_concurrent: usize,
    events: EventBus,
    stop: StopSignal,
}

impl BatchScheduler {
    pub fn new(
        runner: Arc<dyn InstrumentRunner>,
        max_concurrent: usize,
        events: EventBus,
        stop: StopSignal,
    ) -> Result<Self, ConfigError> {
        if max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(Self {
            runner,
            max_concurrent,
            events,
            stop,
        })
    }

    /// Consecutive chunks of at most `size` instruments, duplicates dropped
    pub fn partition(instruments: &[String], size: usize) -> Vec<Vec<String>> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = instruments
            .iter()
            .filter(|i| seen.insert(i.as_str()))
            .cloned()
            .collect();
        unique.chunks(size.max(1)).map(|c| c.to_vec()).collect()
    }

    pub async fn run(&self, instruments: &[String]) -> Result<BatchReport, ConfigError> {
        if instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let batches = Self::partition(instruments, self.max_concurrent);
        let total = batches.iter().map(Vec::len).sum::<usize>();
        if total < instruments.len() {
            warn!(
                "Scheduler: dropped {} duplicate instrument(s)",
                instruments.len() - total
            );
        }

        info!(
            "Scheduler: {} instruments in {} batches of up to {}",
            total,
            batches.len(),
            self.max_concurrent
        );

        // Batch order, which decides global-best ties
        let mut settled: Vec<(String, InstrumentOutcome)> = Vec::with_capacity(total);

        for (index, batch) in batches.iter().enumerate() {
            if self.stop.is_stopped() {
                for instrument in batch {
                    settled.push(self.record_failure(instrument, STOPPED_REASON).await);
                }
                continue;
            }

            self.events
                .publish(OptimizationEvent::BatchStarted {
                    batch: index + 1,
                    total_batches: batches.len(),
                    instruments: batch.clone(),
                })
                .await;

            let outcomes = self.run_batch(batch).await;
            let mut succeeded = 0;
            for (instrument, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => {
                        succeeded += 1;
                        settled.push((
                            instrument.clone(),
                            InstrumentOutcome::Succeeded {
                                result: Box::new(result),
                            },
                        ));
                    }
                    Err(reason) => {
                        settled.push(self.record_failure(instrument, &reason).await);
                    }
                }
            }

            self.events
                .publish(OptimizationEvent::BatchFinished {
                    batch: index + 1,
                    succeeded,
                    failed: batch.len() - succeeded,
                })
                .await;
        }

        Ok(aggregate(
            run_id,
            started_at,
            clock.elapsed().as_millis() as u64,
            batches,
            settled,
        ))
    }

    /// One task per instrument; waits for all of them
    async fn run_batch(&self, batch: &[String]) -> Vec<std::result::Result<OptimizationResult, String>> {
        let handles: Vec<_> = batch
            .iter()
            .map(|instrument| {
                let runner = Arc::clone(&self.runner);
                let stop = self.stop.clone();
                let instrument = instrument.clone();
                tokio::spawn(async move { runner.optimize(&instrument, stop).await })
            })
            .collect();

        futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(e) if e.is_panic() => Err(format!(
                    "optimizer panicked: {}",
                    panic_message(e.into_panic().as_ref())
                )),
                Err(e) => Err(format!("optimizer task aborted: {}", e)),
            })
            .collect()
    }

    async fn record_failure(&self, instrument: &str, reason: &str) -> (String, InstrumentOutcome) {
        if reason != STOPPED_REASON {
            warn!("Scheduler: {} failed: {}", instrument, reason);
        }
        self.events
            .publish(OptimizationEvent::InstrumentFailed {
                instrument: instrument.to_string(),
                reason: reason.to_string(),
            })
            .await;
        (
            instrument.to_string(),
            InstrumentOutcome::Failed {
                reason: reason.to_string(),
            },
        )
    }
}

fn aggregate(
    run_id: Uuid,
    started_at: chrono::DateTime<Utc>,
    duration_ms: u64,
    batches: Vec<Vec<String>>,
    settled: Vec<(String, InstrumentOutcome)>,
) -> BatchReport {
    let mut global_best: Option<GlobalBest> = None;
    let mut score_sum = 0.0;
    let mut succeeded = 0;

    for (instrument, outcome) in &settled {
        if let Some(result) = outcome.result() {
            succeeded += 1;
            score_sum += result.best_score;
            let better = global_best
                .as_ref()
                .is_none_or(|best| result.best_score > best.score);
            if better {
                global_best = Some(GlobalBest {
                    instrument: instrument.clone(),
                    score: result.best_score,
                    variant: result.best_variant.clone(),
                });
            }
        }
    }

    let total = settled.len();
    let average_score = if succeeded > 0 {
        score_sum / succeeded as f64
    } else {
        0.0
    };

    BatchReport {
        run_id,
        started_at,
        duration_ms,
        batches,
        results: settled.into_iter().collect::<BTreeMap<_, _>>(),
        global_best,
        succeeded,
        total,
        average_score,
    }
}
