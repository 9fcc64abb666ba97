use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Progress events emitted by optimizers and the batch scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizationEvent {
    RunStarted {
        instrument: String,
        max_rounds: usize,
        initial_variant: String,
        initial_score: f64,
    },
    RoundCompleted {
        instrument: String,
        round: usize,
        candidate_id: String,
        score: f64,
        current_score: f64,
        best_score: f64,
        accepted: bool,
    },
    RoundFailed {
        instrument: String,
        round: usize,
        error: String,
    },
    RunFinished {
        instrument: String,
        best_variant: String,
        best_score: f64,
    },
    BatchStarted {
        batch: usize,
        total_batches: usize,
        instruments: Vec<String>,
    },
    BatchFinished {
        batch: usize,
        succeeded: usize,
        failed: usize,
    },
    InstrumentFailed {
        instrument: String,
        reason: String,
    },
}

/// Receives every event published on the bus.
///
/// Called synchronously from the publishing task, so implementations must
/// not block.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &OptimizationEvent);
}

/// Mirrors events into the tracing log
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &OptimizationEvent) {
        match event {
            OptimizationEvent::RunStarted {
                instrument,
                max_rounds,
                initial_variant,
                initial_score,
            } => info!(
                "Optimizer [{}]: starting {} rounds from '{}' (score {:.4})",
                instrument, max_rounds, initial_variant, initial_score
            ),
            OptimizationEvent::RoundCompleted {
                instrument,
                round,
                candidate_id,
                score,
                best_score,
                accepted,
                ..
            } => info!(
                "Optimizer [{}]: round {} candidate '{}' scored {:.4} ({}), best {:.4}",
                instrument,
                round,
                candidate_id,
                score,
                if *accepted { "accepted" } else { "rejected" },
                best_score
            ),
            OptimizationEvent::RoundFailed {
                instrument,
                round,
                error,
            } => warn!("Optimizer [{}]: round {} failed: {}", instrument, round, error),
            OptimizationEvent::RunFinished {
                instrument,
                best_variant,
                best_score,
            } => info!(
                "Optimizer [{}]: finished, best '{}' at {:.4}",
                instrument, best_variant, best_score
            ),
            OptimizationEvent::BatchStarted {
                batch,
                total_batches,
                instruments,
            } => info!(
                "Scheduler: batch {}/{} started: {}",
                batch,
                total_batches,
                instruments.join(", ")
            ),
            OptimizationEvent::BatchFinished {
                batch,
                succeeded,
                failed,
            } => info!(
                "Scheduler: batch {} finished ({} ok, {} failed)",
                batch, succeeded, failed
            ),
            OptimizationEvent::InstrumentFailed { instrument, reason } => {
                warn!("Scheduler: {} failed: {}", instrument, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = OptimizationEvent::RoundFailed {
            instrument: "TSLA".to_string(),
            round: 2,
            error: "stopped".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "round_failed");
        assert_eq!(json["round"], 2);
    }
}
