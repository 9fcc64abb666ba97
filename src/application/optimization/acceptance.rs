//! Simulated-annealing style acceptance of candidate scores.
//!
//! Clear improvements are always taken and clear regressions never are.
//! Inside the `[-threshold, +threshold]` band a candidate is taken with
//! probability `exp(improvement / temperature)` (capped at 1).

use crate::config::AcceptanceSettings;
use rand::Rng;

/// Slack on the band edges so `0.50 - 0.52` still counts as in-band
const BAND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptanceDecision {
    Improvement,
    Stochastic { probability: f64, accepted: bool },
    Regression,
}

impl AcceptanceDecision {
    pub fn accepted(&self) -> bool {
        match self {
            AcceptanceDecision::Improvement => true,
            AcceptanceDecision::Stochastic { accepted, .. } => *accepted,
            AcceptanceDecision::Regression => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcceptancePolicy {
    threshold: f64,
    temperature: f64,
}

impl AcceptancePolicy {
    pub fn new(threshold: f64, temperature: f64) -> Self {
        Self {
            threshold,
            temperature,
        }
    }

    pub fn probability(&self, improvement: f64) -> f64 {
        (improvement / self.temperature).exp().min(1.0)
    }

    /// Only the in-band case consumes a random draw.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        current_score: f64,
        candidate_score: f64,
        rng: &mut R,
    ) -> AcceptanceDecision {
        let improvement = candidate_score - current_score;
        if improvement > self.threshold + BAND_EPSILON {
            AcceptanceDecision::Improvement
        } else if improvement < -self.threshold - BAND_EPSILON {
            AcceptanceDecision::Regression
        } else {
            let probability = self.probability(improvement);
            let draw: f64 = rng.random();
            AcceptanceDecision::Stochastic {
                probability,
                accepted: draw < probability,
            }
        }
    }
}

impl From<&AcceptanceSettings> for AcceptancePolicy {
    fn from(settings: &AcceptanceSettings) -> Self {
        Self::new(settings.threshold, settings.temperature)
    }
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self::from(&AcceptanceSettings::default())
    }
}
