//! Round loop for a single instrument: search, generate, evaluate, accept.
//!
//! The optimizer walks a "current" variant that may move downhill through
//! stochastic acceptance, while separately remembering the best variant it
//! has ever scored. Rounds are strictly sequential and isolated: an error
//! or panic inside one round is recorded and the loop moves on.

use crate::application::catalog::VariantCatalog;
use crate::application::evaluation::Evaluator;
use crate::application::optimization::acceptance::{AcceptanceDecision, AcceptancePolicy};
use crate::application::optimization::generator::{
    CandidateGenerator, GenerationRequest, GenerationSource,
};
use crate::application::optimization::{StopSignal, instrument_seed};
use crate::application::panic_message;
use crate::application::search::{
    ActionSpace, CatalogActions, SearchConfig, TransformationActions, TreeSearch,
};
use crate::config::{OptimizerSettings, SearchMode};
use crate::domain::errors::{ConfigError, RoundError};
use crate::domain::evaluation::EvaluationResult;
use crate::domain::events::OptimizationEvent;
use crate::domain::outcomes::{OptimizationResult, RoundRecord};
use crate::domain::ports::{GenerationConstraints, TextGenerationService};
use crate::domain::workflow::WorkflowVariant;
use crate::infrastructure::EventBus;
use chrono::Utc;
use futures::FutureExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared collaborators an optimizer needs, cheap to clone per instrument
#[derive(Clone)]
pub struct OptimizerContext {
    pub catalog: Arc<VariantCatalog>,
    /// Quick-horizon evaluator used for tree-search simulations
    pub search_evaluator: Arc<dyn Evaluator>,
    /// Standard-horizon evaluator used to score candidates
    pub evaluator: Arc<dyn Evaluator>,
    pub generation: Option<Arc<dyn TextGenerationService>>,
    pub constraints: GenerationConstraints,
    pub events: EventBus,
    pub stop: StopSignal,
}

struct WalkState {
    current: WorkflowVariant,
    current_score: f64,
    best: WorkflowVariant,
    best_score: f64,
    best_evaluation: Option<EvaluationResult>,
}

struct RoundStep {
    candidate: WorkflowVariant,
    source: GenerationSource,
    score: f64,
    evaluation: Option<EvaluationResult>,
    decision: AcceptanceDecision,
}

pub struct Optimizer {
    instrument: String,
    max_rounds: usize,
    neutral_score: f64,
    start: WorkflowVariant,
    search: TreeSearch,
    generator: CandidateGenerator,
    evaluator: Arc<dyn Evaluator>,
    acceptance: AcceptancePolicy,
    events: EventBus,
    stop: StopSignal,
    rng: StdRng,
}

impl Optimizer {
    /// Checks everything that would make the run meaningless before any
    /// round starts. Nothing after construction returns an error.
    pub fn new(
        instrument: &str,
        settings: &OptimizerSettings,
        ctx: OptimizerContext,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        validate_instrument(instrument)?;
        if ctx.catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }

        let start_id = match settings.search.mode {
            SearchMode::Variants => &settings.initial_variant,
            SearchMode::Transformations => &settings.search.base_variant,
        };
        let start = ctx
            .catalog
            .get(start_id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownVariant {
                id: start_id.clone(),
            })?;

        let actions: Arc<dyn ActionSpace> = match settings.search.mode {
            SearchMode::Variants => Arc::new(CatalogActions::new(Arc::clone(&ctx.catalog))),
            SearchMode::Transformations => Arc::new(TransformationActions::default()),
        };
        let search = TreeSearch::new(
            actions,
            Arc::clone(&ctx.search_evaluator),
            SearchConfig::from(&settings.search),
        );
        let generator = CandidateGenerator::new(
            Arc::clone(&ctx.catalog),
            ctx.generation.clone(),
            settings.preferences.clone(),
            Duration::from_millis(settings.generation_timeout_ms),
        )
        .with_constraints(ctx.constraints.clone());
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(instrument_seed(seed, instrument)),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            instrument: instrument.to_string(),
            max_rounds: settings.max_rounds,
            neutral_score: settings.search.neutral_score,
            start,
            search,
            generator,
            evaluator: ctx.evaluator,
            acceptance: AcceptancePolicy::from(&settings.acceptance),
            events: ctx.events,
            stop: ctx.stop,
            rng,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Runs every round and returns the result. `history.len()` always
    /// equals the configured round count, stopped rounds included.
    pub async fn run(&mut self) -> OptimizationResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let initial = self.start.clone();
        let (initial_score, initial_evaluation) = self.evaluate_initial(&initial).await;
        let mut state = WalkState {
            current: initial.clone(),
            current_score: initial_score,
            best: initial.clone(),
            best_score: initial_score,
            best_evaluation: initial_evaluation,
        };

        self.events
            .publish(OptimizationEvent::RunStarted {
                instrument: self.instrument.clone(),
                max_rounds: self.max_rounds,
                initial_variant: initial.id.clone(),
                initial_score,
            })
            .await;

        let mut history = Vec::with_capacity(self.max_rounds);
        let mut stop_logged = false;
        for round in 1..=self.max_rounds {
            if self.stop.is_stopped() {
                if !stop_logged {
                    info!(
                        "Optimizer [{}]: stop requested, skipping rounds {}..={}",
                        self.instrument, round, self.max_rounds
                    );
                    stop_logged = true;
                }
                history.push(self.fail_round(round, RoundError::Stopped).await);
                continue;
            }

            let attempt = AssertUnwindSafe(self.play_round(&state)).catch_unwind().await;
            let step = match attempt {
                Ok(step) => step,
                Err(payload) => {
                    let e = RoundError::Panicked {
                        reason: panic_message(payload.as_ref()),
                    };
                    history.push(self.fail_round(round, e).await);
                    continue;
                }
            };

            history.push(self.apply_step(round, step, &mut state).await);
        }

        self.events
            .publish(OptimizationEvent::RunFinished {
                instrument: self.instrument.clone(),
                best_variant: state.best.id.clone(),
                best_score: state.best_score,
            })
            .await;

        OptimizationResult {
            run_id,
            instrument: self.instrument.clone(),
            initial_variant: initial.id,
            initial_score,
            best_variant: state.best,
            best_score: state.best_score,
            best_evaluation: state.best_evaluation,
            history,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn evaluate_initial(&self, variant: &WorkflowVariant) -> (f64, Option<EvaluationResult>) {
        self.score_variant(variant, "initial").await
    }

    /// Scores with the standard evaluator, falling back to the neutral score
    async fn score_variant(
        &self,
        variant: &WorkflowVariant,
        role: &str,
    ) -> (f64, Option<EvaluationResult>) {
        match self.evaluator.evaluate(variant, &self.instrument).await {
            Ok(result) if result.score.is_finite() => (result.score, Some(result)),
            Ok(_) => {
                warn!(
                    "Optimizer [{}]: {} score of '{}' is not finite, using neutral",
                    self.instrument, role, variant.id
                );
                (self.neutral_score, None)
            }
            Err(e) => {
                warn!(
                    "Optimizer [{}]: {} evaluation of '{}' failed: {}",
                    self.instrument, role, variant.id, e
                );
                (self.neutral_score, None)
            }
        }
    }

    async fn play_round(&mut self, state: &WalkState) -> RoundStep {
        let outcome = self
            .search
            .search(&state.current, &self.instrument, &mut self.rng)
            .await;

        let generated = self
            .generator
            .generate(&GenerationRequest {
                instrument: &self.instrument,
                current: &state.current,
                current_score: state.current_score,
                search: &outcome,
            })
            .await;

        let (score, evaluation) = self.score_variant(&generated.variant, "candidate").await;

        let decision = self
            .acceptance
            .decide(state.current_score, score, &mut self.rng);

        RoundStep {
            candidate: generated.variant,
            source: generated.source,
            score,
            evaluation,
            decision,
        }
    }

    async fn apply_step(&self, round: usize, step: RoundStep, state: &mut WalkState) -> RoundRecord {
        let score = step.score;
        let accepted = step.decision.accepted();
        let candidate_id = step.candidate.id.clone();

        debug!(
            "Optimizer [{}]: round {} candidate '{}' via {:?}, {:?}",
            self.instrument, round, candidate_id, step.source, step.decision
        );

        if accepted {
            state.current = step.candidate.clone();
            state.current_score = score;
        }
        // Tracked apart from acceptance: a rejected candidate can still be
        // the best ever seen.
        if score > state.best_score {
            state.best = step.candidate;
            state.best_score = score;
            state.best_evaluation = step.evaluation;
        }

        self.events
            .publish(OptimizationEvent::RoundCompleted {
                instrument: self.instrument.clone(),
                round,
                candidate_id: candidate_id.clone(),
                score,
                current_score: state.current_score,
                best_score: state.best_score,
                accepted,
            })
            .await;

        RoundRecord::completed(
            round,
            candidate_id,
            score,
            state.current_score,
            state.best_score,
            accepted,
        )
    }

    async fn fail_round(&self, round: usize, error: RoundError) -> RoundRecord {
        if !matches!(error, RoundError::Stopped) {
            warn!(
                "Optimizer [{}]: round {} failed: {}",
                self.instrument, round, error
            );
        }
        let error = error.to_string();
        self.events
            .publish(OptimizationEvent::RoundFailed {
                instrument: self.instrument.clone(),
                round,
                error: error.clone(),
            })
            .await;
        RoundRecord::failed(round, error)
    }
}

pub(crate) fn validate_instrument(instrument: &str) -> Result<(), ConfigError> {
    let valid = !instrument.is_empty()
        && instrument.len() <= 16
        && instrument
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '_'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidInstrument {
            instrument: instrument.to_string(),
        })
    }
}
