//! Candidate generation for one optimizer round.
//!
//! The text-generation service only ever picks from a closed slate of
//! admissible variants: the search winner followed by the rest of the
//! catalog. Anything else it says is discarded for the deterministic
//! fallback, so a round always gets a candidate.

use crate::application::catalog::VariantCatalog;
use crate::application::search::SearchOutcome;
use crate::domain::errors::GenerationError;
use crate::domain::ports::{GenerationConstraints, TextGenerationService};
use crate::domain::workflow::WorkflowVariant;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationSource {
    Service,
    Preference,
    SearchWinner,
}

#[derive(Debug, Clone)]
pub struct GeneratedCandidate {
    pub variant: WorkflowVariant,
    pub source: GenerationSource,
}

/// What the generator knows about the walking state when it is asked
pub struct GenerationRequest<'a> {
    pub instrument: &'a str,
    pub current: &'a WorkflowVariant,
    pub current_score: f64,
    pub search: &'a SearchOutcome,
}

pub struct CandidateGenerator {
    catalog: Arc<VariantCatalog>,
    service: Option<Arc<dyn TextGenerationService>>,
    preferences: HashMap<String, Vec<String>>,
    timeout: Duration,
    constraints: GenerationConstraints,
}

impl CandidateGenerator {
    pub fn new(
        catalog: Arc<VariantCatalog>,
        service: Option<Arc<dyn TextGenerationService>>,
        preferences: HashMap<String, Vec<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            service,
            preferences,
            timeout,
            constraints: GenerationConstraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: GenerationConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Search winner first, then every catalog entry with a different id
    pub fn slate(&self, winner: &WorkflowVariant) -> Vec<WorkflowVariant> {
        let mut slate = Vec::with_capacity(self.catalog.len() + 1);
        slate.push(winner.clone());
        slate.extend(
            self.catalog
                .variants()
                .iter()
                .filter(|v| v.id != winner.id)
                .cloned(),
        );
        slate
    }

    /// Never fails: service errors fall back to the preference list and
    /// then to the search winner.
    pub async fn generate(&self, request: &GenerationRequest<'_>) -> GeneratedCandidate {
        let slate = self.slate(&request.search.variant);

        match self.ask_service(request, &slate).await {
            Ok(variant) => {
                debug!(
                    "Generator [{}]: service proposed '{}'",
                    request.instrument, variant.id
                );
                return GeneratedCandidate {
                    variant,
                    source: GenerationSource::Service,
                };
            }
            Err(GenerationError::Unavailable) => {}
            Err(e) => warn!(
                "Generator [{}]: {}, using fallback",
                request.instrument, e
            ),
        }

        self.fallback(request.instrument, slate)
    }

    fn fallback(&self, instrument: &str, mut slate: Vec<WorkflowVariant>) -> GeneratedCandidate {
        let preferred = self.preferences.get(instrument).and_then(|ids| {
            ids.iter()
                .find_map(|id| slate.iter().position(|v| &v.id == id))
        });

        match preferred {
            Some(index) => GeneratedCandidate {
                variant: slate.swap_remove(index),
                source: GenerationSource::Preference,
            },
            None => GeneratedCandidate {
                variant: slate.swap_remove(0),
                source: GenerationSource::SearchWinner,
            },
        }
    }

    async fn ask_service(
        &self,
        request: &GenerationRequest<'_>,
        slate: &[WorkflowVariant],
    ) -> Result<WorkflowVariant, GenerationError> {
        let service = self.service.as_ref().ok_or(GenerationError::Unavailable)?;
        let prompt = build_prompt(request, slate);

        let reply = tokio::time::timeout(self.timeout, service.propose(&prompt, &self.constraints))
            .await
            .map_err(|_| GenerationError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| match e.downcast::<GenerationError>() {
                Ok(typed) => typed,
                Err(other) => GenerationError::Request {
                    reason: format!("{:#}", other),
                },
            })?;

        let normalized = normalize_reply(&reply);
        if normalized.is_empty() {
            return Err(GenerationError::Malformed {
                reason: "empty reply".to_string(),
            });
        }

        slate
            .iter()
            .find(|v| v.id.to_lowercase() == normalized)
            .cloned()
            .ok_or(GenerationError::NotInCatalog { reply: normalized })
    }
}

pub fn build_prompt(request: &GenerationRequest<'_>, slate: &[WorkflowVariant]) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Instrument: {}\nCurrent workflow: {} (win rate {:.3})",
        request.instrument, request.current.id, request.current_score
    );
    match request.search.mean_score {
        Some(mean) => {
            let _ = writeln!(
                prompt,
                "Tree search favours: {} (mean {:.3} over {} visits)",
                request.search.variant.id, mean, request.search.visits
            );
        }
        None => {
            let _ = writeln!(prompt, "Tree search found no alternative.");
        }
    }
    let _ = writeln!(prompt, "Choose the next workflow to backtest from:");
    for variant in slate {
        let _ = writeln!(prompt, "- {}", variant.id);
    }
    prompt.push_str("Answer with the identifier only.");
    prompt
}

/// Strips code fences, quotes and surrounding whitespace and lowercases
/// what is left of the first non-empty line.
pub fn normalize_reply(reply: &str) -> String {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .map(|line| {
            line.trim_matches(|c: char| matches!(c, '`' | '"' | '\'') || c.is_whitespace())
                .trim_start_matches("- ")
                .to_lowercase()
        })
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}
