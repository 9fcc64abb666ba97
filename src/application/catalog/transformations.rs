use crate::domain::workflow::{
    MIN_CONFIDENCE_THRESHOLD, PromptStyle, StepKind, Transformation, VariantBody, WorkflowSpec,
    WorkflowVariant,
};

const THRESHOLD_STEP: f64 = 0.10;

impl Transformation {
    /// Derives a new variant with id `parent+action`.
    ///
    /// Registered variants have no step list to edit and come back
    /// unchanged, id included.
    pub fn apply(&self, variant: &WorkflowVariant) -> WorkflowVariant {
        let spec = match &variant.body {
            VariantBody::Registered { .. } => return variant.clone(),
            VariantBody::Declarative(spec) => spec,
        };

        let mut spec = spec.clone();
        match self {
            Transformation::AddTechnicalAnalysis => {
                if !spec.contains(StepKind::FetchBars) {
                    spec.steps.insert(0, StepKind::FetchBars);
                }
                if !spec.contains(StepKind::TechnicalAnalysis) {
                    let at = spec
                        .position(StepKind::FetchBars)
                        .map(|i| i + 1)
                        .unwrap_or(0);
                    spec.steps.insert(at, StepKind::TechnicalAnalysis);
                }
            }
            Transformation::AddSentimentAnalysis => {
                if !spec.contains(StepKind::FetchNews) {
                    insert_before_predict(&mut spec, StepKind::FetchNews);
                }
                if !spec.contains(StepKind::SentimentAnalysis) {
                    let at = spec
                        .position(StepKind::FetchNews)
                        .map(|i| i + 1)
                        .unwrap_or(spec.steps.len());
                    spec.steps.insert(at, StepKind::SentimentAnalysis);
                }
            }
            Transformation::AddNewsFetch => {
                if !spec.contains(StepKind::FetchNews) {
                    insert_before_predict(&mut spec, StepKind::FetchNews);
                }
            }
            Transformation::ModifyPrompt => {
                spec.prompt = match spec.prompt {
                    PromptStyle::Standard => PromptStyle::MultiFactor,
                    PromptStyle::MultiFactor => PromptStyle::Standard,
                };
            }
            Transformation::ChangeConfidenceThreshold => {
                spec.confidence_threshold =
                    (spec.confidence_threshold - THRESHOLD_STEP).max(MIN_CONFIDENCE_THRESHOLD);
            }
            Transformation::AddEnsemble => {
                spec.ensemble = true;
            }
            Transformation::RemoveNode => {
                spec.steps.retain(|s| *s != StepKind::SentimentAnalysis);
            }
            Transformation::ReorderNodes => {
                if let (Some(fetch), Some(technical)) = (
                    spec.position(StepKind::FetchBars),
                    spec.position(StepKind::TechnicalAnalysis),
                ) && fetch < technical
                {
                    let step = spec.steps.remove(technical);
                    spec.steps.insert(fetch, step);
                }
            }
        }

        WorkflowVariant::declarative(format!("{}+{}", variant.id, self.as_str()), spec)
    }
}

fn insert_before_predict(spec: &mut WorkflowSpec, step: StepKind) {
    let at = spec
        .position(StepKind::Predict)
        .unwrap_or(spec.steps.len());
    spec.steps.insert(at, step);
}
