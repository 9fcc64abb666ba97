//! Workflow variants: the unit the search, the generator and the evaluator
//! all trade in.
//!
//! A variant is either a statically registered callable (looked up by name
//! in the catalog) or a declarative step list interpreted by the catalog's
//! executor. Transformations only ever rewrite declarative bodies.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVariant {
    pub id: String,
    pub body: VariantBody,
}

impl WorkflowVariant {
    pub fn registered(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: VariantBody::Registered { name: name.into() },
        }
    }

    pub fn declarative(id: impl Into<String>, spec: WorkflowSpec) -> Self {
        Self {
            id: id.into(),
            body: VariantBody::Declarative(spec),
        }
    }

    pub fn spec(&self) -> Option<&WorkflowSpec> {
        match &self.body {
            VariantBody::Declarative(spec) => Some(spec),
            VariantBody::Registered { .. } => None,
        }
    }
}

impl fmt::Display for WorkflowVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantBody {
    Registered { name: String },
    Declarative(WorkflowSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub steps: Vec<StepKind>,
    pub prompt: PromptStyle,
    /// Directional predictions below this confidence become holds
    pub confidence_threshold: f64,
    pub ensemble: bool,
}

impl WorkflowSpec {
    pub fn new(steps: Vec<StepKind>) -> Self {
        Self {
            steps,
            prompt: PromptStyle::Standard,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            ensemble: false,
        }
    }

    pub fn contains(&self, step: StepKind) -> bool {
        self.steps.contains(&step)
    }

    pub fn position(&self, step: StepKind) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }
}

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.65;
pub const MIN_CONFIDENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    FetchBars,
    TechnicalAnalysis,
    FetchNews,
    SentimentAnalysis,
    Predict,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::FetchBars => "fetch_bars",
            StepKind::TechnicalAnalysis => "technical_analysis",
            StepKind::FetchNews => "fetch_news",
            StepKind::SentimentAnalysis => "sentiment_analysis",
            StepKind::Predict => "predict",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// Technical direction leads, sentiment only nudges
    #[default]
    Standard,
    /// Technical and sentiment carry equal weight
    MultiFactor,
}

/// Edits applied to a declarative variant in transformation search mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transformation {
    AddTechnicalAnalysis,
    AddSentimentAnalysis,
    AddNewsFetch,
    ModifyPrompt,
    ChangeConfidenceThreshold,
    AddEnsemble,
    RemoveNode,
    ReorderNodes,
}

impl Transformation {
    pub const ALL: [Transformation; 8] = [
        Transformation::AddTechnicalAnalysis,
        Transformation::AddSentimentAnalysis,
        Transformation::AddNewsFetch,
        Transformation::ModifyPrompt,
        Transformation::ChangeConfidenceThreshold,
        Transformation::AddEnsemble,
        Transformation::RemoveNode,
        Transformation::ReorderNodes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transformation::AddTechnicalAnalysis => "add_technical_analysis",
            Transformation::AddSentimentAnalysis => "add_sentiment_analysis",
            Transformation::AddNewsFetch => "add_news_fetch",
            Transformation::ModifyPrompt => "modify_prompt",
            Transformation::ChangeConfidenceThreshold => "change_confidence_threshold",
            Transformation::AddEnsemble => "add_ensemble",
            Transformation::RemoveNode => "remove_node",
            Transformation::ReorderNodes => "reorder_nodes",
        }
    }
}

impl fmt::Display for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
