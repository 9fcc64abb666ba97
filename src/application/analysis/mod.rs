pub mod predictor;
pub mod technical;

pub use predictor::{RuleBasedPredictor, apply_confidence_threshold, blend_confidence};
pub use technical::TechnicalAnalyzer;
