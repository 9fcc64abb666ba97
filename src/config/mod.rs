//! Configuration module for stratflow.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `STRATFLOW_*` environment overrides. `validate()` runs last and is
//! the only place a `ConfigError` can come from.

mod env_overrides;
mod llm_config;

pub use env_overrides::apply_env_overrides;
pub use llm_config::LlmEnvConfig;

use crate::domain::errors::ConfigError;
use crate::domain::market_data::Period;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What the search tree expands over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Each action picks a whole catalog variant
    #[default]
    Variants,
    /// Each action applies a transformation to the node's variant
    Transformations,
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "variants" => Ok(SearchMode::Variants),
            "transformations" => Ok(SearchMode::Transformations),
            _ => anyhow::bail!(
                "Invalid search mode: {}. Must be 'variants' or 'transformations'",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub mode: SearchMode,
    /// Simulations per search call
    pub simulations: usize,
    pub exploration_constant: f64,
    /// Visits after which a node is no longer selected through
    pub terminal_visits: u32,
    /// Simulation score used when the quick evaluator fails
    pub neutral_score: f64,
    /// Root variant used in transformation mode
    pub base_variant: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            mode: SearchMode::Variants,
            simulations: 16,
            exploration_constant: std::f64::consts::SQRT_2,
            terminal_visits: 10,
            neutral_score: 0.5,
            base_variant: "technical".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceSettings {
    pub threshold: f64,
    pub temperature: f64,
}

impl Default for AcceptanceSettings {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            temperature: 0.1,
        }
    }
}

/// Walk-forward window of one evaluator preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorSettings {
    pub lookback: usize,
    pub horizon: usize,
    pub trade_tail: usize,
    pub period: Period,
}

impl EvaluatorSettings {
    /// Cheap preset used inside search simulations
    pub fn quick() -> Self {
        Self {
            lookback: 10,
            horizon: 30,
            trade_tail: 10,
            period: Period::SixMonths,
        }
    }

    /// Preset used to score optimizer candidates
    pub fn standard() -> Self {
        Self {
            lookback: 30,
            horizon: 60,
            trade_tail: 10,
            period: Period::OneYear,
        }
    }

    /// Bars a series must have for the walk-forward loop to run
    pub fn required_bars(&self) -> usize {
        self.lookback + self.horizon + 1
    }
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub max_rounds: usize,
    pub initial_variant: String,
    pub max_concurrent: usize,
    pub search: SearchSettings,
    pub acceptance: AcceptanceSettings,
    pub quick_eval: EvaluatorSettings,
    pub full_eval: EvaluatorSettings,
    pub generation_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub seed: Option<u64>,
    /// Fallback variant ids per instrument, most preferred first
    pub preferences: HashMap<String, Vec<String>>,
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_rounds: 15,
            initial_variant: "technical".to_string(),
            max_concurrent: 3,
            search: SearchSettings::default(),
            acceptance: AcceptanceSettings::default(),
            quick_eval: EvaluatorSettings::quick(),
            full_eval: EvaluatorSettings::standard(),
            generation_timeout_ms: 10_000,
            fetch_timeout_ms: 10_000,
            cache_ttl_secs: 3600,
            seed: None,
            preferences: HashMap::new(),
            artifacts_dir: None,
        }
    }
}

impl OptimizerSettings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse optimizer settings TOML")
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut settings = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        apply_env_overrides(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.search.simulations == 0 {
            return Err(ConfigError::ZeroSimulations);
        }
        if self.search.terminal_visits == 0 {
            return Err(invalid("search.terminal_visits", "must be at least 1"));
        }
        if !(self.search.exploration_constant.is_finite() && self.search.exploration_constant >= 0.0)
        {
            return Err(invalid(
                "search.exploration_constant",
                "must be a non-negative finite number",
            ));
        }
        if !(0.0..=1.0).contains(&self.search.neutral_score) {
            return Err(invalid("search.neutral_score", "must lie in [0, 1]"));
        }
        if !(self.acceptance.threshold.is_finite() && self.acceptance.threshold >= 0.0) {
            return Err(invalid("acceptance.threshold", "must be non-negative"));
        }
        if !(self.acceptance.temperature.is_finite() && self.acceptance.temperature > 0.0) {
            return Err(invalid("acceptance.temperature", "must be positive"));
        }
        for (name, eval) in [("quick_eval", &self.quick_eval), ("full_eval", &self.full_eval)] {
            if eval.lookback == 0 {
                return Err(invalid(&format!("{}.lookback", name), "must be at least 1"));
            }
            if eval.horizon == 0 {
                return Err(invalid(&format!("{}.horizon", name), "must be at least 1"));
            }
        }
        if self.initial_variant.trim().is_empty() {
            return Err(invalid("initial_variant", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_presets() {
        let settings = OptimizerSettings::default();
        assert_eq!(settings.max_rounds, 15);
        assert_eq!(settings.max_concurrent, 3);
        assert_eq!(settings.quick_eval.lookback, 10);
        assert_eq!(settings.quick_eval.horizon, 30);
        assert_eq!(settings.quick_eval.period, Period::SixMonths);
        assert_eq!(settings.full_eval.period, Period::OneYear);
        assert_eq!(settings.full_eval.lookback, 30);
        assert_eq!(settings.full_eval.horizon, 60);
        assert_eq!(settings.full_eval.required_bars(), 91);
        assert_eq!(settings.search.terminal_visits, 10);
        assert!((settings.search.exploration_constant - 1.414).abs() < 1e-3);
        assert_eq!(settings.acceptance.threshold, 0.02);
        assert_eq!(settings.acceptance.temperature, 0.1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = OptimizerSettings::from_toml_str(
            r#"
            max_rounds = 4
            seed = 7

            [search]
            mode = "transformations"
            simulations = 8

            [preferences]
            AAPL = ["technical", "full"]
            "#,
        )
        .unwrap();

        assert_eq!(settings.max_rounds, 4);
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.search.mode, SearchMode::Transformations);
        assert_eq!(settings.search.simulations, 8);
        assert_eq!(settings.search.terminal_visits, 10);
        assert_eq!(settings.max_concurrent, 3);
        assert_eq!(
            settings.preferences.get("AAPL"),
            Some(&vec!["technical".to_string(), "full".to_string()])
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let settings = OptimizerSettings {
            max_rounds: 0,
            ..OptimizerSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::ZeroRounds)));

        let settings = OptimizerSettings {
            max_concurrent: 0,
            ..OptimizerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ZeroConcurrency)
        ));

        let mut settings = OptimizerSettings::default();
        settings.acceptance.temperature = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = OptimizerSettings::default();
        settings.quick_eval.horizon = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidParameter { ref field, .. }) if field == "quick_eval.horizon"
        ));
    }

    #[test]
    fn test_search_mode_parsing() {
        assert_eq!(
            "Transformations".parse::<SearchMode>().unwrap(),
            SearchMode::Transformations
        );
        assert!("random".parse::<SearchMode>().is_err());
    }
}
