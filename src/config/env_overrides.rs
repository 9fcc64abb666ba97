//! `STRATFLOW_*` environment overrides applied on top of file settings.

use super::OptimizerSettings;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub fn apply_env_overrides(settings: &mut OptimizerSettings) {
    apply_overrides_from(settings, |key| env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
///
/// Unparseable values are logged and ignored, leaving the previous layer.
pub fn apply_overrides_from<F>(settings: &mut OptimizerSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    override_parsed(&lookup, "STRATFLOW_MAX_ROUNDS", &mut settings.max_rounds);
    override_parsed(&lookup, "STRATFLOW_MAX_CONCURRENT", &mut settings.max_concurrent);
    override_parsed(&lookup, "STRATFLOW_SIMULATIONS", &mut settings.search.simulations);
    override_parsed(
        &lookup,
        "STRATFLOW_EXPLORATION_CONSTANT",
        &mut settings.search.exploration_constant,
    );
    override_parsed(&lookup, "STRATFLOW_SEARCH_MODE", &mut settings.search.mode);
    override_parsed(&lookup, "STRATFLOW_ACCEPT_THRESHOLD", &mut settings.acceptance.threshold);
    override_parsed(&lookup, "STRATFLOW_TEMPERATURE", &mut settings.acceptance.temperature);
    override_parsed(
        &lookup,
        "STRATFLOW_GENERATION_TIMEOUT_MS",
        &mut settings.generation_timeout_ms,
    );
    override_parsed(&lookup, "STRATFLOW_FETCH_TIMEOUT_MS", &mut settings.fetch_timeout_ms);
    override_parsed(&lookup, "STRATFLOW_CACHE_TTL_SECS", &mut settings.cache_ttl_secs);

    if let Some(seed) = lookup("STRATFLOW_SEED").and_then(|v| v.parse::<u64>().ok()) {
        settings.seed = Some(seed);
    }
    if let Some(variant) = lookup("STRATFLOW_INITIAL_VARIANT").filter(|v| !v.trim().is_empty()) {
        settings.initial_variant = variant.trim().to_string();
    }
    if let Some(dir) = lookup("STRATFLOW_ARTIFACTS_DIR").filter(|v| !v.trim().is_empty()) {
        settings.artifacts_dir = Some(PathBuf::from(dir));
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Config: ignoring unparseable {}={}", key, raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchMode;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut settings = OptimizerSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup_from(&[
                ("STRATFLOW_MAX_ROUNDS", "3"),
                ("STRATFLOW_SEARCH_MODE", "transformations"),
                ("STRATFLOW_SEED", "42"),
                ("STRATFLOW_ARTIFACTS_DIR", "/tmp/runs"),
            ]),
        );

        assert_eq!(settings.max_rounds, 3);
        assert_eq!(settings.search.mode, SearchMode::Transformations);
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.artifacts_dir, Some(PathBuf::from("/tmp/runs")));
    }

    #[test]
    fn test_unparseable_values_are_ignored() {
        let mut settings = OptimizerSettings::default();
        apply_overrides_from(
            &mut settings,
            lookup_from(&[
                ("STRATFLOW_MAX_CONCURRENT", "lots"),
                ("STRATFLOW_TEMPERATURE", "0.25"),
            ]),
        );

        assert_eq!(settings.max_concurrent, 3);
        assert_eq!(settings.acceptance.temperature, 0.25);
    }
}
