//! Text generation backend configuration from environment variables.

use std::env;

/// OpenAI-compatible chat completion endpoint settings
#[derive(Debug, Clone)]
pub struct LlmEnvConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmEnvConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
        }
    }
}

impl LlmEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("STRATFLOW_LLM_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: env::var("STRATFLOW_LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: env::var("STRATFLOW_LLM_MODEL").unwrap_or(defaults.model),
            temperature: env::var("STRATFLOW_LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unconfigured() {
        let config = LlmEnvConfig::default();
        assert!(!config.is_configured());
        assert!(config.base_url.starts_with("https://"));
    }
}
