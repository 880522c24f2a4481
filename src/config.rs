//! Process configuration, read once at startup from the environment plus an
//! optional YAML overrides file. Mirrors the caps C10 centralizes.

use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Overrides accepted from an optional `config.yaml`, layered on top of
/// environment variables. Every field is optional; absent fields fall back
/// to the hard-coded defaults below.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverrides {
    pub openai_model: Option<String>,
    pub max_feeds_per_publisher: Option<usize>,
    pub max_total_feeds: Option<usize>,
    pub max_articles_cap: Option<usize>,
    pub max_concurrent_summaries: Option<usize>,
    pub min_content_len: Option<usize>,
    pub max_input_chars: Option<usize>,
    pub overall_deadline_secs: Option<u64>,
}

impl ConfigOverrides {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(s).map_err(|e| ConfigError::InvalidValue {
            name: "config.yaml",
            value: e.to_string(),
        })
    }
}

/// Settings consumed by the aggregator and its components (C10's read-only
/// caps, plus the LLM credential/model).
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub max_feeds_per_publisher: usize,
    pub max_total_feeds: usize,
    pub max_articles_cap: usize,
    pub max_concurrent_summaries: usize,
    pub min_content_len: usize,
    pub max_input_chars: usize,
    pub overall_deadline: Duration,
}

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const ALLOWED_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-4",
    "gpt-4-32k",
    "gpt-4-turbo",
];

impl Settings {
    /// Loads settings from the environment, applying `overrides` on top of
    /// the hard defaults. `OPENAI_API_KEY` is required and validated
    /// (`sk-` prefix, length >= 20).
    pub fn load(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY"))?;
        validate_api_key(&openai_api_key)?;

        let openai_model = std::env::var("OPENAI_MODEL")
            .ok()
            .or(overrides.openai_model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if !ALLOWED_MODELS.contains(&openai_model.as_str()) {
            return Err(ConfigError::InvalidValue {
                name: "OPENAI_MODEL",
                value: openai_model,
            });
        }

        Ok(Self {
            openai_api_key,
            openai_model,
            max_feeds_per_publisher: overrides.max_feeds_per_publisher.unwrap_or(2),
            max_total_feeds: overrides.max_total_feeds.unwrap_or(6),
            max_articles_cap: overrides.max_articles_cap.unwrap_or(20),
            max_concurrent_summaries: overrides.max_concurrent_summaries.unwrap_or(3),
            min_content_len: overrides.min_content_len.unwrap_or(50),
            max_input_chars: overrides.max_input_chars.unwrap_or(8000),
            overall_deadline: Duration::from_secs(overrides.overall_deadline_secs.unwrap_or(60)),
        })
    }
}

fn validate_api_key(key: &str) -> Result<(), ConfigError> {
    let well_formed = key.starts_with("sk-")
        && key.len() >= 20
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::InvalidApiKey("OPENAI_API_KEY"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_key() {
        assert!(validate_api_key("sk-short").is_err());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(validate_api_key("xx-012345678901234567").is_err());
    }

    #[test]
    fn accepts_well_formed_key() {
        assert!(validate_api_key("sk-abcdefghijklmnopqrstuvwxyz").is_ok());
    }

    #[test]
    fn overrides_parse_from_yaml() {
        let yaml = "max_articles_cap: 15\nopenai_model: gpt-4\n";
        let overrides = ConfigOverrides::from_yaml_str(yaml).unwrap();
        assert_eq!(overrides.max_articles_cap, Some(15));
        assert_eq!(overrides.openai_model.as_deref(), Some("gpt-4"));
    }
}
