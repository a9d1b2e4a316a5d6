use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AnnotatorError, Result};

const HOSTED_DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const HOSTED_DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";
const LOCAL_DEFAULT_BASE_URL: &str = "http://localhost:11434";
const LOCAL_DEFAULT_MODEL: &str = "llama3.2";

const DEFAULT_MAX_TOKENS: u32 = 400;
const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Candidate config file names, checked in the working directory
pub const CONFIG_CANDIDATES: [&str; 3] = ["Annotator.toml", "annotator.toml", ".annotator.toml"];

/// Which kind of text-generation service backs external synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    /// Hosted OpenAI-compatible chat completions API (needs an API key)
    #[default]
    #[serde(alias = "groq")]
    HostedApi,

    /// Local chat endpoint such as Ollama
    #[serde(alias = "ollama")]
    LocalEndpoint,
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Provider::HostedApi => HOSTED_DEFAULT_BASE_URL,
            Provider::LocalEndpoint => LOCAL_DEFAULT_BASE_URL,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Provider::HostedApi => HOSTED_DEFAULT_MODEL,
            Provider::LocalEndpoint => LOCAL_DEFAULT_MODEL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// Provider used when external synthesis is requested
    #[serde(default)]
    pub provider: Provider,

    /// API key (required by the hosted provider)
    pub api_key: Option<String>,

    /// Base URL override
    pub base_url: Option<String>,

    /// Model name
    pub model: Option<String>,

    /// Maximum tokens for LLM responses
    pub max_tokens: Option<u32>,

    /// Temperature for LLM responses (0.0 to 1.0)
    pub temperature: Option<f32>,
}

/// Fully resolved provider settings for one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLlm {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ResolvedLlm {
    /// A local endpoint is always worth trying; the hosted API needs a key.
    pub fn is_usable(&self) -> bool {
        match self.provider {
            Provider::LocalEndpoint => true,
            Provider::HostedApi => self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()),
        }
    }
}

impl LlmConfig {
    /// Resolve settings: per-call override, then stored configuration, then provider default
    pub fn resolve(&self, model_override: Option<&str>) -> ResolvedLlm {
        let model = model_override
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| self.provider.default_model().to_string());

        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string());

        ResolvedLlm {
            provider: self.provider,
            api_key: self.api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM integration settings
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AnnotatorError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnnotatorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default, then apply environment overrides
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)?
                } else {
                    Self::default()
                }
            }
            None => match CONFIG_CANDIDATES.iter().find(|c| Path::new(c).exists()) {
                Some(candidate) => Self::load(candidate)?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("ANNOTATOR_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("ANNOTATOR_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = lookup("ANNOTATOR_MODEL") {
            self.llm.model = Some(model);
        }
    }
}
