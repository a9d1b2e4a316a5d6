use std::time::Duration;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Provider, ResolvedLlm};
use crate::error::{AnnotatorError, Result};
use super::generator::TextGenerator;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Factory function to create the generator for the resolved provider
pub fn create_generator(settings: &ResolvedLlm) -> Result<Box<dyn TextGenerator>> {
    match settings.provider {
        Provider::HostedApi => Ok(Box::new(HostedApiGenerator::new(settings)?)),
        Provider::LocalEndpoint => Ok(Box::new(LocalEndpointGenerator::new(settings)?)),
    }
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AnnotatorError::Provider(format!("Failed to build HTTP client: {}", e)))
}

fn messages(system: &str, user: &str) -> Value {
    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": user }
    ])
}

/// Hosted OpenAI-compatible chat completions API (Groq by default)
pub struct HostedApiGenerator {
    settings: ResolvedLlm,
    api_key: String,
    client: reqwest::Client,
}

impl HostedApiGenerator {
    pub fn new(settings: &ResolvedLlm) -> Result<Self> {
        let api_key = settings.api_key.clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnnotatorError::Config("API key required for the hosted provider".to_string()))?;

        Ok(Self {
            settings: settings.clone(),
            api_key,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl TextGenerator for HostedApiGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Option<String>> {
        let payload = json!({
            "model": self.settings.model,
            "messages": messages(system, user),
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "stream": false
        });

        let response = self.client
            .post(format!("{}/chat/completions", self.settings.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AnnotatorError::Provider(format!("Chat completion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AnnotatorError::Provider(
                format!("Chat completion error {}: {}", status, error_text)
            ));
        }

        let response_data: Value = response.json().await
            .map_err(|e| AnnotatorError::Provider(format!("Failed to parse chat completion response: {}", e)))?;

        if let Some(usage) = response_data.get("usage") {
            debug!("Tokens used: {}", usage["total_tokens"]);
        }

        Ok(response_data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string))
    }

    fn provider_name(&self) -> &str {
        "Hosted API"
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

/// Local chat endpoint speaking the Ollama `/api/chat` protocol
pub struct LocalEndpointGenerator {
    settings: ResolvedLlm,
    client: reqwest::Client,
}

impl LocalEndpointGenerator {
    pub fn new(settings: &ResolvedLlm) -> Result<Self> {
        Ok(Self {
            settings: settings.clone(),
            client: build_client()?,
        })
    }
}

#[async_trait]
impl TextGenerator for LocalEndpointGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<Option<String>> {
        let payload = json!({
            "model": self.settings.model,
            "messages": messages(system, user),
            "stream": false,
            "options": { "temperature": self.settings.temperature }
        });

        let response = self.client
            .post(format!("{}/api/chat", self.settings.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| AnnotatorError::Provider(format!("Local endpoint request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AnnotatorError::Provider(
                format!("Local endpoint error {}", response.status())
            ));
        }

        let response_data: Value = response.json().await
            .map_err(|e| AnnotatorError::Provider(format!("Failed to parse local endpoint response: {}", e)))?;

        Ok(response_data["message"]["content"]
            .as_str()
            .map(str::to_string))
    }

    fn provider_name(&self) -> &str {
        "Local endpoint"
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}
