//! Model collaborators
//!
//! The engine treats every model as `prompt -> text` behind one of three
//! narrow traits. `LlmClient` implements all of them against an
//! OpenAI-compatible chat-completions endpoint.

use crate::agent_prompts::{
    build_classification_prompt, parse_db_need, CHAT_SYSTEM_PROMPT, CLASSIFIER_SYSTEM_PROMPT,
    NL2SQL_SYSTEM_PROMPT,
};
use crate::config::LlmConfig;
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Whether a question needs a database lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DbNeed {
    NeedDb,
    NoDb,
}

/// Produces SQL text (or the refusal sentinel) from a prompt
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, question: &str) -> Result<DbNeed>;
}

/// Answers questions that need no database lookup
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(&self, question: &str) -> Result<String>;
}

pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f64,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature: 0.1,
            http,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EngineError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let mut client = Self::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        client.temperature = config.temperature;
        Ok(client)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call_llm(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": 1000
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("LLM API call failed: {}", e);
                EngineError::UpstreamUnavailable(format!("LLM API call failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("LLM API returned {}: {}", status, text);
            return Err(EngineError::UpstreamUnavailable(format!(
                "LLM API returned {}",
                status
            )));
        }

        let response_json: serde_json::Value = response.json().await.map_err(|e| {
            EngineError::UpstreamUnavailable(format!("Failed to parse LLM response: {}", e))
        })?;

        let content = completion_content(&response_json)?;
        debug!("LLM reply ({} chars)", content.len());
        Ok(content)
    }
}

/// `choices[0].message.content` of a chat-completions reply
pub fn completion_content(response_json: &serde_json::Value) -> Result<String> {
    response_json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EngineError::UpstreamUnavailable("No content in LLM response".to_string()))
}

#[async_trait]
impl SqlGenerator for LlmClient {
    async fn generate_sql(&self, prompt: &str) -> Result<String> {
        self.call_llm(NL2SQL_SYSTEM_PROMPT, prompt).await
    }
}

#[async_trait]
impl IntentClassifier for LlmClient {
    async fn classify(&self, question: &str) -> Result<DbNeed> {
        let reply = self
            .call_llm(CLASSIFIER_SYSTEM_PROMPT, &build_classification_prompt(question))
            .await?;
        Ok(parse_db_need(&reply))
    }
}

#[async_trait]
impl ChatResponder for LlmClient {
    async fn respond(&self, question: &str) -> Result<String> {
        Ok(self.call_llm(CHAT_SYSTEM_PROMPT, question).await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_content() {
        let reply = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "SELECT 1"}}]
        });
        assert_eq!(completion_content(&reply).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_completion_without_content_is_upstream_error() {
        let reply = serde_json::json!({"error": {"message": "rate limited"}});
        assert!(matches!(
            completion_content(&reply),
            Err(EngineError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_trims_base_url() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:8000/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = LlmClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8000/v1");
        assert_eq!(client.model(), config.model);
    }
}
