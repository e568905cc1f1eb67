//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint exposing `POST {base_url}/chat/completions` with
//! `response_format: json_schema` support.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, ModelError, ModelProvider};
use crate::ModelConfig;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u64,
    response_format: Value,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u64,
}

// Keep the key out of logs.
impl fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config, reading the key from `config.api_key_env`
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            debug!(
                "{} is not set, calling {} without credentials",
                config.api_key_env, config.base_url
            );
        }
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            config.temperature,
            config.max_tokens,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        temperature: f64,
        max_tokens: u64,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            temperature,
            max_tokens,
        })
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.chars().count() <= limit {
        return body.to_string();
    }
    let head: String = body.chars().take(limit).collect();
    format!("{head}...(truncated)")
}

/// Pull the JSON document out of a chat completion body
fn parse_completion(body: CompletionResponse) -> Result<Value, ModelError> {
    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ModelError::InvalidResponse("completion has no content".into()))?;

    serde_json::from_str(&content).map_err(|e| {
        ModelError::InvalidResponse(format!(
            "content is not JSON ({e}): {}",
            truncate(&content, 300)
        ))
    })
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    async fn complete(&self, messages: &[ChatMessage], schema: &Value) -> Result<Value, ModelError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "response",
                    "schema": schema,
                    "strict": false,
                }
            }),
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Transport(format!(
                "{} returned {}: {}",
                self.base_url,
                status,
                truncate(&body, 300)
            )));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        debug!("Received completion from {}", self.model);
        parse_completion(body)
    }
}
