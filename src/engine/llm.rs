use crate::engine::config::EngineConfig;
use crate::engine::error::{AgentError, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Client contract against the local model-serving endpoint
///
/// Both calls block the current task until the server answers; callers that
/// need wall-clock limits must impose them a layer above.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Free-text completion
    async fn complete(&self, prompt: &str, model: &str, temperature: f64) -> Result<String>;

    /// Completion constrained to a JSON object, returned parsed
    async fn complete_structured(&self, prompt: &str, model: &str) -> Result<Value>;
}

/// Inference client for a local Ollama server, speaking its
/// OpenAI-compatible chat endpoint
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &EngineConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        info!("Initialized Ollama client with base URL: {}", config.ollama_base_url);
        Self {
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Check whether the server is up and reachable
    pub async fn check_connection(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("Ollama server returned status code: {}", response.status());
                false
            }
            Err(e) => {
                error!("Cannot connect to Ollama server: {e}");
                false
            }
        }
    }

    /// Names of the models available on the server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::Deserialization(format!("invalid model list: {e}")))?;

        let models = body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(models)
    }

    async fn chat(
        &self,
        prompt: &str,
        model: &str,
        temperature: f64,
        json_mode: bool,
    ) -> Result<String> {
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "stream": false,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(|e| AgentError::Http {
            status: status.as_u16(),
            message: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(AgentError::http(status.as_u16(), text));
        }

        let parsed: Value = serde_json::from_str(&text).map_err(AgentError::from_serde)?;
        extract_completion_content(&parsed)
    }
}

/// Pull the completion text out of a chat-completions response
fn extract_completion_content(response: &Value) -> Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| {
            AgentError::Deserialization("completion response has no message content".to_string())
        })
}

fn map_reqwest_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::Timeout(format!("HTTP request timed out: {e}"))
    } else if e.is_connect() {
        AgentError::Http {
            status: 0,
            message: format!("Connection error: {e}"),
        }
    } else {
        AgentError::Http {
            status: e.status().map_or(0, |s| s.as_u16()),
            message: format!("HTTP request failed: {e}"),
        }
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn complete(&self, prompt: &str, model: &str, temperature: f64) -> Result<String> {
        self.chat(prompt, model, temperature, false).await
    }

    async fn complete_structured(&self, prompt: &str, model: &str) -> Result<Value> {
        // Structured requests run cold to keep the JSON well-formed
        let content = self.chat(prompt, model, 0.1, true).await?;
        serde_json::from_str(&content).map_err(AgentError::from_serde)
    }
}
