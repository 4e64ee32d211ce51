use serde::{Deserialize, Serialize};

/// Engine configuration
///
/// Covers the inference-server endpoint, prompt construction knobs, and the
/// resource limits applied to sandboxed script execution. Values can come
/// from a deserialized config file or from environment variables via
/// [`EngineConfig::from_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the local inference server
    pub ollama_base_url: String,
    /// Model used when a task does not name one
    pub default_model: String,
    /// Sampling temperature for analysis completions
    pub temperature: f64,
    /// HTTP timeout for inference calls, in seconds
    pub request_timeout_secs: u64,
    /// Number of head rows included in analysis prompts
    pub sample_rows: usize,
    /// Maximum script operations before the sandbox aborts
    pub sandbox_max_operations: u64,
    /// Maximum array length constructible inside the sandbox
    pub sandbox_max_array_size: usize,
    /// Maximum string length constructible inside the sandbox
    pub sandbox_max_string_size: usize,
    /// Maximum call nesting inside the sandbox
    pub sandbox_max_call_levels: usize,
    /// Modules a code candidate is allowed to import (empty by default)
    pub allowed_modules: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            default_model: "llama3".to_string(),
            temperature: 0.4,
            request_timeout_secs: 120,
            sample_rows: 10,
            sandbox_max_operations: 500_000,
            sandbox_max_array_size: 100_000,
            sandbox_max_string_size: 1_000_000,
            sandbox_max_call_levels: 32,
            allowed_modules: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables: `OLLAMA_BASE_URL`, `OLLAMA_DEFAULT_MODEL`,
    /// `AGENTFLOW_TEMPERATURE`, `AGENTFLOW_SAMPLE_ROWS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.ollama_base_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_DEFAULT_MODEL") {
            config.default_model = model;
        }
        if let Ok(temp) = std::env::var("AGENTFLOW_TEMPERATURE") {
            if let Ok(parsed) = temp.parse() {
                config.temperature = parsed;
            }
        }
        if let Ok(rows) = std::env::var("AGENTFLOW_SAMPLE_ROWS") {
            if let Ok(parsed) = rows.parse() {
                config.sample_rows = parsed;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.default_model, "llama3");
        assert_eq!(config.temperature, 0.4);
        assert!(config.allowed_modules.is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"default_model": "mistral", "sample_rows": 5}"#,
        )
        .unwrap();
        assert_eq!(config.default_model, "mistral");
        assert_eq!(config.sample_rows, 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.temperature, 0.4);
    }
}
