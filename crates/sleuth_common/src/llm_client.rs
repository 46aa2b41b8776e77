//! LLM Client Abstraction
//!
//! The model is a pure function from prompt to text. Backends: Ollama
//! (`/api/generate`) and the llama.cpp HTTP server (`/completion`).
//! `FakeLlmClient` stands in for both in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::config::{Config, LlmBackend, LlmConfig, SamplingConfig};

/// LLM errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("LLM is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("LLM returned empty response")]
    EmptyResponse,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Per-call overrides on top of the configured sampling parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop: Option<Vec<String>>,
}

impl GenerateOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..Self::default()
        }
    }
}

/// Generic LLM client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError>;

    /// Model name, for logs and the banner
    fn model_name(&self) -> &str;
}

/// Build the configured backend
pub fn build_llm_client(config: &Config) -> Result<Arc<dyn LlmClient>, LlmError> {
    let client: Arc<dyn LlmClient> = match config.llm.backend {
        LlmBackend::Ollama => Arc::new(OllamaClient::new(
            config.llm.clone(),
            config.sampling.clone(),
        )?),
        LlmBackend::LlamaServer => Arc::new(LlamaServerClient::new(
            config.llm.clone(),
            config.sampling.clone(),
        )?),
    };
    Ok(client)
}

fn build_http(config: &LlmConfig) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| LlmError::Http(format!("Failed to create HTTP client: {}", e)))
}

fn map_send_error(e: reqwest::Error, timeout_secs: u64) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(timeout_secs)
    } else {
        LlmError::Http(format!("Request failed: {}", e))
    }
}

/// POST a JSON body and return the named string field of the JSON reply
async fn post_for_text(
    http: &reqwest::Client,
    url: &str,
    body: &Value,
    field: &str,
    timeout_secs: u64,
) -> Result<String, LlmError> {
    let response = http
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| map_send_error(e, timeout_secs))?;

    if !response.status().is_success() {
        return Err(LlmError::Http(format!("HTTP {} from {}", response.status(), url)));
    }

    let json: Value = response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let text = json
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or(LlmError::EmptyResponse)?
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

/// Ollama client (`POST /api/generate`, non-streaming)
pub struct OllamaClient {
    config: LlmConfig,
    sampling: SamplingConfig,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: LlmConfig, sampling: SamplingConfig) -> Result<Self, LlmError> {
        let http = build_http(&config)?;
        Ok(Self {
            config,
            sampling,
            http,
        })
    }

    fn request_body(&self, prompt: &str, options: &GenerateOptions) -> Value {
        serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": options.temperature.unwrap_or(self.sampling.temperature),
                "top_p": self.sampling.top_p,
                "top_k": self.sampling.top_k,
                "repeat_penalty": self.sampling.repeat_penalty,
                "num_predict": options.max_tokens.unwrap_or(self.sampling.max_tokens),
                "num_ctx": self.sampling.context_size,
                "stop": options.stop.clone().unwrap_or_else(|| self.sampling.stop.clone()),
            }
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Ollama generate: model={} prompt={} chars", self.config.model, prompt.len());

        let body = self.request_body(prompt, options);
        post_for_text(&self.http, &url, &body, "response", self.config.timeout_secs).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// llama.cpp server client (`POST /completion`)
pub struct LlamaServerClient {
    config: LlmConfig,
    sampling: SamplingConfig,
    http: reqwest::Client,
}

impl LlamaServerClient {
    pub fn new(config: LlmConfig, sampling: SamplingConfig) -> Result<Self, LlmError> {
        let http = build_http(&config)?;
        Ok(Self {
            config,
            sampling,
            http,
        })
    }

    fn request_body(&self, prompt: &str, options: &GenerateOptions) -> Value {
        serde_json::json!({
            "prompt": prompt,
            "n_predict": options.max_tokens.unwrap_or(self.sampling.max_tokens),
            "temperature": options.temperature.unwrap_or(self.sampling.temperature),
            "top_p": self.sampling.top_p,
            "top_k": self.sampling.top_k,
            "repeat_penalty": self.sampling.repeat_penalty,
            "stop": options.stop.clone().unwrap_or_else(|| self.sampling.stop.clone()),
        })
    }
}

#[async_trait]
impl LlmClient for LlamaServerClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }

        let url = format!("{}/completion", self.config.endpoint.trim_end_matches('/'));
        debug!("llama-server completion: prompt={} chars", prompt.len());

        let body = self.request_body(prompt, options);
        post_for_text(&self.http, &url, &body, "content", self.config.timeout_secs).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

/// Fake LLM client for testing
///
/// Either replays a scripted queue (the last entry repeats once the queue
/// runs dry) or routes each prompt through a closure.
pub struct FakeLlmClient {
    responses: Mutex<Vec<Result<String, LlmError>>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlmClient {
    /// Create a fake client with pre-defined responses
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            responder: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a fake client that answers every prompt through `f`
    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responses: Mutex::new(Vec::new()),
            responder: Some(Box::new(f)),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a fake client that always returns the same text
    pub fn always(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// Create a fake client that always returns an error
    pub fn always_error(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Get the number of calls made
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(responder) = &self.responder {
            return responder(prompt);
        }

        let mut responses = match self.responses.lock() {
            Ok(r) => r,
            Err(_) => return Err(LlmError::EmptyResponse),
        };
        match responses.len() {
            0 => Err(LlmError::EmptyResponse),
            // Keep returning the same response
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}
