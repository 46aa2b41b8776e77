//! Configuration management for sleuth.
//!
//! Loads settings from a TOML file or uses defaults. Every field has a serde
//! default so partial files are valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// System-wide config file path
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sleuth/config.toml";

/// Environment override for the config file location
pub const CONFIG_ENV: &str = "SLEUTH_CONFIG";

/// Which inference backend serves the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackend {
    #[default]
    Ollama,
    /// llama.cpp HTTP server (`llama-server`)
    LlamaServer,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: LlmBackend,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP timeout for a single generate call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: LlmBackend::default(),
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Sampling parameters forwarded to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_stop")]
    pub stop: Vec<String>,

    /// Context window size (Ollama `num_ctx`)
    #[serde(default = "default_context_size")]
    pub context_size: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_top_k() -> u32 {
    40
}

fn default_repeat_penalty() -> f32 {
    1.1
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_stop() -> Vec<String> {
    // A blank-line stop would cut multi-section answers short
    vec!["User:".to_string()]
}

fn default_context_size() -> u32 {
    20_000
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repeat_penalty: default_repeat_penalty(),
            max_tokens: default_max_tokens(),
            stop: default_stop(),
            context_size: default_context_size(),
        }
    }
}

/// Web search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Results kept per query (clamped to 1..=10)
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Optional region code (e.g. "us-en")
    #[serde(default)]
    pub region: Option<String>,
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/".to_string()
}

fn default_max_results() -> usize {
    10
}

fn default_search_timeout() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
            region: None,
        }
    }
}

impl SearchConfig {
    pub fn effective_max_results(&self) -> usize {
        self.max_results.clamp(1, 10)
    }
}

/// Page fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between attempts
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Minimum spacing between requests to the same host
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    #[serde(default = "default_respect_robots")]
    pub respect_robots: bool,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    1_000
}

fn default_rate_limit() -> u64 {
    1_000
}

fn default_max_content_chars() -> usize {
    2_400
}

fn default_respect_robots() -> bool {
    true
}

fn default_user_agent() -> String {
    format!(
        "Sleuth/{} (+https://github.com/jjgarcianorway/sleuth)",
        env!("CARGO_PKG_VERSION")
    )
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            rate_limit_ms: default_rate_limit(),
            max_content_chars: default_max_content_chars(),
            respect_robots: default_respect_robots(),
            user_agent: default_user_agent(),
        }
    }
}

/// Research loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Upper bound on a single model call; a timeout fails that step only
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Evidence characters handed to the evaluator and synthesizer
    #[serde(default = "default_evidence_budget")]
    pub evidence_budget_chars: usize,

    /// Print per-round progress to the console
    #[serde(default = "default_show_rounds")]
    pub show_rounds: bool,
}

fn default_step_timeout() -> u64 {
    90
}

fn default_evidence_budget() -> usize {
    8_000
}

fn default_show_rounds() -> bool {
    true
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
            evidence_budget_chars: default_evidence_budget(),
            show_rounds: default_show_rounds(),
        }
    }
}

/// Full configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub research: ResearchConfig,
}

impl Config {
    /// Load config from the first file found, or return defaults.
    ///
    /// Order: explicit path, `$SLEUTH_CONFIG`, user config dir, system path.
    /// An explicit path that fails to load is an error; the others fall
    /// through silently.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        for path in Self::candidate_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring unreadable config {}: {:#}", path.display(), e),
            }
        }

        warn!("Config not found, using defaults");
        Ok(Config::default())
    }

    /// Candidate config locations, highest priority first
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(path));
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sleuth").join("config.toml"));
        }
        paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));
        paths
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Render effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialise config")
    }

    /// Write default config to path (for first-time setup)
    pub fn save_default(path: &Path) -> Result<()> {
        let content = Config::default().to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved default config to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.backend, LlmBackend::Ollama);
        assert_eq!(config.llm.endpoint, "http://127.0.0.1:11434");
        assert_eq!(config.sampling.max_tokens, 1024);
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.fetch.max_content_chars, 2400);
        assert!(config.fetch.respect_robots);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_str = r#"
[llm]
backend = "llama_server"
endpoint = "http://localhost:8080"

[sampling]
temperature = 0.2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::LlamaServer);
        assert_eq!(config.llm.endpoint, "http://localhost:8080");
        assert!((config.sampling.temperature - 0.2).abs() < f32::EPSILON);
        // Defaults for missing fields
        assert_eq!(config.llm.model, "qwen2.5:7b-instruct");
        assert_eq!(config.sampling.top_k, 40);
        assert_eq!(config.research.evidence_budget_chars, 8000);
    }

    #[test]
    fn test_max_results_clamped() {
        let mut search = SearchConfig::default();
        search.max_results = 50;
        assert_eq!(search.effective_max_results(), 10);
        search.max_results = 0;
        assert_eq!(search.effective_max_results(), 1);
    }

    #[test]
    fn test_save_and_load_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::save_default(&path).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.llm.model, Config::default().llm.model);
        assert_eq!(loaded.fetch.max_retries, 3);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nmodel = ").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }
}
