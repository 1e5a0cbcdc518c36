//! Bootstrap configuration loading and resolution
//!
//! Configuration file path priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VRI_CONFIG`)
//! 3. OS-dependent default (`<config dir>/vri/vri-ai.toml`)
//!
//! A missing configuration file is not fatal: a warning is logged and the
//! compiled defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "VRI_CONFIG";

/// Environment variable holding the model-service bearer token
pub const API_TOKEN_ENV_VAR: &str = "VRI_API_TOKEN";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Model service endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Model service endpoints and client limits
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Sentiment classification endpoint
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,

    /// Zero-shot scoring endpoint
    #[serde(default = "default_zero_shot_url")]
    pub zero_shot_url: String,

    /// Chat-completions endpoint of the generative service
    #[serde(default = "default_completion_url")]
    pub completion_url: String,

    /// Model name sent to the generative service
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Generative service quota (requests per second)
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Bearer token for the model services (overridden by `VRI_API_TOKEN`)
    #[serde(default)]
    pub api_token: Option<String>,
}

/// Pipeline tuning parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Target size of the induced category vocabulary
    #[serde(default = "default_label_count")]
    pub label_count: usize,

    /// Number of reviews sampled for label induction
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Seed for the label induction sample
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,

    /// Reviews per intermediate summary batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent model-service calls per stage
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Sampling temperature for label induction
    #[serde(default = "default_label_temperature")]
    pub label_temperature: f32,

    /// Sampling temperature for summaries
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    /// Zero-shot hypothesis template, `{}` is replaced by the candidate label
    #[serde(default = "default_hypothesis_template")]
    pub hypothesis_template: String,

    /// Cluster labels shown per review in summary prompts (all when unset)
    #[serde(default)]
    pub labels_per_review: Option<usize>,

    /// Whole-run time budget in seconds (unbounded when unset)
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,
}

fn default_database_path() -> PathBuf {
    get_default_data_folder().join("vri.db")
}

fn default_port() -> u16 {
    5730
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_classifier_url() -> String {
    "http://127.0.0.1:8080/classify".to_string()
}

fn default_zero_shot_url() -> String {
    "http://127.0.0.1:8080/zero-shot".to_string()
}

fn default_completion_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_label_count() -> usize {
    10
}

fn default_sample_size() -> usize {
    100
}

fn default_sample_seed() -> u64 {
    42
}

fn default_batch_size() -> usize {
    10
}

fn default_max_concurrency() -> usize {
    4
}

fn default_label_temperature() -> f32 {
    0.2
}

fn default_summary_temperature() -> f32 {
    0.3
}

fn default_hypothesis_template() -> String {
    "Cet avis concerne {}.".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            classifier_url: default_classifier_url(),
            zero_shot_url: default_zero_shot_url(),
            completion_url: default_completion_url(),
            completion_model: default_completion_model(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_second: default_requests_per_second(),
            api_token: None,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            label_count: default_label_count(),
            sample_size: default_sample_size(),
            sample_seed: default_sample_seed(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            label_temperature: default_label_temperature(),
            summary_temperature: default_summary_temperature(),
            hypothesis_template: default_hypothesis_template(),
            labels_per_review: None,
            run_timeout_secs: None,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            logging: LoggingConfig::default(),
            services: ServicesConfig::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl TomlConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;

        if p.label_count == 0 {
            return Err(Error::Config("pipeline.label_count must be at least 1".to_string()));
        }
        if p.sample_size == 0 {
            return Err(Error::Config("pipeline.sample_size must be at least 1".to_string()));
        }
        if p.batch_size == 0 {
            return Err(Error::Config("pipeline.batch_size must be at least 1".to_string()));
        }
        if p.max_concurrency == 0 {
            return Err(Error::Config(
                "pipeline.max_concurrency must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("label_temperature", p.label_temperature),
            ("summary_temperature", p.summary_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(Error::Config(format!(
                    "pipeline.{} must be within [0, 2], got {}",
                    name, value
                )));
            }
        }
        if !p.hypothesis_template.contains("{}") {
            return Err(Error::Config(
                "pipeline.hypothesis_template must contain a {} placeholder".to_string(),
            ));
        }
        if p.labels_per_review == Some(0) {
            return Err(Error::Config(
                "pipeline.labels_per_review must be at least 1 when set".to_string(),
            ));
        }
        if self.services.requests_per_second == 0 {
            return Err(Error::Config(
                "services.requests_per_second must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Resolve the configuration file path
///
/// Priority: CLI argument → `VRI_CONFIG` → OS default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    get_default_config_path()
}

/// Load and validate the TOML configuration
///
/// A missing file yields the compiled defaults; an unreadable or malformed
/// file is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        info!("Configuration loaded from {}", path.display());
        config
    } else {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        TomlConfig::default()
    };

    config.validate()?;
    Ok(config)
}

/// Resolve the model-service bearer token
///
/// **Priority:** ENV → TOML. Blank values are ignored.
pub fn resolve_api_token(services: &ServicesConfig) -> Option<String> {
    let env_token = std::env::var(API_TOKEN_ENV_VAR)
        .ok()
        .filter(|t| is_valid_token(t));
    let toml_token = services.api_token.clone().filter(|t| is_valid_token(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!(
            "API token found in both environment and TOML. Using environment (highest priority)."
        );
    }

    if let Some(token) = env_token {
        info!("API token loaded from environment variable");
        return Some(token);
    }

    if let Some(token) = toml_token {
        info!("API token loaded from TOML config");
        return Some(token);
    }

    None
}

/// Validate token (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Get default configuration file path for the platform
fn get_default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("vri").join("vri-ai.toml"))
        .unwrap_or_else(|| PathBuf::from("./vri-ai.toml"))
}

/// Get OS-dependent default data folder
fn get_default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/vri (or /var/lib/vri for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("vri"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vri"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("vri"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/vri"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("vri"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\vri"))
    } else {
        PathBuf::from("./vri_data")
    }
}
