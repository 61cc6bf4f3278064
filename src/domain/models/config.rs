//! Configuration model for hepcode.
//!
//! Plain serde structs with programmatic defaults; loading, merging, and
//! validation live in `infrastructure::config`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Session loop configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Sandboxed executor configuration.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Reasoning service configuration.
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Retry policy for reasoning transport errors.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Hint corpus configuration.
    #[serde(default)]
    pub hints: HintsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            executor: ExecutorConfig::default(),
            reasoning: ReasoningConfig::default(),
            retry: RetryConfig::default(),
            hints: HintsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Session loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Maximum testing iterations before the session is declared failed.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Number of trailing transcript turns replayed per reasoning call.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

const fn default_max_iterations() -> u32 {
    5
}

const fn default_context_window() -> usize {
    12
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            context_window: default_context_window(),
        }
    }
}

/// Sandboxed executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Interpreter binary used to run code units.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extra arguments passed before the staged script path.
    #[serde(default)]
    pub interpreter_args: Vec<String>,

    /// Wall-clock budget per run, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-stream capture cap in bytes; output beyond it is discarded.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_output_bytes() -> usize {
    64 * 1024
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: vec![],
            timeout_secs: default_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// Reasoning service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReasoningConfig {
    /// Base URL of the messages endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

const fn default_request_timeout_secs() -> u64 {
    300
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Retry policy configuration for reasoning transport errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum retry attempts for transient errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    2_000
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Hint corpus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HintsConfig {
    /// Directory of markdown hint files injected into generation prompts.
    #[serde(default = "default_hints_directory")]
    pub directory: PathBuf,

    /// Character budget for the combined corpus.
    #[serde(default = "default_hints_max_chars")]
    pub max_chars: usize,

    /// Whether to inject hints at all.
    #[serde(default = "default_hints_enabled")]
    pub enabled: bool,
}

fn default_hints_directory() -> PathBuf {
    PathBuf::from("hints")
}

const fn default_hints_max_chars() -> usize {
    20_000
}

const fn default_hints_enabled() -> bool {
    true
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            directory: default_hints_directory(),
            max_chars: default_hints_max_chars(),
            enabled: default_hints_enabled(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
