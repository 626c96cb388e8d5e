//! Bootstrap configuration loading and config file resolution
//!
//! Configuration is read once at startup. Sources, highest priority first:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`CDET_CONFIG`)
//! 3. Platform config file (`~/.config/cdet/config.toml`, then `/etc/cdet/config.toml` on Linux)
//! 4. Compiled defaults
//!
//! A missing config file is never fatal: a warning is logged and compiled
//! defaults are used. A config file that exists but cannot be parsed is an error.
//!
//! Individual stage settings can be overridden afterwards with environment
//! variables, see [`TomlConfig::apply_env_overrides`].

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CDET_CONFIG";

/// Environment variable overriding the program used to run both stages
pub const PYTHON_ENV_VAR: &str = "CDET_PYTHON";

/// Environment variable overriding the embedding wrapper script
pub const EMBEDDING_SCRIPT_ENV_VAR: &str = "CDET_EMBEDDING_SCRIPT";

/// Environment variable overriding the search wrapper script
pub const SEARCH_SCRIPT_ENV_VAR: &str = "CDET_SEARCH_SCRIPT";

/// Environment variable overriding the similarity index location
pub const INDEX_PATH_ENV_VAR: &str = "CDET_INDEX_PATH";

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; omitted sections and fields fall back to
/// compiled defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Embedding extraction stage
    #[serde(default)]
    pub embedding: EmbeddingSection,

    /// Similarity search stage
    #[serde(default)]
    pub search: SearchSection,

    /// Defaults applied when a request does not override them
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Retry policy for failed subprocess invocations
    #[serde(default)]
    pub retry: RetrySection,
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Values read from this file
    File(PathBuf),
    /// File was named but does not exist; compiled defaults used
    Missing(PathBuf),
    /// No file was named or found; compiled defaults used
    Defaults,
}

impl ConfigSource {
    /// Log the source at the appropriate level
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Configuration loaded from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigSource::Defaults => warn!("No config file found, using compiled defaults"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// `[embedding]` section
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSection {
    /// Program to execute (interpreter or standalone binary)
    #[serde(default = "default_program")]
    pub program: String,

    /// Wrapper script passed as the first argument (empty string for standalone binaries)
    #[serde(default = "default_embedding_script")]
    pub script: Option<PathBuf>,

    /// Per-invocation timeout
    #[serde(default = "default_embedding_timeout")]
    pub timeout_seconds: u64,

    /// Accepted model identifiers; empty accepts any model
    #[serde(default = "default_supported_models")]
    pub supported_models: Vec<String>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: default_embedding_script(),
            timeout_seconds: default_embedding_timeout(),
            supported_models: default_supported_models(),
        }
    }
}

/// `[search]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    /// Program to execute (interpreter or standalone binary)
    #[serde(default = "default_program")]
    pub program: String,

    /// Wrapper script passed as the first argument (empty string for standalone binaries)
    #[serde(default = "default_search_script")]
    pub script: Option<PathBuf>,

    /// Location of the similarity index (read-only)
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Per-invocation timeout
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// Upper bound for the requested number of matches
    #[serde(default = "default_max_result_limit")]
    pub max_result_limit: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            script: default_search_script(),
            index_path: default_index_path(),
            timeout_seconds: default_search_timeout(),
            max_result_limit: default_max_result_limit(),
        }
    }
}

/// `[defaults]` section
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    /// Embedding model used when the request names none
    #[serde(default = "default_model")]
    pub model: String,

    /// Number of matches requested when the request names none
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Similarity threshold used when the request names none
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            model: default_model(),
            result_limit: default_result_limit(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// `[retry]` section
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Total attempts per invocation (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff cap
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_program() -> String {
    "python3".to_string()
}

fn default_embedding_script() -> Option<PathBuf> {
    Some(PathBuf::from("python/embedding_wrapper.py"))
}

fn default_search_script() -> Option<PathBuf> {
    Some(PathBuf::from("python/search_wrapper.py"))
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/index.faiss")
}

fn default_embedding_timeout() -> u64 {
    300
}

fn default_search_timeout() -> u64 {
    120
}

fn default_supported_models() -> Vec<String> {
    ["spectrogram", "openl3", "audioclip"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_max_result_limit() -> usize {
    100
}

fn default_model() -> String {
    "spectrogram".to_string()
}

fn default_result_limit() -> usize {
    10
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    2000
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from an existing file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration, degrading to compiled defaults when no file is available
    ///
    /// `path` is the already-resolved config file location (see [`resolve_config_path`]).
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        Self::load_with_source(path).map(|(config, _)| config)
    }

    /// Like [`TomlConfig::load_or_default`], also reporting where the values came from
    ///
    /// Nothing is logged here: callers usually load the file before the
    /// tracing subscriber exists, so they log the returned [`ConfigSource`].
    pub fn load_with_source(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        match path {
            Some(path) if path.exists() => {
                let config = Self::load(path)?;
                Ok((config, ConfigSource::File(path.to_path_buf())))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path.to_path_buf()))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(program) = env_value(PYTHON_ENV_VAR) {
            info!("Stage program overridden by {}", PYTHON_ENV_VAR);
            self.embedding.program = program.clone();
            self.search.program = program;
        }

        if let Some(script) = env_value(EMBEDDING_SCRIPT_ENV_VAR) {
            info!("Embedding script overridden by {}", EMBEDDING_SCRIPT_ENV_VAR);
            self.embedding.script = Some(PathBuf::from(script));
        }

        if let Some(script) = env_value(SEARCH_SCRIPT_ENV_VAR) {
            info!("Search script overridden by {}", SEARCH_SCRIPT_ENV_VAR);
            self.search.script = Some(PathBuf::from(script));
        }

        if let Some(index) = env_value(INDEX_PATH_ENV_VAR) {
            info!("Index path overridden by {}", INDEX_PATH_ENV_VAR);
            self.search.index_path = PathBuf::from(index);
        }
    }
}

/// Resolve the config file location
///
/// **Priority:** CLI argument → `CDET_CONFIG` → platform config file.
/// Returns `None` when no source names a file and no platform file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = env_value(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: Platform config file
    platform_config_file()
}

/// Get the first existing platform config file
fn platform_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("cdet").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cdet/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
