//! Runtime configuration for cdet-analysis
//!
//! Converts the bootstrap [`TomlConfig`] into the validated, read-only
//! configuration handed to the orchestrator at construction time. Requests
//! only carry overrides; everything else comes from here.

use crate::utils::retry::RetryPolicy;
use cdet_common::config::TomlConfig;
use cdet_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// How one external stage is launched
#[derive(Debug, Clone, PartialEq)]
pub struct StageCommand {
    /// Program to execute (interpreter or standalone binary)
    pub program: PathBuf,
    /// Script passed as the first argument, if the program is an interpreter
    pub script: Option<PathBuf>,
    /// Kill the process after this long
    pub timeout: Duration,
}

impl StageCommand {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            script: None,
            timeout,
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Full argument list: `[script, stage arguments...]`
    pub fn arguments(&self, stage_args: impl IntoIterator<Item = String>) -> Vec<String> {
        self.script
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .chain(stage_args)
            .collect()
    }
}

/// Defaults applied to requests that do not override them
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisDefaults {
    pub model_id: String,
    pub result_limit: usize,
    pub similarity_threshold: f64,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            model_id: "spectrogram".to_string(),
            result_limit: 10,
            similarity_threshold: 0.8,
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub embedding: StageCommand,
    /// Accepted model identifiers; empty accepts any
    pub supported_models: Vec<String>,
    pub search: StageCommand,
    pub index_path: PathBuf,
    pub max_result_limit: usize,
    pub defaults: AnalysisDefaults,
    pub retry: RetryPolicy,
}

impl AnalysisConfig {
    /// Build from the bootstrap file
    ///
    /// # Errors
    /// `Error::Config` when a value is out of range (see [`AnalysisConfig::validate`]).
    pub fn from_toml(toml: &TomlConfig) -> Result<Self> {
        let embedding = stage_command(
            &toml.embedding.program,
            toml.embedding.script.as_ref(),
            toml.embedding.timeout_seconds,
        );
        let search = stage_command(
            &toml.search.program,
            toml.search.script.as_ref(),
            toml.search.timeout_seconds,
        );

        let config = Self {
            embedding,
            supported_models: toml
                .embedding
                .supported_models
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            search,
            index_path: toml.search.index_path.clone(),
            max_result_limit: toml.search.max_result_limit,
            defaults: AnalysisDefaults {
                model_id: toml.defaults.model.trim().to_string(),
                result_limit: toml.defaults.result_limit,
                similarity_threshold: toml.defaults.similarity_threshold,
            },
            retry: RetryPolicy {
                max_attempts: toml.retry.max_attempts,
                initial_backoff: Duration::from_millis(toml.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(toml.retry.max_backoff_ms),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.embedding.program.as_os_str().is_empty() {
            return Err(Error::Config("embedding.program must not be empty".to_string()));
        }
        if self.search.program.as_os_str().is_empty() {
            return Err(Error::Config("search.program must not be empty".to_string()));
        }
        if self.embedding.timeout.is_zero() || self.search.timeout.is_zero() {
            return Err(Error::Config("timeout_seconds must be greater than 0".to_string()));
        }
        if self.max_result_limit == 0 {
            return Err(Error::Config(
                "search.max_result_limit must be greater than 0".to_string(),
            ));
        }
        if self.defaults.result_limit == 0 || self.defaults.result_limit > self.max_result_limit {
            return Err(Error::Config(format!(
                "defaults.result_limit must be between 1 and {}, got {}",
                self.max_result_limit, self.defaults.result_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.defaults.similarity_threshold) {
            return Err(Error::Config(format!(
                "defaults.similarity_threshold must be between 0.0 and 1.0, got {}",
                self.defaults.similarity_threshold
            )));
        }
        if self.defaults.model_id.is_empty() {
            return Err(Error::Config("defaults.model must not be empty".to_string()));
        }
        if !self.supported_models.is_empty()
            && !self.supported_models.contains(&self.defaults.model_id)
        {
            return Err(Error::Config(format!(
                "defaults.model '{}' is not in embedding.supported_models",
                self.defaults.model_id
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn stage_command(program: &str, script: Option<&PathBuf>, timeout_seconds: u64) -> StageCommand {
    let command = StageCommand::new(program.trim(), Duration::from_secs(timeout_seconds));
    match script {
        Some(script) if !script.as_os_str().is_empty() => command.with_script(script),
        _ => command,
    }
}
