//! Analysis requests

use crate::config::AnalysisDefaults;
use crate::error::StageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Caller-supplied analysis parameters
///
/// Only `audio_reference` is required. Every other field is an override of the
/// configured [`AnalysisDefaults`]; `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Path (or opaque handle) understood by the embedding program
    pub audio_reference: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub result_limit: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    #[serde(default)]
    pub index_path: Option<PathBuf>,
}

impl AnalysisRequest {
    pub fn new(audio_reference: impl Into<String>) -> Self {
        Self {
            audio_reference: audio_reference.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_result_limit(mut self, result_limit: usize) -> Self {
        self.result_limit = Some(result_limit);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn with_index_path(mut self, index_path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(index_path.into());
        self
    }

    /// Model the request will run with once defaults are applied
    pub fn effective_model(&self, defaults: &AnalysisDefaults) -> String {
        self.model_id
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&defaults.model_id)
            .to_string()
    }

    /// Apply defaults and validate the parameters
    ///
    /// # Errors
    /// `StageError::Validation` for an empty audio reference, a zero result
    /// limit, or a threshold that is not a finite value in [0, 1].
    pub fn resolve(
        &self,
        defaults: &AnalysisDefaults,
        default_index: &Path,
    ) -> Result<ResolvedRequest, StageError> {
        let audio_reference = self.audio_reference.trim();
        if audio_reference.is_empty() {
            return Err(StageError::Validation(
                "audio reference must not be empty".to_string(),
            ));
        }

        let result_limit = self.result_limit.unwrap_or(defaults.result_limit);
        if result_limit == 0 {
            return Err(StageError::Validation(
                "result limit must be greater than 0".to_string(),
            ));
        }

        let similarity_threshold = self
            .similarity_threshold
            .unwrap_or(defaults.similarity_threshold);
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(StageError::Validation(format!(
                "similarity threshold must be between 0.0 and 1.0, got {}",
                similarity_threshold
            )));
        }

        Ok(ResolvedRequest {
            audio_reference: audio_reference.to_string(),
            model_id: self.effective_model(defaults),
            result_limit,
            similarity_threshold,
            index_path: self
                .index_path
                .clone()
                .unwrap_or_else(|| default_index.to_path_buf()),
        })
    }
}

/// Request with every default applied and validated
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub audio_reference: String,
    pub model_id: String,
    pub result_limit: usize,
    pub similarity_threshold: f64,
    pub index_path: PathBuf,
}
