//! Embedding extraction records

use crate::error::{FailureKind, StageError};
use serde::{Deserialize, Serialize};

/// Result of one embedding extraction
///
/// Invariant: `success == false` ⇒ `vector` and `shape` are empty and `error`
/// is non-empty; `success == true` ⇒ `error` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub success: bool,
    /// Embedding values, flattened row-major
    pub vector: Vec<f64>,
    /// Dimensions reported by the extractor
    pub shape: Vec<usize>,
    pub model_id: String,
    pub source_duration_seconds: f64,
    pub sample_rate_hz: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl EmbeddingRecord {
    /// Build a failure record
    ///
    /// An empty message is replaced so the failure invariant always holds.
    pub fn failure(model_id: impl Into<String>, kind: FailureKind, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "embedding extraction failed without diagnostic".to_string();
        }

        Self {
            success: false,
            vector: Vec::new(),
            shape: Vec::new(),
            model_id: model_id.into(),
            source_duration_seconds: 0.0,
            sample_rate_hz: 0,
            error: Some(error),
            error_kind: Some(kind),
        }
    }

    /// Recover a stage error into a failure record
    pub fn from_error(model_id: impl Into<String>, err: &StageError) -> Self {
        Self::failure(model_id, err.kind(), err.to_string())
    }
}

/// JSON object printed by the embedding program
///
/// Field names follow the wrapper scripts: `embeddings`, `shape`, `model`,
/// `duration`, `sample_rate` (or `sampleRate`), `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingOutput {
    #[serde(default)]
    pub success: bool,
    /// Flat or nested numeric array
    #[serde(default)]
    pub embeddings: serde_json::Value,
    #[serde(default)]
    pub shape: Vec<usize>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, alias = "sampleRate")]
    pub sample_rate: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EmbeddingOutput {
    /// Parse the raw stdout of the embedding program
    pub fn parse(raw: &str) -> Result<Self, StageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StageError::OutputParse(
                "embedding process produced no output".to_string(),
            ));
        }

        serde_json::from_str(raw).map_err(|e| {
            StageError::OutputParse(format!("failed to parse embedding output: {}", e))
        })
    }

    /// Convert into a successful record, or the failure the payload reports
    ///
    /// `requested_model` is used when the payload does not echo its model.
    pub fn into_record(self, requested_model: &str) -> Result<EmbeddingRecord, StageError> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "embedding stage reported failure".to_string());
            return Err(StageError::Reported(message));
        }

        let mut vector = Vec::new();
        flatten_into(&self.embeddings, &mut vector)?;

        let shape = if self.shape.is_empty() && !vector.is_empty() {
            vec![vector.len()]
        } else {
            self.shape
        };

        if !shape.is_empty() {
            let expected = shape
                .iter()
                .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
                .ok_or_else(|| {
                    StageError::OutputParse(format!("embedding shape {:?} overflows", shape))
                })?;
            if expected != vector.len() {
                return Err(StageError::OutputParse(format!(
                    "embedding shape {:?} does not match {} values",
                    shape,
                    vector.len()
                )));
            }
        }

        let model_id = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| requested_model.to_string());

        Ok(EmbeddingRecord {
            success: true,
            vector,
            shape,
            model_id,
            source_duration_seconds: self.duration.filter(|d| d.is_finite()).unwrap_or(0.0).max(0.0),
            sample_rate_hz: self
                .sample_rate
                .filter(|r| r.is_finite() && *r >= 0.0)
                .map(|r| r.round() as u32)
                .unwrap_or(0),
            error: None,
            error_kind: None,
        })
    }
}

/// Flatten a (possibly nested) JSON numeric array in row-major order
fn flatten_into(value: &serde_json::Value, out: &mut Vec<f64>) -> Result<(), StageError> {
    match value {
        serde_json::Value::Null => Ok(()),
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Number(n) => {
                        let v = n.as_f64().ok_or_else(|| {
                            StageError::OutputParse(format!("embedding value {} is not a float", n))
                        })?;
                        out.push(v);
                    }
                    serde_json::Value::Array(_) => flatten_into(item, out)?,
                    other => {
                        return Err(StageError::OutputParse(format!(
                            "embedding contains non-numeric value: {}",
                            other
                        )))
                    }
                }
            }
            Ok(())
        }
        other => Err(StageError::OutputParse(format!(
            "embeddings must be an array, got: {}",
            other
        ))),
    }
}
