//! Embedding extraction stage
//!
//! Invokes the embedding program as `[script, audio_reference, model_id]` and
//! turns its JSON output into an [`EmbeddingRecord`]. Never fails: launch
//! errors, non-zero exits, timeouts and malformed output all become failure
//! records.

use crate::config::StageCommand;
use crate::error::StageError;
use crate::models::{EmbeddingOutput, EmbeddingRecord};
use crate::services::process_runner::ProcessRunner;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces the embedding of one audio reference
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    /// Extract the embedding; failures are reported in the record, never raised
    async fn extract(&self, audio_reference: &str, model_id: &str) -> EmbeddingRecord;
}

/// [`EmbeddingExtractor`] that delegates to an external program
pub struct EmbeddingStage {
    command: StageCommand,
    supported_models: Vec<String>,
    runner: Arc<dyn ProcessRunner>,
}

impl EmbeddingStage {
    /// Create stage accepting any model identifier
    pub fn new(command: StageCommand, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            command,
            supported_models: Vec::new(),
            runner,
        }
    }

    /// Restrict accepted model identifiers (empty list accepts any)
    pub fn with_supported_models(mut self, models: Vec<String>) -> Self {
        self.supported_models = models;
        self
    }

    async fn try_extract(
        &self,
        audio_reference: &str,
        model_id: &str,
    ) -> Result<EmbeddingRecord, StageError> {
        if audio_reference.trim().is_empty() {
            return Err(StageError::Validation(
                "audio reference must not be empty".to_string(),
            ));
        }

        if !self.supported_models.is_empty()
            && !self.supported_models.iter().any(|m| m == model_id)
        {
            return Err(StageError::Validation(format!(
                "Invalid model name: {}. Valid options: {}",
                model_id,
                self.supported_models.join(", ")
            )));
        }

        let args = self
            .command
            .arguments([audio_reference.to_string(), model_id.to_string()]);

        let stdout = self.runner.run(&self.command.program, &args).await?;

        EmbeddingOutput::parse(&stdout)?.into_record(model_id)
    }
}

#[async_trait]
impl EmbeddingExtractor for EmbeddingStage {
    async fn extract(&self, audio_reference: &str, model_id: &str) -> EmbeddingRecord {
        debug!(audio = audio_reference, model = model_id, "Extracting embedding");

        match self.try_extract(audio_reference, model_id).await {
            Ok(record) => {
                info!(
                    audio = audio_reference,
                    model = %record.model_id,
                    dimensions = record.vector.len(),
                    duration_s = record.source_duration_seconds,
                    "Embedding extracted"
                );
                record
            }
            Err(err) => {
                warn!(
                    audio = audio_reference,
                    model = model_id,
                    kind = ?err.kind(),
                    error = %err,
                    "Embedding extraction failed"
                );
                EmbeddingRecord::from_error(model_id, &err)
            }
        }
    }
}
