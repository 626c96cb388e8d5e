//! Similarity search stage
//!
//! Invokes the search program as `[script, vector_json, index_path, result_limit]`
//! and turns its JSON output into a [`SearchResult`]. Matches keep the rank
//! order the program returned. Risk fields are left at their defaults; the
//! orchestrator fills them in a separate pass.

use crate::config::StageCommand;
use crate::error::{Stage, StageError};
use crate::models::{SearchOutput, SearchResult};
use crate::services::process_runner::ProcessRunner;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message for the empty-vector precondition
pub const EMPTY_VECTOR_ERROR: &str = "empty embedding vector";

/// Prefix of every failure that happened after the search program was invoked
pub const SEARCH_FAILURE_PREFIX: &str = "similarity search failed";

/// Finds catalog tracks similar to an embedding
#[async_trait]
pub trait SimilaritySearcher: Send + Sync {
    /// Search the index; failures are reported in the result, never raised
    async fn search(&self, vector: &[f64], result_limit: usize, index_path: &Path)
        -> SearchResult;
}

/// [`SimilaritySearcher`] that delegates to an external program
pub struct SearchStage {
    command: StageCommand,
    max_result_limit: usize,
    runner: Arc<dyn ProcessRunner>,
}

impl SearchStage {
    /// Create stage allowing up to 100 matches per search
    pub fn new(command: StageCommand, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            command,
            max_result_limit: 100,
            runner,
        }
    }

    /// Set the largest accepted result limit
    pub fn with_max_result_limit(mut self, max_result_limit: usize) -> Self {
        self.max_result_limit = max_result_limit;
        self
    }

    /// Local preconditions, checked before any process is spawned
    fn validate(&self, vector: &[f64], result_limit: usize) -> Result<(), StageError> {
        if vector.is_empty() {
            return Err(StageError::Validation(EMPTY_VECTOR_ERROR.to_string()));
        }
        if result_limit == 0 || result_limit > self.max_result_limit {
            return Err(StageError::Validation(format!(
                "result limit must be between 1 and {}, got {}",
                self.max_result_limit, result_limit
            )));
        }
        if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
            return Err(StageError::Validation(format!(
                "embedding vector contains a non-finite value at index {}",
                position
            )));
        }
        Ok(())
    }

    async fn run_search(
        &self,
        vector: &[f64],
        result_limit: usize,
        index_path: &Path,
    ) -> Result<SearchResult, StageError> {
        let serialized = serde_json::to_string(vector)
            .map_err(|e| StageError::Validation(format!("cannot serialize vector: {}", e)))?;

        let args = self.command.arguments([
            serialized,
            index_path.to_string_lossy().into_owned(),
            result_limit.to_string(),
        ]);

        let stdout = self.runner.run(&self.command.program, &args).await?;

        SearchOutput::parse(&stdout)?.into_result()
    }
}

#[async_trait]
impl SimilaritySearcher for SearchStage {
    async fn search(
        &self,
        vector: &[f64],
        result_limit: usize,
        index_path: &Path,
    ) -> SearchResult {
        if let Err(err) = self.validate(vector, result_limit) {
            warn!(error = %err, "Similarity search rejected");
            return SearchResult::failure(Stage::Search, err.kind(), err.to_string());
        }

        debug!(
            dimensions = vector.len(),
            result_limit,
            index = %index_path.display(),
            "Searching similar tracks"
        );

        match self.run_search(vector, result_limit, index_path).await {
            Ok(result) => {
                info!(
                    match_count = result.match_count,
                    index = %index_path.display(),
                    "Similarity search completed"
                );
                result
            }
            Err(err) => {
                warn!(
                    index = %index_path.display(),
                    kind = ?err.kind(),
                    error = %err,
                    "Similarity search failed"
                );
                SearchResult::failure(
                    Stage::Search,
                    err.kind(),
                    format!("{}: {}", SEARCH_FAILURE_PREFIX, err),
                )
            }
        }
    }
}
