//! Analysis orchestrator
//!
//! Runs the copyright analysis pipeline for one request:
//!
//! REQUEST VALIDATION → EMBEDDING → SEARCH → RISK
//!
//! Each step gates the next. A failure returns immediately with a well-formed
//! [`AnalysisReport`]; later steps never run and risk is never computed from
//! partial data. `elapsed_ms` on the search result covers the whole pipeline.
//!
//! The orchestrator holds only read-only configuration, so one instance can
//! serve concurrent requests.

use crate::config::{AnalysisConfig, AnalysisDefaults};
use crate::error::{FailureKind, Stage};
use crate::models::{AnalysisReport, AnalysisRequest, EmbeddingRecord, SearchResult};
use crate::services::embedding_stage::{EmbeddingExtractor, EmbeddingStage};
use crate::services::process_runner::{ProcessRunner, SubprocessRunner};
use crate::services::risk_engine;
use crate::services::search_stage::{SearchStage, SimilaritySearcher};
use crate::utils::duration_ms;
use crate::utils::retry::{RetryPolicy, RetryingRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Prefix of the search stub returned when embedding extraction fails
pub const EMBEDDING_FAILURE_PREFIX: &str = "embedding extraction failed";

/// Prefix of the failures returned for rejected requests
pub const INVALID_REQUEST_PREFIX: &str = "invalid analysis request";

/// Pipeline coordinator
pub struct AnalysisOrchestrator {
    embedding: Arc<dyn EmbeddingExtractor>,
    search: Arc<dyn SimilaritySearcher>,
    defaults: AnalysisDefaults,
    index_path: PathBuf,
}

impl AnalysisOrchestrator {
    /// Create orchestrator from explicit stages
    ///
    /// # Arguments
    /// * `embedding` - Embedding extraction stage
    /// * `search` - Similarity search stage
    /// * `defaults` - Values used when a request does not override them
    /// * `index_path` - Index searched when a request does not override it
    pub fn new(
        embedding: Arc<dyn EmbeddingExtractor>,
        search: Arc<dyn SimilaritySearcher>,
        defaults: AnalysisDefaults,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedding,
            search,
            defaults,
            index_path: index_path.into(),
        }
    }

    /// Create orchestrator backed by the configured external programs
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let embedding_runner = stage_runner(config.embedding.timeout, &config.retry);
        let search_runner = stage_runner(config.search.timeout, &config.retry);

        let embedding = EmbeddingStage::new(config.embedding.clone(), embedding_runner)
            .with_supported_models(config.supported_models.clone());
        let search = SearchStage::new(config.search.clone(), search_runner)
            .with_max_result_limit(config.max_result_limit);

        info!(
            embedding_program = %config.embedding.program.display(),
            search_program = %config.search.program.display(),
            index = %config.index_path.display(),
            retry_attempts = config.retry.max_attempts,
            "Analysis orchestrator initialized"
        );

        Self::new(
            Arc::new(embedding),
            Arc::new(search),
            config.defaults.clone(),
            config.index_path.clone(),
        )
    }

    /// Defaults applied to requests
    pub fn defaults(&self) -> &AnalysisDefaults {
        &self.defaults
    }

    /// Run the full pipeline for one request
    ///
    /// Always returns a report; inspect `success` on both records.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisReport {
        let analysis_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", %analysis_id);
        self.run_pipeline(request).instrument(span).await
    }

    /// Run only the embedding stage
    pub async fn extract_only(&self, audio_reference: &str, model_id: Option<&str>) -> EmbeddingRecord {
        let mut request = AnalysisRequest::new(audio_reference);
        request.model_id = model_id.map(str::to_string);
        let model_id = request.effective_model(&self.defaults);

        let analysis_id = Uuid::new_v4();
        let span = tracing::info_span!("extraction", %analysis_id);
        self.embedding
            .extract(audio_reference.trim(), &model_id)
            .instrument(span)
            .await
    }

    async fn run_pipeline(&self, request: AnalysisRequest) -> AnalysisReport {
        let start_time = Instant::now();

        // Phase 0: Resolve overrides against defaults
        let resolved = match request.resolve(&self.defaults, &self.index_path) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(error = %err, "Analysis request rejected");
                let message = format!("{}: {}", INVALID_REQUEST_PREFIX, err);
                let mut search_result =
                    SearchResult::failure(Stage::Request, err.kind(), message.clone());
                search_result.elapsed_ms = elapsed_ms(start_time);
                return AnalysisReport {
                    embedding_record: EmbeddingRecord::failure(
                        request.effective_model(&self.defaults),
                        err.kind(),
                        message,
                    ),
                    search_result,
                };
            }
        };

        info!(
            audio = %resolved.audio_reference,
            model = %resolved.model_id,
            result_limit = resolved.result_limit,
            threshold = resolved.similarity_threshold,
            "Starting analysis"
        );

        // Phase 1: EMBEDDING
        let embedding_record = self
            .embedding
            .extract(&resolved.audio_reference, &resolved.model_id)
            .await;

        if !embedding_record.success {
            let detail = embedding_record
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            let mut search_result = SearchResult::failure(
                Stage::Embedding,
                embedding_record.error_kind.unwrap_or(FailureKind::Process),
                format!("{}: {}", EMBEDDING_FAILURE_PREFIX, detail),
            );
            search_result.elapsed_ms = elapsed_ms(start_time);

            warn!(
                elapsed_ms = search_result.elapsed_ms,
                error = %detail,
                "Analysis stopped: embedding extraction failed"
            );
            return AnalysisReport {
                embedding_record,
                search_result,
            };
        }

        // Phase 2: SEARCH
        let mut search_result = self
            .search
            .search(
                &embedding_record.vector,
                resolved.result_limit,
                &resolved.index_path,
            )
            .await;

        if !search_result.success {
            search_result.failed_stage.get_or_insert(Stage::Search);
            search_result.elapsed_ms = elapsed_ms(start_time);

            warn!(
                elapsed_ms = search_result.elapsed_ms,
                error = search_result.error.as_deref().unwrap_or_default(),
                "Analysis stopped: similarity search failed"
            );
            return AnalysisReport {
                embedding_record,
                search_result,
            };
        }

        // Phase 3: RISK
        let threshold = resolved.similarity_threshold;
        for candidate in &mut search_result.matches {
            candidate.per_match_risk = risk_engine::classify_match(candidate.similarity_score, threshold);
        }
        search_result.overall_risk = risk_engine::classify_risk(&search_result.matches, threshold);
        search_result.risk_score = risk_engine::score_risk(&search_result.matches);
        search_result.match_count = search_result.matches.len();
        search_result.elapsed_ms = elapsed_ms(start_time);

        info!(
            match_count = search_result.match_count,
            risk = %search_result.overall_risk,
            risk_score = search_result.risk_score,
            elapsed_ms = search_result.elapsed_ms,
            "Analysis completed"
        );

        AnalysisReport {
            embedding_record,
            search_result,
        }
    }
}

fn stage_runner(timeout: Duration, retry: &RetryPolicy) -> Arc<dyn ProcessRunner> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(SubprocessRunner::with_timeout(timeout));
    if retry.is_enabled() {
        Arc::new(RetryingRunner::new(runner, retry.clone()))
    } else {
        runner
    }
}

fn elapsed_ms(start_time: Instant) -> u64 {
    duration_ms(start_time.elapsed())
}
