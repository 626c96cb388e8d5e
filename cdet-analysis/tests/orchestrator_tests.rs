//! Orchestrator pipeline tests using substitute stages

mod helpers;

use cdet_analysis::{
    AnalysisDefaults, AnalysisOrchestrator, AnalysisReport, AnalysisRequest, EmbeddingRecord,
    FailureKind, RiskLevel, SearchResult, Stage,
};
use helpers::{embedding_record, matches, CountingEmbedding, CountingSearch};
use std::sync::Arc;

fn build(
    embedding: EmbeddingRecord,
    search: SearchResult,
) -> (AnalysisOrchestrator, Arc<CountingEmbedding>, Arc<CountingSearch>) {
    let embedding = Arc::new(CountingEmbedding::new(embedding));
    let search = Arc::new(CountingSearch::new(search));
    let orchestrator = AnalysisOrchestrator::new(
        embedding.clone(),
        search.clone(),
        AnalysisDefaults::default(),
        "/data/index.faiss",
    );
    (orchestrator, embedding, search)
}

fn without_timing(mut report: AnalysisReport) -> AnalysisReport {
    report.search_result.elapsed_ms = 0;
    report
}

#[tokio::test]
async fn test_successful_pipeline_populates_risk() {
    let (orchestrator, embedding, search) = build(
        embedding_record(),
        SearchResult::from_matches(matches(&[0.9, 0.8, 0.7, 0.6])),
    );

    let report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav"))
        .await;

    assert!(report.is_success());
    assert_eq!(embedding.calls(), 1);
    assert_eq!(search.calls(), 1);

    let result = &report.search_result;
    assert_eq!(result.overall_risk, RiskLevel::High);
    assert_eq!(result.risk_score, 0.87);
    assert_eq!(result.match_count, 4);
    assert!(result.error.is_none());
    assert!(result.failed_stage.is_none());
    assert_eq!(result.matches[0].per_match_risk, RiskLevel::High);
    assert_eq!(result.matches[1].per_match_risk, RiskLevel::Medium);
    assert_eq!(result.matches[3].per_match_risk, RiskLevel::Low);
}

#[tokio::test]
async fn test_embedding_failure_skips_search() {
    let failed = EmbeddingRecord::failure(
        "spectrogram",
        FailureKind::Process,
        "process exited with code 1: Audio file not found",
    );
    let (orchestrator, _, search) =
        build(failed, SearchResult::from_matches(matches(&[0.99])));

    let report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/missing.wav"))
        .await;

    assert_eq!(search.calls(), 0);
    assert!(!report.embedding_record.success);

    let result = &report.search_result;
    assert!(!result.success);
    assert!(result.matches.is_empty());
    assert_eq!(result.overall_risk, RiskLevel::Low);
    assert_eq!(result.risk_score, 0.0);
    assert_eq!(result.failed_stage, Some(Stage::Embedding));
    assert_eq!(result.error_kind, Some(FailureKind::Process));
    assert_eq!(
        result.error.as_deref(),
        Some("embedding extraction failed: process exited with code 1: Audio file not found")
    );
}

#[tokio::test]
async fn test_search_failure_leaves_risk_at_defaults() {
    let failed = SearchResult::failure(
        Stage::Search,
        FailureKind::Reported,
        "similarity search failed: Index file not found: /data/index.faiss",
    );
    let (orchestrator, _, search) = build(embedding_record(), failed);

    let report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav"))
        .await;

    assert_eq!(search.calls(), 1);
    assert!(report.embedding_record.success);

    let result = &report.search_result;
    assert!(!result.success);
    assert_eq!(result.overall_risk, RiskLevel::Low);
    assert_eq!(result.risk_score, 0.0);
    assert_eq!(result.match_count, 0);
    assert_eq!(
        result.error.as_deref(),
        Some("similarity search failed: Index file not found: /data/index.faiss")
    );
}

#[tokio::test]
async fn test_no_matches_is_low_risk_success() {
    let (orchestrator, _, _) = build(embedding_record(), SearchResult::from_matches(Vec::new()));

    let report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/original.wav"))
        .await;

    assert!(report.is_success());
    assert_eq!(report.search_result.overall_risk, RiskLevel::Low);
    assert_eq!(report.search_result.risk_score, 0.0);
}

#[tokio::test]
async fn test_identical_inputs_give_identical_reports() {
    let (orchestrator, _, _) = build(
        embedding_record(),
        SearchResult::from_matches(matches(&[0.96, 0.71, 0.52])),
    );

    let first = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav").with_similarity_threshold(0.7))
        .await;
    let second = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav").with_similarity_threshold(0.7))
        .await;

    assert_eq!(without_timing(first), without_timing(second));
}

#[tokio::test]
async fn test_request_threshold_overrides_default() {
    let (orchestrator, _, _) = build(
        embedding_record(),
        SearchResult::from_matches(matches(&[0.78, 0.72])),
    );

    // Default threshold 0.8: only the max counts, MEDIUM
    let default_report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav"))
        .await;
    assert_eq!(default_report.search_result.overall_risk, RiskLevel::Medium);

    // Threshold 0.7: two matches at/above threshold, HIGH
    let lowered = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav").with_similarity_threshold(0.7))
        .await;
    assert_eq!(lowered.search_result.overall_risk, RiskLevel::High);
}

#[tokio::test]
async fn test_invalid_request_rejected_before_stages() {
    let (orchestrator, embedding, search) =
        build(embedding_record(), SearchResult::from_matches(matches(&[0.9])));

    let report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav").with_result_limit(0))
        .await;

    assert_eq!(embedding.calls(), 0);
    assert_eq!(search.calls(), 0);
    assert!(!report.embedding_record.success);
    assert!(!report.search_result.success);
    assert_eq!(report.search_result.failed_stage, Some(Stage::Request));
    assert_eq!(report.search_result.error_kind, Some(FailureKind::Validation));
}

#[tokio::test]
async fn test_empty_audio_reference_rejected() {
    let (orchestrator, embedding, _) =
        build(embedding_record(), SearchResult::from_matches(Vec::new()));

    let report = orchestrator.analyze(AnalysisRequest::new("   ")).await;

    assert_eq!(embedding.calls(), 0);
    assert_eq!(report.search_result.failed_stage, Some(Stage::Request));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_orchestrator() {
    let (orchestrator, embedding, search) = build(
        embedding_record(),
        SearchResult::from_matches(matches(&[0.88, 0.5])),
    );
    let orchestrator = Arc::new(orchestrator);

    let mut handles = Vec::new();
    for i in 0..16 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .analyze(AnalysisRequest::new(format!("/uploads/track_{}.wav", i)))
                .await
        }));
    }

    for handle in handles {
        let report = handle.await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.search_result.overall_risk, RiskLevel::High);
    }

    assert_eq!(embedding.calls(), 16);
    assert_eq!(search.calls(), 16);
}

#[tokio::test]
async fn test_extract_only_never_searches() {
    let (orchestrator, embedding, search) =
        build(embedding_record(), SearchResult::from_matches(matches(&[0.9])));

    let record = orchestrator
        .extract_only("/uploads/track.wav", Some("openl3"))
        .await;

    assert!(record.success);
    assert_eq!(record.vector.len(), 4);
    assert_eq!(embedding.calls(), 1);
    assert_eq!(search.calls(), 0);
}

#[tokio::test]
async fn test_report_serializes_with_interchange_names() {
    let (orchestrator, _, _) = build(
        embedding_record(),
        SearchResult::from_matches(matches(&[0.97])),
    );

    let report = orchestrator
        .analyze(AnalysisRequest::new("/uploads/track.wav"))
        .await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["embeddingRecord"]["sampleRateHz"], 22050);
    assert_eq!(json["searchResult"]["overallRisk"], "VERY_HIGH");
    assert_eq!(json["searchResult"]["matches"][0]["perMatchRisk"], "VERY_HIGH");
    assert_eq!(json["searchResult"]["matchCount"], 1);
    assert!(json["searchResult"].get("error").is_none());
}
