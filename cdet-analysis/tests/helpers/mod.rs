//! Shared test utilities for cdet-analysis integration tests
//!
//! Substitute stages count their invocations so tests can assert which
//! stages ran. Script helpers write `/bin/sh` fakes of the external programs.

#![allow(dead_code)]

use async_trait::async_trait;
use cdet_analysis::services::{EmbeddingExtractor, SimilaritySearcher};
use cdet_analysis::{EmbeddingRecord, MatchRecord, RiskLevel, SearchResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Embedding substitute returning a fixed record
pub struct CountingEmbedding {
    record: EmbeddingRecord,
    calls: AtomicUsize,
}

impl CountingEmbedding {
    pub fn new(record: EmbeddingRecord) -> Self {
        Self {
            record,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingExtractor for CountingEmbedding {
    async fn extract(&self, _audio_reference: &str, _model_id: &str) -> EmbeddingRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.record.clone()
    }
}

/// Search substitute returning a fixed result
pub struct CountingSearch {
    result: SearchResult,
    calls: AtomicUsize,
}

impl CountingSearch {
    pub fn new(result: SearchResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimilaritySearcher for CountingSearch {
    async fn search(&self, _vector: &[f64], _result_limit: usize, _index_path: &Path) -> SearchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to interleave
        tokio::task::yield_now().await;
        self.result.clone()
    }
}

/// Successful 4-dimensional embedding
pub fn embedding_record() -> EmbeddingRecord {
    EmbeddingRecord {
        success: true,
        vector: vec![0.12, -0.5, 0.33, 0.9],
        shape: vec![4],
        model_id: "spectrogram".to_string(),
        source_duration_seconds: 30.0,
        sample_rate_hz: 22050,
        error: None,
        error_kind: None,
    }
}

/// Catalog match with the given score
pub fn catalog_match(track_id: &str, similarity_score: f64) -> MatchRecord {
    MatchRecord {
        track_id: track_id.to_string(),
        artist: "Demo Artist".to_string(),
        album: "Demo Album".to_string(),
        genre: "Rock".to_string(),
        similarity_score,
        distance: 2.0 * (1.0 - similarity_score),
        per_match_risk: RiskLevel::Low,
        duration_seconds: 200.0,
        release_year: Some(2019),
    }
}

/// Matches with the given scores, in rank order
pub fn matches(scores: &[f64]) -> Vec<MatchRecord> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| catalog_match(&format!("demo_song_{}.wav", i), *score))
        .collect()
}

/// Write a shell script to run as `/bin/sh <script> args...`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("Failed to write test script");
    path
}
