//! Combined analysis report

use super::embedding::EmbeddingRecord;
use super::search::SearchResult;
use serde::{Deserialize, Serialize};

/// Everything `analyze` returns: the embedding and the annotated search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub embedding_record: EmbeddingRecord,
    pub search_result: SearchResult,
}

impl AnalysisReport {
    /// Both stages succeeded and the risk verdict is populated
    pub fn is_success(&self) -> bool {
        self.embedding_record.success && self.search_result.success
    }
}
