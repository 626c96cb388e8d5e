//! Similarity search records

use super::risk::RiskLevel;
use crate::error::{FailureKind, Stage, StageError};
use serde::{Deserialize, Serialize};

/// One catalog track returned by the similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Catalog identifier of the matched track (the indexed filename)
    pub track_id: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// Normalized similarity in [0, 1]
    pub similarity_score: f64,
    /// Index distance, never negative
    pub distance: f64,
    /// Risk for this match alone, filled during the risk pass
    pub per_match_risk: RiskLevel,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
}

/// Outcome of one similarity search, later annotated with the risk verdict
///
/// Invariant: `success == false` ⇒ `matches` is empty, `risk_score == 0.0`
/// and `overall_risk == RiskLevel::Low`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub success: bool,
    /// Ranked by descending similarity, as returned by the search program
    pub matches: Vec<MatchRecord>,
    pub overall_risk: RiskLevel,
    pub risk_score: f64,
    pub match_count: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
}

impl SearchResult {
    /// Successful result with risk fields at their defaults
    pub fn from_matches(matches: Vec<MatchRecord>) -> Self {
        Self {
            success: true,
            match_count: matches.len(),
            matches,
            overall_risk: RiskLevel::Low,
            risk_score: 0.0,
            elapsed_ms: 0,
            error: None,
            error_kind: None,
            failed_stage: None,
        }
    }

    /// Failure result attributed to `stage`
    pub fn failure(stage: Stage, kind: FailureKind, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = match stage {
                Stage::Request => "analysis request rejected without diagnostic",
                Stage::Embedding => "embedding extraction failed without diagnostic",
                Stage::Search => "similarity search failed without diagnostic",
            }
            .to_string();
        }

        Self {
            success: false,
            matches: Vec::new(),
            overall_risk: RiskLevel::Low,
            risk_score: 0.0,
            match_count: 0,
            elapsed_ms: 0,
            error: Some(error),
            error_kind: Some(kind),
            failed_stage: Some(stage),
        }
    }
}

/// JSON object printed by the search program
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutput {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub similar_tracks: Vec<TrackOutput>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One entry of `similarTracks`
///
/// The wrapper also emits its own `copyrightRisk` per track; it is ignored
/// because the risk verdict is computed locally.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackOutput {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl TrackOutput {
    fn into_match(self) -> Result<MatchRecord, StageError> {
        if !self.similarity_score.is_finite() || !self.distance.is_finite() {
            return Err(StageError::OutputParse(format!(
                "non-finite score for track {:?}",
                self.filename.unwrap_or_default()
            )));
        }

        Ok(MatchRecord {
            track_id: self.filename.unwrap_or_default(),
            artist: self.artist.unwrap_or_default(),
            album: self.album.unwrap_or_default(),
            genre: self.genre.unwrap_or_default(),
            similarity_score: self.similarity_score.clamp(0.0, 1.0),
            distance: self.distance.max(0.0),
            per_match_risk: RiskLevel::Low,
            duration_seconds: self.duration.filter(|d| d.is_finite()).unwrap_or(0.0).max(0.0),
            release_year: self.year,
        })
    }
}

impl SearchOutput {
    /// Parse the raw stdout of the search program
    pub fn parse(raw: &str) -> Result<Self, StageError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StageError::OutputParse(
                "search process produced no output".to_string(),
            ));
        }

        serde_json::from_str(raw)
            .map_err(|e| StageError::OutputParse(format!("failed to parse search output: {}", e)))
    }

    /// Convert into a successful result (rank order preserved), or the failure the payload reports
    pub fn into_result(self) -> Result<SearchResult, StageError> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "search stage reported failure".to_string());
            return Err(StageError::Reported(message));
        }

        let matches = self
            .similar_tracks
            .into_iter()
            .map(TrackOutput::into_match)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchResult::from_matches(matches))
    }
}
