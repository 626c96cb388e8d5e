//! Copyright risk scoring
//!
//! Pure, stateless functions over the ranked match list. Identical inputs
//! always produce identical outputs.
//!
//! # Classification
//! Evaluated top-down, first rule wins (`max` = best similarity, `high` =
//! matches at or above the threshold):
//!
//! | Rule                        | Level       |
//! |-----------------------------|-------------|
//! | max ≥ 0.95                  | `VERY_HIGH` |
//! | max ≥ 0.85                  | `HIGH`      |
//! | max ≥ 0.70 and high > 1     | `HIGH`      |
//! | max ≥ 0.50                  | `MEDIUM`    |
//! | otherwise                   | `LOW`       |
//!
//! # Score
//! `round(0.7 × max + 0.3 × mean(top 3 by rank), 3)`

use crate::models::{MatchRecord, RiskLevel};

/// Similarity at or above which a match is near-certainly a copy
pub const VERY_HIGH_SIMILARITY: f64 = 0.95;

/// Similarity at or above which a single match is high risk
pub const HIGH_SIMILARITY: f64 = 0.85;

/// Similarity at or above which several threshold matches are high risk
pub const ELEVATED_SIMILARITY: f64 = 0.70;

/// Similarity at or above which a match is medium risk
pub const MEDIUM_SIMILARITY: f64 = 0.50;

/// Weight of the best match in the blended score
pub const MAX_SIMILARITY_WEIGHT: f64 = 0.7;

/// Weight of the top-window mean in the blended score
pub const TOP_MEAN_WEIGHT: f64 = 0.3;

/// Number of leading matches averaged into the score
pub const TOP_MATCH_WINDOW: usize = 3;

fn max_similarity(matches: &[MatchRecord]) -> Option<f64> {
    matches
        .iter()
        .map(|m| m.similarity_score)
        .reduce(f64::max)
}

/// Overall risk level of a ranked match list
pub fn classify_risk(matches: &[MatchRecord], threshold: f64) -> RiskLevel {
    let Some(max_sim) = max_similarity(matches) else {
        return RiskLevel::Low;
    };

    let high_count = matches
        .iter()
        .filter(|m| m.similarity_score >= threshold)
        .count();

    if max_sim >= VERY_HIGH_SIMILARITY {
        RiskLevel::VeryHigh
    } else if max_sim >= HIGH_SIMILARITY {
        RiskLevel::High
    } else if max_sim >= ELEVATED_SIMILARITY && high_count > 1 {
        RiskLevel::High
    } else if max_sim >= MEDIUM_SIMILARITY {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Continuous risk score in [0, 1], rounded to 3 decimals
pub fn score_risk(matches: &[MatchRecord]) -> f64 {
    let Some(max_sim) = max_similarity(matches) else {
        return 0.0;
    };

    let window = &matches[..matches.len().min(TOP_MATCH_WINDOW)];
    let top_avg = window.iter().map(|m| m.similarity_score).sum::<f64>() / window.len() as f64;

    round3(MAX_SIMILARITY_WEIGHT * max_sim + TOP_MEAN_WEIGHT * top_avg).clamp(0.0, 1.0)
}

/// Risk level of a single match
///
/// Unlike [`classify_risk`], the threshold itself marks the MEDIUM boundary.
pub fn classify_match(similarity_score: f64, threshold: f64) -> RiskLevel {
    if similarity_score >= VERY_HIGH_SIMILARITY {
        RiskLevel::VeryHigh
    } else if similarity_score >= HIGH_SIMILARITY {
        RiskLevel::High
    } else if similarity_score >= threshold {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(score: f64) -> MatchRecord {
        MatchRecord {
            track_id: format!("track_{}", score),
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
            similarity_score: score,
            distance: 1.0 - score,
            per_match_risk: RiskLevel::Low,
            duration_seconds: 0.0,
            release_year: None,
        }
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(classify_risk(&[m(0.95)], 0.8), RiskLevel::VeryHigh);
        assert_eq!(classify_risk(&[m(0.85)], 0.8), RiskLevel::High);
        assert_eq!(classify_risk(&[m(0.70)], 0.8), RiskLevel::Medium);
        assert_eq!(classify_risk(&[m(0.50)], 0.8), RiskLevel::Medium);
        assert_eq!(classify_risk(&[m(0.49)], 0.8), RiskLevel::Low);
    }

    #[test]
    fn test_several_threshold_matches_escalate() {
        // Two matches at/above a 0.7 threshold with max in [0.70, 0.85)
        assert_eq!(classify_risk(&[m(0.72), m(0.71)], 0.7), RiskLevel::High);
        // Below 0.70 the count is irrelevant
        assert_eq!(classify_risk(&[m(0.69), m(0.68)], 0.5), RiskLevel::Medium);
    }

    #[test]
    fn test_max_is_not_rank_dependent() {
        // An unsorted list still classifies on its best match
        assert_eq!(classify_risk(&[m(0.3), m(0.96)], 0.8), RiskLevel::VeryHigh);
    }

    #[test]
    fn test_score_window_shorter_than_three() {
        // 0.7 × 0.9 + 0.3 × 0.8 = 0.87
        assert_eq!(score_risk(&[m(0.9), m(0.7)]), 0.87);
    }

    #[test]
    fn test_score_rounding() {
        // 0.7 × 0.8123 + 0.3 × 0.8123 = 0.8123 → 0.812
        assert_eq!(score_risk(&[m(0.8123)]), 0.812);
    }

    #[test]
    fn test_classify_match() {
        assert_eq!(classify_match(0.97, 0.8), RiskLevel::VeryHigh);
        assert_eq!(classify_match(0.86, 0.8), RiskLevel::High);
        assert_eq!(classify_match(0.80, 0.8), RiskLevel::Medium);
        assert_eq!(classify_match(0.79, 0.8), RiskLevel::Low);
        assert_eq!(classify_match(0.6, 0.5), RiskLevel::Medium);
    }
}
