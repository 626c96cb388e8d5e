//! cdet-analysis library
//!
//! Copyright-risk analysis core: extracts an audio embedding through an
//! external program, searches a similarity index through a second program,
//! and scores the ranked matches.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::{AnalysisConfig, AnalysisDefaults, StageCommand};
pub use error::{FailureKind, Stage, StageError};
pub use models::{AnalysisReport, AnalysisRequest, EmbeddingRecord, MatchRecord, RiskLevel, SearchResult};
pub use services::AnalysisOrchestrator;
