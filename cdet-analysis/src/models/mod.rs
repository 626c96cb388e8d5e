//! Data models for cdet-analysis
//!
//! Result records are the caller-facing interchange schema (camelCase JSON).
//! The `*Output` types mirror what the external stage programs print on stdout.

pub mod embedding;
pub mod report;
pub mod request;
pub mod risk;
pub mod search;

pub use embedding::{EmbeddingOutput, EmbeddingRecord};
pub use report::AnalysisReport;
pub use request::{AnalysisRequest, ResolvedRequest};
pub use risk::RiskLevel;
pub use search::{MatchRecord, SearchOutput, SearchResult, TrackOutput};
