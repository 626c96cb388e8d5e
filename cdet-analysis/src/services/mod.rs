//! Pipeline services
//!
//! The two external stages sit behind traits so the orchestrator can be
//! driven by substitutes in tests.

pub mod embedding_stage;
pub mod orchestrator;
pub mod process_runner;
pub mod risk_engine;
pub mod search_stage;

pub use embedding_stage::{EmbeddingExtractor, EmbeddingStage};
pub use orchestrator::AnalysisOrchestrator;
pub use process_runner::{ProcessRunner, SubprocessRunner};
pub use search_stage::{SearchStage, SimilaritySearcher};
