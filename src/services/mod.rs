pub mod filter;
pub mod intent;
pub mod providers;
pub mod rerank;
pub mod retrieval;
pub mod scoring;
pub mod search;

pub use filter::ConstraintFilter;
pub use intent::IntentExtractor;
pub use rerank::{RerankOutcome, Reranker};
pub use retrieval::CandidateRetriever;
pub use scoring::ScoringEngine;
pub use search::{CancellationFlag, PipelineSettings, SearchContext, SearchPipeline};
