//! Collaborator abstractions the search pipeline consumes
//!
//! The pipeline only talks to these traits, so the metadata store, the vector index,
//! the embedding model and the LLM can each be swapped (or faked in tests) without
//! touching the stages.
use std::collections::HashMap;
use std::time::Duration;

use crate::{
    error::{AppResult, LlmError},
    models::{TitleId, TitleMetadata},
};

pub mod embedding;
pub mod llm;
pub mod vector_index;

pub use embedding::HttpEmbedder;
pub use llm::{DisabledLlmClient, HttpLlmClient};
pub use vector_index::{FlatIndex, SimilarityMetric};

/// Read access to title metadata
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    /// Looks up one title; `Ok(None)` when the id is unknown
    async fn get(&self, id: TitleId) -> AppResult<Option<TitleMetadata>>;

    /// Batched lookup; unknown ids are simply absent from the map
    ///
    /// Default implementation calls `get` for each id. Stores with a bulk query
    /// should override it.
    async fn get_many(&self, ids: &[TitleId]) -> AppResult<HashMap<TitleId, TitleMetadata>> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(meta) = self.get(*id).await? {
                found.insert(*id, meta);
            }
        }
        Ok(found)
    }

    /// Titles whose name resembles `text`, most relevant first
    async fn titles_matching(&self, text: &str) -> AppResult<Vec<(TitleId, String)>>;
}

/// Read-only nearest-neighbour index over title embeddings
pub trait VectorIndex: Send + Sync {
    /// Top-k ids by the index's native similarity, most similar first
    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(TitleId, f32)>>;

    /// Stored embedding of a title, if the index holds one
    fn embedding_of(&self, id: TitleId) -> Option<&[f32]>;

    fn dimension(&self) -> usize;

    /// Embedding model the index was built with
    fn model(&self) -> &str;

    fn metric(&self) -> SimilarityMetric;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Text embedding model
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    fn model(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Text-completion service used by the re-ranker
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Completes `prompt`, giving up after `timeout`
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
