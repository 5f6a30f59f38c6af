use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{QueryIntent, TitleId},
    services::providers::{vector_index::normalize, Embedder, VectorIndex},
};

pub const MIN_K: usize = 1;
pub const MAX_K: usize = 200;

/// Fails when the embedder and the index were not built for the same model
///
/// Checked once at startup; a mismatch would make every similarity meaningless.
pub fn ensure_compatible(embedder: &dyn Embedder, index: &dyn VectorIndex) -> AppResult<()> {
    if embedder.dimension() != index.dimension() {
        return Err(AppError::Configuration(format!(
            "embedding dimension {} does not match index dimension {}",
            embedder.dimension(),
            index.dimension()
        )));
    }
    if embedder.model() != index.model() {
        return Err(AppError::Configuration(format!(
            "embedding model '{}' does not match index model '{}'",
            embedder.model(),
            index.model()
        )));
    }
    Ok(())
}

fn clamp_k(k: usize) -> usize {
    let clamped = k.clamp(MIN_K, MAX_K);
    if clamped != k {
        tracing::warn!(requested = k, used = clamped, "Retrieval k out of range, clamping");
    }
    clamped
}

/// Nearest-neighbour retrieval over the title index
pub struct CandidateRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reference_blend_weight: f32,
}

impl CandidateRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reference_blend_weight: f32,
    ) -> AppResult<Self> {
        ensure_compatible(embedder.as_ref(), index.as_ref())?;

        Ok(Self {
            embedder,
            index,
            reference_blend_weight: reference_blend_weight.clamp(0.0, 1.0),
        })
    }

    /// Top-k `(id, raw_similarity)` pairs for the intent, most similar first
    ///
    /// Embeds `semantic_query` and, when reference titles were resolved, blends in
    /// the mean of their stored embeddings. Fewer than `k` hits come back only when
    /// the index holds fewer than `k` vectors.
    pub async fn retrieve(&self, intent: &QueryIntent, k: usize) -> AppResult<Vec<(TitleId, f32)>> {
        let query = intent.semantic_query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidQuery("semantic query is empty".to_string()));
        }
        let k = clamp_k(k);

        let text_vector = self.embedder.embed(query).await?;
        let query_vector = self.blend(text_vector, &intent.reference_ids);
        let hits = self.index.search(&query_vector, k)?;

        tracing::info!(
            k = k,
            hits = hits.len(),
            references = intent.reference_ids.len(),
            "Candidates retrieved"
        );

        Ok(hits)
    }

    /// `(1 - w) * text + w * mean(references)`, unit-normalised
    fn blend(&self, text_vector: Vec<f32>, references: &[TitleId]) -> Vec<f32> {
        let reference_vectors: Vec<Vec<f32>> = references
            .iter()
            .filter_map(|id| self.index.embedding_of(*id))
            .map(|vector| normalize(vector.to_vec()))
            .collect();

        let weight = self.reference_blend_weight;
        if reference_vectors.is_empty() || weight == 0.0 {
            return normalize(text_vector);
        }

        let share = weight / reference_vectors.len() as f32;
        let mut blended: Vec<f32> = normalize(text_vector)
            .into_iter()
            .map(|v| v * (1.0 - weight))
            .collect();
        for vector in &reference_vectors {
            for (b, r) in blended.iter_mut().zip(vector) {
                *b += share * r;
            }
        }

        normalize(blended)
    }
}
