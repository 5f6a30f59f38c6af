use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::VectorIndex;
use crate::{
    error::{AppError, AppResult},
    models::TitleId,
};

/// Similarity measure the index was built with
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Cosine,
    /// Inner product over unit-normalised vectors
    InnerProduct,
}

impl SimilarityMetric {
    /// Maps a raw similarity onto [0, 1]
    ///
    /// Both metrics range over [-1, 1] for unit vectors.
    pub fn rescale(&self, raw: f32) -> f64 {
        match self {
            SimilarityMetric::Cosine | SimilarityMetric::InnerProduct => {
                ((f64::from(raw) + 1.0) / 2.0).clamp(0.0, 1.0)
            }
        }
    }

    fn similarity(&self, query: &[f32], query_norm: f32, vector: &[f32], vector_norm: f32) -> f32 {
        let dot: f32 = query.iter().zip(vector).map(|(a, b)| a * b).sum();
        match self {
            SimilarityMetric::InnerProduct => dot,
            SimilarityMetric::Cosine => {
                if query_norm == 0.0 || vector_norm == 0.0 {
                    0.0
                } else {
                    dot / (query_norm * vector_norm)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    model: String,
    dimension: usize,
    metric: SimilarityMetric,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    id: TitleId,
    vector: Vec<f32>,
}

/// Exact brute-force index, loaded once and never mutated
pub struct FlatIndex {
    model: String,
    dimension: usize,
    metric: SimilarityMetric,
    ids: Vec<TitleId>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    positions: HashMap<TitleId, usize>,
}

impl FlatIndex {
    /// Builds an index from in-memory entries
    ///
    /// Every vector must have `dimension` components; duplicate ids keep the last entry.
    pub fn new(
        model: impl Into<String>,
        dimension: usize,
        metric: SimilarityMetric,
        entries: Vec<(TitleId, Vec<f32>)>,
    ) -> AppResult<Self> {
        if dimension == 0 {
            return Err(AppError::IndexUnavailable(
                "index dimension must be positive".to_string(),
            ));
        }

        let mut index = Self {
            model: model.into(),
            dimension,
            metric,
            ids: Vec::with_capacity(entries.len()),
            vectors: Vec::with_capacity(entries.len()),
            norms: Vec::with_capacity(entries.len()),
            positions: HashMap::with_capacity(entries.len()),
        };

        for (id, vector) in entries {
            if vector.len() != dimension {
                return Err(AppError::IndexUnavailable(format!(
                    "entry {} has {} dimensions, index declares {}",
                    id,
                    vector.len(),
                    dimension
                )));
            }
            let norm = l2_norm(&vector);

            if let Some(&pos) = index.positions.get(&id) {
                index.vectors[pos] = vector;
                index.norms[pos] = norm;
            } else {
                index.positions.insert(id, index.ids.len());
                index.ids.push(id);
                index.vectors.push(vector);
                index.norms.push(norm);
            }
        }

        Ok(index)
    }

    /// Loads the pre-built index file
    ///
    /// Expected layout: `{"model", "dimension", "metric", "entries": [{"id", "vector"}]}`.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::IndexUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let file: IndexFile = serde_json::from_str(&raw).map_err(|e| {
            AppError::IndexUnavailable(format!("cannot parse {}: {}", path.display(), e))
        })?;

        let entries = file
            .entries
            .into_iter()
            .map(|entry| (entry.id, entry.vector))
            .collect();
        let index = Self::new(file.model, file.dimension, file.metric, entries)?;

        tracing::info!(
            path = %path.display(),
            model = %index.model,
            dimension = index.dimension,
            vectors = index.len(),
            "Vector index loaded"
        );

        Ok(index)
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(TitleId, f32)>> {
        if query.len() != self.dimension {
            return Err(AppError::IndexUnavailable(format!(
                "query has {} dimensions, index expects {}",
                query.len(),
                self.dimension
            )));
        }
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(TitleId, f32)> = self
            .ids
            .iter()
            .zip(self.vectors.iter().zip(&self.norms))
            .map(|(id, (vector, norm))| {
                (*id, self.metric.similarity(query, query_norm, vector, *norm))
            })
            .collect();

        // Most similar first; lower id first on ties
        let by_similarity =
            |a: &(TitleId, f32), b: &(TitleId, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_similarity);
            scored.truncate(k);
        }
        scored.sort_by(by_similarity);

        Ok(scored)
    }

    fn embedding_of(&self, id: TitleId) -> Option<&[f32]> {
        self.positions
            .get(&id)
            .map(|&pos| self.vectors[pos].as_slice())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

pub(crate) fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Scales a vector to unit length; zero vectors are returned unchanged
pub(crate) fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = l2_norm(&vector);
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FlatIndex {
        FlatIndex::new(
            "test-model",
            2,
            SimilarityMetric::Cosine,
            vec![
                (TitleId(1), vec![1.0, 0.0]),
                (TitleId(2), vec![0.0, 1.0]),
                (TitleId(3), vec![0.7, 0.7]),
                (TitleId(4), vec![-1.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let hits = index().search(&[1.0, 0.1], 4).unwrap();
        let ids: Vec<i64> = hits.iter().map(|(id, _)| id.0).collect();

        assert_eq!(ids, vec![1, 3, 2, 4]);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_search_k_one_returns_single_best() {
        let hits = index().search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, TitleId(2));
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let hits = index().search(&[1.0, 0.0], 50).unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_search_ties_break_by_id() {
        let index = FlatIndex::new(
            "m",
            2,
            SimilarityMetric::InnerProduct,
            vec![(TitleId(9), vec![1.0, 0.0]), (TitleId(5), vec![1.0, 0.0])],
        )
        .unwrap();

        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, TitleId(5));
        assert_eq!(hits[1].0, TitleId(9));
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let result = index().search(&[1.0, 0.0, 0.0], 3);
        assert!(matches!(result, Err(AppError::IndexUnavailable(_))));
    }

    #[test]
    fn test_new_rejects_mismatched_entry() {
        let result = FlatIndex::new(
            "m",
            3,
            SimilarityMetric::Cosine,
            vec![(TitleId(1), vec![1.0, 0.0])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_embedding_of_known_and_unknown() {
        let index = index();
        assert_eq!(index.embedding_of(TitleId(3)), Some(&[0.7, 0.7][..]));
        assert_eq!(index.embedding_of(TitleId(42)), None);
    }

    #[test]
    fn test_load_parses_index_file() {
        let path = std::env::temp_dir().join(format!("cinescope-index-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"model": "m", "dimension": 2, "metric": "inner_product",
                "entries": [{"id": 11, "vector": [0.6, 0.8]}]}"#,
        )
        .unwrap();

        let index = FlatIndex::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(index.len(), 1);
        assert_eq!(index.metric(), SimilarityMetric::InnerProduct);
        assert_eq!(index.model(), "m");
    }

    #[test]
    fn test_load_missing_file_is_index_unavailable() {
        let result = FlatIndex::load("/nonexistent/cinescope/index.json");
        assert!(matches!(result, Err(AppError::IndexUnavailable(_))));
    }

    #[test]
    fn test_rescale_cosine_range() {
        let metric = SimilarityMetric::Cosine;
        assert_eq!(metric.rescale(-1.0), 0.0);
        assert_eq!(metric.rescale(1.0), 1.0);
        assert!((metric.rescale(0.0) - 0.5).abs() < 1e-12);
    }
}
