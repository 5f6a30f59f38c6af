use chrono::{Datelike, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::{
    db::CacheStore,
    error::{AppError, AppResult},
    models::{Filters, QueryIntent, QueryInterpretation, SearchRequest, SearchResponse, WeightPreset},
    services::{
        filter::ConstraintFilter,
        intent::IntentExtractor,
        providers::{Embedder, LlmClient, MetadataStore, SimilarityMetric, VectorIndex},
        rerank::{RerankSettings, Reranker},
        retrieval::CandidateRetriever,
        scoring::{ScoringEngine, ScoringSettings},
    },
};

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

/// Cooperative cancellation shared between a request and its pipeline run
///
/// Checked between stages and right before the LLM call.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is tripped
    pub fn check(&self, stage: &str) -> AppResult<()> {
        if self.is_cancelled() {
            tracing::info!(stage = stage, "Search cancelled");
            return Err(AppError::Cancelled);
        }
        Ok(())
    }
}

/// Process-wide collaborators, loaded once and shared read-only by every request
#[derive(Clone)]
pub struct SearchContext {
    pub metadata: Arc<dyn MetadataStore>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: Arc<dyn LlmClient>,
    pub cache: Arc<dyn CacheStore>,
}

/// Request-independent tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Nearest neighbours fetched per query
    pub retrieval_k: usize,
    pub reference_blend_weight: f32,
    pub default_preset: WeightPreset,
    /// Infer a preset from query wording when the request names none
    pub adaptive_weights: bool,
    pub scoring: ScoringSettings,
    pub rerank: RerankSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retrieval_k: 50,
            reference_blend_weight: 0.5,
            default_preset: WeightPreset::Balanced,
            adaptive_weights: true,
            scoring: ScoringSettings::default(),
            rerank: RerankSettings::default(),
        }
    }
}

/// The five-stage discovery pipeline
///
/// Stages run strictly in sequence per request: intent extraction, retrieval,
/// constraint filtering, scoring and re-ranking. Many requests may share one
/// pipeline concurrently; it holds no per-request state.
pub struct SearchPipeline {
    extractor: IntentExtractor,
    metadata: Arc<dyn MetadataStore>,
    retriever: CandidateRetriever,
    filter: ConstraintFilter,
    reranker: Reranker,
    metric: SimilarityMetric,
    settings: PipelineSettings,
}

impl SearchPipeline {
    /// Wires the stages over the shared context
    ///
    /// Fails with [`AppError::Configuration`] when the embedder does not match the
    /// index or the default preset's weights are unusable.
    pub fn new(ctx: SearchContext, settings: PipelineSettings) -> AppResult<Self> {
        settings.default_preset.weights().normalized()?;

        let metric = ctx.index.metric();
        let index_size = ctx.index.len();
        let retriever =
            CandidateRetriever::new(ctx.embedder, ctx.index, settings.reference_blend_weight)?;

        tracing::info!(
            index_size = index_size,
            metric = ?metric,
            default_preset = %settings.default_preset,
            llm = ctx.llm.name(),
            "Search pipeline ready"
        );

        Ok(Self {
            extractor: IntentExtractor::new(),
            filter: ConstraintFilter::new(ctx.metadata.clone()),
            metadata: ctx.metadata,
            retriever,
            reranker: Reranker::new(ctx.llm, ctx.cache, settings.rerank),
            metric,
            settings,
        })
    }

    /// Swaps the intent extractor, e.g. for one with a different tone classifier
    pub fn with_intent_extractor(mut self, extractor: IntentExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Requested preset, else one inferred from the query, else the default
    pub fn select_preset(&self, requested: Option<WeightPreset>, intent: &QueryIntent) -> WeightPreset {
        requested
            .or_else(|| {
                if self.settings.adaptive_weights {
                    WeightPreset::infer(&intent.raw_query, !intent.reference_titles.is_empty())
                } else {
                    None
                }
            })
            .unwrap_or(self.settings.default_preset)
    }

    pub async fn search(
        &self,
        request: SearchRequest,
        cancel: &CancellationFlag,
    ) -> AppResult<SearchResponse> {
        let start = Instant::now();

        // 1. Validate explicit filters and the limit
        let filters = request.filters.map(Filters::validate).transpose()?;
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        tracing::info!(query = %request.query, limit = limit, "Starting search");

        // 2. Extract intent
        let intent = self
            .extractor
            .extract(&request.query, filters, self.metadata.as_ref())
            .await?;
        cancel.check("intent")?;

        // 3. Retrieve nearest neighbours
        let hits = self
            .retriever
            .retrieve(&intent, self.settings.retrieval_k)
            .await?;
        cancel.check("retrieval")?;

        // 4. Resolve metadata and apply hard constraints
        let candidates = self
            .filter
            .filter(&hits, intent.explicit_filters.as_ref(), &intent.undesired_genres)
            .await?;
        cancel.check("filter")?;

        // 5. Score with the selected preset
        let preset = self.select_preset(request.preset, &intent);
        let engine = ScoringEngine::new(self.settings.scoring, self.metric, Utc::now().year());
        let scored = engine.score(candidates, &intent, &preset.weights())?;
        cancel.check("scoring")?;

        // 6. Re-rank the head (degrades to the fused order on any failure)
        let outcome = self.reranker.rerank(scored, &intent, cancel).await;
        cancel.check("rerank")?;

        // 7. Truncate and describe what was understood
        let total = outcome.results.len();
        let mut results = outcome.results;
        results.truncate(limit);

        let elapsed = start.elapsed();
        tracing::info!(
            hits = hits.len(),
            total = total,
            returned = results.len(),
            preset = %preset,
            reranked = outcome.reranked,
            processing_time_ms = elapsed.as_millis(),
            "Search completed"
        );

        Ok(SearchResponse {
            results,
            total,
            query_interpretation: QueryInterpretation::new(&intent, preset, outcome.reranked),
            processing_time_ms: elapsed.as_millis(),
        })
    }
}
