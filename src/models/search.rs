use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::intent::{Filters, QueryIntent, Tone};
use super::title::{Candidate, TitleId};
use super::weights::WeightPreset;

/// Per-candidate signals, each normalised to [0, 1]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SubScores {
    pub semantic: f64,
    pub popularity: f64,
    pub recency: f64,
    pub rating: f64,
    pub penalty: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub sub_scores: SubScores,
    pub fused_score: f64,
}

impl ScoredCandidate {
    pub fn id(&self) -> TitleId {
        self.candidate.id()
    }
}

/// Final, immutable result entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedResult {
    #[serde(flatten)]
    pub scored: ScoredCandidate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Positions gained (positive) or lost (negative) in re-ranking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_delta: Option<i32>,
}

impl RankedResult {
    /// Result that kept its fused position without an LLM verdict
    pub fn unranked(scored: ScoredCandidate) -> Self {
        Self {
            scored,
            explanation: None,
            rerank_delta: None,
        }
    }

    pub fn id(&self) -> TitleId {
        self.scored.id()
    }
}

/// Request body for the search endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub preset: Option<WeightPreset>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: None,
            limit: None,
            preset: None,
        }
    }
}

/// What the pipeline understood from the query
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryInterpretation {
    pub raw_query: String,
    pub semantic_query: String,
    pub genres: BTreeSet<String>,
    pub undesired_genres: BTreeSet<String>,
    pub tones: Vec<Tone>,
    pub undesired_tones: BTreeSet<Tone>,
    pub themes: Vec<String>,
    pub undesired_themes: Vec<String>,
    pub reference_titles: Vec<String>,
    pub filters_applied: Option<Filters>,
    pub preset: WeightPreset,
    pub reranked: bool,
    pub confidence: f64,
}

impl QueryInterpretation {
    pub fn new(intent: &QueryIntent, preset: WeightPreset, reranked: bool) -> Self {
        Self {
            raw_query: intent.raw_query.clone(),
            semantic_query: intent.semantic_query.clone(),
            genres: intent.genres.clone(),
            undesired_genres: intent.undesired_genres.clone(),
            tones: intent.tones.clone(),
            undesired_tones: intent.undesired_tones.clone(),
            themes: intent.themes.clone(),
            undesired_themes: intent.undesired_themes.clone(),
            reference_titles: intent.reference_titles.clone(),
            filters_applied: intent.explicit_filters.clone(),
            preset,
            reranked,
            confidence: intent.confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    /// Ranked results before the limit was applied
    pub total: usize,
    pub query_interpretation: QueryInterpretation,
    pub processing_time_ms: u128,
}
