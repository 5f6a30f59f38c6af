use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::{
    error::AppResult,
    models::{Candidate, QueryIntent, ScoredCandidate, ScoringWeights, SubScores, TitleMetadata},
    services::providers::SimilarityMetric,
};

/// Recency score for titles without a release year
const UNKNOWN_RECENCY: f64 = 0.5;

/// Tunables for the sub-score formulas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringSettings {
    /// Years for the recency score to halve
    pub recency_half_life_years: f64,
    /// Pseudo-votes pulling ratings toward `rating_prior_mean`
    pub rating_prior_count: f64,
    /// Mean rating on the 0-10 scale
    pub rating_prior_mean: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            recency_half_life_years: 20.0,
            rating_prior_count: 500.0,
            rating_prior_mean: 6.5,
        }
    }
}

/// Fuses per-candidate signals into one ranking score
///
/// Pure and deterministic: the same candidates, intent and weights always produce
/// the same scores in the same order.
pub struct ScoringEngine {
    settings: ScoringSettings,
    metric: SimilarityMetric,
    current_year: i32,
}

impl ScoringEngine {
    pub fn new(settings: ScoringSettings, metric: SimilarityMetric, current_year: i32) -> Self {
        Self {
            settings,
            metric,
            current_year,
        }
    }

    /// Scores candidates and sorts them by fused score, best first
    ///
    /// Ties fall back to vote count (higher first), then title id (lower first).
    /// Fails only when `weights` cannot be normalised.
    pub fn score(
        &self,
        candidates: Vec<Candidate>,
        intent: &QueryIntent,
        weights: &ScoringWeights,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let weights = weights.normalized()?;

        let max_popularity = candidates
            .iter()
            .map(|c| popularity_log(c.meta.popularity))
            .fold(0.0_f64, f64::max);
        let undesired = undesired_terms(intent);

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let sub_scores = SubScores {
                    semantic: self.metric.rescale(candidate.raw_similarity),
                    popularity: popularity_score(candidate.meta.popularity, max_popularity),
                    recency: self.recency_score(candidate.meta.release_year),
                    rating: self.rating_score(&candidate.meta),
                    penalty: penalty_score(&candidate.meta, &undesired),
                };
                let fused_score = fuse(&sub_scores, &weights);

                ScoredCandidate {
                    candidate,
                    sub_scores,
                    fused_score,
                }
            })
            .collect();

        scored.sort_by(ranking_order);

        tracing::debug!(
            scored = scored.len(),
            undesired_terms = undesired.len(),
            top_score = ?scored.first().map(|s| s.fused_score),
            "Candidates scored"
        );

        Ok(scored)
    }

    /// 1.0 for this year or later, halving every `recency_half_life_years`
    fn recency_score(&self, release_year: Option<i32>) -> f64 {
        let Some(year) = release_year else {
            return UNKNOWN_RECENCY;
        };
        let age = f64::from(self.current_year - year);
        if age <= 0.0 {
            return 1.0;
        }
        0.5_f64
            .powf(age / self.settings.recency_half_life_years)
            .clamp(0.0, 1.0)
    }

    /// Bayesian average of the rating, scaled to [0, 1]
    fn rating_score(&self, meta: &TitleMetadata) -> f64 {
        let prior_mean = self.settings.rating_prior_mean;
        let Some(rating) = meta.vote_average else {
            return (prior_mean / 10.0).clamp(0.0, 1.0);
        };

        let votes = meta.vote_count.max(0) as f64;
        let prior_count = self.settings.rating_prior_count.max(0.0);
        let adjusted = if votes + prior_count > 0.0 {
            (votes * rating + prior_count * prior_mean) / (votes + prior_count)
        } else {
            rating
        };

        (adjusted / 10.0).clamp(0.0, 1.0)
    }
}

fn popularity_log(popularity: f64) -> f64 {
    popularity.max(0.0).ln_1p()
}

/// Log popularity relative to the most popular candidate in the set
fn popularity_score(popularity: f64, max_log: f64) -> f64 {
    if max_log <= 0.0 {
        return 0.0;
    }
    (popularity_log(popularity) / max_log).clamp(0.0, 1.0)
}

/// Undesired tones and negated-clause phrases, lowercased
fn undesired_terms(intent: &QueryIntent) -> BTreeSet<String> {
    intent
        .undesired_tones
        .iter()
        .map(|tone| tone.as_str().to_string())
        .chain(intent.undesired_themes.iter().map(|theme| theme.to_lowercase()))
        .filter(|term| !term.trim().is_empty())
        .collect()
}

/// One side's words all appear in the other's ("graphic violence" ~ "violence")
fn descriptor_matches(descriptor: &str, term: &str) -> bool {
    let descriptor_words: Vec<&str> = descriptor.split_whitespace().collect();
    let term_words: Vec<&str> = term.split_whitespace().collect();
    if descriptor_words.is_empty() || term_words.is_empty() {
        return false;
    }

    term_words.iter().all(|w| descriptor_words.contains(w))
        || descriptor_words.iter().all(|w| term_words.contains(w))
}

/// Share of undesired terms the candidate's own tags carry
fn penalty_score(meta: &TitleMetadata, undesired: &BTreeSet<String>) -> f64 {
    if undesired.is_empty() {
        return 0.0;
    }

    let descriptors: Vec<String> = meta.descriptors().collect();
    let present = undesired
        .iter()
        .filter(|term| descriptors.iter().any(|d| descriptor_matches(d, term)))
        .count();

    present as f64 / undesired.len() as f64
}

/// Weighted sum minus the weighted penalty, clamped to [0, 1]
fn fuse(sub: &SubScores, weights: &ScoringWeights) -> f64 {
    let fused = weights.semantic * sub.semantic
        + weights.popularity * sub.popularity
        + weights.recency * sub.recency
        + weights.rating * sub.rating
        - weights.penalty * sub.penalty;

    if fused.is_finite() {
        fused.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn ranking_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| b.candidate.meta.vote_count.cmp(&a.candidate.meta.vote_count))
        .then_with(|| a.id().cmp(&b.id()))
}
