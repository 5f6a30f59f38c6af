use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Allowed drift from 1.0 once weights have been normalised
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative weight of each sub-score in the fused score
///
/// `penalty` is subtracted; the other four are added.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub semantic: f64,
    pub popularity: f64,
    pub recency: f64,
    pub rating: f64,
    pub penalty: f64,
}

impl ScoringWeights {
    fn components(&self) -> [f64; 5] {
        [
            self.semantic,
            self.popularity,
            self.recency,
            self.rating,
            self.penalty,
        ]
    }

    /// Rescales the weights to sum to 1.0
    ///
    /// Negative, non-finite or all-zero weights cannot be normalised and are a
    /// configuration error.
    pub fn normalized(&self) -> AppResult<Self> {
        let parts = self.components();
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AppError::Configuration(format!(
                "scoring weights must be finite and non-negative: {:?}",
                self
            )));
        }

        let sum: f64 = parts.iter().sum();
        if sum <= 0.0 {
            return Err(AppError::Configuration(
                "scoring weights sum to zero".to_string(),
            ));
        }

        let normalized = Self {
            semantic: self.semantic / sum,
            popularity: self.popularity / sum,
            recency: self.recency / sum,
            rating: self.rating / sum,
            penalty: self.penalty / sum,
        };

        let total: f64 = normalized.components().iter().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::Configuration(format!(
                "scoring weights sum to {} after normalisation",
                total
            )));
        }

        Ok(normalized)
    }
}

/// Named weight configurations selectable per request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightPreset {
    #[default]
    Balanced,
    #[serde(alias = "semantic-focused", alias = "semantic_focused")]
    Semantic,
    #[serde(alias = "discovery-heavy", alias = "discovery_heavy")]
    Discovery,
    #[serde(alias = "popularity-heavy", alias = "popularity_heavy")]
    Popularity,
    #[serde(alias = "quality-focused", alias = "quality_focused")]
    Quality,
}

const TRENDING_WORDS: &[&str] = &["trending", "popular", "most watched", "blockbuster"];
const RECENT_WORDS: &[&str] = &["new", "recent", "latest", "this year", "upcoming"];
const QUALITY_WORDS: &[&str] = &[
    "best",
    "top rated",
    "top-rated",
    "critically acclaimed",
    "acclaimed",
    "masterpiece",
    "award winning",
    "award-winning",
];

impl WeightPreset {
    pub fn weights(&self) -> ScoringWeights {
        let (semantic, popularity, recency, rating, penalty) = match self {
            WeightPreset::Balanced => (0.50, 0.10, 0.10, 0.15, 0.15),
            WeightPreset::Semantic => (0.65, 0.05, 0.05, 0.10, 0.15),
            WeightPreset::Discovery => (0.35, 0.05, 0.25, 0.20, 0.15),
            WeightPreset::Popularity => (0.35, 0.25, 0.05, 0.20, 0.15),
            WeightPreset::Quality => (0.40, 0.05, 0.05, 0.35, 0.15),
        };

        ScoringWeights {
            semantic,
            popularity,
            recency,
            rating,
            penalty,
        }
    }

    /// Picks a preset from cue words in the query
    ///
    /// Trending beats recency beats quality; a query anchored on reference titles
    /// leans on semantic similarity. Returns `None` when nothing stands out.
    pub fn infer(raw_query: &str, has_reference_titles: bool) -> Option<Self> {
        let words: Vec<String> = raw_query
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let text = words.join(" ");
        let mentions = |cues: &[&str]| {
            cues.iter().any(|cue| {
                if cue.contains(' ') {
                    format!(" {} ", text).contains(&format!(" {} ", cue))
                } else {
                    words.iter().any(|w| w == cue)
                }
            })
        };

        if mentions(TRENDING_WORDS) {
            Some(WeightPreset::Popularity)
        } else if mentions(RECENT_WORDS) {
            Some(WeightPreset::Discovery)
        } else if mentions(QUALITY_WORDS) {
            Some(WeightPreset::Quality)
        } else if has_reference_titles {
            Some(WeightPreset::Semantic)
        } else {
            None
        }
    }
}

impl Display for WeightPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WeightPreset::Balanced => "balanced",
            WeightPreset::Semantic => "semantic",
            WeightPreset::Discovery => "discovery",
            WeightPreset::Popularity => "popularity",
            WeightPreset::Quality => "quality",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for WeightPreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
            .map_err(|_| AppError::Configuration(format!("unknown weight preset '{}'", s)))
    }
}
