use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;

use super::title::TitleId;
use crate::error::{AppError, AppResult};

/// Type of content
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    #[serde(alias = "tv", alias = "series")]
    TvShow,
}

/// The fixed tone/emotion vocabulary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Joy,
    Fear,
    Sadness,
    Awe,
    Thrill,
    Hope,
    Dark,
    Romance,
}

impl Tone {
    pub const ALL: [Tone; 8] = [
        Tone::Joy,
        Tone::Fear,
        Tone::Sadness,
        Tone::Awe,
        Tone::Thrill,
        Tone::Hope,
        Tone::Dark,
        Tone::Romance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Joy => "joy",
            Tone::Fear => "fear",
            Tone::Sadness => "sadness",
            Tone::Awe => "awe",
            Tone::Thrill => "thrill",
            Tone::Hope => "hope",
            Tone::Dark => "dark",
            Tone::Romance => "romance",
        }
    }
}

impl Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keep only titles at/above (`Popular`) or strictly below (`HiddenGems`) the median
/// popularity of the current candidate set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PopularityPreference {
    Popular,
    HiddenGems,
}

/// Hard constraints applied by the constraint filter
///
/// Every bound is optional; an unset bound never excludes anything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filters {
    #[serde(default, alias = "year_min", skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,
    #[serde(default, alias = "year_max", skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
    #[serde(default, alias = "rating_min", skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, alias = "rating_max", skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<f64>,
    /// Allowed ISO 639-1 language codes
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub languages: BTreeSet<String>,
    #[serde(default, alias = "runtime_min", skip_serializing_if = "Option::is_none")]
    pub min_runtime: Option<i32>,
    #[serde(default, alias = "runtime_max", skip_serializing_if = "Option::is_none")]
    pub max_runtime: Option<i32>,
    #[serde(default)]
    pub include_adult: bool,
    /// Genres a candidate must all carry
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub genres: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclude_genres: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    /// Streaming providers, any of which qualifies a candidate
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub streaming_providers: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<PopularityPreference>,
}

const MIN_YEAR: i32 = 1900;
const MAX_RUNTIME_MINUTES: i32 = 600;

impl Filters {
    /// Validates bounds and normalises language codes
    ///
    /// Language codes that are not two ASCII letters are dropped with a warning;
    /// every other violation rejects the filters.
    pub fn validate(mut self) -> AppResult<Self> {
        if let Some(year) = self.min_year.into_iter().chain(self.max_year).find(|y| *y < MIN_YEAR) {
            return Err(AppError::InvalidFilters(format!(
                "year {} is before {}",
                year, MIN_YEAR
            )));
        }
        check_order("year", self.min_year, self.max_year)?;

        for rating in self.min_rating.into_iter().chain(self.max_rating) {
            if !(0.0..=10.0).contains(&rating) {
                return Err(AppError::InvalidFilters(format!(
                    "rating {} is outside 0-10",
                    rating
                )));
            }
        }
        check_order("rating", self.min_rating, self.max_rating)?;

        for runtime in self.min_runtime.into_iter().chain(self.max_runtime) {
            if !(0..=MAX_RUNTIME_MINUTES).contains(&runtime) {
                return Err(AppError::InvalidFilters(format!(
                    "runtime {} is outside 0-{} minutes",
                    runtime, MAX_RUNTIME_MINUTES
                )));
            }
        }
        check_order("runtime", self.min_runtime, self.max_runtime)?;

        let (valid, invalid): (BTreeSet<String>, BTreeSet<String>) = self
            .languages
            .into_iter()
            .map(|code| code.trim().to_lowercase())
            .partition(|code| code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()));
        if !invalid.is_empty() {
            tracing::warn!(dropped = ?invalid, "Ignoring invalid language codes");
        }
        self.languages = valid;

        Ok(self)
    }

    /// Fills year bounds the caller left unset
    ///
    /// Returns false (and changes nothing) when the combined range would be inverted.
    pub fn fill_years(&mut self, min_year: Option<i32>, max_year: Option<i32>) -> bool {
        let min = self.min_year.or(min_year);
        let max = self.max_year.or(max_year);
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return false;
            }
        }
        self.min_year = min;
        self.max_year = max;
        true
    }
}

fn check_order<T: PartialOrd + Display + Copy>(
    field: &str,
    min: Option<T>,
    max: Option<T>,
) -> AppResult<()> {
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(AppError::InvalidFilters(format!(
            "min {} {} is greater than max {} {}",
            field, lo, field, hi
        ))),
        _ => Ok(()),
    }
}

/// Structured reading of a free-text query
///
/// Desired and undesired attributes are kept in disjoint sets.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QueryIntent {
    pub raw_query: String,
    pub semantic_query: String,
    pub genres: BTreeSet<String>,
    pub undesired_genres: BTreeSet<String>,
    /// Ordered by first mention
    pub tones: Vec<Tone>,
    pub undesired_tones: BTreeSet<Tone>,
    pub reference_titles: Vec<String>,
    /// Catalog ids of resolved reference titles, parallel to `reference_titles`
    #[serde(skip)]
    pub reference_ids: Vec<TitleId>,
    pub themes: Vec<String>,
    pub undesired_themes: Vec<String>,
    pub explicit_filters: Option<Filters>,
}

impl QueryIntent {
    /// Share of intent fields that carry something, as a rough parse confidence
    pub fn confidence(&self) -> f64 {
        let populated = [
            !self.genres.is_empty() || !self.undesired_genres.is_empty(),
            !self.tones.is_empty() || !self.undesired_tones.is_empty(),
            !self.themes.is_empty() || !self.undesired_themes.is_empty(),
            !self.reference_titles.is_empty(),
            self.explicit_filters.is_some(),
        ];
        let hits = populated.iter().filter(|p| **p).count();
        hits as f64 / populated.len() as f64
    }
}
