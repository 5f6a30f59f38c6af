use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::intent::MediaType;

/// Catalog identifier for a title, shared by the vector index and the metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleId(pub i64);

impl Display for TitleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TitleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Catalog record for a movie or show, as held by the metadata store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TitleMetadata {
    pub id: TitleId,
    pub title: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    /// Average rating on a 0-10 scale
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub popularity: f64,
    /// Runtime in minutes
    #[serde(default)]
    pub runtime: Option<i32>,
    /// ISO 639-1 code (e.g., "en")
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub adult: bool,
    /// Mood descriptors ("dark", "uplifting", ...) used for the tone penalty
    #[serde(default)]
    pub tone_tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Streaming provider names the title is available on
    #[serde(default)]
    pub streaming_providers: Vec<String>,
}

impl TitleMetadata {
    /// Case-insensitive genre membership
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }

    /// Lowercased tone tags and keywords, the descriptors a candidate can be penalised on
    pub fn descriptors(&self) -> impl Iterator<Item = String> + '_ {
        self.tone_tags
            .iter()
            .chain(self.keywords.iter())
            .map(|tag| tag.to_lowercase())
    }
}

/// A retrieved title that survived metadata resolution
///
/// Carries the raw similarity from the vector index next to the attributes the
/// filter, scorer and re-ranker need.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Candidate {
    #[serde(flatten)]
    pub meta: TitleMetadata,
    pub raw_similarity: f32,
}

impl Candidate {
    pub fn new(meta: TitleMetadata, raw_similarity: f32) -> Self {
        Self {
            meta,
            raw_similarity,
        }
    }

    pub fn id(&self) -> TitleId {
        self.meta.id
    }
}
