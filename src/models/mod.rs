pub mod intent;
pub mod search;
pub mod title;
pub mod weights;

pub use intent::{Filters, MediaType, PopularityPreference, QueryIntent, Tone};
pub use search::{
    QueryInterpretation, RankedResult, ScoredCandidate, SearchRequest, SearchResponse, SubScores,
};
pub use title::{Candidate, TitleId, TitleMetadata};
pub use weights::{ScoringWeights, WeightPreset};
