use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Candidate, Filters, PopularityPreference, TitleId, TitleMetadata},
    services::providers::MetadataStore,
};

/// Hard constraints over retrieved titles
///
/// Resolution against the metadata store is the only async part; the predicates
/// themselves live in [`apply`] and are pure.
pub struct ConstraintFilter {
    metadata: Arc<dyn MetadataStore>,
}

impl ConstraintFilter {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Attaches metadata to retrieval hits, keeping retrieval order
    ///
    /// Hits the store does not know are dropped: the index and the store have drifted
    /// apart, which is not the caller's problem.
    pub async fn resolve(&self, hits: &[(TitleId, f32)]) -> AppResult<Vec<Candidate>> {
        let ids: Vec<TitleId> = hits.iter().map(|(id, _)| *id).collect();
        let found = self.metadata.get_many(&ids).await?;

        let mut candidates = Vec::with_capacity(hits.len());
        for (id, similarity) in hits {
            match found.get(id) {
                Some(meta) => candidates.push(Candidate::new(meta.clone(), *similarity)),
                None => {
                    tracing::warn!(title_id = %id, "Dropping candidate missing from metadata store")
                }
            }
        }

        Ok(candidates)
    }

    /// Resolves hits and keeps those passing every constraint
    pub async fn filter(
        &self,
        hits: &[(TitleId, f32)],
        filters: Option<&Filters>,
        undesired_genres: &BTreeSet<String>,
    ) -> AppResult<Vec<Candidate>> {
        let candidates = self.resolve(hits).await?;
        let resolved = candidates.len();

        let kept = apply(candidates, filters, undesired_genres);

        tracing::info!(
            retrieved = hits.len(),
            resolved = resolved,
            kept = kept.len(),
            "Constraint filter applied"
        );

        Ok(kept)
    }
}

/// Keeps candidates satisfying all hard constraints, preserving order
///
/// Without filters only adult titles and undesired genres are excluded. The
/// popularity preference compares against the median of the survivors, so unlike
/// the other predicates it does not shrink monotonically as bounds tighten.
pub fn apply(
    candidates: Vec<Candidate>,
    filters: Option<&Filters>,
    undesired_genres: &BTreeSet<String>,
) -> Vec<Candidate> {
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| passes(&c.meta, filters, undesired_genres))
        .collect();

    match filters.and_then(|f| f.popularity) {
        Some(preference) => apply_popularity(kept, preference),
        None => kept,
    }
}

fn passes(meta: &TitleMetadata, filters: Option<&Filters>, undesired_genres: &BTreeSet<String>) -> bool {
    if undesired_genres.iter().any(|genre| meta.has_genre(genre)) {
        return false;
    }

    let Some(filters) = filters else {
        return !meta.adult;
    };

    if meta.adult && !filters.include_adult {
        return false;
    }
    if !within(meta.release_year, filters.min_year, filters.max_year) {
        return false;
    }
    if !within(meta.vote_average, filters.min_rating, filters.max_rating) {
        return false;
    }
    if !within(meta.runtime, filters.min_runtime, filters.max_runtime) {
        return false;
    }

    if !filters.languages.is_empty() {
        let language = meta.original_language.as_deref().map(str::to_lowercase);
        match language {
            Some(code) if filters.languages.contains(&code) => {}
            _ => return false,
        }
    }

    if let Some(media_type) = filters.media_type {
        if meta.media_type != media_type {
            return false;
        }
    }

    if !filters.genres.iter().all(|genre| meta.has_genre(genre)) {
        return false;
    }
    if filters.exclude_genres.iter().any(|genre| meta.has_genre(genre)) {
        return false;
    }

    if !filters.streaming_providers.is_empty() {
        let available = meta.streaming_providers.iter().any(|provider| {
            filters
                .streaming_providers
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(provider))
        });
        if !available {
            return false;
        }
    }

    true
}

/// Inclusive bounds check; an unknown value fails any bound that is set
fn within<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn apply_popularity(candidates: Vec<Candidate>, preference: PopularityPreference) -> Vec<Candidate> {
    let Some(median) = median(candidates.iter().map(|c| c.meta.popularity).collect()) else {
        return candidates;
    };

    candidates
        .into_iter()
        .filter(|c| match preference {
            PopularityPreference::Popular => c.meta.popularity >= median,
            PopularityPreference::HiddenGems => c.meta.popularity < median,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCatalog;
    use crate::error::AppError;
    use crate::models::MediaType;
    use std::collections::HashMap;

    fn meta(id: i64, year: i32, genres: &[&str]) -> TitleMetadata {
        TitleMetadata {
            id: TitleId(id),
            title: format!("Title {}", id),
            media_type: MediaType::Movie,
            overview: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            release_year: Some(year),
            vote_average: Some(7.0),
            vote_count: 1_000,
            popularity: id as f64,
            runtime: Some(110),
            original_language: Some("en".to_string()),
            adult: false,
            tone_tags: Vec::new(),
            keywords: Vec::new(),
            streaming_providers: vec!["Netflix".to_string()],
        }
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new(meta(1, 2014, &["Science Fiction", "Drama"]), 0.9),
            Candidate::new(meta(2, 2008, &["Science Fiction"]), 0.8),
            Candidate::new(meta(3, 2016, &["Science Fiction", "Romance"]), 0.7),
            Candidate::new(meta(4, 2020, &["Comedy"]), 0.6),
            Candidate::new(meta(5, 2023, &["Science Fiction", "Thriller"]), 0.5),
        ]
    }

    fn ids(candidates: &[Candidate]) -> Vec<i64> {
        candidates.iter().map(|c| c.id().0).collect()
    }

    fn undesired(genres: &[&str]) -> BTreeSet<String> {
        genres.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_year_bounds_and_undesired_genres() {
        let filters = Filters {
            min_year: Some(2010),
            max_year: Some(2024),
            genres: undesired(&["Science Fiction"]),
            ..Default::default()
        };

        let kept = apply(candidates(), Some(&filters), &undesired(&["Romance"]));
        assert_eq!(ids(&kept), vec![1, 5]);
    }

    #[test]
    fn test_no_filters_keeps_order() {
        let kept = apply(candidates(), None, &BTreeSet::new());
        assert_eq!(ids(&kept), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_adult_excluded_unless_requested() {
        let mut adult = meta(6, 2015, &["Drama"]);
        adult.adult = true;
        let pool = vec![Candidate::new(adult, 0.4)];

        assert!(apply(pool.clone(), None, &BTreeSet::new()).is_empty());

        let filters = Filters {
            include_adult: true,
            ..Default::default()
        };
        assert_eq!(apply(pool, Some(&filters), &BTreeSet::new()).len(), 1);
    }

    #[test]
    fn test_missing_attribute_fails_set_bound() {
        let mut unknown = meta(7, 2015, &["Drama"]);
        unknown.runtime = None;
        unknown.vote_average = None;

        let runtime = Filters {
            max_runtime: Some(150),
            ..Default::default()
        };
        let rating = Filters {
            min_rating: Some(6.0),
            ..Default::default()
        };
        let pool = vec![Candidate::new(unknown, 0.4)];

        assert!(apply(pool.clone(), Some(&runtime), &BTreeSet::new()).is_empty());
        assert!(apply(pool.clone(), Some(&rating), &BTreeSet::new()).is_empty());
        // Case: no bound set, unknown values are fine
        assert_eq!(apply(pool, Some(&Filters::default()), &BTreeSet::new()).len(), 1);
    }

    #[test]
    fn test_language_media_type_and_providers() {
        let mut french_show = meta(8, 2019, &["Drama"]);
        french_show.original_language = Some("FR".to_string());
        french_show.media_type = MediaType::TvShow;
        french_show.streaming_providers = vec!["Max".to_string()];
        let pool = vec![
            Candidate::new(meta(1, 2014, &["Drama"]), 0.9),
            Candidate::new(french_show, 0.8),
        ];

        let french = Filters {
            languages: ["fr".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&apply(pool.clone(), Some(&french), &BTreeSet::new())), vec![8]);

        let shows = Filters {
            media_type: Some(MediaType::TvShow),
            ..Default::default()
        };
        assert_eq!(ids(&apply(pool.clone(), Some(&shows), &BTreeSet::new())), vec![8]);

        let netflix = Filters {
            streaming_providers: ["netflix".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&apply(pool, Some(&netflix), &BTreeSet::new())), vec![1]);
    }

    #[test]
    fn test_exclude_genres() {
        let filters = Filters {
            exclude_genres: undesired(&["science fiction"]),
            ..Default::default()
        };
        assert_eq!(ids(&apply(candidates(), Some(&filters), &BTreeSet::new())), vec![4]);
    }

    #[test]
    fn test_narrowing_year_range_never_grows_result() {
        let ranges = [
            (None, None),
            (Some(2005), None),
            (Some(2005), Some(2022)),
            (Some(2010), Some(2022)),
            (Some(2015), Some(2021)),
            (Some(2017), Some(2017)),
        ];

        let mut previous = usize::MAX;
        for (min_year, max_year) in ranges {
            let filters = Filters {
                min_year,
                max_year,
                ..Default::default()
            };
            let kept = apply(candidates(), Some(&filters), &BTreeSet::new()).len();
            assert!(kept <= previous, "{:?}-{:?} grew the result", min_year, max_year);
            previous = kept;
        }
    }

    #[test]
    fn test_popularity_preference_splits_at_median() {
        let popular = Filters {
            popularity: Some(PopularityPreference::Popular),
            ..Default::default()
        };
        let gems = Filters {
            popularity: Some(PopularityPreference::HiddenGems),
            ..Default::default()
        };

        assert_eq!(ids(&apply(candidates(), Some(&popular), &BTreeSet::new())), vec![3, 4, 5]);
        assert_eq!(ids(&apply(candidates(), Some(&gems), &BTreeSet::new())), vec![1, 2]);
    }

    #[test]
    fn test_empty_input_is_valid() {
        assert!(apply(Vec::new(), Some(&Filters::default()), &BTreeSet::new()).is_empty());
    }

    #[tokio::test]
    async fn test_resolve_drops_unknown_ids() {
        let catalog = MemoryCatalog::new(vec![meta(1, 2014, &["Drama"]), meta(2, 2015, &["Drama"])]);
        let filter = ConstraintFilter::new(Arc::new(catalog));

        let hits = vec![(TitleId(2), 0.9), (TitleId(42), 0.8), (TitleId(1), 0.7)];
        let resolved = filter.resolve(&hits).await.unwrap();

        assert_eq!(ids(&resolved), vec![2, 1]);
        assert_eq!(resolved[0].raw_similarity, 0.9);
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl MetadataStore for BrokenStore {
        async fn get(&self, _id: TitleId) -> AppResult<Option<TitleMetadata>> {
            Err(AppError::MetadataUnavailable("connection refused".to_string()))
        }

        async fn get_many(&self, _ids: &[TitleId]) -> AppResult<HashMap<TitleId, TitleMetadata>> {
            Err(AppError::MetadataUnavailable("connection refused".to_string()))
        }

        async fn titles_matching(&self, _text: &str) -> AppResult<Vec<(TitleId, String)>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let filter = ConstraintFilter::new(Arc::new(BrokenStore));

        let result = filter
            .filter(&[(TitleId(1), 0.9)], None, &BTreeSet::new())
            .await;
        assert!(matches!(result, Err(AppError::MetadataUnavailable(_))));
    }
}
