//! Shared fixtures for the integration tests: a small sci-fi heavy catalog, a keyword
//! embedder over four axes and LLM stand-ins.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cinescope::{
    db::{MemoryCache, MemoryCatalog},
    error::{AppResult, LlmError},
    models::{MediaType, TitleId, TitleMetadata},
    services::{
        providers::{DisabledLlmClient, Embedder, FlatIndex, LlmClient, SimilarityMetric},
        PipelineSettings, SearchContext, SearchPipeline,
    },
};

pub const MODEL: &str = "keyword-axes";

/// Axes: space, romance, crime, comedy
const AXES: [&[&str]; 4] = [
    &["sci", "space", "interstellar", "astronaut", "alien"],
    &["romance", "love", "romantic"],
    &["crime", "heist", "gangster"],
    &["comedy", "funny", "laugh"],
];

pub struct KeywordEmbedder;

#[async_trait::async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(AXES
            .iter()
            .map(|words| 0.05 + words.iter().filter(|w| text.contains(*w)).count() as f32)
            .collect())
    }

    fn model(&self) -> &str {
        MODEL
    }

    fn dimension(&self) -> usize {
        AXES.len()
    }
}

/// Sleeps far past any configured timeout
pub struct StalledLlm;

#[async_trait::async_trait]
impl LlmClient for StalledLlm {
    async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("{}".to_string())
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

/// Ranks the prompt's candidates in reverse and slips in an id it was never shown
pub struct ReversingLlm;

#[async_trait::async_trait]
impl LlmClient for ReversingLlm {
    async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        let mut ids: Vec<i64> = prompt
            .lines()
            .filter_map(|line| line.strip_prefix("- id "))
            .filter_map(|rest| rest.split(" |").next()?.trim().parse().ok())
            .collect();
        ids.reverse();

        let mut ranking: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| serde_json::json!({ "id": id, "reason": format!("Pick {}", id) }))
            .collect();
        ranking.insert(1, serde_json::json!({ "id": 999_999, "reason": "Not a candidate" }));

        Ok(serde_json::json!({ "ranking": ranking }).to_string())
    }

    fn name(&self) -> &'static str {
        "reversing"
    }
}

fn title(
    id: i64,
    name: &str,
    year: i32,
    genres: &[&str],
    popularity: f64,
    rating: f64,
) -> TitleMetadata {
    TitleMetadata {
        id: TitleId(id),
        title: name.to_string(),
        media_type: MediaType::Movie,
        overview: Some(format!("{} overview", name)),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        release_year: Some(year),
        vote_average: Some(rating),
        vote_count: 2_000 + id * 100,
        popularity,
        runtime: Some(120),
        original_language: Some("en".to_string()),
        adult: false,
        tone_tags: Vec::new(),
        keywords: Vec::new(),
        streaming_providers: Vec::new(),
    }
}

pub fn catalog() -> Vec<(TitleMetadata, Vec<f32>)> {
    vec![
        (title(1, "Interstellar", 2014, &["Science Fiction", "Drama", "Adventure"], 90.0, 8.6), vec![1.0, 0.1, 0.0, 0.0]),
        (title(2, "Arrival", 2016, &["Science Fiction", "Drama"], 60.0, 7.9), vec![0.9, 0.1, 0.0, 0.0]),
        (title(3, "Blade Runner 2049", 2017, &["Science Fiction", "Drama"], 70.0, 7.5), vec![0.9, 0.2, 0.1, 0.0]),
        (title(4, "Passengers", 2016, &["Science Fiction", "Romance"], 50.0, 7.0), vec![0.8, 0.6, 0.0, 0.0]),
        (title(5, "Ad Astra", 2019, &["Science Fiction", "Drama"], 40.0, 6.5), vec![0.95, 0.05, 0.0, 0.0]),
        (title(6, "Moon", 2009, &["Science Fiction", "Drama"], 20.0, 7.9), vec![0.9, 0.0, 0.0, 0.0]),
        (title(7, "The Notebook", 2004, &["Romance", "Drama"], 55.0, 7.9), vec![0.0, 1.0, 0.0, 0.0]),
        (title(8, "Heat", 1995, &["Crime", "Thriller"], 45.0, 8.3), vec![0.0, 0.0, 1.0, 0.0]),
        (title(9, "Annihilation", 2018, &["Science Fiction", "Horror"], 35.0, 6.8), vec![0.85, 0.0, 0.0, 0.0]),
        (title(10, "Superbad", 2007, &["Comedy"], 30.0, 7.6), vec![0.0, 0.1, 0.0, 1.0]),
        (title(11, "Her", 2013, &["Science Fiction", "Romance", "Drama"], 40.0, 8.0), vec![0.5, 0.8, 0.0, 0.0]),
        (title(12, "Edge of Tomorrow", 2014, &["Science Fiction", "Action"], 65.0, 7.9), vec![0.9, 0.0, 0.1, 0.1]),
    ]
}

pub fn context(llm: Arc<dyn LlmClient>) -> SearchContext {
    let (titles, vectors): (Vec<_>, Vec<_>) = catalog()
        .into_iter()
        .map(|(meta, vector)| {
            let id = meta.id;
            (meta, (id, vector))
        })
        .unzip();

    let index = FlatIndex::new(MODEL, AXES.len(), SimilarityMetric::Cosine, vectors).unwrap();

    SearchContext {
        metadata: Arc::new(MemoryCatalog::new(titles)),
        index: Arc::new(index),
        embedder: Arc::new(KeywordEmbedder),
        llm,
        cache: Arc::new(MemoryCache::new()),
    }
}

pub fn pipeline_with(llm: Arc<dyn LlmClient>, settings: PipelineSettings) -> SearchPipeline {
    SearchPipeline::new(context(llm), settings).unwrap()
}

pub fn offline_pipeline() -> SearchPipeline {
    pipeline_with(Arc::new(DisabledLlmClient), PipelineSettings::default())
}
