mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cinescope::{
    models::{Filters, SearchRequest, TitleId},
    services::{
        providers::DisabledLlmClient, rerank::RerankSettings, CancellationFlag, CandidateRetriever,
        IntentExtractor, PipelineSettings,
    },
};
use common::{context, offline_pipeline, pipeline_with, ReversingLlm, StalledLlm};

fn interstellar_request() -> SearchRequest {
    let mut request = SearchRequest::new("dark sci-fi movies like Interstellar with less romance");
    request.filters = Some(Filters {
        genres: BTreeSet::from(["Science Fiction".to_string()]),
        min_year: Some(2010),
        max_year: Some(2024),
        ..Default::default()
    });
    request.limit = Some(10);
    request
}

fn ids(response: &cinescope::models::SearchResponse) -> Vec<TitleId> {
    response.results.iter().map(|r| r.id()).collect()
}

#[tokio::test]
async fn test_dark_scifi_like_interstellar_without_romance() {
    let response = offline_pipeline()
        .search(interstellar_request(), &CancellationFlag::new())
        .await
        .unwrap();

    let interpretation = &response.query_interpretation;
    assert_eq!(interpretation.reference_titles, vec!["Interstellar".to_string()]);
    assert!(interpretation.undesired_genres.contains("Romance"));
    assert!(interpretation.genres.contains("Science Fiction"));
    assert!(!interpretation.reranked);

    // Arrival, Blade Runner 2049, Ad Astra, Annihilation, Edge of Tomorrow and the reference
    assert_eq!(response.total, 6);
    for result in &response.results {
        let meta = &result.scored.candidate.meta;
        let year = meta.release_year.unwrap();
        assert!((2010..=2024).contains(&year), "{} out of range", meta.title);
        assert!(meta.genres.iter().any(|g| g == "Science Fiction"));
        assert!(!meta.genres.iter().any(|g| g == "Romance"), "{} is a romance", meta.title);
        assert!(result.explanation.is_none());
        assert!(result.rerank_delta.is_none());
    }

    let position = response.results.iter().position(|r| r.id() == TitleId(1));
    assert!(matches!(position, Some(p) if p < 3), "Interstellar at {:?}", position);

    let fused: Vec<f64> = response.results.iter().map(|r| r.scored.fused_score).collect();
    assert!(fused.windows(2).all(|pair| pair[0] >= pair[1]), "{:?}", fused);
    assert!(fused.iter().all(|score| (0.0..=1.0).contains(score)));
}

#[tokio::test]
async fn test_reference_title_is_retrieved() {
    let request = interstellar_request();
    let ctx = context(Arc::new(DisabledLlmClient));
    let intent = IntentExtractor::new()
        .extract(&request.query, request.filters, ctx.metadata.as_ref())
        .await
        .unwrap();
    assert_eq!(intent.reference_ids, vec![TitleId(1)]);

    let retriever = CandidateRetriever::new(ctx.embedder, ctx.index, 0.5).unwrap();
    let hits = retriever.retrieve(&intent, 5).await.unwrap();

    assert!(hits.iter().any(|(id, _)| *id == TitleId(1)), "{:?}", hits);
}

#[tokio::test]
async fn test_llm_timeout_keeps_fused_order() {
    let settings = PipelineSettings {
        rerank: RerankSettings {
            timeout: Duration::from_millis(50),
            ..Default::default()
        },
        ..Default::default()
    };
    let stalled = pipeline_with(Arc::new(StalledLlm), settings)
        .search(interstellar_request(), &CancellationFlag::new())
        .await
        .unwrap();
    let offline = offline_pipeline()
        .search(interstellar_request(), &CancellationFlag::new())
        .await
        .unwrap();

    assert!(!stalled.query_interpretation.reranked);
    assert_eq!(ids(&stalled), ids(&offline));
    assert!(stalled.results.iter().all(|r| r.explanation.is_none()));
}

#[tokio::test]
async fn test_llm_reordering_applied_and_hallucinations_dropped() {
    let reranked = pipeline_with(Arc::new(ReversingLlm), PipelineSettings::default())
        .search(interstellar_request(), &CancellationFlag::new())
        .await
        .unwrap();
    let offline = offline_pipeline()
        .search(interstellar_request(), &CancellationFlag::new())
        .await
        .unwrap();

    let mut expected = ids(&offline);
    expected.reverse();

    assert!(reranked.query_interpretation.reranked);
    assert_eq!(ids(&reranked), expected);
    assert!(!ids(&reranked).contains(&TitleId(999_999)));
    assert!(reranked.results.iter().all(|r| r.explanation.is_some()));

    let last = reranked.results.last().unwrap();
    assert_eq!(last.rerank_delta, Some(-(expected.len() as i32 - 1)));
}

#[tokio::test]
async fn test_single_neighbour_retrieval() {
    let settings = PipelineSettings {
        retrieval_k: 1,
        ..Default::default()
    };
    let response = pipeline_with(Arc::new(DisabledLlmClient), settings)
        .search(SearchRequest::new("space exploration epics"), &CancellationFlag::new())
        .await
        .unwrap();

    assert!(response.total <= 1);
    assert!(response.results.len() <= 1);
}

#[tokio::test]
async fn test_constraints_matching_nothing_return_empty() {
    let mut request = SearchRequest::new("space exploration epics");
    request.filters = Some(Filters {
        min_year: Some(1950),
        max_year: Some(1960),
        ..Default::default()
    });

    let response = offline_pipeline()
        .search(request, &CancellationFlag::new())
        .await
        .unwrap();

    assert!(response.results.is_empty());
    assert_eq!(response.total, 0);
}
