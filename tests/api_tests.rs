mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use cinescope::routes::{create_router, AppState};
use common::offline_pipeline;

fn create_test_server() -> TestServer {
    let app = create_router(AppState::new(offline_pipeline()));
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_search_returns_ranked_results() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/search")
        .json(&json!({
            "query": "space movies like Interstellar",
            "limit": 3
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(body["total"].as_u64().unwrap() >= 3);
    assert!(results[0]["id"].is_number());
    assert!(results[0]["fused_score"].is_number());
    assert_eq!(
        body["query_interpretation"]["reference_titles"],
        json!(["Interstellar"])
    );
    assert_eq!(body["query_interpretation"]["reranked"], json!(false));
}

#[tokio::test]
async fn test_search_rejects_short_query() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/search")
        .json(&json!({ "query": " ab " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("at least 3"));
}

#[tokio::test]
async fn test_search_rejects_out_of_range_limit() {
    let server = create_test_server();

    for limit in [0, 51] {
        let response = server
            .post("/api/v1/search")
            .json(&json!({ "query": "heist movies", "limit": limit }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_search_rejects_inverted_year_range() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/search")
        .json(&json!({
            "query": "heist movies",
            "filters": { "year_min": 2020, "year_max": 2000 }
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_with_no_matches_is_empty_not_error() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/search")
        .json(&json!({
            "query": "space movies",
            "filters": { "min_year": 1950, "max_year": 1960 }
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["total"], json!(0));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();
    let request_id = Uuid::new_v4().to_string();

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_str(&request_id).unwrap(),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-request-id").to_str().unwrap(), request_id);
}

#[tokio::test]
async fn test_request_id_generated_when_missing() {
    let server = create_test_server();

    let response = server.get("/health").await;

    let header = response.header("x-request-id");
    assert!(Uuid::parse_str(header.to_str().unwrap()).is_ok());
}
