use axum::{extract::State, Extension, Json};
use tracing::Instrument;

use super::AppState;
use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{SearchRequest, SearchResponse},
    services::{search::MAX_LIMIT, CancellationFlag},
};

const MIN_QUERY_CHARS: usize = 3;

/// Handler for the discovery search endpoint
pub async fn search(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Json<SearchResponse>> {
    validate(&request)?;

    tracing::info!(
        request_id = %request_id,
        query = %request.query,
        limit = ?request.limit,
        preset = ?request.preset,
        "Search request received"
    );

    // The search runs detached so a dropped connection stops it at the next stage boundary
    let cancel = CancellationFlag::new();
    let guard = CancelOnDrop::new(cancel.clone());
    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(
        async move { pipeline.search(request, &cancel).await }.in_current_span(),
    );

    let joined = task.await;
    guard.disarm();
    let response = joined.map_err(|e| AppError::Internal(format!("search task failed: {}", e)))??;

    Ok(Json(response))
}

/// Trips the flag when dropped while still armed
struct CancelOnDrop {
    flag: CancellationFlag,
    armed: bool,
}

impl CancelOnDrop {
    fn new(flag: CancellationFlag) -> Self {
        Self { flag, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::info!("Client went away, cancelling search");
            self.flag.cancel();
        }
    }
}

fn validate(request: &SearchRequest) -> AppResult<()> {
    if request.query.trim().chars().count() < MIN_QUERY_CHARS {
        return Err(AppError::InvalidQuery(format!(
            "query must be at least {} characters",
            MIN_QUERY_CHARS
        )));
    }

    if let Some(limit) = request.limit {
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::InvalidQuery(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, limit
            )));
        }
    }

    Ok(())
}
