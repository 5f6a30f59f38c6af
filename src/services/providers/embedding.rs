use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::Embedder;
use crate::{
    cached,
    db::{CacheKey, CacheStore},
    error::{AppError, AppResult},
};

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint
///
/// Embeddings are memoised through the shared cache, keyed by model and text.
pub struct HttpEmbedder {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    request_dimensions: bool,
    cache: Arc<dyn CacheStore>,
    cache_ttl_secs: u64,
}

impl HttpEmbedder {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
        cache: Arc<dyn CacheStore>,
        cache_ttl_secs: u64,
    ) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            request_dimensions: false,
            cache,
            cache_ttl_secs,
        })
    }

    /// Sends the expected dimension with every request, for models that can shorten output
    pub fn with_requested_dimensions(mut self, enabled: bool) -> Self {
        self.request_dimensions = enabled;
        self
    }

    fn request_body(&self, text: &str) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        if self.request_dimensions {
            body["dimensions"] = self.dimension.into();
        }
        body
    }

    async fn request_embedding(&self, text: &str) -> AppResult<Vec<f32>> {
        let body = self.request_body(text);

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.api_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, model = %self.model, "Embedding request failed");
            AppError::Embedding(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, model = %self.model, "Embedding API returned error status");
            return Err(AppError::Embedding(format!(
                "embedding API returned status {}",
                status
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("invalid embedding response: {}", e)))?;
        let vector = parse_embedding_response(&json)?;

        if vector.len() != self.dimension {
            return Err(AppError::Embedding(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimension
            )));
        }

        Ok(vector)
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let key = CacheKey::Embedding {
            model: self.model.clone(),
            text: text.to_string(),
        };

        cached!(self.cache, key, self.cache_ttl_secs, async {
            self.request_embedding(text).await
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Extracts the first embedding from a `{"data": [{"index", "embedding"}]}` payload
fn parse_embedding_response(json: &Value) -> AppResult<Vec<f32>> {
    let data = json
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AppError::Embedding("response is missing data array".to_string()))?;

    let item = data
        .iter()
        .min_by_key(|item| item.get("index").and_then(|v| v.as_u64()).unwrap_or(0))
        .ok_or_else(|| AppError::Embedding("response data array is empty".to_string()))?;

    let values = item
        .get("embedding")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AppError::Embedding("item is missing embedding array".to_string()))?;

    values
        .iter()
        .map(|value| {
            value
                .as_f64()
                .map(|number| number as f32)
                .ok_or_else(|| AppError::Embedding("embedding value must be numeric".to_string()))
        })
        .collect()
}
