use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::LlmClient;
use crate::error::LlmError;

const SYSTEM_PROMPT: &str =
    "You are a film and TV recommendation assistant. Reply with a single JSON object and nothing else.";

/// LLM client for an OpenAI-compatible `/chat/completions` endpoint
///
/// Performs exactly one attempt per call; retries belong to whoever wraps it.
pub struct HttpLlmClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(timeout.as_millis() as u64)
                } else {
                    LlmError::from(e)
                }
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            status if !status.is_success() => {
                return Err(LlmError::Provider(format!("status {}", status)));
            }
            _ => {}
        }

        let json: Value = response.json().await?;
        parse_completion_content(&json)
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Stand-in used when re-ranking is switched off or no API key is configured
pub struct DisabledLlmClient;

#[async_trait::async_trait]
impl LlmClient for DisabledLlmClient {
    async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
        Err(LlmError::Provider("LLM client is disabled".to_string()))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

fn parse_completion_content(json: &Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            LlmError::MalformedResponse("completion is missing choices[0].message.content".to_string())
        })
}
