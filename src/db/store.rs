use sha2::{Digest, Sha256};
use std::fmt::{Display, Write};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Embedding of a text under a given model
    Embedding { model: String, text: String },
    /// LLM verdict for an intent fingerprint and candidate-set fingerprint
    Rerank { intent: String, candidates: String },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Embedding { model, text } => {
                write!(f, "embed:{}", fingerprint([model.as_str(), text.as_str()]))
            }
            CacheKey::Rerank { intent, candidates } => {
                write!(f, "rerank:{}:{}", intent, candidates)
            }
        }
    }
}

/// Hex SHA-256 over the parts, separated so ("ab", "c") and ("a", "bc") differ
pub fn fingerprint<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// Key-value store used to memoise expensive calls
///
/// Reads are awaited; writes are fire-and-forget so they never add latency to a
/// request. Last writer wins.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>>;

    fn set_raw(&self, key: String, value: String, ttl_secs: u64);
}

impl dyn CacheStore {
    /// Retrieves and deserializes a cached value
    ///
    /// Returns `None` when the key does not exist.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        match self.get_raw(&key.to_string()).await? {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Serializes a value and hands it to the store without waiting for the write
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        self.set_raw(key.to_string(), json, ttl);
    }
}
