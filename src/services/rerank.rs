use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cached,
    db::{fingerprint, CacheKey, CacheStore},
    error::LlmError,
    models::{QueryIntent, RankedResult, ScoredCandidate, TitleId},
    services::{providers::LlmClient, search::CancellationFlag},
};

/// Overview characters included per candidate in the prompt
const OVERVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankSettings {
    pub enabled: bool,
    /// Head of the fused ranking sent to the LLM
    pub top_n: usize,
    pub timeout: Duration,
    pub cache_ttl_secs: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            top_n: 20,
            timeout: Duration::from_secs(4),
            cache_ttl_secs: 14_400,
        }
    }
}

/// One entry of the LLM's ordering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Verdict {
    id: TitleId,
    reason: Option<String>,
}

#[derive(Debug)]
pub struct RerankOutcome {
    pub results: Vec<RankedResult>,
    /// True when an LLM ordering (fresh or cached) was applied
    pub reranked: bool,
}

impl RerankOutcome {
    fn passthrough(scored: Vec<ScoredCandidate>) -> Self {
        Self {
            results: scored.into_iter().map(RankedResult::unranked).collect(),
            reranked: false,
        }
    }
}

/// LLM re-ordering of the fused ranking's head, with one-line explanations
///
/// Never fails: a timeout, rate limit, provider error or unusable reply leaves the
/// fused order untouched and without explanations.
pub struct Reranker {
    llm: Arc<dyn LlmClient>,
    cache: Arc<dyn CacheStore>,
    settings: RerankSettings,
}

impl Reranker {
    pub fn new(llm: Arc<dyn LlmClient>, cache: Arc<dyn CacheStore>, settings: RerankSettings) -> Self {
        Self {
            llm,
            cache,
            settings,
        }
    }

    pub async fn rerank(
        &self,
        scored: Vec<ScoredCandidate>,
        intent: &QueryIntent,
        cancel: &CancellationFlag,
    ) -> RerankOutcome {
        if !self.settings.enabled || self.settings.top_n == 0 || scored.is_empty() {
            return RerankOutcome::passthrough(scored);
        }
        // Last exit before paying for an LLM call
        if cancel.is_cancelled() {
            tracing::info!("Request cancelled, skipping re-rank");
            return RerankOutcome::passthrough(scored);
        }

        let head_len = self.settings.top_n.min(scored.len());
        let head = &scored[..head_len];
        let key = CacheKey::Rerank {
            intent: intent_fingerprint(intent),
            candidates: candidate_fingerprint(head),
        };

        let verdicts: Result<Vec<Verdict>, LlmError> =
            cached!(self.cache, key, self.settings.cache_ttl_secs, async {
                self.request_verdicts(intent, head).await
            });

        match verdicts {
            Ok(verdicts) => {
                let results = apply_verdicts(scored, head_len, &verdicts);
                tracing::info!(
                    head = head_len,
                    verdicts = verdicts.len(),
                    llm = self.llm.name(),
                    "Re-ranked results"
                );
                RerankOutcome {
                    results,
                    reranked: true,
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    llm = self.llm.name(),
                    "Re-ranking degraded, keeping fused order"
                );
                RerankOutcome::passthrough(scored)
            }
        }
    }

    async fn request_verdicts(
        &self,
        intent: &QueryIntent,
        head: &[ScoredCandidate],
    ) -> Result<Vec<Verdict>, LlmError> {
        let prompt = build_prompt(intent, head);
        let timeout = self.settings.timeout;

        let reply = tokio::time::timeout(timeout, self.llm.complete(&prompt, timeout))
            .await
            .map_err(|_| LlmError::Timeout(timeout.as_millis() as u64))??;

        let verdicts = parse_verdicts(&reply)?;
        if !verdicts.iter().any(|v| head.iter().any(|s| s.id() == v.id)) {
            return Err(LlmError::MalformedResponse(
                "ranking names none of the candidates".to_string(),
            ));
        }
        Ok(verdicts)
    }
}

fn joined<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(",")
}

fn intent_fingerprint(intent: &QueryIntent) -> String {
    let parts = [
        intent.semantic_query.trim().to_lowercase(),
        joined(intent.genres.iter().map(String::as_str)),
        joined(intent.undesired_genres.iter().map(String::as_str)),
        joined(intent.tones.iter().map(|t| t.as_str())),
        joined(intent.undesired_tones.iter().map(|t| t.as_str())),
        joined(intent.themes.iter().map(String::as_str)),
        joined(intent.undesired_themes.iter().map(String::as_str)),
        joined(intent.reference_titles.iter().map(String::as_str)),
    ];
    fingerprint(parts.iter().map(String::as_str))
}

/// Order-independent fingerprint of the candidate ids
fn candidate_fingerprint(head: &[ScoredCandidate]) -> String {
    let mut ids: Vec<TitleId> = head.iter().map(|s| s.id()).collect();
    ids.sort();
    let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    fingerprint(ids.iter().map(String::as_str))
}

fn build_prompt(intent: &QueryIntent, head: &[ScoredCandidate]) -> String {
    let list = |items: Vec<&str>| {
        if items.is_empty() {
            "-".to_string()
        } else {
            items.join(", ")
        }
    };
    let avoid: Vec<&str> = intent
        .undesired_genres
        .iter()
        .map(String::as_str)
        .chain(intent.undesired_tones.iter().map(|t| t.as_str()))
        .chain(intent.undesired_themes.iter().map(String::as_str))
        .collect();

    let mut lines = vec![
        "A viewer is looking for something to watch. Re-order the candidates from best to worst \
         match for their request and justify each position in one short sentence."
            .to_string(),
        String::new(),
        format!("Request: {}", intent.raw_query.trim()),
        format!("Wanted genres: {}", list(intent.genres.iter().map(String::as_str).collect())),
        format!("Wanted tones: {}", list(intent.tones.iter().map(|t| t.as_str()).collect())),
        format!("Themes: {}", list(intent.themes.iter().map(String::as_str).collect())),
        format!(
            "Similar to: {}",
            list(intent.reference_titles.iter().map(String::as_str).collect())
        ),
        format!("Avoid: {}", list(avoid)),
        String::new(),
        "Candidates:".to_string(),
    ];

    lines.extend(head.iter().map(|scored| {
        let meta = &scored.candidate.meta;
        let year = meta
            .release_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "unknown year".to_string());
        let overview: String = meta
            .overview
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(OVERVIEW_CHARS)
            .collect();
        format!(
            "- id {} | {} ({}) | genres: {} | tone: {} | {}",
            meta.id,
            meta.title,
            year,
            list(meta.genres.iter().map(String::as_str).collect()),
            list(meta.tone_tags.iter().map(String::as_str).collect()),
            overview.trim()
        )
    }));

    lines.push(String::new());
    lines.push(
        "Respond with JSON only: {\"ranking\": [{\"id\": <candidate id>, \"reason\": \"<one sentence>\"}]}. \
         Use only the ids listed above."
            .to_string(),
    );

    lines.join("\n")
}

/// Reads `{"ranking": [{"id", "reason"}]}`, tolerating code fences, prose around the
/// object, a bare array, and ids sent as strings
fn parse_verdicts(reply: &str) -> Result<Vec<Verdict>, LlmError> {
    let malformed = |msg: &str| LlmError::MalformedResponse(msg.to_string());

    let start = reply.find(['{', '[']).ok_or_else(|| malformed("no JSON in reply"))?;
    let end = reply.rfind(['}', ']']).ok_or_else(|| malformed("no JSON in reply"))?;
    if end < start {
        return Err(malformed("no JSON in reply"));
    }

    let json: Value = serde_json::from_str(&reply[start..=end])
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    let items = match &json {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("ranking")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing ranking array"))?,
        _ => return Err(malformed("unexpected JSON shape")),
    };

    let verdicts: Vec<Verdict> = items
        .iter()
        .filter_map(|item| {
            let id = match item.get("id")? {
                Value::Number(n) => n.as_i64()?,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let reason = item
                .get("reason")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from);
            Some(Verdict {
                id: TitleId(id),
                reason,
            })
        })
        .collect();

    if verdicts.is_empty() {
        return Err(malformed("ranking names no candidates"));
    }
    Ok(verdicts)
}

/// Re-orders the head by the verdicts and appends the untouched tail
///
/// Ids outside the head and repeats are ignored. Head entries the LLM left out are
/// put back at their original position, or at the end when fewer entries precede them.
fn apply_verdicts(
    mut scored: Vec<ScoredCandidate>,
    head_len: usize,
    verdicts: &[Verdict],
) -> Vec<RankedResult> {
    let tail = scored.split_off(head_len);
    let positions: HashMap<TitleId, usize> = scored
        .iter()
        .enumerate()
        .map(|(pos, s)| (s.id(), pos))
        .collect();

    let mut order: Vec<(usize, Option<String>)> = Vec::with_capacity(head_len);
    let mut seen = HashSet::new();
    let mut hallucinated = 0;
    for verdict in verdicts {
        match positions.get(&verdict.id) {
            Some(&pos) if seen.insert(pos) => order.push((pos, verdict.reason.clone())),
            Some(_) => {}
            None => hallucinated += 1,
        }
    }

    let omitted: Vec<usize> = (0..head_len).filter(|pos| !seen.contains(pos)).collect();
    for &pos in &omitted {
        let at = pos.min(order.len());
        order.insert(at, (pos, None));
    }

    if hallucinated > 0 || !omitted.is_empty() {
        tracing::debug!(
            hallucinated = hallucinated,
            omitted = omitted.len(),
            "Repaired LLM ranking"
        );
    }

    let mut slots: Vec<Option<ScoredCandidate>> = scored.into_iter().map(Some).collect();
    let mut results = Vec::with_capacity(head_len + tail.len());
    for (new_pos, (old_pos, reason)) in order.into_iter().enumerate() {
        if let Some(entry) = slots[old_pos].take() {
            results.push(RankedResult {
                scored: entry,
                explanation: reason,
                rerank_delta: Some(old_pos as i32 - new_pos as i32),
            });
        }
    }
    results.extend(tail.into_iter().map(RankedResult::unranked));

    results
}
