//! Rule-based intent extraction
//!
//! Turns free text into a [`QueryIntent`]: reference titles, genres, tones, themes,
//! negated attributes and implied year bounds, plus a derived semantic query for
//! retrieval. Nothing here fails except an empty query; anything that cannot be
//! read confidently is left empty.

mod lexicon;
mod tokens;
pub mod tone;

use std::collections::BTreeSet;
use std::ops::Range;

use self::tokens::{matches_at, tokenize, Break, Token};
use crate::{
    error::{AppError, AppResult},
    models::{Filters, QueryIntent, TitleId, Tone},
    services::providers::MetadataStore,
};

pub use tone::{KeywordToneClassifier, ToneClassifier};

const MAX_THEMES: usize = 5;
const MAX_THEME_WORDS: usize = 3;
const MAX_TITLE_TOKENS: usize = 8;
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Words trimmed from the edges of semantic query segments
const DANGLING_CONNECTORS: &[&str] = &[
    "with", "and", "or", "but", "nor", "that", "which", "plus", "while", "so", "yet", "like", "as",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Desired,
    ReferenceMarker,
    Reference,
    NegationMarker,
    Negated,
    Constraint,
}

#[derive(Debug, Clone)]
struct ReferencePhrase {
    text: String,
    /// Typed with a leading capital, so a looser match is acceptable
    capitalized: bool,
}

struct ParsedQuery {
    intent: QueryIntent,
    references: Vec<ReferencePhrase>,
}

pub struct IntentExtractor {
    tone_classifier: Box<dyn ToneClassifier>,
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentExtractor {
    pub fn new() -> Self {
        Self::with_tone_classifier(KeywordToneClassifier)
    }

    pub fn with_tone_classifier(classifier: impl ToneClassifier + 'static) -> Self {
        Self {
            tone_classifier: Box::new(classifier),
        }
    }

    /// Extracts intent and resolves reference titles against the catalog
    ///
    /// References that are missing, ambiguous, or whose lookup fails are dropped.
    pub async fn extract(
        &self,
        raw_query: &str,
        explicit_filters: Option<Filters>,
        titles: &dyn MetadataStore,
    ) -> AppResult<QueryIntent> {
        let ParsedQuery {
            mut intent,
            references,
        } = self.parse_query(raw_query, explicit_filters)?;

        intent.reference_titles.clear();
        for phrase in references {
            let candidates = match titles.titles_matching(&phrase.text).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(error = %e, reference = %phrase.text, "Reference title lookup failed");
                    continue;
                }
            };

            match match_reference(&phrase.text, &candidates, phrase.capitalized) {
                Some((id, title)) => {
                    if !intent.reference_ids.contains(&id) {
                        intent.reference_ids.push(id);
                        intent.reference_titles.push(title);
                    }
                }
                None => tracing::debug!(
                    reference = %phrase.text,
                    candidates = candidates.len(),
                    "Dropping unresolved reference title"
                ),
            }
        }

        tracing::info!(
            genres = intent.genres.len(),
            undesired_genres = intent.undesired_genres.len(),
            tones = intent.tones.len(),
            references = intent.reference_titles.len(),
            themes = intent.themes.len(),
            "Intent extracted"
        );

        Ok(intent)
    }

    /// Parses the query without consulting the catalog
    ///
    /// `reference_titles` holds the phrases as typed.
    pub fn parse(&self, raw_query: &str, explicit_filters: Option<Filters>) -> AppResult<QueryIntent> {
        Ok(self.parse_query(raw_query, explicit_filters)?.intent)
    }

    fn parse_query(
        &self,
        raw_query: &str,
        explicit_filters: Option<Filters>,
    ) -> AppResult<ParsedQuery> {
        let trimmed = raw_query.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidQuery("query is empty".to_string()));
        }

        let tokens = tokenize(trimmed);
        let mut roles = vec![Role::Desired; tokens.len()];

        // 1. Reference titles, negated clauses, then year constraints
        let references = mark_references(&tokens, &mut roles);
        let clauses = mark_negations(&tokens, &mut roles);
        let (implied_min, implied_max) = mark_years(&tokens, &mut roles);

        // 2. Desired genres and tones
        let desired = |i: usize| roles[i] == Role::Desired;
        let mut genres: BTreeSet<String> = lexicon::genres_in(&tokens, desired)
            .into_iter()
            .map(String::from)
            .collect();
        let desired_tokens: Vec<&Token> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| desired(*i))
            .map(|(_, t)| t)
            .collect();
        let mut tones = self.tone_classifier.classify(&tokens::join(&desired_tokens));

        // 3. Undesired attributes from each negated clause
        let mut undesired_genres = BTreeSet::new();
        let mut undesired_tones = BTreeSet::new();
        let mut undesired_themes: Vec<String> = Vec::new();
        for clause in &clauses {
            let slice = &tokens[clause.clone()];
            undesired_genres.extend(lexicon::genres_in(slice, |_| true).into_iter().map(String::from));

            let clause_tokens: Vec<&Token> = slice.iter().collect();
            undesired_tones.extend(self.tone_classifier.classify(&tokens::join(&clause_tokens)));

            let phrase = clause_phrase(slice);
            if !phrase.is_empty() && !undesired_themes.contains(&phrase) {
                undesired_themes.push(phrase);
            }
        }

        let mut themes = extract_themes(&tokens, &roles);
        themes.retain(|theme| !undesired_themes.contains(theme));

        // 4. Explicit filter genres; explicit requirements beat text negation
        if let Some(filters) = &explicit_filters {
            let required: BTreeSet<String> =
                filters.genres.iter().map(|g| lexicon::canonical_genre(g)).collect();
            undesired_genres.extend(filters.exclude_genres.iter().map(|g| lexicon::canonical_genre(g)));
            undesired_genres.retain(|g| !required.contains(g));
            genres.extend(required);
        }
        genres.retain(|g| !undesired_genres.contains(g));
        tones.retain(|t| !undesired_tones.contains(t));

        // 5. Implied years fill bounds the caller left open
        let mut filters = explicit_filters;
        if implied_min.is_some() || implied_max.is_some() {
            let mut merged = filters.clone().unwrap_or_default();
            if merged.fill_years(implied_min, implied_max) {
                filters = Some(merged);
            } else {
                tracing::debug!(
                    implied_min = ?implied_min,
                    implied_max = ?implied_max,
                    "Ignoring implied years that conflict with explicit filters"
                );
            }
        }

        let semantic_query = compose_semantic_query(&tokens, &roles, &themes, &tones, &genres)
            .unwrap_or_else(|| trimmed.to_string());

        let intent = QueryIntent {
            raw_query: raw_query.to_string(),
            semantic_query,
            genres,
            undesired_genres,
            tones,
            undesired_tones,
            reference_titles: references.iter().map(|r| r.text.clone()).collect(),
            reference_ids: Vec::new(),
            themes,
            undesired_themes,
            explicit_filters: filters,
        };

        Ok(ParsedQuery { intent, references })
    }
}

/// Marks "like X" style references and returns the captured title phrases
fn mark_references(tokens: &[Token], roles: &mut [Role]) -> Vec<ReferencePhrase> {
    let mut references = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let marker_len = lexicon::REFERENCE_MARKERS
            .iter()
            .find_map(|marker| matches_at(tokens, i, marker));
        let Some(len) = marker_len else {
            i += 1;
            continue;
        };

        let marker_end = i + len;
        if tokens[marker_end - 1].brk != Break::None {
            i = marker_end;
            continue;
        }

        let mut resume = marker_end;
        for span in capture_titles(tokens, marker_end) {
            let slice = &tokens[span.clone()];
            // "like dark comedies" names attributes, not a title
            let descriptive = slice.iter().all(|t| {
                lexicon::is_stop_word(&t.norm)
                    || lexicon::is_media_word(&t.norm)
                    || lexicon::is_keyword_token(t)
            });
            if descriptive {
                continue;
            }

            let phrase_tokens: Vec<&Token> = slice.iter().collect();
            references.push(ReferencePhrase {
                text: tokens::join(&phrase_tokens),
                capitalized: slice[0].is_capitalized(),
            });
            roles[span.clone()].fill(Role::Reference);
            roles[i..marker_end].fill(Role::ReferenceMarker);
            resume = span.end;
        }
        i = resume.max(marker_end);
    }

    references
}

/// Title spans following a reference marker
///
/// A capitalised first word switches to title-case reading, where lowercase
/// connectors are kept between capitalised words. Otherwise the title runs until a
/// stop word. "and", "or" and commas separate titles.
fn capture_titles(tokens: &[Token], start: usize) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let Some(first) = tokens.get(start) else {
        return spans;
    };
    let title_case = first.is_capitalized();

    let close = |spans: &mut Vec<Range<usize>>, from: usize, mut to: usize| {
        while to > from {
            let norm = tokens[to - 1].norm.as_str();
            let dangling = if title_case {
                lexicon::TITLE_CONNECTORS.contains(&norm)
            } else {
                matches!(norm, "the" | "a" | "an")
            };
            if !dangling {
                break;
            }
            to -= 1;
        }
        if to > from {
            spans.push(from..to);
        }
    };

    let mut span_start = start;
    let mut i = start;
    while i < tokens.len() && i - span_start < MAX_TITLE_TOKENS {
        let token = &tokens[i];
        let next_capitalized = tokens
            .get(i + 1)
            .map(|t| t.is_capitalized())
            .unwrap_or(false);
        let at_span_start = i == span_start;

        if matches!(token.norm.as_str(), "and" | "or") && !at_span_start {
            if title_case && !next_capitalized {
                break;
            }
            close(&mut spans, span_start, i);
            i += 1;
            span_start = i;
            continue;
        }

        let accept = if title_case {
            if at_span_start {
                token.is_capitalized()
            } else if lexicon::is_negation_marker(&token.norm) {
                false
            } else {
                token.is_capitalized()
                    || (lexicon::TITLE_CONNECTORS.contains(&token.norm.as_str()) && next_capitalized)
            }
        } else if at_span_start && matches!(token.norm.as_str(), "the" | "a" | "an") {
            true
        } else {
            !(lexicon::is_stop_word(&token.norm)
                || lexicon::is_negation_marker(&token.norm)
                || lexicon::is_media_word(&token.norm)
                || token.is_numeric())
        };
        if !accept {
            break;
        }

        i += 1;
        match token.brk {
            Break::None => {}
            Break::Comma => {
                close(&mut spans, span_start, i);
                span_start = i;
            }
            Break::Stop => break,
        }
    }
    close(&mut spans, span_start, i);

    spans
}

/// Marks negation markers and the clause each one governs
///
/// A clause runs from the marker to the next conjunction, negation or punctuation.
/// "or"/"nor" straight after a clause carry the negation into the next one.
fn mark_negations(tokens: &[Token], roles: &mut [Role]) -> Vec<Range<usize>> {
    let mut clauses = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if roles[i] != Role::Desired || !lexicon::is_negation_marker(&tokens[i].norm) {
            i += 1;
            continue;
        }

        let mut marker = i;
        i += 1;
        while let Some(clause) = negated_clause(tokens, roles, marker) {
            roles[marker..clause.start].fill(Role::NegationMarker);
            roles[clause.clone()].fill(Role::Negated);
            i = clause.end;

            let continues = tokens
                .get(clause.end)
                .map(|t| lexicon::NEGATION_CONTINUERS.contains(&t.norm.as_str()))
                .unwrap_or(false)
                && tokens[clause.end - 1].brk == Break::None;
            let next_marker = clause.end;
            clauses.push(clause);

            if !continues {
                break;
            }
            marker = next_marker;
        }
    }

    clauses
}

fn negated_clause(tokens: &[Token], roles: &[Role], marker: usize) -> Option<Range<usize>> {
    if tokens[marker].brk != Break::None {
        return None;
    }

    let mut start = marker + 1;
    while start < tokens.len()
        && roles[start] == Role::Desired
        && lexicon::CLAUSE_FILLERS.contains(&tokens[start].norm.as_str())
        && tokens[start].brk == Break::None
    {
        start += 1;
    }

    let mut end = start;
    while end < tokens.len() {
        let token = &tokens[end];
        if roles[end] != Role::Desired
            || lexicon::CLAUSE_ENDERS.contains(&token.norm.as_str())
            || lexicon::is_negation_marker(&token.norm)
        {
            break;
        }
        end += 1;
        if token.brk != Break::None {
            break;
        }
    }

    (end > start).then_some(start..end)
}

fn parse_year(text: &str) -> Option<i32> {
    text.parse::<i32>()
        .ok()
        .filter(|year| (MIN_YEAR..=MAX_YEAR).contains(year))
}

/// "1990-1999"
fn parse_year_range(text: &str) -> Option<(i32, i32)> {
    let (lo, hi) = text.split_once('-')?;
    let (lo, hi) = (parse_year(lo)?, parse_year(hi)?);
    (lo <= hi).then_some((lo, hi))
}

/// "90s", "1990s", "80's"
fn parse_decade(text: &str) -> Option<(i32, i32)> {
    let digits = text.strip_suffix("'s").or_else(|| text.strip_suffix('s'))?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let start = match digits.len() {
        2 => {
            let short: i32 = digits.parse().ok()?;
            if short < 30 {
                2000 + short
            } else {
                1900 + short
            }
        }
        4 => parse_year(digits)?,
        _ => return None,
    };

    (start % 10 == 0).then_some((start, start + 9))
}

/// Consumes year phrases and returns the implied (min, max) bounds
fn mark_years(tokens: &[Token], roles: &mut [Role]) -> (Option<i32>, Option<i32>) {
    let mut min_year = None;
    let mut max_year = None;
    let mut i = 0;

    while i < tokens.len() {
        if roles[i] != Role::Desired {
            i += 1;
            continue;
        }
        let token = &tokens[i];

        if let Some((lo, hi)) = parse_year_range(&token.norm) {
            min_year = Some(lo);
            max_year = Some(hi);
            roles[i] = Role::Constraint;
            i += 1;
            continue;
        }

        // A decade only bounds release years when it qualifies the titles themselves
        if let Some((lo, hi)) = parse_decade(&token.norm) {
            if let Some(from) = decade_release_span(tokens, i) {
                min_year = Some(lo);
                max_year = Some(hi);
                roles[from..=i].fill(Role::Constraint);
            }
            i += 1;
            continue;
        }

        let year_at = |j: usize| -> Option<i32> {
            if j < tokens.len() && roles[j] == Role::Desired && tokens[j - 1].brk == Break::None {
                parse_year(&tokens[j].norm)
            } else {
                None
            }
        };

        let consumed = match (token.norm.as_str(), year_at(i + 1)) {
            ("from" | "since", Some(year)) => {
                min_year = Some(year);
                2
            }
            ("after", Some(year)) => {
                min_year = Some(year + 1);
                2
            }
            ("before", Some(year)) => {
                max_year = Some(year - 1);
                2
            }
            ("until" | "till" | "through", Some(year)) => {
                max_year = Some(year);
                2
            }
            ("in", Some(year)) if follows_release_word(tokens, i) => {
                min_year = Some(year);
                max_year = Some(year);
                2
            }
            ("between", Some(lo)) => {
                let and = tokens.get(i + 2).map(|t| t.norm == "and").unwrap_or(false);
                match (and, year_at(i + 3)) {
                    (true, Some(hi)) if lo <= hi => {
                        min_year = Some(lo);
                        max_year = Some(hi);
                        4
                    }
                    _ => 0,
                }
            }
            _ => 0,
        };

        if consumed > 0 {
            roles[i..i + consumed].fill(Role::Constraint);
            i += consumed;
        } else {
            i += 1;
        }
    }

    (min_year, max_year)
}

/// "released in 1999", "movies in 1999"; not "set in 1969"
fn follows_release_word(tokens: &[Token], at: usize) -> bool {
    at > 0 && {
        let prev = &tokens[at - 1];
        prev.brk == Break::None
            && (lexicon::is_media_word(&prev.norm) || lexicon::RELEASE_WORDS.contains(&prev.norm.as_str()))
    }
}

/// Start of the phrase that makes the decade at `at` a release constraint, if any
///
/// "90s thrillers", "80s movies", "movies from the 90s" and "released in the 70s"
/// qualify; "set in the 1920s" and "about the 80s music scene" describe a topic.
fn decade_release_span(tokens: &[Token], at: usize) -> Option<usize> {
    let mut prev = at.checked_sub(1);
    while let Some(p) = prev {
        if tokens[p].norm != "the" || tokens[p].brk != Break::None {
            break;
        }
        prev = p.checked_sub(1);
    }

    if let Some(p) = prev.filter(|&p| tokens[p].brk == Break::None) {
        match tokens[p].norm.as_str() {
            "from" | "since" => return Some(p),
            "in" | "during" => return follows_release_word(tokens, p).then_some(p),
            word if lexicon::TOPIC_CUES.contains(&word) => return None,
            _ => {}
        }
    }

    let mut j = at;
    while j + 1 < tokens.len() && j < at + 3 && tokens[j].brk == Break::None {
        j += 1;
        if lexicon::is_media_word(&tokens[j].norm) || (j == at + 1 && lexicon::is_keyword_token(&tokens[j])) {
            return Some(at);
        }
    }
    None
}

fn is_theme_word(token: &Token) -> bool {
    !lexicon::is_stop_word(&token.norm)
        && !lexicon::is_media_word(&token.norm)
        && !lexicon::is_negation_marker(&token.norm)
        && !lexicon::is_keyword_token(token)
        && (!token.is_numeric() || parse_year(&token.norm).is_some())
        && token.norm.chars().count() > 2
}

/// Runs of content words in the desired part of the query
fn extract_themes(tokens: &[Token], roles: &[Role]) -> Vec<String> {
    let mut themes: Vec<String> = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    let flush = |run: &mut Vec<&str>, themes: &mut Vec<String>| {
        if !run.is_empty() {
            let phrase = run.join(" ");
            if !themes.contains(&phrase) {
                themes.push(phrase);
            }
            run.clear();
        }
    };

    for (i, token) in tokens.iter().enumerate() {
        if roles[i] == Role::Desired && is_theme_word(token) {
            run.push(&token.norm);
            if token.brk != Break::None || run.len() == MAX_THEME_WORDS {
                flush(&mut run, &mut themes);
            }
        } else {
            flush(&mut run, &mut themes);
        }
    }
    flush(&mut run, &mut themes);

    themes.truncate(MAX_THEMES);
    themes
}

fn clause_phrase(clause: &[Token]) -> String {
    clause
        .iter()
        .filter(|t| !lexicon::is_stop_word(&t.norm))
        .map(|t| t.norm.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Query text with negated clauses and year phrases removed, followed by the
/// extracted themes, tones and genres
///
/// Returns `None` when nothing usable remains.
fn compose_semantic_query(
    tokens: &[Token],
    roles: &[Role],
    themes: &[String],
    tones: &[Tone],
    genres: &BTreeSet<String>,
) -> Option<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut current: Vec<&Token> = Vec::new();

    let flush = |current: &mut Vec<&Token>, segments: &mut Vec<String>| {
        let is_dangling = |t: &&Token| DANGLING_CONNECTORS.contains(&t.norm.as_str());
        let start = current.iter().position(|t| !is_dangling(t));
        let end = current.iter().rposition(|t| !is_dangling(t));
        if let (Some(start), Some(end)) = (start, end) {
            segments.push(tokens::join(&current[start..=end]));
        }
        current.clear();
    };

    for (i, token) in tokens.iter().enumerate() {
        match roles[i] {
            Role::Negated | Role::NegationMarker | Role::Constraint => {
                flush(&mut current, &mut segments)
            }
            Role::Desired | Role::Reference | Role::ReferenceMarker => current.push(token),
        }
    }
    flush(&mut current, &mut segments);

    let mut parts = Vec::new();
    let base = segments.join(", ");
    if !base.is_empty() {
        parts.push(base);
    }
    if !themes.is_empty() {
        parts.push(format!("Themes: {}", themes.join(", ")));
    }
    if !tones.is_empty() {
        let names: Vec<&str> = tones.iter().map(|t| t.as_str()).collect();
        parts.push(format!("Tone: {}", names.join(", ")));
    }
    if !genres.is_empty() {
        let names: Vec<&str> = genres.iter().map(String::as_str).collect();
        parts.push(format!("Genres: {}", names.join(", ")));
    }

    (!parts.is_empty()).then(|| parts.join(". "))
}

/// Lowercase alphanumerics and single spaces, without a leading article
fn simplify_title(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let words = match words.first() {
        Some(&"the") if words.len() > 1 => &words[1..],
        _ => &words[..],
    };
    words.join(" ")
}

/// Resolves a typed reference against catalog candidates
///
/// Tries an exact match (first one wins), then the unique closest title within an
/// edit distance of a fifth of the phrase length, then, for capitalised phrases, a
/// unique whole-word substring match.
fn match_reference(
    phrase: &str,
    candidates: &[(TitleId, String)],
    allow_substring: bool,
) -> Option<(TitleId, String)> {
    let needle = simplify_title(phrase);
    if needle.is_empty() {
        return None;
    }
    let simplified: Vec<String> = candidates
        .iter()
        .map(|(_, title)| simplify_title(title))
        .collect();

    if let Some(pos) = simplified.iter().position(|title| *title == needle) {
        return Some(candidates[pos].clone());
    }

    let max_distance = (needle.chars().count() / 5).max(1);
    let distances: Vec<usize> = simplified
        .iter()
        .map(|title| strsim::levenshtein(&needle, title))
        .collect();
    if let Some(best) = distances.iter().copied().filter(|d| *d <= max_distance).min() {
        let closest: Vec<usize> = (0..candidates.len())
            .filter(|&i| distances[i] == best)
            .collect();
        if let [only] = closest[..] {
            return Some(candidates[only].clone());
        }
        return None;
    }

    if allow_substring {
        let padded = format!(" {} ", needle);
        let containing: Vec<usize> = (0..candidates.len())
            .filter(|&i| format!(" {} ", simplified[i]).contains(&padded))
            .collect();
        if let [only] = containing[..] {
            return Some(candidates[only].clone());
        }
    }

    None
}
