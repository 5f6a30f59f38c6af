use super::{lexicon, tokens::tokenize};
use crate::models::Tone;

/// Strategy for reading tones out of query text
///
/// Implementations return tones in relevance order without duplicates.
pub trait ToneClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Vec<Tone>;
}

/// Keyword-table classifier; relevance is order of first mention
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordToneClassifier;

impl ToneClassifier for KeywordToneClassifier {
    fn classify(&self, text: &str) -> Vec<Tone> {
        let tokens = tokenize(text);
        lexicon::tones_in(&tokens, |_| true)
    }
}
