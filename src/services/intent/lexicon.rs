//! Static vocabulary for the rule-based intent parser

use super::tokens::{matches_at, Token};
use crate::models::Tone;

/// Canonical genre names, as stored in the catalog
pub const GENRES: &[&str] = &[
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "History",
    "Horror",
    "Music",
    "Mystery",
    "Romance",
    "Science Fiction",
    "Thriller",
    "War",
    "Western",
];

/// Keyword (singular, lowercase) to the genres it implies
pub const GENRE_KEYWORDS: &[(&str, &[&str])] = &[
    ("action", &["Action"]),
    ("action-packed", &["Action"]),
    ("martial arts", &["Action"]),
    ("adventure", &["Adventure"]),
    ("quest", &["Adventure"]),
    ("animation", &["Animation"]),
    ("animated", &["Animation"]),
    ("anime", &["Animation"]),
    ("cartoon", &["Animation"]),
    ("comedy", &["Comedy"]),
    ("comedic", &["Comedy"]),
    ("funny", &["Comedy"]),
    ("sitcom", &["Comedy"]),
    ("rom-com", &["Romance", "Comedy"]),
    ("romcom", &["Romance", "Comedy"]),
    ("dramedy", &["Comedy", "Drama"]),
    ("crime", &["Crime"]),
    ("heist", &["Crime"]),
    ("gangster", &["Crime"]),
    ("mafia", &["Crime"]),
    ("documentary", &["Documentary"]),
    ("docuseries", &["Documentary"]),
    ("drama", &["Drama"]),
    ("dramatic", &["Drama"]),
    ("family", &["Family"]),
    ("kid", &["Family"]),
    ("fantasy", &["Fantasy"]),
    ("magic", &["Fantasy"]),
    ("history", &["History"]),
    ("historical", &["History"]),
    ("period piece", &["History"]),
    ("horror", &["Horror"]),
    ("slasher", &["Horror"]),
    ("music", &["Music"]),
    ("musical", &["Music"]),
    ("mystery", &["Mystery"]),
    ("whodunit", &["Mystery"]),
    ("detective", &["Mystery"]),
    ("romance", &["Romance"]),
    ("romantic", &["Romance"]),
    ("love story", &["Romance"]),
    ("sci-fi", &["Science Fiction"]),
    ("scifi", &["Science Fiction"]),
    ("science fiction", &["Science Fiction"]),
    ("science-fiction", &["Science Fiction"]),
    ("space opera", &["Science Fiction"]),
    ("cyberpunk", &["Science Fiction"]),
    ("thriller", &["Thriller"]),
    ("suspense", &["Thriller"]),
    ("war", &["War"]),
    ("western", &["Western"]),
];

/// Keyword (singular, lowercase) to tone
pub const TONE_KEYWORDS: &[(&str, Tone)] = &[
    ("happy", Tone::Joy),
    ("joyful", Tone::Joy),
    ("feel-good", Tone::Joy),
    ("feel good", Tone::Joy),
    ("fun", Tone::Joy),
    ("funny", Tone::Joy),
    ("lighthearted", Tone::Joy),
    ("light-hearted", Tone::Joy),
    ("wholesome", Tone::Joy),
    ("cheerful", Tone::Joy),
    ("scary", Tone::Fear),
    ("terrifying", Tone::Fear),
    ("creepy", Tone::Fear),
    ("frightening", Tone::Fear),
    ("spooky", Tone::Fear),
    ("eerie", Tone::Fear),
    ("horror", Tone::Fear),
    ("sad", Tone::Sadness),
    ("heartbreaking", Tone::Sadness),
    ("tearjerker", Tone::Sadness),
    ("melancholy", Tone::Sadness),
    ("melancholic", Tone::Sadness),
    ("tragic", Tone::Sadness),
    ("depressing", Tone::Sadness),
    ("bittersweet", Tone::Sadness),
    ("epic", Tone::Awe),
    ("awe", Tone::Awe),
    ("awe-inspiring", Tone::Awe),
    ("breathtaking", Tone::Awe),
    ("mind-bending", Tone::Awe),
    ("mind-blowing", Tone::Awe),
    ("majestic", Tone::Awe),
    ("cosmic", Tone::Awe),
    ("visually stunning", Tone::Awe),
    ("thrilling", Tone::Thrill),
    ("intense", Tone::Thrill),
    ("suspenseful", Tone::Thrill),
    ("tense", Tone::Thrill),
    ("gripping", Tone::Thrill),
    ("exciting", Tone::Thrill),
    ("adrenaline", Tone::Thrill),
    ("edge of my seat", Tone::Thrill),
    ("edge-of-your-seat", Tone::Thrill),
    ("hopeful", Tone::Hope),
    ("uplifting", Tone::Hope),
    ("inspiring", Tone::Hope),
    ("inspirational", Tone::Hope),
    ("optimistic", Tone::Hope),
    ("heartwarming", Tone::Hope),
    ("dark", Tone::Dark),
    ("gritty", Tone::Dark),
    ("bleak", Tone::Dark),
    ("grim", Tone::Dark),
    ("noir", Tone::Dark),
    ("brooding", Tone::Dark),
    ("disturbing", Tone::Dark),
    ("sinister", Tone::Dark),
    ("twisted", Tone::Dark),
    ("romance", Tone::Romance),
    ("romantic", Tone::Romance),
    ("love story", Tone::Romance),
    ("swoon-worthy", Tone::Romance),
];

/// Phrases introducing reference titles ("like X", "similar to X")
pub const REFERENCE_MARKERS: &[&str] = &[
    "in the vein of",
    "in the style of",
    "along the lines of",
    "the likes of",
    "reminiscent of",
    "similar to",
    "comparable to",
    "inspired by",
    "such as",
    "same vibe as",
    "like",
];

/// Words that negate the clause that follows
pub const NEGATION_MARKERS: &[&str] = &[
    "less",
    "fewer",
    "no",
    "not",
    "without",
    "avoid",
    "avoiding",
    "minus",
    "skip",
    "except",
    "excluding",
    "don't",
    "dont",
    "never",
];

/// Words that end a negated clause
pub const CLAUSE_ENDERS: &[&str] = &[
    "and", "but", "with", "yet", "plus", "while", "though", "although", "then", "so", "because",
    "that", "which", "who", "where", "like", "from", "since", "after", "before", "until", "in",
    "set", "or", "nor",
];

/// Coordinators that carry a negation into the next clause ("no gore or jump scares")
pub const NEGATION_CONTINUERS: &[&str] = &["or", "nor"];

/// Words skipped at the start of a negated clause
pub const CLAUSE_FILLERS: &[&str] = &[
    "the", "a", "an", "any", "too", "much", "many", "so", "very", "of", "more", "want", "need",
    "like", "as",
];

/// Lowercase words allowed inside a capitalised title ("Once Upon a Time in Hollywood")
pub const TITLE_CONNECTORS: &[&str] = &[
    "of", "the", "a", "an", "in", "on", "at", "to", "for", "from", "with", "and", "or", "vs",
];

pub const MEDIA_WORDS: &[&str] = &[
    "movie", "movies", "film", "films", "flick", "flicks", "show", "shows", "series", "tv",
    "cinema", "season", "seasons", "episode", "episodes", "title", "titles", "miniseries",
];

/// Words after which "in YYYY" or a decade refers to release dates
pub const RELEASE_WORDS: &[&str] = &["released", "release", "made", "out", "premiered", "aired"];

/// Words after which a year or decade describes what the title is about
pub const TOPIC_CUES: &[&str] = &["about", "set", "of", "on", "around", "depicting"];

pub const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "nor", "with", "without", "of", "in", "on", "at", "to",
    "for", "from", "by", "about", "into", "over", "under", "within", "between", "before", "after",
    "since", "until", "than", "then", "as", "i", "i'm", "i'd", "me", "my", "we", "us", "our",
    "you", "your", "it", "it's", "its", "is", "are", "was", "were", "be", "been", "being", "has",
    "have", "had", "do", "does", "did", "not", "no", "very", "really", "more", "less", "most",
    "least", "much", "many", "so", "too", "like", "similar", "such", "some", "any", "something",
    "anything", "that", "this", "these", "those", "which", "who", "whom", "where", "when", "what",
    "want", "wanted", "looking", "look", "find", "show", "recommend", "watch", "watching", "good",
    "great", "nice", "kind", "sort", "type", "lot", "lots", "bit", "little", "just", "also",
    "all", "set", "while", "though", "please", "can", "could", "would", "should", "will", "need",
    "give", "get", "feel", "feeling", "vibe", "vibes", "style", "stuff", "one", "ones", "plus",
    "minus", "avoid", "fewer", "other", "same", "there", "here", "where", "maybe", "tonight",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

pub fn is_media_word(word: &str) -> bool {
    MEDIA_WORDS.contains(&word)
}

pub fn is_negation_marker(word: &str) -> bool {
    NEGATION_MARKERS.contains(&word)
}

/// True when the token is part of any genre or tone keyword
pub fn is_keyword_token(token: &Token) -> bool {
    let parts = GENRE_KEYWORDS
        .iter()
        .map(|(key, _)| *key)
        .chain(TONE_KEYWORDS.iter().map(|(key, _)| *key));

    for key in parts {
        if key
            .split(' ')
            .any(|part| part == token.norm || part == token.stem)
        {
            return true;
        }
    }
    false
}

/// Maps a user-supplied genre name onto the catalog spelling when it is known
pub fn canonical_genre(name: &str) -> String {
    let trimmed = name.trim();
    GENRES
        .iter()
        .find(|genre| genre.eq_ignore_ascii_case(trimmed))
        .map(|genre| genre.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Scans tokens for table keys, trying longer keys first at each position
///
/// `include` selects which token positions may take part in a match. Values are
/// returned in order of first appearance without duplicates.
pub fn scan<V: Copy + PartialEq>(
    tokens: &[Token],
    table: &[(&str, V)],
    include: impl Fn(usize) -> bool,
) -> Vec<V> {
    let mut keys: Vec<&(&str, V)> = table.iter().collect();
    keys.sort_by_key(|(key, _)| std::cmp::Reverse(key.split(' ').count()));

    let mut found = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let mut advanced = 1;
        if include(i) {
            for (key, value) in &keys {
                if let Some(len) = matches_at(tokens, i, key) {
                    if (i..i + len).all(&include) {
                        if !found.contains(value) {
                            found.push(*value);
                        }
                        advanced = len;
                        break;
                    }
                }
            }
        }
        i += advanced;
    }
    found
}

/// Genres named in the selected tokens, in order of first mention
pub fn genres_in(tokens: &[Token], include: impl Fn(usize) -> bool) -> Vec<&'static str> {
    let mut genres = Vec::new();
    for group in scan(tokens, GENRE_KEYWORDS, include) {
        for genre in group.iter() {
            if !genres.contains(genre) {
                genres.push(*genre);
            }
        }
    }
    genres
}

/// Tones named in the selected tokens, in order of first mention
pub fn tones_in(tokens: &[Token], include: impl Fn(usize) -> bool) -> Vec<Tone> {
    scan(tokens, TONE_KEYWORDS, include)
}
