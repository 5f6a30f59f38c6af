/// Punctuation that follows a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Break {
    None,
    /// `,`
    Comma,
    /// `.`, `;`, `:`, `!`, `?`
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Text as typed
    pub text: String,
    /// Lowercased text
    pub norm: String,
    /// Singular form of `norm` ("comedies" -> "comedy")
    pub stem: String,
    pub brk: Break,
}

impl Token {
    pub fn is_capitalized(&self) -> bool {
        self.text
            .chars()
            .next()
            .map(|c| c.is_uppercase() || c.is_ascii_digit())
            .unwrap_or(false)
    }

    pub fn is_numeric(&self) -> bool {
        self.norm.chars().all(|c| c.is_ascii_digit() || c == '-')
    }
}

/// Splits a query into word tokens
///
/// Apostrophes and inner hyphens stay inside words ("sci-fi", "don't"); other
/// punctuation is dropped, but commas and sentence stops are recorded on the
/// preceding token since they bound titles and negated clauses.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() || c == '\'' || c == '’' || c == '-' {
            current.push(if c == '’' { '\'' } else { c });
            continue;
        }

        flush(&mut current, &mut tokens);
        let brk = match c {
            ',' => Break::Comma,
            '.' | ';' | ':' | '!' | '?' => Break::Stop,
            _ => continue,
        };
        if let Some(last) = tokens.last_mut() {
            // A stop outranks a comma
            if last.brk != Break::Stop {
                last.brk = brk;
            }
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<Token>) {
    let word = current.trim_matches(|c: char| c == '-' || c == '\'');
    if !word.is_empty() {
        let norm = word.to_lowercase();
        tokens.push(Token {
            text: word.to_string(),
            stem: singular(&norm),
            norm,
            brk: Break::None,
        });
    }
    current.clear();
}

fn singular(word: &str) -> String {
    if word.len() > 4 {
        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{}y", stem);
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("'s") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Rebuilds readable text from tokens, keeping recorded punctuation
pub fn join(tokens: &[&Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&token.text);
        if i + 1 < tokens.len() {
            match token.brk {
                Break::Comma => out.push(','),
                Break::Stop => out.push('.'),
                Break::None => {}
            }
        }
    }
    out
}

/// Finds `phrase` (space-separated, lowercase) as a run of tokens starting at `start`
///
/// A token matches a phrase word by its lowercase or singular form.
pub fn matches_at(tokens: &[Token], start: usize, phrase: &str) -> Option<usize> {
    let mut len = 0;
    for (offset, part) in phrase.split(' ').enumerate() {
        let token = tokens.get(start + offset)?;
        if token.norm != part && token.stem != part {
            return None;
        }
        // Multi-word phrases do not span punctuation
        if offset > 0 && tokens[start + offset - 1].brk != Break::None {
            return None;
        }
        len += 1;
    }
    Some(len)
}
