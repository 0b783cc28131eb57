//! Text normalization shared by every matcher in the bot.
//!
//! All keyword rules operate on the output of [`normalize`]: lowercase ASCII, Spanish diacritics
//! folded (`á` → `a`, `ñ` → `n`), anything that is not a letter or digit replaced by a single space.

/// Minimum length of a token taking part in catalog search.
pub const MIN_TOKEN_LEN: usize = 3;

pub fn fold_diacritic(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

pub fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut pending_space = false;

    for character in text.chars().flat_map(char::to_lowercase) {
        let character = fold_diacritic(character);
        if character.is_ascii_alphanumeric() {
            if pending_space && !normalized.is_empty() {
                normalized.push(' ');
            }
            pending_space = false;
            normalized.push(character);
        } else {
            pending_space = true;
        }
    }

    normalized
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Removes markup tags from catalog descriptions before they are tokenized or shown.
pub fn strip_tags(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut inside_tag = false;
    for character in text.chars() {
        match character {
            '<' => inside_tag = true,
            '>' if inside_tag => {
                inside_tag = false;
                plain.push(' ');
            }
            _ if !inside_tag => plain.push(character),
            _ => {}
        }
    }
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Spanish function words that never carry meaning for matching.
pub const STOPWORDS: &[&str] = &[
    "a", "al", "algo", "alguien", "as", "con", "como", "cual", "cuando", "de", "del", "donde",
    "el", "ella", "ellos", "en", "es", "esta", "estoy", "fue", "ha", "hola", "las", "lo", "los",
    "la", "me", "mi", "mis", "necesito", "quiero", "que", "para", "por", "ser", "si", "sin", "su",
    "sus", "una", "un", "unos", "unas", "y", "o",
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Tokens of at least [`MIN_TOKEN_LEN`] characters with stopwords removed.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|token| !is_stopword(token)).collect()
}

/// Keeps only the digits of a phone number so every transport maps to the same session key.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
