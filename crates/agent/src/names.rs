//! Personal-name introductions ("me llamo Ana", "soy Juan Pérez").

use once_cell::sync::Lazy;
use regex::Regex;

use aquabot_core::text::normalize;

const NAME_CONNECTORS: &[&str] = &["de", "del", "la", "las", "los", "y"];
const NAME_REJECTED_FIRST_WORDS: &[&str] = &["de", "del", "desde"];
const MAX_NAME_WORDS: usize = 4;

const GREETING_ONLY: &[&str] = &[
    "hola",
    "buenas",
    "buen dia",
    "buenos dias",
    "buenas tardes",
    "buenas noches",
    "saludos",
    "que tal",
];

static NAME_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)(?:mi nombre es|me llamo)\s+([A-Za-zÁÉÍÓÚÜÑáéíóúüñ\-\s]{2,40})")
            .expect("name introduction pattern is valid"),
        Regex::new(r"(?i)\bsoy\s+([A-Za-zÁÉÍÓÚÜÑáéíóúüñ\-\s]{2,40})")
            .expect("soy pattern is valid"),
    ]
});

fn is_edge_punctuation(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, ',' | ';' | ':' | '-' | '.')
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedName {
    pub name: String,
    /// The message with the introduction removed.
    pub remainder: String,
}

/// First plausible personal name introduced in `text`.
pub fn extract_name(text: &str) -> Option<DetectedName> {
    for pattern in NAME_PATTERNS.iter() {
        let Some(captures) = pattern.captures(text) else {
            continue;
        };
        let (Some(whole), Some(raw_name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let raw_name = raw_name.as_str().trim_end_matches(is_edge_punctuation).trim();
        if !is_plausible_name(raw_name) {
            continue;
        }

        let remainder = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
        return Some(DetectedName {
            name: title_case_name(raw_name),
            remainder: remainder.trim_matches(is_edge_punctuation).to_string(),
        });
    }
    None
}

fn is_plausible_name(raw_name: &str) -> bool {
    if raw_name.is_empty() || raw_name.chars().any(|ch| ch.is_ascii_digit()) {
        return false;
    }
    let words: Vec<String> = raw_name.split_whitespace().map(str::to_lowercase).collect();
    let Some(first) = words.first() else {
        return false;
    };
    words.len() <= MAX_NAME_WORDS
        && !NAME_REJECTED_FIRST_WORDS.contains(&first.as_str())
        && !words.iter().all(|word| NAME_CONNECTORS.contains(&word.as_str()))
}

fn title_case_name(raw_name: &str) -> String {
    raw_name
        .split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            if NAME_CONNECTORS.contains(&lower.as_str()) {
                return lower;
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => lower,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when nothing but a salutation is left.
pub fn is_only_greeting(text: &str) -> bool {
    let normalized = normalize(text);
    normalized.is_empty() || GREETING_ONLY.contains(&normalized.as_str())
}
