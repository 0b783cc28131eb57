//! Optional curated question/answer file consulted for informational messages.
//!
//! The file is a JSON array of entries. It is re-read at most once per [`RELOAD_INTERVAL_SECS`];
//! a missing or malformed file behaves as an empty knowledge base.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use aquabot_core::clock::Clock;
use aquabot_core::config::KnowledgeConfig;
use aquabot_core::text::{content_tokens, normalize};

pub const RELOAD_INTERVAL_SECS: i64 = 60;
const TOKEN_POINTS: u32 = 2;

/// Words that mark a message as a question about the company rather than a product request.
const INFO_HINTS: &[&str] = &[
    "aqua",
    "aquaintegral",
    "empresa",
    "quienes",
    "quien",
    "servicio",
    "servicios",
    "linea",
    "lineas",
    "catalogo",
    "portafolio",
    "pagina",
    "web",
    "sitio",
    "enlace",
    "ubicacion",
    "direccion",
    "horario",
    "horas",
    "atencion",
    "pago",
    "pagos",
    "tarjeta",
    "addi",
    "envio",
    "envios",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub include_answer_in_match: bool,
}

impl KnowledgeEntry {
    fn match_tokens(&self) -> HashSet<String> {
        let mut tokens: HashSet<String> = content_tokens(&self.question).into_iter().collect();
        tokens.extend(content_tokens(&self.tags.join(" ")));
        if self.include_answer_in_match {
            tokens.extend(content_tokens(&self.answer));
        }
        tokens
    }

    pub fn score(&self, query_tokens: &[String]) -> u32 {
        let entry_tokens = self.match_tokens();
        let matches = query_tokens.iter().filter(|token| entry_tokens.contains(*token)).count();
        TOKEN_POINTS * matches as u32
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeAnswer {
    pub answer: String,
    pub entry_id: String,
    pub score: u32,
}

#[derive(Default)]
struct LoadedEntries {
    entries: Arc<Vec<KnowledgeEntry>>,
    loaded_at: Option<DateTime<Utc>>,
}

pub struct KnowledgeBase {
    path: Option<PathBuf>,
    min_score: u32,
    require_verified: bool,
    clock: Arc<dyn Clock>,
    loaded: Mutex<LoadedEntries>,
}

/// Entries of a knowledge file: a JSON array of objects.
pub fn parse_entries(raw: &str) -> Result<Vec<KnowledgeEntry>, serde_json::Error> {
    serde_json::from_str(raw)
}

pub fn should_attempt_knowledge(text: &str) -> bool {
    let normalized = normalize(text);
    !normalized.is_empty() && INFO_HINTS.iter().any(|hint| normalized.contains(hint))
}

impl KnowledgeBase {
    pub fn new(config: &KnowledgeConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: config.path.clone(),
            min_score: config.min_score,
            require_verified: config.require_verified,
            clock,
            loaded: Mutex::new(LoadedEntries::default()),
        }
    }

    async fn entries(&self) -> Arc<Vec<KnowledgeEntry>> {
        let now = self.clock.now();
        let mut loaded = self.loaded.lock().await;
        let fresh = loaded
            .loaded_at
            .is_some_and(|at| now - at < Duration::seconds(RELOAD_INTERVAL_SECS));
        if !fresh {
            loaded.entries = Arc::new(self.read_file().await);
            loaded.loaded_at = Some(now);
        }
        loaded.entries.clone()
    }

    async fn read_file(&self) -> Vec<KnowledgeEntry> {
        let Some(path) = self.path.as_ref() else {
            return Vec::new();
        };
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(error) => {
                debug!(
                    event_name = "knowledge.unavailable",
                    path = %path.display(),
                    error = %error,
                    "knowledge base file not readable"
                );
                return Vec::new();
            }
        };
        match parse_entries(&raw) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(
                    event_name = "knowledge.malformed",
                    path = %path.display(),
                    error = %error,
                    "knowledge base file is not a JSON array of entries"
                );
                Vec::new()
            }
        }
    }

    /// Best-scoring entry for `text`, if it clears the configured threshold.
    pub async fn find_answer(&self, text: &str) -> Option<KnowledgeAnswer> {
        let query_tokens = content_tokens(text);
        if query_tokens.is_empty() {
            return None;
        }

        let entries = self.entries().await;
        let mut best: Option<KnowledgeAnswer> = None;
        for entry in entries.iter() {
            if self.require_verified && !entry.verified {
                continue;
            }
            let score = entry.score(&query_tokens);
            if score == 0 || best.as_ref().is_some_and(|current| score <= current.score) {
                continue;
            }
            best = Some(KnowledgeAnswer {
                answer: entry.answer.trim().to_string(),
                entry_id: entry.id.clone(),
                score,
            });
        }

        best.filter(|answer| answer.score >= self.min_score && !answer.answer.is_empty())
    }
}
