//! Free-text product search.
//!
//! Tiers, each tried only when the previous one found nothing:
//! 1. live catalog search over a queue of short phrases (planner output, line-hinted variants,
//!    keyword expansions), keeping only candidates that pass the [`TermFilter`];
//! 2. the local [`CatalogCache`] ranking, filtered the same way unless that would leave nothing;
//! 3. a fixed reply asking for more detail.
//!
//! Candidates may then be re-ranked by the reranker, which can also answer with a clarifying
//! question instead of products.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use aquabot_core::domain::assist::RerankCandidate;
use aquabot_core::domain::line::LineKey;
use aquabot_core::domain::product::{CatalogRecord, ProductId, ProductSummary};
use aquabot_core::format::format_cop;
use aquabot_core::playbook::WELCOME_MESSAGE;
use aquabot_core::ports::{CatalogSource, QueryPlanner, Reranker};
use aquabot_core::text::{is_stopword, normalize};
use aquabot_store::CatalogCache;

pub const SELECTED_LIMIT: usize = 3;
pub const POOL_LIMIT: usize = 12;
pub const MAX_PHRASES: usize = 12;
const MAX_PLANNED_QUERIES: usize = 5;
const LIVE_PAGE_SIZE: u32 = 15;
const LIVE_TARGET: usize = 5;
const CACHE_LIMIT: usize = 50;
const RERANK_LIMIT: usize = 30;
const SPECIFIC_TERM_MIN_LEN: usize = 5;

pub const RESULTS_INTRO: &str = "Encontré estas opciones relacionadas con tu solicitud:";
pub const MORE_RESULTS_INTRO: &str = "Con gusto. Aquí tienes más opciones del catálogo de Aqua:";
pub const CHOICE_INSTRUCTION: &str =
    "Respóndeme con el número (1, 2 o 3) o con el SKU para darte disponibilidad y cotización.";
pub const MORE_RESULTS_HINT: &str = "Si quieres ver más opciones, escribe \"más opciones\".";
pub const NO_RESULTS_REPLY: &str = "No encontré productos que coincidan con esa descripción.\n\
     Para ayudarte a cotizar: dime el tipo (ej. filtro de arena/cartucho/químico), \
     capacidad/tamaño y uso (hogar/industrial). Si tienes el SKU, envíamelo.";

const KEYWORD_EXPANSIONS: &[(&str, &[&str])] = &[
    ("filtr", &["filtro", "filtros", "filtracion"]),
    ("quim", &["cloro", "ph", "alguicida", "clarificador", "acidet"]),
    ("bomb", &["bomba", "bombas"]),
];

/// A concept named in the request. Candidates must mention at least one of its synonyms.
#[derive(Debug, PartialEq, Eq)]
pub struct TermGroup {
    pub name: &'static str,
    triggers: &'static [&'static str],
    synonyms: &'static [&'static str],
}

const TERM_GROUPS: &[TermGroup] = &[
    TermGroup {
        name: "bomba",
        triggers: &["bomba", "bombas", "bombeo", "motobomba", "motobombas", "electrobomba"],
        synonyms: &["bomba", "bombas", "motobomba", "motobombas", "electrobomba", "electrobombas"],
    },
    TermGroup {
        name: "piscina",
        triggers: &["piscina", "piscinas"],
        synonyms: &["piscina", "piscinas"],
    },
    TermGroup {
        name: "filtro",
        triggers: &["filtro", "filtros", "filtracion", "filtrar"],
        synonyms: &["filtro", "filtros", "filtracion", "filtrante", "cartucho", "cartuchos"],
    },
    TermGroup {
        name: "cloro",
        triggers: &["cloro", "clorador", "cloradores", "hipoclorito"],
        synonyms: &["cloro", "clorador", "cloradores", "hipoclorito", "tricloro", "dicloro"],
    },
    TermGroup {
        name: "calentador",
        triggers: &["calentador", "calentadores", "calefaccion", "climatizacion"],
        synonyms: &[
            "calentador",
            "calentadores",
            "calefaccion",
            "climatizacion",
            "intercambiador",
        ],
    },
    TermGroup {
        name: "valvula",
        triggers: &["valvula", "valvulas"],
        synonyms: &["valvula", "valvulas"],
    },
    TermGroup {
        name: "dosificador",
        triggers: &["dosificador", "dosificadora", "dosificadores"],
        synonyms: &["dosificador", "dosificadora", "dosificadores", "dosificacion"],
    },
];

/// Request words too generic to narrow a search.
const GENERIC_TERMS: &[&str] = &[
    "necesito",
    "quiero",
    "busco",
    "buscando",
    "producto",
    "productos",
    "equipo",
    "equipos",
    "precio",
    "precios",
    "cotizar",
    "cotizacion",
    "tienen",
    "tienes",
    "venden",
    "informacion",
    "favor",
    "gracias",
    "buenas",
    "buenos",
    "sistema",
    "sistemas",
    "opciones",
    "alguna",
    "alguno",
    "cuanto",
    "cuesta",
    "valor",
    "hogar",
    "industrial",
];

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("catalog unavailable: live search and local cache both failed: {0}")]
    CatalogUnavailable(String),
}

/// Required concepts and specific terms extracted from the caller's raw text.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TermFilter {
    groups: Vec<&'static TermGroup>,
    specific: Vec<String>,
}

impl TermFilter {
    pub fn from_query(raw: &str) -> Self {
        let normalized = normalize(raw);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        let groups: Vec<&'static TermGroup> = TERM_GROUPS
            .iter()
            .filter(|group| tokens.iter().any(|token| group.triggers.contains(token)))
            .collect();

        let mut seen = HashSet::new();
        let specific = tokens
            .iter()
            .filter(|token| token.len() >= SPECIFIC_TERM_MIN_LEN)
            .filter(|token| !token.chars().all(|ch| ch.is_ascii_digit()))
            .filter(|token| !is_stopword(token) && !GENERIC_TERMS.contains(*token))
            .filter(|token| {
                !TERM_GROUPS
                    .iter()
                    .any(|group| group.triggers.contains(*token) || group.synonyms.contains(*token))
            })
            .filter(|token| seen.insert(**token))
            .map(|token| token.to_string())
            .collect();

        Self { groups, specific }
    }

    pub fn required_groups(&self) -> Vec<&'static str> {
        self.groups.iter().map(|group| group.name).collect()
    }

    pub fn specific_terms(&self) -> &[String] {
        &self.specific
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.specific.is_empty()
    }

    pub fn accepts(&self, record: &CatalogRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        let normalized = normalize(&record.search_text());
        let words: HashSet<&str> = normalized.split_whitespace().collect();

        let groups_met = self
            .groups
            .iter()
            .all(|group| group.synonyms.iter().any(|synonym| words.contains(synonym)));
        let specific_met =
            self.specific.is_empty() || self.specific.iter().any(|term| words.contains(term.as_str()));
        groups_met && specific_met
    }

    /// Filtered records, or all of them when the filter would discard every one.
    pub fn apply_relaxed(&self, records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
        if !records.iter().any(|record| self.accepts(record)) {
            return records;
        }
        records.into_iter().filter(|record| self.accepts(record)).collect()
    }
}

/// Search phrases in query order: each planned query, its line-hinted variant, then keyword
/// expansions of the raw text. Case-insensitively unique, at most [`MAX_PHRASES`].
pub fn build_phrase_queue(queries: &[String], raw: &str, line_hint: Option<LineKey>) -> Vec<String> {
    let mut queue = Vec::new();
    for query in queries {
        queue.push(query.trim().to_string());
        if let Some(hint) = line_hint {
            queue.push(format!("{} {}", query.trim(), hint.as_str()));
        }
    }

    let normalized = normalize(raw);
    for (stem, phrases) in KEYWORD_EXPANSIONS {
        if normalized.contains(stem) {
            queue.extend(phrases.iter().map(|phrase| phrase.to_string()));
        }
    }

    let mut seen = HashSet::new();
    queue
        .into_iter()
        .filter(|phrase| !phrase.is_empty() && seen.insert(phrase.to_lowercase()))
        .take(MAX_PHRASES)
        .collect()
}

/// Numbered product list with the choice instruction.
pub fn format_products_reply(
    products: &[ProductSummary],
    intro: &str,
    show_more_hint: bool,
) -> String {
    let mut lines = vec![intro.to_string()];
    for (index, product) in products.iter().take(SELECTED_LIMIT).enumerate() {
        lines.push(format!(
            "{}) {} ({}) — precio: {} — {}",
            index + 1,
            product.name,
            product.sku_label(),
            format_cop(product.price),
            product.stock_descriptor(),
        ));
    }
    lines.push(CHOICE_INSTRUCTION.to_string());
    if show_more_hint {
        lines.push(MORE_RESULTS_HINT.to_string());
    }
    lines.join("\n")
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchOutcome {
    pub reply: String,
    pub selected: Vec<ProductSummary>,
    /// Merged ranked results, selected ones included.
    pub pool: Vec<ProductSummary>,
}

impl SearchOutcome {
    fn reply_only(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), selected: Vec::new(), pool: Vec::new() }
    }

    /// Pool entries not already shown, for "show more".
    pub fn remaining_pool(&self) -> Vec<ProductSummary> {
        self.pool
            .iter()
            .filter(|product| !self.selected.iter().any(|selected| selected.id == product.id))
            .cloned()
            .collect()
    }
}

enum RerankDecision {
    Pick(Vec<ProductSummary>),
    Ask(String),
    LocalOrder,
}

struct LiveResults {
    records: Vec<CatalogRecord>,
    all_failed: bool,
}

pub struct ProductSearch {
    source: Arc<dyn CatalogSource>,
    cache: Arc<CatalogCache>,
    planner: Option<Arc<dyn QueryPlanner>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl ProductSearch {
    pub fn new(source: Arc<dyn CatalogSource>, cache: Arc<CatalogCache>) -> Self {
        Self { source, cache, planner: None, reranker: None }
    }

    pub fn with_planner(mut self, planner: Arc<dyn QueryPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub async fn search(
        &self,
        raw: &str,
        line_hint: Option<LineKey>,
    ) -> Result<SearchOutcome, SearchError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(SearchOutcome::reply_only(WELCOME_MESSAGE));
        }

        let filter = TermFilter::from_query(raw);
        debug!(
            event_name = "search.filter",
            groups = ?filter.required_groups(),
            specific = ?filter.specific_terms(),
            "product search term filter"
        );

        let live = self.live_search(raw, line_hint, &filter).await;
        let candidates = if live.records.is_empty() {
            match self.cache.search(raw, line_hint, CACHE_LIMIT).await {
                Ok(records) => filter.apply_relaxed(records),
                Err(error) if live.all_failed => {
                    return Err(SearchError::CatalogUnavailable(error.to_string()));
                }
                Err(error) => {
                    warn!(event_name = "search.cache_failed", error = %error, "catalog cache search failed");
                    Vec::new()
                }
            }
        } else {
            live.records
        };

        if candidates.is_empty() {
            return Ok(SearchOutcome::reply_only(NO_RESULTS_REPLY));
        }

        let ranked: Vec<ProductSummary> = candidates.iter().map(CatalogRecord::summary).collect();
        let selected = match self.rerank(raw, &ranked).await {
            RerankDecision::Ask(question) => return Ok(SearchOutcome::reply_only(question)),
            RerankDecision::Pick(selected) => selected,
            RerankDecision::LocalOrder => ranked.iter().take(SELECTED_LIMIT).cloned().collect(),
        };

        let pool: Vec<ProductSummary> = ranked.into_iter().take(POOL_LIMIT).collect();
        let has_more = pool.iter().any(|product| !selected.iter().any(|s| s.id == product.id));
        let reply = format_products_reply(&selected, RESULTS_INTRO, has_more);
        Ok(SearchOutcome { reply, selected, pool })
    }

    async fn planned_queries(&self, raw: &str) -> Vec<String> {
        let Some(planner) = self.planner.as_ref() else {
            return vec![raw.to_string()];
        };
        match planner.plan(raw).await {
            Ok(plan) => {
                let queries: Vec<String> = plan
                    .queries
                    .into_iter()
                    .map(|query| query.trim().to_string())
                    .filter(|query| !query.is_empty())
                    .take(MAX_PLANNED_QUERIES)
                    .collect();
                if queries.is_empty() {
                    vec![raw.to_string()]
                } else {
                    queries
                }
            }
            Err(error) => {
                warn!(event_name = "search.planner_failed", error = %error, "query planner failed");
                vec![raw.to_string()]
            }
        }
    }

    async fn live_search(
        &self,
        raw: &str,
        line_hint: Option<LineKey>,
        filter: &TermFilter,
    ) -> LiveResults {
        let queries = self.planned_queries(raw).await;
        let phrases = build_phrase_queue(&queries, raw, line_hint);

        let mut seen: HashSet<ProductId> = HashSet::new();
        let mut records = Vec::new();
        let mut attempted = 0usize;
        let mut failures = 0usize;

        for phrase in &phrases {
            attempted += 1;
            match self.source.search_products(phrase, LIVE_PAGE_SIZE).await {
                Ok(found) => {
                    for record in found {
                        if seen.insert(record.id) && filter.accepts(&record) {
                            records.push(record);
                        }
                    }
                }
                Err(error) => {
                    failures += 1;
                    warn!(
                        event_name = "search.phrase_failed",
                        phrase = %phrase,
                        error = %error,
                        "live catalog search failed for phrase"
                    );
                }
            }
            if records.len() >= LIVE_TARGET {
                break;
            }
        }

        LiveResults { records, all_failed: attempted > 0 && failures == attempted }
    }

    async fn rerank(&self, raw: &str, ranked: &[ProductSummary]) -> RerankDecision {
        let Some(reranker) = self.reranker.as_ref() else {
            return RerankDecision::LocalOrder;
        };

        let offered = &ranked[..ranked.len().min(RERANK_LIMIT)];
        let candidates: Vec<RerankCandidate> = offered.iter().map(RerankCandidate::from).collect();
        let outcome = match reranker.rerank(raw, &candidates, SELECTED_LIMIT).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(event_name = "search.rerank_failed", error = %error, "reranker failed");
                return RerankDecision::LocalOrder;
            }
        };

        let mut picked: Vec<ProductSummary> = Vec::new();
        for id in outcome.selected_ids {
            if picked.len() >= SELECTED_LIMIT || picked.iter().any(|product| product.id == id) {
                continue;
            }
            if let Some(product) = offered.iter().find(|product| product.id == id) {
                picked.push(product.clone());
            }
        }

        if !picked.is_empty() {
            return RerankDecision::Pick(picked);
        }
        match outcome.clarifying_question.map(|question| question.trim().to_string()) {
            Some(question) if !question.is_empty() => RerankDecision::Ask(question),
            _ => RerankDecision::LocalOrder,
        }
    }
}
