use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use aquabot_core::clock::Clock;
use aquabot_core::domain::line::LineKey;
use aquabot_core::domain::product::CatalogRecord;
use aquabot_core::errors::CollaboratorError;
use aquabot_core::ports::CatalogSource;
use aquabot_core::text::{normalize, tokenize};

const FILTRATION_EXPANSION: &[&str] =
    &["filtro", "filtros", "filtracion", "cartucho", "arena", "valvula"];
/// Every expansion token must survive `tokenize`, or it can never match a product.
const POOL_CHEMICAL_EXPANSION: &[&str] =
    &["cloro", "alguicida", "clarificador", "reductor", "incrementador", "acidet"];
const POOL_LINE_EXPANSION: &[&str] = &["piscina", "piscinas"];

const TOKEN_MATCH_POINTS: u32 = 3;
const LINE_HINT_POINTS: u32 = 2;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog refresh failed: {0}")]
    Refresh(#[from] CollaboratorError),
}

#[derive(Clone, Copy, Debug)]
pub struct CatalogCacheSettings {
    pub ttl: Duration,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for CatalogCacheSettings {
    fn default() -> Self {
        Self { ttl: Duration::minutes(10), page_size: 100, max_pages: 30 }
    }
}

/// One cached product with its precomputed search tokens.
#[derive(Clone, Debug)]
pub struct CatalogEntry {
    pub record: CatalogRecord,
    pub tokens: HashSet<String>,
}

impl CatalogEntry {
    pub fn new(record: CatalogRecord) -> Self {
        let tokens = tokenize(&record.search_text()).into_iter().collect();
        Self { record, tokens }
    }
}

#[derive(Debug, Default)]
struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.refreshed_at {
            _ if self.entries.is_empty() => true,
            None => true,
            Some(refreshed_at) => now - refreshed_at >= ttl,
        }
    }
}

/// Locally cached, tokenized copy of the whole catalog.
///
/// Readers always work on a complete snapshot; a refresh builds the next one off to the side
/// and swaps it in at once. Only one refresh runs at a time.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    settings: CatalogCacheSettings,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl CatalogCache {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        settings: CatalogCacheSettings,
    ) -> Self {
        Self {
            source,
            clock,
            settings,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            refresh_lock: Mutex::new(()),
        }
    }

    async fn current(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.current().await.entries.len()
    }

    pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.current().await.refreshed_at
    }

    pub async fn refresh_if_needed(&self) -> Result<(), CatalogError> {
        if !self.current().await.is_stale(self.clock.now(), self.settings.ttl) {
            return Ok(());
        }

        let _refreshing = self.refresh_lock.lock().await;
        if !self.current().await.is_stale(self.clock.now(), self.settings.ttl) {
            return Ok(());
        }

        let records = match self.fetch_all().await {
            Ok(records) => records,
            Err(error) => {
                warn!(event_name = "catalog.refresh_failed", error = %error, "catalog refresh failed");
                return Err(error.into());
            }
        };
        let entries: Vec<CatalogEntry> = records.into_iter().map(CatalogEntry::new).collect();
        let count = entries.len();
        let next = Arc::new(CatalogSnapshot { entries, refreshed_at: Some(self.clock.now()) });
        *self.snapshot.write().await = next;

        info!(event_name = "catalog.refreshed", products = count, "catalog cache refreshed");
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<CatalogRecord>, CollaboratorError> {
        let mut records = Vec::new();
        for page in 1..=self.settings.max_pages {
            let batch = self.source.list_products(page, self.settings.page_size).await?;
            let short_page = batch.len() < self.settings.page_size as usize;
            records.extend(batch);
            if short_page {
                break;
            }
        }
        Ok(records)
    }

    /// Products ranked by token overlap with the expanded query, best first.
    ///
    /// When a refresh fails but an older snapshot exists, that snapshot is searched.
    pub async fn search(
        &self,
        query: &str,
        line_hint: Option<LineKey>,
        limit: usize,
    ) -> Result<Vec<CatalogRecord>, CatalogError> {
        if let Err(error) = self.refresh_if_needed().await {
            if self.current().await.entries.is_empty() {
                return Err(error);
            }
        }

        let snapshot = self.current().await;
        let query_tokens = expand_query_tokens(query, line_hint);
        Ok(rank(&snapshot.entries, &query_tokens, line_hint, limit))
    }
}

/// Query tokens plus the additive expansions for filtration, pool chemicals and the pool line.
pub fn expand_query_tokens(query: &str, line_hint: Option<LineKey>) -> Vec<String> {
    let normalized = normalize(query);
    let mut tokens = tokenize(query);

    if normalized.contains("filtracion") || normalized.contains("filtro") {
        tokens.extend(FILTRATION_EXPANSION.iter().map(|token| token.to_string()));
    }
    let pool_context = line_hint == Some(LineKey::Piscinas) || normalized.contains("piscin");
    if normalized.contains("quimic") && pool_context {
        tokens.extend(POOL_CHEMICAL_EXPANSION.iter().map(|token| token.to_string()));
    }
    if line_hint == Some(LineKey::Piscinas) {
        tokens.extend(POOL_LINE_EXPANSION.iter().map(|token| token.to_string()));
    }

    let mut seen = HashSet::new();
    tokens.retain(|token| seen.insert(token.clone()));
    tokens
}

pub fn score(
    product_tokens: &HashSet<String>,
    query_tokens: &[String],
    line_hint: Option<LineKey>,
) -> u32 {
    let matches = query_tokens.iter().filter(|token| product_tokens.contains(*token)).count();
    let mut score = TOKEN_MATCH_POINTS * matches as u32;
    if let Some(hint) = line_hint {
        if product_tokens.contains(&normalize(hint.as_str())) {
            score += LINE_HINT_POINTS;
        }
    }
    score
}

fn rank(
    entries: &[CatalogEntry],
    query_tokens: &[String],
    line_hint: Option<LineKey>,
    limit: usize,
) -> Vec<CatalogRecord> {
    let mut scored: Vec<(u32, &CatalogEntry)> = entries
        .iter()
        .map(|entry| (score(&entry.tokens, query_tokens, line_hint), entry))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|left, right| right.0.cmp(&left.0));
    scored.into_iter().take(limit).map(|(_, entry)| entry.record.clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    use aquabot_core::clock::ManualClock;
    use aquabot_core::domain::line::LineKey;
    use aquabot_core::domain::product::{CatalogRecord, ProductId, StockStatus};
    use aquabot_core::errors::CollaboratorError;
    use aquabot_core::ports::{CatalogSource, CollaboratorResult};

    use aquabot_core::text::tokenize;

    use super::{expand_query_tokens, score, CatalogCache, CatalogCacheSettings};

    fn record(id: i64, name: &str, category: &str) -> CatalogRecord {
        CatalogRecord {
            id: ProductId(id),
            name: name.to_string(),
            sku: format!("{}", 5000 + id),
            price: None,
            regular_price: None,
            stock_status: StockStatus::InStock,
            stock_quantity: None,
            manage_stock: false,
            permalink: String::new(),
            short_description: String::new(),
            categories: vec![category.to_string()],
        }
    }

    struct CountingSource {
        records: Vec<CatalogRecord>,
        list_calls: AtomicUsize,
        failing: AtomicBool,
    }

    impl CountingSource {
        fn new(records: Vec<CatalogRecord>) -> Self {
            Self { records, list_calls: AtomicUsize::new(0), failing: AtomicBool::new(false) }
        }

        fn calls(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn list_products(
            &self,
            page: u32,
            page_size: u32,
        ) -> CollaboratorResult<Vec<CatalogRecord>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(CollaboratorError::unavailable("catalog", "connection refused"));
            }
            let start = ((page - 1) * page_size) as usize;
            Ok(self.records.iter().skip(start).take(page_size as usize).cloned().collect())
        }

        async fn search_products(
            &self,
            _query: &str,
            _page_size: u32,
        ) -> CollaboratorResult<Vec<CatalogRecord>> {
            Ok(Vec::new())
        }

        async fn product_by_sku(&self, _sku: &str) -> CollaboratorResult<Option<CatalogRecord>> {
            Ok(None)
        }
    }

    fn catalog() -> Vec<CatalogRecord> {
        vec![
            record(1, "Filtro de arena 20 pulgadas", "Piscinas"),
            record(2, "Bomba periferica 1HP", "Bombeo"),
            record(3, "Bomba para piscina 2HP", "Piscinas"),
            record(4, "Cloro granulado 90%", "Piscinas"),
            record(5, "Cartucho filtro sedimentos", "Agua potable"),
        ]
    }

    fn cache_with(
        source: Arc<CountingSource>,
        page_size: u32,
        max_pages: u32,
    ) -> (Arc<ManualClock>, CatalogCache) {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).single().expect("valid date");
        let clock = Arc::new(ManualClock::new(start));
        let settings = CatalogCacheSettings { ttl: Duration::minutes(10), page_size, max_pages };
        let cache = CatalogCache::new(source, clock.clone(), settings);
        (clock, cache)
    }

    fn ids(records: &[CatalogRecord]) -> Vec<i64> {
        records.iter().map(|record| record.id.0).collect()
    }

    #[tokio::test]
    async fn two_refreshes_inside_ttl_fetch_once() {
        let source = Arc::new(CountingSource::new(catalog()));
        let (clock, cache) = cache_with(source.clone(), 100, 30);

        cache.refresh_if_needed().await.expect("first refresh");
        clock.advance(Duration::minutes(5));
        cache.refresh_if_needed().await.expect("second refresh");
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.len().await, 5);

        clock.advance(Duration::minutes(6));
        cache.refresh_if_needed().await.expect("stale refresh");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_refreshes_are_single_flight() {
        let source = Arc::new(CountingSource::new(catalog()));
        let (_clock, cache) = cache_with(source.clone(), 100, 30);
        let cache = Arc::new(cache);

        let first = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh_if_needed().await.is_ok() }
        });
        let second = tokio::spawn({
            let cache = cache.clone();
            async move { cache.refresh_if_needed().await.is_ok() }
        });

        assert!(first.await.expect("join first"));
        assert!(second.await.expect("join second"));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn paging_stops_on_short_page_and_page_cap() {
        let source = Arc::new(CountingSource::new(catalog()));
        let (_clock, cache) = cache_with(source.clone(), 2, 30);
        cache.refresh_if_needed().await.expect("refresh");
        assert_eq!(source.calls(), 3);
        assert_eq!(cache.len().await, 5);

        let capped = Arc::new(CountingSource::new(catalog()));
        let (_clock, cache) = cache_with(capped.clone(), 2, 2);
        cache.refresh_if_needed().await.expect("refresh");
        assert_eq!(capped.calls(), 2);
        assert_eq!(cache.len().await, 4);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(CountingSource::new(catalog()));
        let (clock, cache) = cache_with(source.clone(), 100, 30);
        cache.refresh_if_needed().await.expect("refresh");
        let refreshed_at = cache.last_refreshed_at().await;

        source.failing.store(true, Ordering::SeqCst);
        clock.advance(Duration::minutes(11));
        assert!(cache.refresh_if_needed().await.is_err());
        assert_eq!(cache.len().await, 5);
        assert_eq!(cache.last_refreshed_at().await, refreshed_at);

        let results = cache.search("cloro", None, 50).await.expect("stale search");
        assert_eq!(ids(&results), vec![4]);
    }

    #[tokio::test]
    async fn failed_first_refresh_is_reported() {
        let source = Arc::new(CountingSource::new(catalog()));
        source.failing.store(true, Ordering::SeqCst);
        let (_clock, cache) = cache_with(source, 100, 30);
        assert!(cache.search("bomba", None, 50).await.is_err());
    }

    #[tokio::test]
    async fn search_ranks_by_score_with_stable_ties() {
        let source = Arc::new(CountingSource::new(catalog()));
        let (_clock, cache) = cache_with(source, 100, 30);

        let results = cache.search("bomba", None, 50).await.expect("search");
        assert_eq!(ids(&results), vec![2, 3]);

        let results = cache.search("bomba piscina", None, 50).await.expect("search");
        assert_eq!(ids(&results)[0], 3);

        let limited = cache.search("filtracion", None, 1).await.expect("search");
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn line_hint_boosts_matching_products() {
        let source = Arc::new(CountingSource::new(catalog()));
        let (_clock, cache) = cache_with(source, 100, 30);

        let results = cache.search("bomba", Some(LineKey::Piscinas), 50).await.expect("search");
        assert_eq!(ids(&results)[0], 3);
    }

    #[test]
    fn expansion_is_additive() {
        let tokens = expand_query_tokens("Equipo de filtración", None);
        assert!(tokens.contains(&"equipo".to_string()));
        assert!(tokens.contains(&"cartucho".to_string()));

        let tokens = expand_query_tokens("producto químico", Some(LineKey::Piscinas));
        assert!(tokens.contains(&"producto".to_string()));
        assert!(tokens.contains(&"alguicida".to_string()));
        assert!(tokens.contains(&"piscinas".to_string()));

        let tokens = expand_query_tokens("producto químico", None);
        assert!(!tokens.contains(&"alguicida".to_string()));
    }

    #[test]
    fn expansion_tokens_are_matchable() {
        let expanded = expand_query_tokens("químico para filtración", Some(LineKey::Piscinas));
        for token in &expanded {
            assert_eq!(tokenize(token), vec![token.clone()], "`{token}` would never match");
        }
    }

    #[tokio::test]
    async fn chemical_request_finds_ph_products_through_other_tokens() {
        let source = Arc::new(CountingSource::new(vec![
            record(1, "Reductor de pH 2kg", "Químicos"),
            record(2, "Bomba periférica 1HP", "Bombas"),
        ]));
        let (_clock, cache) = cache_with(source, 100, 30);

        let results =
            cache.search("químico", Some(LineKey::Piscinas), 50).await.expect("search");
        assert_eq!(ids(&results), vec![1]);
    }

    #[test]
    fn score_is_monotonic_in_matching_tokens() {
        let product: HashSet<String> =
            ["bomba", "piscina", "2hp"].iter().map(|token| token.to_string()).collect();
        let query = |tokens: &[&str]| tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>();

        let none = score(&product, &query(&["filtro"]), None);
        let one = score(&product, &query(&["bomba", "filtro"]), None);
        let two = score(&product, &query(&["bomba", "piscina"]), None);
        let three = score(&product, &query(&["bomba", "piscina", "2hp"]), None);
        assert_eq!(none, 0);
        assert!(none < one && one < two && two < three);
    }
}
