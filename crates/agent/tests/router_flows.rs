use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use aquabot_agent::router::{INVENTORY_ERROR_REPLY, NO_MORE_RESULTS_REPLY};
use aquabot_agent::search::{MORE_RESULTS_INTRO, RESULTS_INTRO};
use aquabot_agent::{KnowledgeBase, MessageRouter, ProductSearch, RouterSettings};
use aquabot_core::clock::ManualClock;
use aquabot_core::config::KnowledgeConfig;
use aquabot_core::domain::assist::{InfoIntent, IntentResult, QuestionChoice};
use aquabot_core::domain::contact::{Contact, ContactId};
use aquabot_core::domain::line::LineKey;
use aquabot_core::domain::product::{CatalogRecord, ProductId, StockStatus};
use aquabot_core::errors::CollaboratorError;
use aquabot_core::playbook::WELCOME_MESSAGE;
use aquabot_core::ports::{CatalogSource, CollaboratorResult, Consultant, Crm, IntentClassifier};
use aquabot_store::{CatalogCache, CatalogCacheSettings, SessionStore};

const PHONE: &str = "573001112233";

fn record(id: i64, name: &str, sku: &str, price: Option<&str>, qty: Option<i64>) -> CatalogRecord {
    CatalogRecord {
        id: ProductId(id),
        name: name.to_string(),
        sku: sku.to_string(),
        price: price.map(|raw| Decimal::from_str(raw).expect("valid decimal")),
        regular_price: None,
        stock_status: StockStatus::InStock,
        stock_quantity: qty,
        manage_stock: qty.is_some(),
        permalink: format!("https://aquaintegral.co/producto/{id}/"),
        short_description: String::new(),
        categories: Vec::new(),
    }
}

fn catalog() -> Vec<CatalogRecord> {
    vec![
        record(1, "Filtro de arena para piscina 20 pulgadas", "1001", Some("850000"), Some(4)),
        record(2, "Bomba para piscina 1HP", "2001", Some("1234567"), Some(3)),
        record(3, "Bomba sumergible 2HP", "2002", Some("990000"), None),
        record(4, "Bomba para piscina 2HP autocebante", "2003", None, None),
        record(5, "Bomba piscina 3HP trifasica", "2005", Some("2500000"), Some(2)),
        record(11, "Cloro granulado 10kg", "3011", Some("210000"), None),
        record(12, "Cloro granulado 25kg", "3012", Some("480000"), None),
        record(13, "Cloro en tabletas 1kg", "3013", Some("60000"), None),
        record(14, "Cloro en tabletas 5kg", "3014", Some("250000"), None),
        record(15, "Cloro liquido 20L", "3015", Some("120000"), None),
        record(16, "Cloro estabilizado 10kg", "3016", Some("320000"), None),
        record(17, "Cloro choque 1kg", "3017", Some("45000"), None),
        record(18, "Cloro choque 5kg", "3018", Some("190000"), None),
    ]
}

/// Store search that returns the whole catalog for any phrase.
struct FakeCatalog {
    records: Vec<CatalogRecord>,
    fail_sku: bool,
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_products(
        &self,
        page: u32,
        _page_size: u32,
    ) -> CollaboratorResult<Vec<CatalogRecord>> {
        Ok(if page == 1 { self.records.clone() } else { Vec::new() })
    }

    async fn search_products(
        &self,
        _query: &str,
        _page_size: u32,
    ) -> CollaboratorResult<Vec<CatalogRecord>> {
        Ok(self.records.clone())
    }

    async fn product_by_sku(&self, sku: &str) -> CollaboratorResult<Option<CatalogRecord>> {
        if self.fail_sku {
            return Err(CollaboratorError::unavailable("catalog", "timeout"));
        }
        Ok(self.records.iter().find(|record| record.sku == sku).cloned())
    }
}

#[derive(Default)]
struct RecordingCrm {
    notes: Mutex<Vec<String>>,
    deals: Mutex<Vec<String>>,
}

#[async_trait]
impl Crm for RecordingCrm {
    async fn get_or_create_contact_by_phone(&self, phone: &str) -> CollaboratorResult<Contact> {
        Ok(Contact { id: ContactId("c-1".to_string()), phone: phone.to_string() })
    }

    async fn add_note(&self, _contact_id: &ContactId, text: &str) -> CollaboratorResult<()> {
        self.notes.lock().await.push(text.to_string());
        Ok(())
    }

    async fn create_deal(&self, _contact_id: &ContactId, name: &str) -> CollaboratorResult<()> {
        self.deals.lock().await.push(name.to_string());
        Ok(())
    }
}

/// Classifier that always reports the same intent and counts its calls.
struct FixedIntent {
    result: IntentResult,
    calls: AtomicUsize,
}

impl FixedIntent {
    fn new(intent: InfoIntent, line_key: Option<LineKey>, confidence: f64) -> Self {
        Self { result: IntentResult { intent, line_key, confidence }, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl IntentClassifier for FixedIntent {
    async fn classify(
        &self,
        _text: &str,
        _line_hint: Option<LineKey>,
    ) -> CollaboratorResult<Option<IntentResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.result.clone()))
    }
}

/// Consultant that ignores the asked keys and always proposes the same question.
struct RepeatingConsultant {
    choice: QuestionChoice,
    seen_asked: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl Consultant for RepeatingConsultant {
    async fn select_question(
        &self,
        _text: &str,
        _line_hint: Option<LineKey>,
        asked_keys: &[String],
    ) -> CollaboratorResult<Option<QuestionChoice>> {
        self.seen_asked.lock().await.push(asked_keys.to_vec());
        Ok(Some(self.choice.clone()))
    }
}

/// CRM whose contact upsert can fail; notes always fail.
struct BrokenCrm {
    fail_contact: bool,
    contact_calls: AtomicUsize,
    deals: Mutex<Vec<String>>,
}

impl BrokenCrm {
    fn new(fail_contact: bool) -> Self {
        Self { fail_contact, contact_calls: AtomicUsize::new(0), deals: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl Crm for BrokenCrm {
    async fn get_or_create_contact_by_phone(&self, phone: &str) -> CollaboratorResult<Contact> {
        self.contact_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_contact {
            return Err(CollaboratorError::unavailable("crm", "503 from upstream"));
        }
        Ok(Contact { id: ContactId("c-9".to_string()), phone: phone.to_string() })
    }

    async fn add_note(&self, _contact_id: &ContactId, _text: &str) -> CollaboratorResult<()> {
        Err(CollaboratorError::malformed("crm", "note rejected"))
    }

    async fn create_deal(&self, _contact_id: &ContactId, name: &str) -> CollaboratorResult<()> {
        self.deals.lock().await.push(name.to_string());
        Ok(())
    }
}

struct Harness {
    router: MessageRouter,
    store: Arc<SessionStore>,
    clock: Arc<ManualClock>,
}

fn harness_with(
    settings: RouterSettings,
    fail_sku: bool,
    crm: Option<Arc<dyn Crm>>,
) -> Harness {
    // Monday 10:00 in Bogotá.
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).single().expect("valid date"),
    ));
    let source: Arc<dyn CatalogSource> = Arc::new(FakeCatalog { records: catalog(), fail_sku });
    let store =
        Arc::new(SessionStore::new(clock.clone(), Duration::minutes(120), Duration::hours(6)));
    let cache = Arc::new(CatalogCache::new(
        source.clone(),
        clock.clone(),
        CatalogCacheSettings::default(),
    ));
    let search = Arc::new(ProductSearch::new(source.clone(), cache));

    let mut router = MessageRouter::new(store.clone(), search, source, clock.clone(), settings);
    if let Some(crm) = crm {
        router = router.with_crm(crm);
    }
    Harness { router, store, clock }
}

fn harness() -> Harness {
    harness_with(RouterSettings::default(), false, None)
}

#[tokio::test]
async fn first_greeting_shows_menu_with_time_of_day() {
    let h = harness();
    let reply = h.router.handle_incoming_message(PHONE, "hola").await;
    assert_eq!(reply, format!("Buenos días. {WELCOME_MESSAGE}"));

    let again = h.router.handle_incoming_message(PHONE, "hola").await;
    assert_eq!(again, WELCOME_MESSAGE, "greeted once per window");
}

#[tokio::test]
async fn greeting_returns_after_the_window() {
    let h = harness();
    h.router.handle_incoming_message(PHONE, "hola").await;
    h.clock.advance(Duration::hours(7));

    let reply = h.router.handle_incoming_message(PHONE, "hola").await;
    assert!(reply.starts_with("Buenas tardes. "), "{reply}");
}

#[tokio::test]
async fn number_without_a_list_is_a_menu_choice() {
    let h = harness();
    let reply = h.router.handle_incoming_message(PHONE, "2").await;
    assert!(!reply.contains("Seleccionaste"), "{reply}");
    assert_eq!(h.store.line_hint(PHONE).await, Some(LineKey::AguaResidual));
}

#[tokio::test]
async fn number_after_a_list_selects_the_product() {
    let h = harness();
    let listing = h.router.handle_incoming_message(PHONE, "bomba para piscina 2HP").await;
    assert!(listing.contains(RESULTS_INTRO), "{listing}");
    assert!(!listing.contains("Filtro de arena"), "filtro excluded: {listing}");
    assert!(!listing.contains("sumergible"), "needs piscina: {listing}");

    let state = h.store.snapshot(PHONE).await.expect("session");
    assert_eq!(state.pending_candidates.len(), 3);
    let second = state.pending_candidates[1].clone();

    let reply = h.router.handle_incoming_message(PHONE, "2").await;
    assert!(
        reply.starts_with(&format!("Perfecto, gracias. Seleccionaste: {} (SKU {}).", second.name, second.sku)),
        "{reply}"
    );
    assert!(reply.ends_with("Para cotizar, dime ciudad y cantidad."));
    assert!(reply.contains(&format!("Enlace: {}", second.permalink)));
}

#[tokio::test]
async fn pool_brochure_only_for_exact_line_word() {
    let h = harness();
    let brochure = h.router.handle_incoming_message(PHONE, "piscinas").await;
    assert!(brochure.contains("Dime qué producto necesitas"), "{brochure}");
    assert_eq!(h.store.line_hint(PHONE).await, Some(LineKey::Piscinas));

    let other = harness();
    let reply =
        other.router.handle_incoming_message(PHONE, "equipo de filtracion para piscina").await;
    assert!(!reply.contains("Dime qué producto necesitas"), "{reply}");
    assert_eq!(other.store.line_hint(PHONE).await, Some(LineKey::Piscinas), "soft hint only");
}

#[tokio::test]
async fn show_more_pages_through_the_pool() {
    let h = harness();
    let listing = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert!(listing.contains("Cloro granulado 10kg"), "{listing}");
    assert!(listing.contains("más opciones"), "hint offered: {listing}");

    let more = h.router.handle_incoming_message(PHONE, "¿Tienes más opciones?").await;
    assert!(more.starts_with(MORE_RESULTS_INTRO), "{more}");
    assert!(more.contains("Cloro en tabletas 5kg"), "{more}");
    assert!(!more.contains("Cloro granulado 10kg"), "already shown: {more}");

    // The new batch becomes the selectable list.
    let picked = h.router.handle_incoming_message(PHONE, "1").await;
    assert!(picked.contains("Cloro en tabletas 5kg"), "{picked}");

    h.router.handle_incoming_message(PHONE, "cloro").await;
    h.router.handle_incoming_message(PHONE, "mas opciones").await;
    let last = h.router.handle_incoming_message(PHONE, "ver más").await;
    assert!(last.contains("Cloro choque 5kg"), "{last}");

    let exhausted = h.router.handle_incoming_message(PHONE, "más resultados").await;
    assert_eq!(exhausted, NO_MORE_RESULTS_REPLY);
}

#[tokio::test]
async fn other_handlers_drop_the_pending_list() {
    let h = harness();
    h.router.handle_incoming_message(PHONE, "cloro").await;
    h.router.handle_incoming_message(PHONE, "menu").await;

    let state = h.store.snapshot(PHONE).await.expect("session");
    assert!(state.pending_candidates.is_empty());
    assert!(state.search_pool.is_empty());
}

#[tokio::test]
async fn sku_lookup_reports_stock_and_price() {
    let h = harness();
    let reply = h.router.handle_incoming_message(PHONE, "tienen el 2001?").await;
    assert!(reply.contains("para Bomba para piscina 1HP (SKU 2001)"), "{reply}");
    assert!(reply.contains("Actualmente tenemos 3 unidades en stock."), "{reply}");
    assert!(reply.contains("El precio actual es $1.234.567,00 COP."), "{reply}");

    let missing = h.router.handle_incoming_message(PHONE, "y el 999999?").await;
    assert!(missing.contains("No veo ese SKU en el catálogo (999999)"), "{missing}");
}

#[tokio::test]
async fn sku_lookup_failure_is_apologetic() {
    let h = harness_with(RouterSettings::default(), true, None);
    let reply = h.router.handle_incoming_message(PHONE, "sku 2001").await;
    assert!(reply.ends_with(INVENTORY_ERROR_REPLY), "{reply}");
}

#[tokio::test]
async fn name_only_introduction_gets_a_personal_welcome() {
    let h = harness();
    let reply = h.router.handle_incoming_message(PHONE, "Hola, me llamo ana").await;
    assert_eq!(
        reply,
        "Hola Ana, bienvenido a Aqua Integral SAS. Soy tu asesor online. ¿En qué puedo ayudarte hoy?"
    );
    assert_eq!(h.store.customer_name(PHONE).await.as_deref(), Some("Ana"));

    let next = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert!(next.starts_with(RESULTS_INTRO), "no second greeting: {next}");
}

#[tokio::test]
async fn introduction_with_a_request_prefixes_the_answer() {
    let h = harness();
    let reply = h.router.handle_incoming_message(PHONE, "soy Juan, necesito cloro").await;
    let prefix = "Hola Juan, bienvenido a Aqua Integral SAS. Soy tu asesor online.\n\n";
    assert!(reply.starts_with(prefix), "{reply}");
    assert!(reply[prefix.len()..].starts_with(RESULTS_INTRO), "{reply}");
}

#[tokio::test]
async fn test_mode_ignores_unlisted_callers() {
    let mut settings = RouterSettings::default();
    settings.test_mode.enabled = true;
    settings.test_mode.allowed_numbers = vec![PHONE.to_string()];
    settings.test_mode.tag = "[TEST]".to_string();
    let crm = Arc::new(RecordingCrm::default());
    let h = harness_with(settings, false, Some(crm.clone() as Arc<dyn Crm>));

    let ignored = h.router.handle_incoming_message("573009998877", "hola").await;
    assert_eq!(ignored, "");
    assert!(h.store.is_empty().await);

    let answered = h.router.handle_incoming_message("+57 300 111 2233", "cloro").await;
    assert!(!answered.is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(*crm.notes.lock().await, vec!["[TEST] Mensaje WhatsApp: cloro".to_string()]);
    assert_eq!(*crm.deals.lock().await, vec!["[TEST] Interés vía WhatsApp (bot)".to_string()]);
}

#[tokio::test]
async fn low_confidence_intent_is_ignored() {
    let intent = Arc::new(FixedIntent::new(InfoIntent::CompanyInfo, Some(LineKey::Bombeo), 0.5));
    let mut h = harness();
    h.router = h.router.with_intent_classifier(intent.clone());

    let reply = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert_eq!(intent.calls.load(Ordering::SeqCst), 1);
    assert!(reply.starts_with(&format!("Buenos días. {RESULTS_INTRO}")), "{reply}");
    assert!(!reply.contains("Somos Aqua Integral"), "{reply}");
    assert_eq!(h.store.line_hint(PHONE).await, None, "no hint from an unsure classifier");
}

#[tokio::test]
async fn product_search_and_other_intents_fall_through_to_search() {
    for fallthrough in [InfoIntent::ProductSearch, InfoIntent::Other] {
        let intent = Arc::new(FixedIntent::new(fallthrough, Some(LineKey::Piscinas), 0.95));
        let mut h = harness();
        h.router = h.router.with_intent_classifier(intent.clone());

        let reply = h.router.handle_incoming_message(PHONE, "cloro").await;
        assert!(reply.contains("Cloro granulado 10kg"), "{fallthrough:?}: {reply}");
        assert_eq!(
            h.store.line_hint(PHONE).await,
            Some(LineKey::Piscinas),
            "{fallthrough:?} still records the line"
        );
        let state = h.store.snapshot(PHONE).await.expect("session");
        assert_eq!(state.pending_candidates.len(), 3, "{fallthrough:?}");
    }

    let confident = Arc::new(FixedIntent::new(InfoIntent::CompanyInfo, None, 0.95));
    let mut h = harness();
    h.router = h.router.with_intent_classifier(confident);
    let reply = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert!(reply.starts_with("Buenos días. Con gusto. Somos Aqua Integral SAS."), "{reply}");
}

#[tokio::test]
async fn consultant_asks_each_topic_once() {
    let consultant = Arc::new(RepeatingConsultant {
        choice: QuestionChoice {
            key: "flow_rate".to_string(),
            question: "¿Qué caudal necesitas mover?".to_string(),
        },
        seen_asked: Mutex::new(Vec::new()),
    });
    let mut h = harness();
    h.router = h.router.with_consultant(consultant.clone());

    let first = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert_eq!(first, "Buenos días. ¿Qué caudal necesitas mover?");
    assert_eq!(h.store.consult_questions(PHONE).await, vec!["flow_rate".to_string()]);

    let second = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert!(second.starts_with(RESULTS_INTRO), "repeat question skipped: {second}");
    assert_eq!(h.store.consult_questions(PHONE).await, vec!["flow_rate".to_string()]);
    assert_eq!(
        *consultant.seen_asked.lock().await,
        vec![Vec::new(), vec!["flow_rate".to_string()]]
    );
}

#[tokio::test]
async fn crm_failures_never_block_the_reply() {
    let unreachable = Arc::new(BrokenCrm::new(true));
    let crm: Arc<dyn Crm> = unreachable.clone();
    let h = harness_with(RouterSettings::default(), false, Some(crm));
    let reply = h.router.handle_incoming_message(PHONE, "cloro").await;
    assert!(reply.contains("Cloro granulado 10kg"), "{reply}");

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(unreachable.contact_calls.load(Ordering::SeqCst), 1);
    assert!(unreachable.deals.lock().await.is_empty(), "no deal without a contact");

    let note_rejected = Arc::new(BrokenCrm::new(false));
    let crm: Arc<dyn Crm> = note_rejected.clone();
    let h = harness_with(RouterSettings::default(), false, Some(crm));
    let reply = h.router.handle_incoming_message(PHONE, "hola").await;
    assert_eq!(reply, format!("Buenos días. {WELCOME_MESSAGE}"));

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(*note_rejected.deals.lock().await, vec!["Interés vía WhatsApp (bot)".to_string()]);
}

#[tokio::test]
async fn knowledge_base_answers_before_intent_and_search() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("knowledge.json");
    std::fs::write(
        &path,
        r#"[
            {
                "id": "mantenimiento",
                "question": "¿Hacen mantenimiento de equipos?",
                "answer": "Sí, hacemos mantenimiento preventivo y correctivo en sitio.",
                "tags": ["mantenimiento", "servicios"],
                "verified": true
            },
            {
                "id": "borrador",
                "question": "¿Qué servicios de mantenimiento ofrece la empresa?",
                "answer": "Texto sin revisar.",
                "tags": ["mantenimiento", "servicios", "empresa"],
                "verified": false
            }
        ]"#,
    )
    .expect("write knowledge file");

    let intent = Arc::new(FixedIntent::new(InfoIntent::CompanyInfo, None, 0.95));
    let mut h = harness();
    let knowledge = Arc::new(KnowledgeBase::new(
        &KnowledgeConfig { path: Some(path), min_score: 2, require_verified: true },
        h.clock.clone(),
    ));
    h.router = h.router.with_knowledge(knowledge).with_intent_classifier(intent.clone());

    h.router.handle_incoming_message(PHONE, "hola").await;
    let reply = h
        .router
        .handle_incoming_message(PHONE, "¿Qué servicios de mantenimiento ofrece la empresa?")
        .await;
    assert_eq!(reply, "Sí, hacemos mantenimiento preventivo y correctivo en sitio.");
    assert_eq!(intent.calls.load(Ordering::SeqCst), 0, "intent never consulted");
    let state = h.store.snapshot(PHONE).await.expect("session");
    assert!(state.pending_candidates.is_empty());
}
