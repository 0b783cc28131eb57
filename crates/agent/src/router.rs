//! Per-message decision pipeline.
//!
//! A message first passes the test-mode gate, refreshes the caller's activity, triggers the CRM
//! sync in the background and is checked for a name introduction. It then walks an ordered list
//! of handlers; the first handler returning a reply wins. The last handler always answers, so
//! every message that passes the gate gets exactly one reply.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use aquabot_core::clock::Clock;
use aquabot_core::config::{AppConfig, TestModeConfig};
use aquabot_core::domain::line::LineKey;
use aquabot_core::domain::product::{CatalogRecord, StockStatus};
use aquabot_core::domain::session::Channel;
use aquabot_core::format::format_cop;
use aquabot_core::ports::{CatalogSource, Consultant, Crm, IntentClassifier};
use aquabot_core::profile::COMPANY_NAME;
use aquabot_core::text::{normalize, normalize_phone};
use aquabot_store::SessionStore;

use crate::faq::route_info_request;
use crate::info::build_info_response;
use crate::knowledge::{should_attempt_knowledge, KnowledgeBase};
use crate::menu::{clarify_question, infer_line_hint, route_playbook};
use crate::names::{extract_name, is_only_greeting};
use crate::search::{format_products_reply, ProductSearch, MORE_RESULTS_INTRO};

pub const SHOW_MORE_BATCH: usize = 3;
pub const DEAL_NAME: &str = "Interés vía WhatsApp (bot)";

pub const INVENTORY_ERROR_REPLY: &str = "En este momento no puedo consultar el inventario. \
     Si me compartes el SKU y la cantidad, lo reviso y te confirmo.";
pub const CATALOG_ERROR_REPLY: &str = "En este momento no puedo consultar el catálogo. \
     ¿Me compartes el SKU o una foto del producto?";
pub const NO_MORE_RESULTS_REPLY: &str = "Por ahora no veo más opciones con esa descripción en el \
     catálogo. Si me das más detalles o el SKU, afino la búsqueda.";

const SHOW_MORE_TRIGGERS: &[&str] = &[
    "mas opciones",
    "mas productos",
    "tienes mas opciones",
    "tienes mas productos",
    "hay mas opciones",
    "hay mas productos",
    "ver mas",
    "mas resultados",
];

static CHOICE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([1-3])\s*[.)\-]?\s*$").expect("choice pattern is valid")
});

static SKU_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4,10})\b").expect("sku pattern is valid"));

/// Router knobs taken from the application config.
#[derive(Clone, Debug)]
pub struct RouterSettings {
    pub intent_min_confidence: f64,
    pub utc_offset_hours: i32,
    pub test_mode: TestModeConfig,
}

impl RouterSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            intent_min_confidence: config.llm.intent_min_confidence,
            utc_offset_hours: config.session.utc_offset_hours,
            test_mode: config.test_mode.clone(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Caller-local wall clock used for greetings and the weekend note.
fn local_time(now: DateTime<Utc>, utc_offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(utc_offset_hours.saturating_mul(3600))
        .unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
}

pub fn time_greeting(local: DateTime<FixedOffset>) -> &'static str {
    match local.hour() {
        0..=11 => "Buenos días",
        12..=17 => "Buenas tardes",
        _ => "Buenas noches",
    }
}

pub fn is_weekend(local: DateTime<FixedOffset>) -> bool {
    local.weekday().number_from_monday() >= 6
}

fn is_more_options_request(text: &str) -> bool {
    let normalized = normalize(text);
    !normalized.is_empty() && SHOW_MORE_TRIGGERS.iter().any(|trigger| normalized.contains(trigger))
}

fn selection_reply(product: &aquabot_core::ProductSummary) -> String {
    let sku = if product.sku.trim().is_empty() { "N/D" } else { product.sku.as_str() };
    let link = if product.permalink.trim().is_empty() {
        String::new()
    } else {
        format!("\nEnlace: {}", product.permalink)
    };
    format!(
        "Perfecto, gracias. Seleccionaste: {} (SKU {sku}).\nPrecio: {}.{link}\n\
         Para cotizar, dime ciudad y cantidad.",
        product.name,
        format_cop(product.price),
    )
}

fn sku_reply(record: &CatalogRecord, requested_sku: &str) -> String {
    let name = if record.name.trim().is_empty() { "producto" } else { record.name.as_str() };
    let sku = if record.sku.trim().is_empty() { requested_sku } else { record.sku.as_str() };

    let stock = match (record.manage_stock, record.stock_quantity) {
        (true, Some(quantity)) => format!("Actualmente tenemos {quantity} unidades en stock."),
        _ => match record.stock_status {
            StockStatus::InStock => "Actualmente aparece como disponible.",
            StockStatus::OutOfStock => "Actualmente aparece como agotado.",
            StockStatus::OnBackorder => "Actualmente aparece como en pedido pendiente.",
            StockStatus::Unknown(_) => "Actualmente no puedo confirmar el stock exacto.",
        }
        .to_string(),
    };
    let price = match record.effective_price() {
        Some(price) => format!(" El precio actual es {}.", format_cop(Some(price))),
        None => String::new(),
    };

    format!(
        "Esto es lo que tengo en el catálogo para {name} (SKU {sku}). {stock}{price} \
         ¿Quieres que te cotice? Si es así, dime cantidad y ciudad."
    )
}

/// What every handler sees of the current message.
struct TurnContext {
    phone: String,
    text: String,
    line_hint: Option<LineKey>,
    is_weekend: bool,
}

struct RouterDeps {
    store: Arc<SessionStore>,
    search: Arc<ProductSearch>,
    catalog: Arc<dyn CatalogSource>,
    intent: Option<Arc<dyn IntentClassifier>>,
    consultant: Option<Arc<dyn Consultant>>,
    knowledge: Option<Arc<KnowledgeBase>>,
    intent_min_confidence: f64,
}

#[async_trait]
trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a reply from this handler drops the pending list and the search pool.
    fn resets_listing(&self) -> bool {
        true
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String>;
}

struct SelectionHandler;

#[async_trait]
impl Handler for SelectionHandler {
    fn name(&self) -> &'static str {
        "selection"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let choice = CHOICE_PATTERN.captures(&ctx.text)?.get(1)?.as_str().parse::<usize>().ok()?;
        let product = deps.store.candidate_by_choice(&ctx.phone, choice).await?;
        Some(selection_reply(&product))
    }
}

struct ShowMoreHandler;

#[async_trait]
impl Handler for ShowMoreHandler {
    fn name(&self) -> &'static str {
        "show_more"
    }

    fn resets_listing(&self) -> bool {
        false
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        if !is_more_options_request(&ctx.text) {
            return None;
        }
        let next = deps.store.next_search_results(&ctx.phone).await;
        if next.is_empty() {
            return Some(NO_MORE_RESULTS_REPLY.to_string());
        }
        let reply = format_products_reply(&next, MORE_RESULTS_INTRO, false);
        deps.store.set_last_candidates(&ctx.phone, next).await;
        Some(reply)
    }
}

struct PlaybookHandler;

#[async_trait]
impl Handler for PlaybookHandler {
    fn name(&self) -> &'static str {
        "playbook"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let matched = route_playbook(&ctx.text, ctx.is_weekend)?;
        if let Some(line) = matched.line {
            deps.store.set_line_hint(&ctx.phone, line).await;
            ctx.line_hint = Some(line);
        }
        Some(matched.reply)
    }
}

/// Sets a soft line hint from keywords; never replies.
struct LineHintHandler;

#[async_trait]
impl Handler for LineHintHandler {
    fn name(&self) -> &'static str {
        "line_hint"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        if ctx.line_hint.is_none() {
            if let Some(line) = infer_line_hint(&ctx.text) {
                deps.store.set_line_hint(&ctx.phone, line).await;
                ctx.line_hint = Some(line);
            }
        }
        None
    }
}

struct FaqHandler;

#[async_trait]
impl Handler for FaqHandler {
    fn name(&self) -> &'static str {
        "faq"
    }

    async fn attempt(&self, _deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        route_info_request(&ctx.text, ctx.line_hint)
    }
}

struct KnowledgeHandler;

#[async_trait]
impl Handler for KnowledgeHandler {
    fn name(&self) -> &'static str {
        "knowledge"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let knowledge = deps.knowledge.as_ref()?;
        if !should_attempt_knowledge(&ctx.text) {
            return None;
        }
        let answer = knowledge.find_answer(&ctx.text).await?;
        debug!(
            event_name = "router.knowledge_hit",
            entry_id = %answer.entry_id,
            score = answer.score,
            "knowledge base answered"
        );
        Some(answer.answer)
    }
}

struct IntentHandler;

#[async_trait]
impl Handler for IntentHandler {
    fn name(&self) -> &'static str {
        "intent"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let classifier = deps.intent.as_ref()?;
        let result = match classifier.classify(&ctx.text, ctx.line_hint).await {
            Ok(result) => result?,
            Err(error) => {
                warn!(
                    event_name = "router.intent_failed",
                    phone = %ctx.phone,
                    error = %error,
                    "intent classification failed"
                );
                return None;
            }
        };
        if result.confidence < deps.intent_min_confidence {
            return None;
        }

        if ctx.line_hint.is_none() {
            if let Some(line) = result.line_key {
                deps.store.set_line_hint(&ctx.phone, line).await;
                ctx.line_hint = Some(line);
            }
        }
        if result.intent.falls_through() {
            return None;
        }
        build_info_response(result.intent, &ctx.text, ctx.line_hint)
    }
}

struct SkuHandler;

#[async_trait]
impl Handler for SkuHandler {
    fn name(&self) -> &'static str {
        "sku"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let sku = SKU_PATTERN.captures(&ctx.text)?.get(1)?.as_str().to_string();
        let reply = match deps.catalog.product_by_sku(&sku).await {
            Ok(Some(record)) => sku_reply(&record, &sku),
            Ok(None) => format!(
                "No veo ese SKU en el catálogo ({sku}). \
                 ¿Puedes verificar el código o describirme el producto que necesitas?"
            ),
            Err(error) => {
                warn!(
                    event_name = "router.sku_lookup_failed",
                    phone = %ctx.phone,
                    sku = %sku,
                    error = %error,
                    "sku lookup failed"
                );
                INVENTORY_ERROR_REPLY.to_string()
            }
        };
        Some(reply)
    }
}

struct ConsultantHandler;

#[async_trait]
impl Handler for ConsultantHandler {
    fn name(&self) -> &'static str {
        "consultant"
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let consultant = deps.consultant.as_ref()?;
        let asked = deps.store.consult_questions(&ctx.phone).await;
        let choice = match consultant.select_question(&ctx.text, ctx.line_hint, &asked).await {
            Ok(choice) => choice?,
            Err(error) => {
                warn!(
                    event_name = "router.consultant_failed",
                    phone = %ctx.phone,
                    error = %error,
                    "consultant question selection failed"
                );
                return None;
            }
        };
        if choice.question.trim().is_empty() || asked.contains(&choice.key) {
            return None;
        }
        deps.store.add_consult_question(&ctx.phone, &choice.key).await;
        Some(choice.question)
    }
}

struct ClarifyHandler;

#[async_trait]
impl Handler for ClarifyHandler {
    fn name(&self) -> &'static str {
        "clarify"
    }

    async fn attempt(&self, _deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        clarify_question(&ctx.text, ctx.line_hint).map(str::to_string)
    }
}

struct SearchHandler;

#[async_trait]
impl Handler for SearchHandler {
    fn name(&self) -> &'static str {
        "search"
    }

    fn resets_listing(&self) -> bool {
        false
    }

    async fn attempt(&self, deps: &RouterDeps, ctx: &mut TurnContext) -> Option<String> {
        let outcome = match deps.search.search(&ctx.text, ctx.line_hint).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "router.search_failed",
                    phone = %ctx.phone,
                    error = %error,
                    "product search failed"
                );
                return Some(CATALOG_ERROR_REPLY.to_string());
            }
        };

        let remaining = outcome.remaining_pool();
        if remaining.is_empty() {
            deps.store.clear_search_pool(&ctx.phone).await;
        } else {
            deps.store.set_search_pool(&ctx.phone, &ctx.text, remaining, SHOW_MORE_BATCH).await;
        }
        if outcome.selected.is_empty() {
            deps.store.clear_last_candidates(&ctx.phone).await;
        } else {
            deps.store.set_last_candidates(&ctx.phone, outcome.selected).await;
        }
        Some(outcome.reply)
    }
}

fn default_handlers() -> Vec<Box<dyn Handler>> {
    vec![
        Box::new(SelectionHandler),
        Box::new(ShowMoreHandler),
        Box::new(PlaybookHandler),
        Box::new(LineHintHandler),
        Box::new(FaqHandler),
        Box::new(KnowledgeHandler),
        Box::new(IntentHandler),
        Box::new(SkuHandler),
        Box::new(ConsultantHandler),
        Box::new(ClarifyHandler),
        Box::new(SearchHandler),
    ]
}

async fn sync_crm(crm: Arc<dyn Crm>, phone: String, note: String, deal_name: String) {
    let contact = match crm.get_or_create_contact_by_phone(&phone).await {
        Ok(contact) => contact,
        Err(error) => {
            warn!(
                event_name = "crm.contact_failed",
                phone = %phone,
                error = %error,
                "crm contact upsert failed"
            );
            return;
        }
    };
    if let Err(error) = crm.add_note(&contact.id, &note).await {
        warn!(
            event_name = "crm.note_failed",
            phone = %phone,
            contact_id = %contact.id,
            error = %error,
            "crm note failed"
        );
    }
    if let Err(error) = crm.create_deal(&contact.id, &deal_name).await {
        warn!(
            event_name = "crm.deal_failed",
            phone = %phone,
            contact_id = %contact.id,
            error = %error,
            "crm deal failed"
        );
    }
}

pub struct MessageRouter {
    deps: RouterDeps,
    crm: Option<Arc<dyn Crm>>,
    clock: Arc<dyn Clock>,
    settings: RouterSettings,
    handlers: Vec<Box<dyn Handler>>,
}

impl MessageRouter {
    pub fn new(
        store: Arc<SessionStore>,
        search: Arc<ProductSearch>,
        catalog: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            deps: RouterDeps {
                store,
                search,
                catalog,
                intent: None,
                consultant: None,
                knowledge: None,
                intent_min_confidence: settings.intent_min_confidence,
            },
            crm: None,
            clock,
            settings,
            handlers: default_handlers(),
        }
    }

    pub fn with_crm(mut self, crm: Arc<dyn Crm>) -> Self {
        self.crm = Some(crm);
        self
    }

    pub fn with_intent_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.deps.intent = Some(classifier);
        self
    }

    pub fn with_consultant(mut self, consultant: Arc<dyn Consultant>) -> Self {
        self.deps.consultant = Some(consultant);
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.deps.knowledge = Some(knowledge);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.deps.store
    }

    pub async fn handle_incoming_message(&self, phone: &str, text: &str) -> String {
        self.handle_incoming_message_on(phone, text, Channel::Meta).await
    }

    /// Reply for one inbound message. Never fails; an empty reply means "send nothing".
    pub async fn handle_incoming_message_on(
        &self,
        phone: &str,
        text: &str,
        channel: Channel,
    ) -> String {
        let phone = normalize_phone(phone);
        if !self.settings.test_mode.allows(&phone) {
            debug!(
                event_name = "router.test_mode_dropped",
                phone = %phone,
                "caller not allow-listed"
            );
            return String::new();
        }

        info!(event_name = "router.message", phone = %phone, channel = %channel, "inbound message");
        let store = &self.deps.store;
        store.mark_user_activity(&phone, channel).await;
        self.spawn_crm_sync(&phone, text);

        let mut name_prefix = None;
        let mut text = text.to_string();
        if let Some(detected) = extract_name(&text) {
            store.set_customer_name(&phone, &detected.name).await;
            store.mark_greeted(&phone).await;
            let prefix = format!(
                "Hola {}, bienvenido a {COMPANY_NAME}. Soy tu asesor online.",
                detected.name
            );
            if is_only_greeting(&detected.remainder) {
                return format!("{prefix} ¿En qué puedo ayudarte hoy?");
            }
            name_prefix = Some(prefix);
            text = detected.remainder;
        }

        let local = local_time(self.clock.now(), self.settings.utc_offset_hours);
        let mut ctx = TurnContext {
            line_hint: store.line_hint(&phone).await,
            phone,
            text,
            is_weekend: is_weekend(local),
        };

        let mut body = String::new();
        for handler in &self.handlers {
            let Some(reply) = handler.attempt(&self.deps, &mut ctx).await else {
                continue;
            };
            debug!(
                event_name = "router.handled",
                phone = %ctx.phone,
                handler = handler.name(),
                "handler replied"
            );
            if handler.resets_listing() {
                store.clear_last_candidates(&ctx.phone).await;
                store.clear_search_pool(&ctx.phone).await;
            }
            body = reply;
            break;
        }

        match name_prefix {
            Some(prefix) => format!("{prefix}\n\n{body}"),
            None => self.with_greeting(&ctx.phone, body, local).await,
        }
    }

    async fn with_greeting(
        &self,
        phone: &str,
        body: String,
        local: DateTime<FixedOffset>,
    ) -> String {
        if body.is_empty() || !self.deps.store.should_greet(phone).await {
            return body;
        }
        self.deps.store.mark_greeted(phone).await;
        format!("{}. {body}", time_greeting(local))
    }

    fn spawn_crm_sync(&self, phone: &str, text: &str) {
        let Some(crm) = self.crm.clone() else {
            return;
        };
        let note = self.settings.test_mode.tagged(&format!("Mensaje WhatsApp: {text}"));
        let deal_name = self.settings.test_mode.tagged(DEAL_NAME);
        tokio::spawn(sync_crm(crm, phone.to_string(), note, deal_name));
    }
}
