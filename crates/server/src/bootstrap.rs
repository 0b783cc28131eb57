use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use chrono::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use aquabot_agent::{
    KnowledgeBase, LlmClient, LlmConsultant, LlmIntentClassifier, LlmQueryPlanner, LlmReranker,
    MessageRouter, ProductSearch, ResponsesClient, RouterSettings,
};
use aquabot_channels::{ChannelError, ChannelSender};
use aquabot_core::clock::{Clock, SystemClock};
use aquabot_core::config::{AppConfig, ConfigError};
use aquabot_core::domain::product::CatalogRecord;
use aquabot_core::errors::CollaboratorError;
use aquabot_core::ports::{CatalogSource, CollaboratorResult, Crm};
use aquabot_store::{CatalogCache, CatalogCacheSettings, SessionStore};

use crate::clientify::ClientifyCrm;
use crate::health::{self, HealthState};
use crate::inventory::{self, InventoryState};
use crate::webhook::{self, WebhookState};
use crate::woocommerce::WooCommerceSource;

const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 3600;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<SessionStore>,
    pub catalog: Arc<dyn CatalogSource>,
    pub cache: Arc<CatalogCache>,
    pub router: Arc<MessageRouter>,
    pub sender: Arc<ChannelSender>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("collaborator setup failed: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error("channel setup failed: {0}")]
    Channel(#[from] ChannelError),
    #[error("llm client setup failed: {0}")]
    Llm(String),
}

/// Catalog stand-in when WooCommerce is not configured; every lookup reports it as disabled.
struct UnconfiguredCatalog;

#[async_trait]
impl CatalogSource for UnconfiguredCatalog {
    async fn list_products(&self, _: u32, _: u32) -> CollaboratorResult<Vec<CatalogRecord>> {
        Err(CollaboratorError::Disabled("woocommerce".to_string()))
    }

    async fn search_products(&self, _: &str, _: u32) -> CollaboratorResult<Vec<CatalogRecord>> {
        Err(CollaboratorError::Disabled("woocommerce".to_string()))
    }

    async fn product_by_sku(&self, _: &str) -> CollaboratorResult<Option<CatalogRecord>> {
        Err(CollaboratorError::Disabled("woocommerce".to_string()))
    }
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(SessionStore::new(
        clock.clone(),
        config.session.ttl(),
        config.session.greeting_window(),
    ));

    let catalog = catalog_source(&config)?;
    let cache = Arc::new(CatalogCache::new(
        catalog.clone(),
        clock.clone(),
        CatalogCacheSettings {
            ttl: Duration::seconds(config.catalog.cache_ttl_secs.min(MAX_CACHE_TTL_SECS) as i64),
            page_size: config.catalog.page_size,
            max_pages: config.catalog.max_pages,
        },
    ));

    let llm = llm_client(&config)?;
    let mut search = ProductSearch::new(catalog.clone(), cache.clone());
    if let Some(client) = llm.as_ref() {
        if config.llm.planner {
            search = search.with_planner(Arc::new(LlmQueryPlanner::new(client.clone())));
        }
        if config.llm.rerank {
            search = search.with_reranker(Arc::new(LlmReranker::new(client.clone())));
        }
    }

    let mut router = MessageRouter::new(
        store.clone(),
        Arc::new(search),
        catalog.clone(),
        clock.clone(),
        RouterSettings::from_config(&config),
    )
    .with_knowledge(Arc::new(KnowledgeBase::new(&config.knowledge, clock.clone())));
    if let Some(client) = llm.as_ref() {
        if config.llm.intent {
            router =
                router.with_intent_classifier(Arc::new(LlmIntentClassifier::new(client.clone())));
        }
        if config.llm.consultant {
            router = router.with_consultant(Arc::new(LlmConsultant::new(client.clone())));
        }
    }
    if let Some(crm) = crm_client(&config)? {
        router = router.with_crm(crm);
    }

    let sender = Arc::new(ChannelSender::from_config(&config)?);
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        catalog = config.catalog.is_configured(),
        llm = llm.is_some(),
        meta = sender.has_meta(),
        twilio = sender.has_twilio(),
        "application wired"
    );

    Ok(Application { config, store, catalog, cache, router: Arc::new(router), sender })
}

fn catalog_source(config: &AppConfig) -> Result<Arc<dyn CatalogSource>, BootstrapError> {
    match WooCommerceSource::new(&config.catalog) {
        Ok(source) => Ok(Arc::new(source)),
        Err(CollaboratorError::Disabled(_)) => {
            warn!(
                event_name = "system.bootstrap.catalog_disabled",
                correlation_id = "bootstrap",
                "catalog is not configured; product questions get a canned apology"
            );
            Ok(Arc::new(UnconfiguredCatalog))
        }
        Err(error) => Err(error.into()),
    }
}

fn llm_client(config: &AppConfig) -> Result<Option<Arc<dyn LlmClient>>, BootstrapError> {
    let llm = &config.llm;
    let wanted = [llm.intent, llm.planner, llm.rerank, llm.consultant]
        .into_iter()
        .any(|toggle| llm.helper_enabled(toggle));
    if !wanted {
        return Ok(None);
    }
    let client =
        ResponsesClient::new(llm).map_err(|error| BootstrapError::Llm(error.to_string()))?;
    Ok(Some(Arc::new(client)))
}

fn crm_client(config: &AppConfig) -> Result<Option<Arc<dyn Crm>>, BootstrapError> {
    match ClientifyCrm::new(&config.crm) {
        Ok(crm) => Ok(Some(Arc::new(crm))),
        Err(CollaboratorError::Disabled(_)) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

impl Application {
    pub fn http_router(&self) -> Router {
        let mut channels = Vec::new();
        if self.sender.has_meta() {
            channels.push("whatsapp");
        }
        if self.sender.has_twilio() {
            channels.push("twilio");
        }

        health::router(HealthState {
            catalog: self.cache.clone(),
            catalog_configured: self.config.catalog.is_configured(),
            channels,
        })
        .merge(webhook::router(WebhookState {
            router: self.router.clone(),
            sender: self.sender.clone(),
            verify_token: self.config.whatsapp.verify_token.clone(),
        }))
        .merge(inventory::router(InventoryState { catalog: self.catalog.clone() }))
    }

    /// Loads the catalog in the background so the first caller does not wait for it.
    pub fn spawn_catalog_warmup(&self) -> Option<JoinHandle<()>> {
        if !self.config.catalog.is_configured() {
            return None;
        }
        let cache = self.cache.clone();
        Some(tokio::spawn(async move {
            if let Err(error) = cache.refresh_if_needed().await {
                warn!(
                    event_name = "system.bootstrap.catalog_warmup_failed",
                    correlation_id = "bootstrap",
                    error = %error,
                    "catalog warm-up failed; it will retry on the next search"
                );
            }
        }))
    }
}
