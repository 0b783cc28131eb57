//! Narrow contracts for every external collaborator the bot talks to.
//!
//! Each trait has exactly one production implementation living next to its transport
//! (`aquabot-server`, `aquabot-channels`, `aquabot-agent::llm`) and in-test fakes elsewhere.

use async_trait::async_trait;

use crate::domain::assist::{
    IntentResult, QuestionChoice, RerankCandidate, RerankOutcome, SearchPlan,
};
use crate::domain::contact::{Contact, ContactId};
use crate::domain::line::LineKey;
use crate::domain::product::CatalogRecord;
use crate::domain::session::Channel;
use crate::errors::CollaboratorError;

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// One page of the published catalog, 1-based.
    async fn list_products(
        &self,
        page: u32,
        page_size: u32,
    ) -> CollaboratorResult<Vec<CatalogRecord>>;

    async fn search_products(
        &self,
        query: &str,
        page_size: u32,
    ) -> CollaboratorResult<Vec<CatalogRecord>>;

    async fn product_by_sku(&self, sku: &str) -> CollaboratorResult<Option<CatalogRecord>>;
}

#[async_trait]
pub trait Crm: Send + Sync {
    async fn get_or_create_contact_by_phone(&self, phone: &str) -> CollaboratorResult<Contact>;
    async fn add_note(&self, contact_id: &ContactId, text: &str) -> CollaboratorResult<()>;
    async fn create_deal(&self, contact_id: &ContactId, name: &str) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send(&self, channel: Channel, phone: &str, text: &str) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        line_hint: Option<LineKey>,
    ) -> CollaboratorResult<Option<IntentResult>>;
}

#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan(&self, text: &str) -> CollaboratorResult<SearchPlan>;
}

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        top_k: usize,
    ) -> CollaboratorResult<RerankOutcome>;
}

#[async_trait]
pub trait Consultant: Send + Sync {
    async fn select_question(
        &self,
        text: &str,
        line_hint: Option<LineKey>,
        asked_keys: &[String],
    ) -> CollaboratorResult<Option<QuestionChoice>>;
}
