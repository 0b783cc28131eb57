//! Conversation brain of the WhatsApp sales assistant.
//!
//! # Architecture
//!
//! Every inbound message flows through [`router::MessageRouter`], an ordered cascade:
//! 1. **Pending list** - "1".."3" picks from the last product list, "más opciones" pages the pool
//! 2. **Playbook** (`menu`) - exact menu and brochure triggers
//! 3. **Informational** (`faq`, `knowledge`, `info`) - links, hours, location, curated answers
//! 4. **SKU lookup** - numeric codes checked against the live catalog
//! 5. **Consultative** - one clarifying question per topic
//! 6. **Product search** (`search`) - tiered live/cache search with optional reranking
//!
//! [`followup::IdleScheduler`] runs beside the router and nudges callers who go quiet.
//!
//! # Safety Principle
//!
//! The language model (`llm`) only classifies and orders. Prices, stock and product names always
//! come from the catalog, and model answers are filtered to what the bot actually offered.

pub mod faq;
pub mod followup;
pub mod info;
pub mod knowledge;
pub mod llm;
pub mod menu;
pub mod names;
pub mod router;
pub mod search;

pub use followup::{IdleScheduler, IdleSweep};
pub use knowledge::KnowledgeBase;
pub use llm::{
    LlmClient, LlmConsultant, LlmIntentClassifier, LlmQueryPlanner, LlmReranker, ResponsesClient,
};
pub use router::{MessageRouter, RouterSettings};
pub use search::{ProductSearch, SearchError, SearchOutcome};
