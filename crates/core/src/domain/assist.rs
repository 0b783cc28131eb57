//! Value types exchanged with the language-model helpers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::line::LineKey;
use super::product::{ProductId, ProductSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoIntent {
    CompanyInfo,
    Services,
    LineInfo,
    Catalog,
    Faq,
    ProductSearch,
    Other,
}

impl InfoIntent {
    pub const ALL: [InfoIntent; 7] = [
        Self::CompanyInfo,
        Self::Services,
        Self::LineInfo,
        Self::Catalog,
        Self::Faq,
        Self::ProductSearch,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompanyInfo => "company_info",
            Self::Services => "services",
            Self::LineInfo => "line_info",
            Self::Catalog => "catalog",
            Self::Faq => "faq",
            Self::ProductSearch => "product_search",
            Self::Other => "other",
        }
    }

    /// Intents the router leaves to the later product handlers.
    pub fn falls_through(self) -> bool {
        matches!(self, Self::ProductSearch | Self::Other)
    }
}

impl FromStr for InfoIntent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == value)
            .ok_or_else(|| format!("unknown intent `{value}`"))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntentResult {
    pub intent: InfoIntent,
    pub line_key: Option<LineKey>,
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchPlan {
    pub queries: Vec<String>,
    pub should_ask: bool,
    pub question: Option<String>,
}

/// Compact product description handed to the reranker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RerankCandidate {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: String,
    pub stock: String,
    pub categories: Vec<String>,
}

impl From<&ProductSummary> for RerankCandidate {
    fn from(product: &ProductSummary) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            sku: product.sku.clone(),
            price: product.price.map(|price| price.to_string()).unwrap_or_default(),
            stock: product.stock_descriptor(),
            categories: product.categories.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RerankOutcome {
    pub selected_ids: Vec<ProductId>,
    pub clarifying_question: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionChoice {
    pub key: String,
    pub question: String,
}
