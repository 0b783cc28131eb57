use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::text::strip_tags;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
    OnBackorder,
    Unknown(String),
}

impl StockStatus {
    pub fn from_api(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "instock" => Self::InStock,
            "outofstock" => Self::OutOfStock,
            "onbackorder" => Self::OnBackorder,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_api(&self) -> &str {
        match self {
            Self::InStock => "instock",
            Self::OutOfStock => "outofstock",
            Self::OnBackorder => "onbackorder",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// Short word shown in product lists when no quantity is tracked.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InStock => "disponible",
            Self::OutOfStock => "agotado",
            Self::OnBackorder => "bajo pedido",
            Self::Unknown(_) => "sin confirmar",
        }
    }
}

/// Typed product record at the catalog source boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Option<Decimal>,
    pub regular_price: Option<Decimal>,
    pub stock_status: StockStatus,
    pub stock_quantity: Option<i64>,
    pub manage_stock: bool,
    pub permalink: String,
    pub short_description: String,
    pub categories: Vec<String>,
}

impl CatalogRecord {
    /// Sale price when present, regular price otherwise.
    pub fn effective_price(&self) -> Option<Decimal> {
        self.price.or(self.regular_price)
    }

    /// Text the search index and the term filters look at.
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.categories.join(" "),
            strip_tags(&self.short_description)
        )
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id,
            name: if self.name.trim().is_empty() {
                "Producto".to_string()
            } else {
                self.name.clone()
            },
            sku: self.sku.clone(),
            price: self.effective_price(),
            stock_status: self.stock_status.clone(),
            stock_quantity: self.stock_quantity,
            permalink: self.permalink.clone(),
            categories: self.categories.clone(),
        }
    }
}

/// Read-only view of a product, as shown to and remembered for a caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Option<Decimal>,
    pub stock_status: StockStatus,
    pub stock_quantity: Option<i64>,
    pub permalink: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ProductSummary {
    pub fn sku_label(&self) -> String {
        if self.sku.trim().is_empty() {
            "SKU N/D".to_string()
        } else {
            format!("SKU {}", self.sku)
        }
    }

    pub fn stock_descriptor(&self) -> String {
        match self.stock_quantity {
            Some(quantity) if quantity > 0 => format!("{quantity} unidades"),
            Some(_) => "agotado".to_string(),
            None => self.stock_status.label().to_string(),
        }
    }

    pub fn search_text(&self) -> String {
        format!("{} {}", self.name, self.categories.join(" "))
    }
}
