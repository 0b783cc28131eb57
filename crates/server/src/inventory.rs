use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use aquabot_core::domain::product::CatalogRecord;
use aquabot_core::errors::ApplicationError;
use aquabot_core::ports::CatalogSource;

use crate::errors::{correlation_id, ApiError};

const SKU_NOT_FOUND: &str = "Producto no encontrado para ese SKU";

#[derive(Clone)]
pub struct InventoryState {
    pub catalog: Arc<dyn CatalogSource>,
}

/// Stock view of a single SKU for operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockInfo {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub manage_stock: bool,
    pub stock_quantity: Option<i64>,
    pub stock_status: String,
}

impl From<CatalogRecord> for StockInfo {
    fn from(record: CatalogRecord) -> Self {
        Self {
            id: record.id.0,
            stock_status: record.stock_status.as_api().to_string(),
            name: record.name,
            sku: record.sku,
            manage_stock: record.manage_stock,
            stock_quantity: record.stock_quantity,
        }
    }
}

pub fn router(state: InventoryState) -> Router {
    Router::new()
        .route("/woocommerce/inventory/sku/{sku}", get(stock_by_sku))
        .with_state(state)
}

pub async fn stock_by_sku(
    State(state): State<InventoryState>,
    Path(sku): Path<String>,
) -> Result<Json<StockInfo>, ApiError> {
    let correlation_id = correlation_id();
    let sku = sku.trim();
    if sku.is_empty() {
        let error = ApplicationError::InvalidInput("sku must not be empty".to_string());
        return Err(ApiError::from_application(error, &correlation_id));
    }
    match state.catalog.product_by_sku(sku).await {
        Ok(Some(record)) => Ok(Json(StockInfo::from(record))),
        Ok(None) => Err(ApiError::not_found(SKU_NOT_FOUND, &correlation_id)),
        Err(error) => Err(ApiError::from_application(error.into(), &correlation_id)),
    }
}
