//! WooCommerce REST catalog source (`/wp-json/wc/v3/products`).
//!
//! Credentials travel as `consumer_key`/`consumer_secret` query parameters. Every product payload
//! goes through [`into_record`]; products that fail to decode are skipped with a warning so one bad
//! listing never empties a whole page.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use aquabot_core::config::CatalogConfig;
use aquabot_core::domain::product::{CatalogRecord, ProductId, StockStatus};
use aquabot_core::errors::CollaboratorError;
use aquabot_core::ports::{CatalogSource, CollaboratorResult};

const COLLABORATOR: &str = "woocommerce";

pub struct WooCommerceSource {
    client: Client,
    api_base: String,
    consumer_key: SecretString,
    consumer_secret: SecretString,
}

impl WooCommerceSource {
    pub fn new(config: &CatalogConfig) -> CollaboratorResult<Self> {
        let base_url = config.base_url.as_deref().filter(|_| config.is_configured());
        let (Some(base_url), Some(consumer_key), Some(consumer_secret)) =
            (base_url, config.consumer_key.clone(), config.consumer_secret.clone())
        else {
            return Err(CollaboratorError::Disabled(COLLABORATOR.to_string()));
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| CollaboratorError::unavailable(COLLABORATOR, error))?;
        Ok(Self {
            client,
            api_base: format!("{}/wp-json/wc/v3", base_url.trim().trim_end_matches('/')),
            consumer_key,
            consumer_secret,
        })
    }

    fn products_request(&self, params: &[(&str, String)]) -> RequestBuilder {
        self.client.get(format!("{}/products", self.api_base)).query(params).query(&[
            ("consumer_key", self.consumer_key.expose_secret()),
            ("consumer_secret", self.consumer_secret.expose_secret()),
        ])
    }

    async fn fetch(&self, params: &[(&str, String)]) -> CollaboratorResult<Vec<CatalogRecord>> {
        let response = self
            .products_request(params)
            .send()
            .await
            .map_err(|error| CollaboratorError::unavailable(COLLABORATOR, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "woocommerce.request_failed",
                status = status.as_u16(),
                body = %body,
                "woocommerce returned an error status"
            );
            return Err(CollaboratorError::unavailable(COLLABORATOR, format!("status {status}")));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|error| CollaboratorError::malformed(COLLABORATOR, error))?;
        let records = records_from_payload(payload)?;
        debug!(event_name = "woocommerce.fetched", products = records.len(), "products fetched");
        Ok(records)
    }
}

#[async_trait]
impl CatalogSource for WooCommerceSource {
    async fn list_products(
        &self,
        page: u32,
        page_size: u32,
    ) -> CollaboratorResult<Vec<CatalogRecord>> {
        self.fetch(&[
            ("page", page.max(1).to_string()),
            ("per_page", page_size.clamp(1, 100).to_string()),
            ("status", "publish".to_string()),
        ])
        .await
    }

    async fn search_products(
        &self,
        query: &str,
        page_size: u32,
    ) -> CollaboratorResult<Vec<CatalogRecord>> {
        self.fetch(&[
            ("search", query.trim().to_string()),
            ("per_page", page_size.clamp(1, 100).to_string()),
        ])
        .await
    }

    async fn product_by_sku(&self, sku: &str) -> CollaboratorResult<Option<CatalogRecord>> {
        let records = self.fetch(&[("sku", sku.trim().to_string())]).await?;
        Ok(records.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct WooProduct {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    sku: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    regular_price: Option<String>,
    #[serde(default)]
    stock_status: Option<String>,
    #[serde(default)]
    stock_quantity: Option<i64>,
    /// `true`, `false` or `"parent"` for variations.
    #[serde(default)]
    manage_stock: Value,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    categories: Vec<WooCategory>,
}

#[derive(Debug, Deserialize)]
struct WooCategory {
    #[serde(default)]
    name: String,
}

fn records_from_payload(payload: Value) -> CollaboratorResult<Vec<CatalogRecord>> {
    let Value::Array(items) = payload else {
        return Err(CollaboratorError::malformed(COLLABORATOR, "expected a product list"));
    };
    let records = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<WooProduct>(item) {
            Ok(product) => Some(into_record(product)),
            Err(error) => {
                warn!(
                    event_name = "woocommerce.product_skipped",
                    error = %error,
                    "skipping product that failed to decode"
                );
                None
            }
        })
        .collect();
    Ok(records)
}

fn into_record(product: WooProduct) -> CatalogRecord {
    CatalogRecord {
        id: ProductId(product.id),
        name: product.name.trim().to_string(),
        sku: product.sku.trim().to_string(),
        price: parse_price(product.price.as_deref()),
        regular_price: parse_price(product.regular_price.as_deref()),
        stock_status: StockStatus::from_api(product.stock_status.as_deref().unwrap_or_default()),
        stock_quantity: product.stock_quantity,
        manage_stock: product.manage_stock.as_bool().unwrap_or(false),
        permalink: product.permalink,
        short_description: product.short_description,
        categories: product
            .categories
            .into_iter()
            .map(|category| category.name)
            .filter(|name| !name.trim().is_empty())
            .collect(),
    }
}

fn parse_price(raw: Option<&str>) -> Option<Decimal> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use aquabot_core::config::CatalogConfig;
    use aquabot_core::domain::product::{ProductId, StockStatus};
    use aquabot_core::errors::CollaboratorError;

    use super::{records_from_payload, WooCommerceSource};

    fn config() -> CatalogConfig {
        CatalogConfig {
            base_url: Some("https://tienda.example.co/".to_string()),
            consumer_key: Some("ck_test".to_string().into()),
            consumer_secret: Some("cs_test".to_string().into()),
            cache_ttl_secs: 600,
            page_size: 100,
            max_pages: 30,
            timeout_secs: 10,
        }
    }

    #[test]
    fn unconfigured_source_is_disabled() {
        let mut partial = config();
        partial.consumer_secret = None;
        assert!(matches!(
            WooCommerceSource::new(&partial),
            Err(CollaboratorError::Disabled(ref name)) if name == "woocommerce"
        ));
    }

    #[test]
    fn requests_carry_credentials_as_query_parameters() {
        let source = WooCommerceSource::new(&config()).expect("configured");
        let request = source
            .products_request(&[("sku", "BOM-1HP".to_string())])
            .build()
            .expect("request");

        assert_eq!(request.url().path(), "/wp-json/wc/v3/products");
        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert!(pairs.contains(&("sku".to_string(), "BOM-1HP".to_string())));
        assert!(pairs.contains(&("consumer_key".to_string(), "ck_test".to_string())));
        assert!(pairs.contains(&("consumer_secret".to_string(), "cs_test".to_string())));
    }

    #[test]
    fn product_payload_is_translated_into_catalog_records() {
        let payload = json!([
            {
                "id": 321,
                "name": " Bomba periférica 1HP ",
                "sku": "BOM-1HP",
                "price": "450000",
                "regular_price": "",
                "stock_status": "instock",
                "stock_quantity": 4,
                "manage_stock": true,
                "permalink": "https://tienda.example.co/producto/bomba",
                "short_description": "<p>Para agua limpia</p>",
                "categories": [{"id": 1, "name": "Bombeo"}, {"id": 2, "name": ""}]
            },
            {
                "id": 322,
                "name": "Variación",
                "price": "",
                "regular_price": "99000.50",
                "stock_status": "onbackorder",
                "stock_quantity": null,
                "manage_stock": "parent"
            }
        ]);

        let records = records_from_payload(payload).expect("records");
        assert_eq!(records.len(), 2);

        let pump = &records[0];
        assert_eq!(pump.id, ProductId(321));
        assert_eq!(pump.name, "Bomba periférica 1HP");
        assert_eq!(pump.price, Some(Decimal::new(450_000, 0)));
        assert_eq!(pump.regular_price, None);
        assert_eq!(pump.stock_status, StockStatus::InStock);
        assert!(pump.manage_stock);
        assert_eq!(pump.categories, vec!["Bombeo".to_string()]);

        let variation = &records[1];
        assert_eq!(variation.effective_price(), Some(Decimal::new(9_900_050, 2)));
        assert_eq!(variation.stock_status, StockStatus::OnBackorder);
        assert!(!variation.manage_stock);
    }

    #[test]
    fn undecodable_products_are_skipped_and_non_lists_rejected() {
        let records =
            records_from_payload(json!([{"name": "sin id"}, {"id": 9, "name": "Cloro"}]))
                .expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, ProductId(9));

        let error = records_from_payload(json!({"code": "woocommerce_rest_cannot_view"}))
            .expect_err("object payload");
        assert!(matches!(error, CollaboratorError::MalformedPayload { .. }));
    }
}
