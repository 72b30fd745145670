//! HTTP inventory client implementation.
//!
//! Uses `reqwest` 0.13 for HTTP. Caches catalog records using `moka`.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use rocketshoes_core::{CatalogProduct, ProductId, Stock};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::cache::ProductCache;
use super::{Inventory, InventoryError};
use crate::config::InventoryConfig;

/// Client for the inventory/catalog REST API.
///
/// Cheaply cloneable; clones share the connection pool and product cache.
#[derive(Clone)]
pub struct HttpInventory {
    inner: Arc<HttpInventoryInner>,
}

struct HttpInventoryInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
    cache: ProductCache,
}

impl std::fmt::Debug for HttpInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInventory")
            .field("base_url", &self.inner.base_url.as_str())
            .field(
                "api_token",
                &self.inner.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpInventory {
    /// Create a new inventory client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &InventoryConfig) -> Result<Self, InventoryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpInventoryInner {
                client,
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
                cache: ProductCache::new(config.product_cache_ttl),
            }),
        })
    }

    /// Issue a GET against `path` (relative to the base URL) and decode JSON.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, InventoryError> {
        let url = self.inner.base_url.join(path)?;

        let mut request = self
            .inner
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.inner.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(InventoryError::RateLimited(retry_after));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(InventoryError::NotFound(path.to_string()));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Inventory API returned non-success status"
            );
            return Err(InventoryError::Status {
                status: status.as_u16(),
                body: response_text.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse inventory response"
            );
            InventoryError::Parse(e)
        })
    }
}

impl Inventory for HttpInventory {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn stock(&self, id: ProductId) -> Result<Stock, InventoryError> {
        let stock: Stock = self.get_json(&format!("stock/{id}")).await?;

        if stock.id != id {
            return Err(InventoryError::Malformed(format!(
                "requested stock for {id}, got {}",
                stock.id
            )));
        }

        debug!(available = stock.amount, "Fetched stock");
        Ok(stock)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: ProductId) -> Result<CatalogProduct, InventoryError> {
        if let Some(product) = self.inner.cache.get(id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let product: CatalogProduct = self.get_json(&format!("products/{id}")).await?;

        if product.id != id {
            return Err(InventoryError::Malformed(format!(
                "requested product {id}, got {}",
                product.id
            )));
        }

        self.inner.cache.insert(product.clone()).await;

        Ok(product)
    }
}
