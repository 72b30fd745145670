//! Inventory and catalog lookups.
//!
//! # Architecture
//!
//! - The cart talks to the inventory service through the [`Inventory`] trait
//! - [`HttpInventory`] is the production implementation over `reqwest`
//! - Catalog records are cached in memory via `moka`; stock never is, since a
//!   stale stock figure would let the cart exceed availability
//!
//! # Endpoints
//!
//! - `GET {base}/stock/{id}` → `{ "id": 1, "amount": 3 }`
//! - `GET {base}/products/{id}` → `{ "id": 1, "title": "...", "price": 179.9, ... }`

use std::future::Future;
use std::sync::Arc;

use rocketshoes_core::{CatalogProduct, ProductId, Stock};
use thiserror::Error;

mod cache;
mod client;

pub use client::HttpInventory;

/// Errors that can occur when interacting with the inventory API.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with an unexpected status code.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the inventory service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response parsed but is unusable (e.g. describes another product).
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Request URL could not be built.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Source of stock levels and catalog records.
///
/// Implementations must be cheap to share across tasks; the cart store holds
/// one instance for its whole lifetime.
pub trait Inventory: Send + Sync + 'static {
    /// Fetch the units currently available for `id`.
    fn stock(&self, id: ProductId) -> impl Future<Output = Result<Stock, InventoryError>> + Send;

    /// Fetch the catalog record for `id`.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<CatalogProduct, InventoryError>> + Send;
}

impl<T: Inventory> Inventory for Arc<T> {
    fn stock(&self, id: ProductId) -> impl Future<Output = Result<Stock, InventoryError>> + Send {
        (**self).stock(id)
    }

    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<CatalogProduct, InventoryError>> + Send {
        (**self).product(id)
    }
}
