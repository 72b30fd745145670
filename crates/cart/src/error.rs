//! Cart error handling with Sentry integration.
//!
//! Every cart operation returns `Result<T, CartError>` so callers and tests can
//! tell outcomes apart. The store also notifies the shopper before returning
//! an error, so UI code is free to ignore the result.

use std::fmt;

use rocketshoes_core::ProductId;
use thiserror::Error;

use crate::inventory::InventoryError;

/// The cart operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOperation {
    /// `add_product`
    Add,
    /// `remove_product`
    Remove,
    /// `update_product_amount`
    UpdateAmount,
}

impl fmt::Display for CartOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::UpdateAmount => "update_amount",
        })
    }
}

/// Errors returned by cart operations. The cart is unchanged in every case.
#[derive(Debug, Error)]
pub enum CartError {
    /// Requested quantity is larger than the available stock.
    #[error("Requested {requested} units of product {product_id}, only {available} in stock")]
    StockExceeded {
        operation: CartOperation,
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// The product is not in the cart.
    #[error("Product {product_id} is not in the cart")]
    NotFound {
        operation: CartOperation,
        product_id: ProductId,
    },

    /// Inventory or catalog lookup failed.
    #[error("Inventory lookup for product {product_id} failed: {source}")]
    Upstream {
        operation: CartOperation,
        product_id: ProductId,
        source: InventoryError,
    },
}

impl CartError {
    /// Operation that produced this error.
    #[must_use]
    pub const fn operation(&self) -> CartOperation {
        match self {
            Self::StockExceeded { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Upstream { operation, .. } => *operation,
        }
    }

    /// Product the failed operation targeted.
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        match self {
            Self::StockExceeded { product_id, .. }
            | Self::NotFound { product_id, .. }
            | Self::Upstream { product_id, .. } => *product_id,
        }
    }

    /// Log the error and capture upstream failures to Sentry.
    ///
    /// Stock and not-found errors are expected shopper outcomes and only logged.
    pub(crate) fn report(&self) {
        if matches!(self, Self::Upstream { .. }) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                operation = %self.operation(),
                sentry_event_id = %event_id,
                "Cart operation failed"
            );
        } else {
            tracing::info!(
                error = %self,
                operation = %self.operation(),
                "Cart operation rejected"
            );
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for a committed cart mutation.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// changes leading up to an error.
pub fn add_breadcrumb(operation: CartOperation, product_id: ProductId, amount: Option<u32>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some("cart".to_string()),
        message: Some(format!("{operation} product {product_id}")),
        level: sentry::Level::Info,
        ..Default::default()
    };

    breadcrumb.data.insert(
        "product_id".to_string(),
        serde_json::Value::from(product_id.as_i32()),
    );
    if let Some(amount) = amount {
        breadcrumb
            .data
            .insert("amount".to_string(), serde_json::Value::from(amount));
    }

    sentry::add_breadcrumb(breadcrumb);
}
