//! Catalog records, cart line items, and stock snapshots.
//!
//! Product attributes other than `id` and `amount` are opaque to the cart:
//! they are captured in a passthrough map so a line item serializes back with
//! exactly the fields the catalog served.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::ProductId;
use super::price::Price;

/// A product record as served by the catalog (`GET /products/{id}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    /// Catalog product ID.
    pub id: ProductId,
    /// Passthrough attributes (title, price, image, ...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl CatalogProduct {
    /// Build a cart line item holding a single unit of this product.
    ///
    /// A stray `amount` attribute in the catalog record is dropped so it can
    /// never shadow the line item's quantity.
    #[must_use]
    pub fn into_line_item(mut self) -> Product {
        self.attributes.remove("amount");
        Product {
            id: self.id,
            attributes: self.attributes,
            amount: 1,
        }
    }
}

/// A cart line item: a catalog product paired with a chosen quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog product ID. Unique within a cart.
    pub id: ProductId,
    /// Passthrough attributes copied from the catalog record.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    /// Quantity held in the cart.
    pub amount: u32,
}

impl Product {
    /// Look up a passthrough attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Product title, if the catalog provided one.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.attribute("title").and_then(Value::as_str)
    }

    /// Unit price parsed from the `price` attribute.
    ///
    /// Returns `None` when the attribute is missing or not a valid price.
    #[must_use]
    pub fn price(&self) -> Option<Price> {
        self.attribute("price")
            .and_then(|value| Price::from_json(value).ok())
    }

    /// Unit price multiplied by the quantity held.
    ///
    /// Returns `None` when there is no valid price or the total overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Price> {
        self.price().and_then(|price| price.times(self.amount))
    }

    /// Copy of this line item with a different quantity.
    #[must_use]
    pub fn with_amount(&self, amount: u32) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }
}

/// Units currently available for a product (`GET /stock/{id}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    /// Product this stock record belongs to.
    pub id: ProductId,
    /// Units available. Upstream may report zero or negative values.
    pub amount: i64,
}

impl Stock {
    /// Whether `requested` units fit within the available stock.
    #[must_use]
    pub fn covers(&self, requested: i64) -> bool {
        requested <= self.amount
    }
}
