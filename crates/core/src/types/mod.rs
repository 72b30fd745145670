//! Core types for RocketShoes.
//!
//! This module provides type-safe wrappers for cart and catalog concepts.

pub mod id;
pub mod price;
pub mod product;

pub use id::*;
pub use price::{CurrencyCode, Price, PriceError};
pub use product::{CatalogProduct, Product, Stock};
