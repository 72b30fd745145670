//! RocketShoes Core - Shared types library.
//!
//! This crate provides the types shared by the cart store and its
//! collaborators:
//! - `ProductId` - type-safe product identifier
//! - `Product` - a cart line item (catalog record plus quantity)
//! - `CatalogProduct` - a catalog record as served by the inventory API
//! - `Stock` - available units for a product
//! - `Price` - decimal price parsed from a product's passthrough attributes
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
