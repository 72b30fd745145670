//! RocketShoes cart store.
//!
//! Client-side shopping cart for the storefront UI: tracks the products a
//! shopper selected and their quantities, keeps the cart durable across
//! reloads, and checks the inventory service before raising a quantity.
//!
//! # Architecture
//!
//! - [`store::CartStore`] owns the cart and exposes add/remove/update
//! - [`inventory::Inventory`] supplies stock levels and catalog records
//!   ([`inventory::HttpInventory`] in production)
//! - [`storage::CartStorage`] persists the cart snapshot
//!   ([`storage::FileStorage`] in production)
//! - [`notify::Notifier`] surfaces failure messages to the shopper
//!
//! # Example
//!
//! ```rust,ignore
//! use rocketshoes_cart::{CartConfig, CartStore, LogNotifier, UpdateProductAmount};
//! use rocketshoes_core::ProductId;
//!
//! let config = CartConfig::from_env()?;
//! let _telemetry = rocketshoes_cart::telemetry::init(&config)?;
//! let store = CartStore::open(&config, LogNotifier)?;
//!
//! store.add_product(ProductId::new(1)).await?;
//! store
//!     .update_product_amount(UpdateProductAmount { product_id: ProductId::new(1), amount: 3 })
//!     .await?;
//! println!("{} items", store.cart().item_count());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod inventory;
pub mod notify;
pub mod storage;
pub mod store;
pub mod telemetry;

pub use config::{CartConfig, ConfigError, InventoryConfig, Locale};
pub use error::{CartError, CartOperation};
pub use inventory::{HttpInventory, Inventory, InventoryError};
pub use notify::{ChannelNotifier, LogNotifier, NotificationMessages, Notifier};
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};
pub use store::{CartSnapshot, CartStore, StoreSettings, UpdateProductAmount};
