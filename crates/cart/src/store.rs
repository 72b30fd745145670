//! The cart store.
//!
//! [`CartStore`] owns the authoritative list of line items. It validates
//! quantities against live stock before committing, writes a snapshot to
//! durable storage on every committed change, and publishes the new list to
//! subscribers.
//!
//! # Concurrency
//!
//! - `add_product` and `update_product_amount` hold a per-product lock for the
//!   whole operation, so two calls for the same product run one after the
//!   other and the second sees the first one's result.
//! - Every mutation is re-resolved against the latest list inside a single
//!   commit section that also persists and publishes, so a write to storage
//!   always matches the in-memory list it came from.
//! - `remove_product` makes no network call and commits immediately. An add or
//!   update racing with it for the same product finds the line gone at commit
//!   time and reports `NotFound` instead of resurrecting it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

use rocketshoes_core::{CurrencyCode, Price, Product, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::{CartConfig, DEFAULT_STORAGE_KEY};
use crate::error::{CartError, CartOperation, Result, add_breadcrumb};
use crate::inventory::{HttpInventory, Inventory, InventoryError};
use crate::notify::{NotificationMessages, Notifier};
use crate::storage::{CartStorage, FileStorage};

// =============================================================================
// CartSnapshot
// =============================================================================

/// Immutable view of the cart at one point in time.
///
/// Cheap to clone; readers never block writers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSnapshot(Arc<[Product]>);

impl CartSnapshot {
    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[Product] {
        &self.0
    }

    /// Line item for `id`, if present.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.0.iter().find(|p| p.id == id)
    }

    /// Total number of units across all line items.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.0.iter().map(|p| u64::from(p.amount)).sum()
    }

    /// Sum of line totals.
    ///
    /// Items without a parseable price, or whose total overflows, count as
    /// zero.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        let amount = self
            .0
            .iter()
            .filter_map(Product::line_total)
            .fold(Decimal::ZERO, |total, line| {
                total.checked_add(line.amount).unwrap_or_else(|| {
                    warn!(line_total = %line, "Cart subtotal overflow, skipping line");
                    total
                })
            });
        Price::new(amount, CurrencyCode::default())
    }
}

impl Deref for CartSnapshot {
    type Target = [Product];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Product>> for CartSnapshot {
    fn from(items: Vec<Product>) -> Self {
        Self(items.into())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Input for [`CartStore::update_product_amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductAmount {
    /// Product whose quantity changes.
    pub product_id: ProductId,
    /// Target quantity. Zero or negative values are ignored.
    pub amount: i64,
}

/// Store settings that do not involve a collaborator.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Storage key of the cart snapshot.
    pub storage_key: String,
    /// User-facing failure messages.
    pub messages: NotificationMessages,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            messages: NotificationMessages::default(),
        }
    }
}

impl StoreSettings {
    /// Settings derived from the application configuration.
    #[must_use]
    pub fn from_config(config: &CartConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            messages: NotificationMessages::for_locale(config.locale),
        }
    }
}

// =============================================================================
// CartStore
// =============================================================================

/// Shopping cart with stock validation and durable snapshots.
///
/// Construct once and hand clones to whatever needs the cart; clones share
/// the same state.
pub struct CartStore<I, S, N> {
    inner: Arc<CartStoreInner<I, S, N>>,
}

struct CartStoreInner<I, S, N> {
    inventory: I,
    storage: S,
    notifier: N,
    settings: StoreSettings,
    state: watch::Sender<CartSnapshot>,
    commit: Mutex<()>,
    // One entry per product touched this session
    product_locks: Mutex<HashMap<ProductId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<I, S, N> Clone for CartStore<I, S, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N: Notifier> CartStore<HttpInventory, FileStorage, N> {
    /// Open the production store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory HTTP client cannot be built.
    pub fn open(config: &CartConfig, notifier: N) -> std::result::Result<Self, InventoryError> {
        let inventory = HttpInventory::new(&config.inventory)?;
        let storage = FileStorage::new(&config.cart_file);
        Ok(Self::with_settings(
            inventory,
            storage,
            notifier,
            StoreSettings::from_config(config),
        ))
    }
}

impl<I, S, N> CartStore<I, S, N>
where
    I: Inventory,
    S: CartStorage,
    N: Notifier,
{
    /// Create a store with default settings, restoring any persisted cart.
    pub fn new(inventory: I, storage: S, notifier: N) -> Self {
        Self::with_settings(inventory, storage, notifier, StoreSettings::default())
    }

    /// Create a store, restoring the cart persisted under `settings.storage_key`.
    ///
    /// A missing, unreadable, or unparseable snapshot yields an empty cart.
    pub fn with_settings(inventory: I, storage: S, notifier: N, settings: StoreSettings) -> Self {
        let items = load_snapshot(&storage, &settings.storage_key);
        info!(
            storage_key = %settings.storage_key,
            line_items = items.len(),
            "Cart restored"
        );

        let (state, _) = watch::channel(CartSnapshot::from(items));

        Self {
            inner: Arc::new(CartStoreInner {
                inventory,
                storage,
                notifier,
                settings,
                state,
                commit: Mutex::new(()),
                product_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Current cart contents.
    #[must_use]
    pub fn cart(&self) -> CartSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receive the cart after every committed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.state.subscribe()
    }

    /// Settings this store was created with.
    #[must_use]
    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    /// Add one unit of `product_id`, or start a new line item at one unit.
    ///
    /// # Errors
    ///
    /// - `StockExceeded` if the incremented quantity exceeds stock
    /// - `Upstream` if the stock or catalog lookup fails
    ///
    /// The shopper is notified before the error is returned.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(&self, product_id: ProductId) -> Result<Product> {
        let lock = self.product_lock(product_id);
        let _guard = lock.lock().await;

        let result = self.try_add(product_id).await;
        self.finish(CartOperation::Add, result)
    }

    /// Remove the line item for `product_id` entirely.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the product is not in the cart
    ///
    /// The shopper is notified before the error is returned.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub fn remove_product(&self, product_id: ProductId) -> Result<Product> {
        let result = self.commit(|items| {
            let index = items
                .iter()
                .position(|p| p.id == product_id)
                .ok_or(CartError::NotFound {
                    operation: CartOperation::Remove,
                    product_id,
                })?;
            Ok(items.remove(index))
        });
        self.finish(CartOperation::Remove, result)
    }

    /// Set the quantity of an existing line item.
    ///
    /// Returns `Ok(None)` without touching anything when `amount <= 0`.
    ///
    /// # Errors
    ///
    /// - `StockExceeded` if `amount` exceeds stock
    /// - `NotFound` if the product is not in the cart
    /// - `Upstream` if the stock lookup fails
    ///
    /// The shopper is notified before the error is returned.
    #[instrument(skip(self, update), fields(product_id = %update.product_id, amount = update.amount))]
    pub async fn update_product_amount(
        &self,
        update: UpdateProductAmount,
    ) -> Result<Option<Product>> {
        if update.amount <= 0 {
            debug!("Ignoring non-positive amount");
            return Ok(None);
        }

        let lock = self.product_lock(update.product_id);
        let _guard = lock.lock().await;

        let result = self.try_update(update).await.map(Some);
        self.finish(CartOperation::UpdateAmount, result)
    }

    async fn try_add(&self, product_id: ProductId) -> Result<Product> {
        let upstream = |source| CartError::Upstream {
            operation: CartOperation::Add,
            product_id,
            source,
        };

        if self.cart().get(product_id).is_some() {
            let stock = self.inner.inventory.stock(product_id).await.map_err(upstream)?;

            return self.commit(|items| {
                let line = items
                    .iter_mut()
                    .find(|p| p.id == product_id)
                    .ok_or(CartError::NotFound {
                        operation: CartOperation::Add,
                        product_id,
                    })?;

                let requested = i64::from(line.amount) + 1;
                let exceeded = CartError::StockExceeded {
                    operation: CartOperation::Add,
                    product_id,
                    requested,
                    available: stock.amount,
                };
                if !stock.covers(requested) {
                    return Err(exceeded);
                }

                line.amount = line.amount.checked_add(1).ok_or(exceeded)?;
                Ok(line.clone())
            });
        }

        let product = self.inner.inventory.product(product_id).await.map_err(upstream)?;

        // Lines are only created here, under the product lock
        self.commit(|items| {
            let line = product.into_line_item();
            items.push(line.clone());
            Ok(line)
        })
    }

    async fn try_update(&self, update: UpdateProductAmount) -> Result<Product> {
        let UpdateProductAmount { product_id, amount } = update;

        let stock = self
            .inner
            .inventory
            .stock(product_id)
            .await
            .map_err(|source| CartError::Upstream {
                operation: CartOperation::UpdateAmount,
                product_id,
                source,
            })?;

        let exceeded = CartError::StockExceeded {
            operation: CartOperation::UpdateAmount,
            product_id,
            requested: amount,
            available: stock.amount,
        };
        if !stock.covers(amount) {
            return Err(exceeded);
        }
        let amount = u32::try_from(amount).map_err(|_| exceeded)?;

        self.commit(|items| {
            let line = items
                .iter_mut()
                .find(|p| p.id == product_id)
                .ok_or(CartError::NotFound {
                    operation: CartOperation::UpdateAmount,
                    product_id,
                })?;

            line.amount = amount;
            Ok(line.clone())
        })
    }

    /// Apply `mutate` to the latest list; on success persist and publish.
    fn commit<T>(&self, mutate: impl FnOnce(&mut Vec<Product>) -> Result<T>) -> Result<T> {
        let _commit = self
            .inner
            .commit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut items = self.inner.state.borrow().to_vec();
        let value = mutate(&mut items)?;

        self.persist(&items);
        self.inner.state.send_replace(CartSnapshot::from(items));

        Ok(value)
    }

    /// Write the snapshot. Failures are logged and reported, never returned.
    fn persist(&self, items: &[Product]) {
        let key = &self.inner.settings.storage_key;

        let written = serde_json::to_string(items)
            .map_err(|e| e.to_string())
            .and_then(|body| {
                self.inner
                    .storage
                    .set(key, &body)
                    .map_err(|e| e.to_string())
            });

        if let Err(error) = written {
            let event_id = sentry::capture_message(
                &format!("Failed to persist cart snapshot: {error}"),
                sentry::Level::Error,
            );
            tracing::error!(
                error = %error,
                storage_key = %key,
                sentry_event_id = %event_id,
                "Failed to persist cart snapshot"
            );
        }
    }

    /// Notify on failure, leave a breadcrumb on success.
    fn finish<T: LineItemOutcome>(&self, operation: CartOperation, result: Result<T>) -> Result<T> {
        match &result {
            Ok(outcome) => {
                if let Some(line) = outcome.line_item() {
                    let amount = (operation != CartOperation::Remove).then_some(line.amount);
                    add_breadcrumb(operation, line.id, amount);
                    info!(%operation, product_id = %line.id, amount = line.amount, "Cart updated");
                }
            }
            Err(error) => {
                error.report();
                self.inner
                    .notifier
                    .notify_error(self.inner.settings.messages.for_error(error));
            }
        }
        result
    }

    fn product_lock(&self, product_id: ProductId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .product_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match locks.entry(product_id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::default())),
        }
    }
}

/// Successful operation results that may carry the affected line item.
trait LineItemOutcome {
    fn line_item(&self) -> Option<&Product>;
}

impl LineItemOutcome for Product {
    fn line_item(&self) -> Option<&Product> {
        Some(self)
    }
}

impl LineItemOutcome for Option<Product> {
    fn line_item(&self) -> Option<&Product> {
        self.as_ref()
    }
}

/// Read the persisted cart, falling back to an empty one.
fn load_snapshot<S: CartStorage>(storage: &S, key: &str) -> Vec<Product> {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, storage_key = %key, "Could not read cart snapshot");
            return Vec::new();
        }
    };

    let items: Vec<Product> = match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, storage_key = %key, "Discarding unparseable cart snapshot");
            return Vec::new();
        }
    };

    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            if item.amount == 0 {
                warn!(product_id = %item.id, "Dropping line item with zero amount");
                return false;
            }
            if !seen.insert(item.id) {
                warn!(product_id = %item.id, "Dropping duplicate line item");
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::significant_drop_tightening)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use rocketshoes_core::{CatalogProduct, Stock};
    use serde_json::json;
    use tokio::task::JoinSet;

    use super::*;
    use crate::storage::MemoryStorage;

    // =========================================================================
    // Fakes
    // =========================================================================

    #[derive(Default)]
    struct FakeInventory {
        stock: Mutex<HashMap<ProductId, i64>>,
        catalog: HashMap<ProductId, CatalogProduct>,
        delay: Duration,
        stock_calls: AtomicUsize,
        product_calls: AtomicUsize,
    }

    impl FakeInventory {
        fn new() -> Self {
            let mut inventory = Self::default();
            for (id, title, price) in [
                (1, "Tênis de Caminhada Leve Confortável", 179.9),
                (2, "Tênis VR Caminhada Confortável Detalhes Couro Masculino", 139.9),
                (3, "Tênis Adidas Duramo Lite 2.0", 219.9),
            ] {
                let product: CatalogProduct = serde_json::from_value(json!({
                    "id": id,
                    "title": title,
                    "price": price,
                    "image": format!("https://rocketseat-cdn.s3-sa-east-1.amazonaws.com/modulo-redux/tenis{id}.jpg"),
                }))
                .unwrap();
                inventory.catalog.insert(product.id, product);
            }
            inventory
        }

        fn with_stock(self, id: i32, amount: i64) -> Self {
            self.stock.lock().unwrap().insert(ProductId::new(id), amount);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.stock_calls.load(Ordering::SeqCst),
                self.product_calls.load(Ordering::SeqCst),
            )
        }
    }

    impl Inventory for FakeInventory {
        async fn stock(&self, id: ProductId) -> std::result::Result<Stock, InventoryError> {
            self.stock_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let amount = self.stock.lock().unwrap().get(&id).copied();
            amount
                .map(|amount| Stock { id, amount })
                .ok_or_else(|| InventoryError::NotFound(format!("stock/{id}")))
        }

        async fn product(&self, id: ProductId) -> std::result::Result<CatalogProduct, InventoryError> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.catalog
                .get(&id)
                .cloned()
                .ok_or_else(|| InventoryError::NotFound(format!("products/{id}")))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify_error(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    type TestStore = CartStore<Arc<FakeInventory>, MemoryStorage, Arc<RecordingNotifier>>;

    struct Harness {
        store: TestStore,
        inventory: Arc<FakeInventory>,
        storage: MemoryStorage,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(inventory: FakeInventory, initial: Option<serde_json::Value>) -> Harness {
        let inventory = Arc::new(inventory);
        let storage = MemoryStorage::new();
        if let Some(initial) = initial {
            storage
                .set(DEFAULT_STORAGE_KEY, &initial.to_string())
                .unwrap();
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let store = CartStore::new(
            Arc::clone(&inventory),
            storage.clone(),
            Arc::clone(&notifier),
        );
        Harness {
            store,
            inventory,
            storage,
            notifier,
        }
    }

    fn persisted(storage: &MemoryStorage) -> Vec<Product> {
        serde_json::from_str(&storage.get(DEFAULT_STORAGE_KEY).unwrap().unwrap()).unwrap()
    }

    fn amounts(snapshot: &CartSnapshot) -> Vec<(i32, u32)> {
        snapshot.iter().map(|p| (p.id.as_i32(), p.amount)).collect()
    }

    fn seeded_cart() -> serde_json::Value {
        json!([
            {"id": 1, "title": "Tênis de Caminhada Leve Confortável", "price": 179.9, "amount": 2},
            {"id": 2, "title": "Tênis VR Caminhada Confortável Detalhes Couro Masculino", "price": 139.9, "amount": 1}
        ])
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    #[test]
    fn test_starts_empty_without_snapshot() {
        let h = harness(FakeInventory::new(), None);
        assert!(h.store.cart().is_empty());
    }

    #[test]
    fn test_restores_snapshot() {
        let h = harness(FakeInventory::new(), Some(seeded_cart()));
        assert_eq!(amounts(&h.store.cart()), vec![(1, 2), (2, 1)]);
        assert_eq!(
            h.store.cart().get(ProductId::new(1)).unwrap().title(),
            Some("Tênis de Caminhada Leve Confortável")
        );
    }

    #[test]
    fn test_invalid_snapshot_yields_empty_cart() {
        let storage = MemoryStorage::new();
        storage.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();

        let store = CartStore::new(
            Arc::new(FakeInventory::new()),
            storage,
            Arc::new(RecordingNotifier::default()),
        );
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_snapshot_duplicates_are_dropped() {
        let h = harness(
            FakeInventory::new(),
            Some(json!([
                {"id": 1, "amount": 2},
                {"id": 1, "amount": 5},
                {"id": 3, "amount": 0},
            ])),
        );
        assert_eq!(amounts(&h.store.cart()), vec![(1, 2)]);
    }

    // =========================================================================
    // add_product
    // =========================================================================

    #[tokio::test]
    async fn test_add_new_product() {
        let h = harness(FakeInventory::new().with_stock(3, 4), None);

        let line = h.store.add_product(ProductId::new(3)).await.unwrap();

        assert_eq!(line.amount, 1);
        assert_eq!(line.title(), Some("Tênis Adidas Duramo Lite 2.0"));
        assert!(line.attribute("image").is_some());
        assert_eq!(h.store.cart().items(), &[line]);
        assert_eq!(persisted(&h.storage), h.store.cart().to_vec());
        assert_eq!(h.inventory.calls(), (0, 1));
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_add_existing_product_increments() {
        let h = harness(FakeInventory::new().with_stock(1, 5), Some(seeded_cart()));
        let before = h.store.cart();

        let line = h.store.add_product(ProductId::new(1)).await.unwrap();

        assert_eq!(line.amount, 3);
        let after = h.store.cart();
        assert_eq!(amounts(&after), vec![(1, 3), (2, 1)]);
        assert_eq!(after.get(ProductId::new(2)), before.get(ProductId::new(2)));
        assert_eq!(
            after.get(ProductId::new(1)).unwrap().attributes,
            before.get(ProductId::new(1)).unwrap().attributes
        );
        assert_eq!(persisted(&h.storage), after.to_vec());
        assert_eq!(h.inventory.calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_add_beyond_stock_is_rejected() {
        let h = harness(FakeInventory::new().with_stock(1, 2), Some(seeded_cart()));
        let before = h.store.cart();
        let stored_before = h.storage.get(DEFAULT_STORAGE_KEY).unwrap();

        let err = h.store.add_product(ProductId::new(1)).await.unwrap_err();

        assert!(matches!(
            err,
            CartError::StockExceeded {
                operation: CartOperation::Add,
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(h.store.cart(), before);
        assert_eq!(h.storage.get(DEFAULT_STORAGE_KEY).unwrap(), stored_before);
        assert_eq!(h.notifier.messages(), vec!["requested quantity exceeds stock"]);
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_upstream_failure() {
        let h = harness(FakeInventory::new(), None);

        let err = h.store.add_product(ProductId::new(99)).await.unwrap_err();

        assert!(matches!(
            err,
            CartError::Upstream {
                operation: CartOperation::Add,
                source: InventoryError::NotFound(_),
                ..
            }
        ));
        assert!(h.store.cart().is_empty());
        assert!(h.storage.get(DEFAULT_STORAGE_KEY).unwrap().is_none());
        assert_eq!(h.notifier.messages(), vec!["failed to add product"]);
    }

    #[tokio::test]
    async fn test_add_existing_without_stock_record_is_upstream_failure() {
        let h = harness(FakeInventory::new(), Some(seeded_cart()));
        let before = h.store.cart();

        let err = h.store.add_product(ProductId::new(2)).await.unwrap_err();

        assert!(matches!(err, CartError::Upstream { .. }));
        assert_eq!(h.store.cart(), before);
        assert_eq!(h.notifier.messages(), vec!["failed to add product"]);
    }

    #[tokio::test]
    async fn test_stock_scenario_from_two_to_three() {
        let cart = json!([{"id": 1, "amount": 2}]);

        let h = harness(FakeInventory::new().with_stock(1, 2), Some(cart.clone()));
        assert!(h.store.add_product(ProductId::new(1)).await.is_err());
        assert_eq!(amounts(&h.store.cart()), vec![(1, 2)]);
        assert_eq!(h.notifier.messages(), vec!["requested quantity exceeds stock"]);

        let h = harness(FakeInventory::new().with_stock(1, 5), Some(cart));
        h.store.add_product(ProductId::new(1)).await.unwrap();
        assert_eq!(amounts(&h.store.cart()), vec![(1, 3)]);
    }

    // =========================================================================
    // remove_product
    // =========================================================================

    #[test]
    fn test_remove_present_product() {
        let h = harness(FakeInventory::new(), Some(seeded_cart()));
        let before = h.store.cart();

        let removed = h.store.remove_product(ProductId::new(1)).unwrap();

        assert_eq!(removed.id, ProductId::new(1));
        let after = h.store.cart();
        assert_eq!(after.items(), &before[1..]);
        assert_eq!(persisted(&h.storage), after.to_vec());
        assert_eq!(h.inventory.calls(), (0, 0));
    }

    #[test]
    fn test_remove_absent_product() {
        let h = harness(FakeInventory::new(), Some(seeded_cart()));
        let before = h.store.cart();

        let err = h.store.remove_product(ProductId::new(3)).unwrap_err();

        assert!(matches!(
            err,
            CartError::NotFound {
                operation: CartOperation::Remove,
                ..
            }
        ));
        assert_eq!(h.store.cart(), before);
        assert_eq!(h.notifier.messages(), vec!["failed to remove product"]);
    }

    // =========================================================================
    // update_product_amount
    // =========================================================================

    #[tokio::test]
    async fn test_update_non_positive_is_noop() {
        let h = harness(FakeInventory::new().with_stock(1, 5), Some(seeded_cart()));
        let before = h.store.cart();

        for amount in [0, -1, i64::MIN] {
            let result = h
                .store
                .update_product_amount(UpdateProductAmount {
                    product_id: ProductId::new(1),
                    amount,
                })
                .await
                .unwrap();
            assert!(result.is_none());
        }

        assert_eq!(h.store.cart(), before);
        assert_eq!(h.inventory.calls(), (0, 0));
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_update_within_stock() {
        let h = harness(FakeInventory::new().with_stock(2, 4), Some(seeded_cart()));
        let before = h.store.cart();

        let line = h
            .store
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(2),
                amount: 4,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(line, before.get(ProductId::new(2)).unwrap().with_amount(4));
        assert_eq!(amounts(&h.store.cart()), vec![(1, 2), (2, 4)]);
        assert_eq!(persisted(&h.storage), h.store.cart().to_vec());
    }

    #[tokio::test]
    async fn test_update_beyond_stock() {
        let h = harness(FakeInventory::new().with_stock(2, 4), Some(seeded_cart()));
        let before = h.store.cart();

        let err = h
            .store
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(2),
                amount: 5,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::StockExceeded { requested: 5, available: 4, .. }));
        assert_eq!(h.store.cart(), before);
        assert_eq!(h.notifier.messages(), vec!["requested quantity exceeds stock"]);
    }

    #[tokio::test]
    async fn test_update_absent_product() {
        let h = harness(FakeInventory::new().with_stock(3, 10), Some(seeded_cart()));

        let err = h
            .store
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(3),
                amount: 2,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CartError::NotFound {
                operation: CartOperation::UpdateAmount,
                ..
            }
        ));
        // Stock is checked before the cart is consulted
        assert_eq!(h.inventory.calls(), (1, 0));
        assert_eq!(h.notifier.messages(), vec!["failed to update product quantity"]);
    }

    #[tokio::test]
    async fn test_update_stock_failure() {
        let h = harness(FakeInventory::new(), Some(seeded_cart()));

        let err = h
            .store
            .update_product_amount(UpdateProductAmount {
                product_id: ProductId::new(1),
                amount: 1,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CartError::Upstream { .. }));
        assert_eq!(h.notifier.messages(), vec!["failed to update product quantity"]);
    }

    // =========================================================================
    // Persistence, subscriptions, concurrency
    // =========================================================================

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let h = harness(
            FakeInventory::new().with_stock(1, 5).with_stock(2, 5),
            None,
        );
        h.store.add_product(ProductId::new(2)).await.unwrap();
        h.store.add_product(ProductId::new(1)).await.unwrap();
        h.store.add_product(ProductId::new(1)).await.unwrap();

        let reopened = CartStore::new(
            Arc::new(FakeInventory::new()),
            h.storage.clone(),
            Arc::new(RecordingNotifier::default()),
        );

        assert_eq!(reopened.cart(), h.store.cart());
        assert_eq!(amounts(&reopened.cart()), vec![(2, 1), (1, 2)]);
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let h = harness(FakeInventory::new().with_stock(1, 5), None);
        let mut receiver = h.store.subscribe();

        h.store.add_product(ProductId::new(1)).await.unwrap();

        receiver.changed().await.unwrap();
        assert_eq!(amounts(&receiver.borrow_and_update()), vec![(1, 1)]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let inventory = FakeInventory::new()
            .with_stock(1, 10)
            .with_delay(Duration::from_millis(5));
        let h = harness(inventory, Some(json!([{"id": 1, "amount": 1}])));

        let mut tasks = JoinSet::new();
        for _ in 0..5 {
            let store = h.store.clone();
            tasks.spawn(async move { store.add_product(ProductId::new(1)).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(amounts(&h.store.cart()), vec![(1, 6)]);
        assert_eq!(persisted(&h.storage), h.store.cart().to_vec());
    }

    #[tokio::test]
    async fn test_concurrent_first_adds_create_one_line() {
        let inventory = FakeInventory::new()
            .with_stock(2, 10)
            .with_delay(Duration::from_millis(5));
        let h = harness(inventory, None);

        let (a, b) = tokio::join!(
            h.store.add_product(ProductId::new(2)),
            h.store.add_product(ProductId::new(2)),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(amounts(&h.store.cart()), vec![(2, 2)]);
        assert_eq!(h.inventory.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_remove_during_add_is_not_undone() {
        let inventory = FakeInventory::new()
            .with_stock(1, 10)
            .with_delay(Duration::from_millis(50));
        let h = harness(inventory, Some(json!([{"id": 1, "amount": 1}])));

        let store = h.store.clone();
        let add = tokio::spawn(async move { store.add_product(ProductId::new(1)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        h.store.remove_product(ProductId::new(1)).unwrap();

        let err = add.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            CartError::NotFound {
                operation: CartOperation::Add,
                ..
            }
        ));
        assert!(h.store.cart().is_empty());
        assert_eq!(h.notifier.messages(), vec!["failed to add product"]);
    }

    #[tokio::test]
    async fn test_portuguese_messages() {
        let inventory = Arc::new(FakeInventory::new().with_stock(1, 2));
        let storage = MemoryStorage::new();
        storage
            .set(DEFAULT_STORAGE_KEY, &seeded_cart().to_string())
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let store = CartStore::with_settings(
            inventory,
            storage,
            Arc::clone(&notifier),
            StoreSettings {
                storage_key: DEFAULT_STORAGE_KEY.to_string(),
                messages: NotificationMessages::portuguese(),
            },
        );

        let _ = store.add_product(ProductId::new(1)).await;
        let _ = store.remove_product(ProductId::new(3));

        assert_eq!(
            notifier.messages(),
            vec![
                "Quantidade solicitada fora de estoque",
                "Erro na remoção do produto"
            ]
        );
    }

    #[test]
    fn test_snapshot_totals() {
        let h = harness(FakeInventory::new(), Some(seeded_cart()));
        let cart = h.store.cart();

        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.subtotal().to_string(), "R$ 499.70");
    }

    #[test]
    fn test_subtotal_skips_overflowing_lines() {
        let h = harness(
            FakeInventory::new(),
            Some(json!([
                {"id": 1, "price": 1e28, "amount": 10},
                {"id": 2, "price": "50000000000000000000000000000", "amount": 1},
                {"id": 3, "price": "50000000000000000000000000000", "amount": 1},
                {"id": 4, "price": "20", "amount": 2}
            ])),
        );
        let cart = h.store.cart();

        // Line 1 overflows on its own; line 3 overflows the running total
        assert_eq!(
            cart.subtotal().amount,
            "50000000000000000000000000040".parse::<Decimal>().unwrap()
        );
    }
}
