//! Cache for catalog records.

use std::time::Duration;

use moka::future::Cache;
use rocketshoes_core::{CatalogProduct, ProductId};

/// Catalog records keyed by product ID.
///
/// A zero TTL disables caching entirely.
#[derive(Clone)]
pub struct ProductCache {
    inner: Option<Cache<ProductId, CatalogProduct>>,
}

impl ProductCache {
    pub fn new(ttl: Duration) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    pub async fn get(&self, id: ProductId) -> Option<CatalogProduct> {
        match &self.inner {
            Some(cache) => cache.get(&id).await,
            None => None,
        }
    }

    pub async fn insert(&self, product: CatalogProduct) {
        if let Some(cache) = &self.inner {
            cache.insert(product.id, product).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn product(id: i32) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new(id),
            attributes: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = ProductCache::new(Duration::from_secs(60));
        assert!(cache.get(ProductId::new(1)).await.is_none());

        cache.insert(product(1)).await;
        assert_eq!(cache.get(ProductId::new(1)).await.unwrap().id, ProductId::new(1));
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let cache = ProductCache::new(Duration::ZERO);
        cache.insert(product(1)).await;
        assert!(cache.get(ProductId::new(1)).await.is_none());
    }
}
