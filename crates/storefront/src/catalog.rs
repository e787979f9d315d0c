//! Cached catalog snapshot.
//!
//! Products, categories and brands are fetched together and cached for the
//! configured TTL using `moka`. A snapshot is always replaced wholesale. When
//! a refresh fails the last good snapshot keeps being served, so a flaky
//! backend never empties the assistant's view of the catalog mid-session.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use mercadito_core::Product;

use crate::backend::{BackendError, CatalogSource, NamedEntity};

const SNAPSHOT_KEY: &str = "catalog";

/// Products, category names and brand names at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    /// Products in catalog order.
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    pub brands: Vec<String>,
}

impl CatalogSnapshot {
    /// Build a snapshot, dropping blank category and brand names.
    #[must_use]
    pub fn new(products: Vec<Product>, categories: Vec<String>, brands: Vec<String>) -> Self {
        Self {
            products,
            categories: clean_names(categories),
            brands: clean_names(brands),
        }
    }

    /// True when the snapshot has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

fn clean_names(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn entity_names(entities: Vec<NamedEntity>) -> Vec<String> {
    entities.into_iter().map(|entity| entity.name).collect()
}

/// Catalog reader with TTL caching and last-good fallback.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    source: Arc<dyn CatalogSource>,
    cache: Cache<&'static str, Arc<CatalogSnapshot>>,
    last_good: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogService {
    /// Create a catalog service whose snapshots stay fresh for `ttl`.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();

        Self {
            inner: Arc::new(CatalogServiceInner {
                source,
                cache,
                last_good: RwLock::new(None),
            }),
        }
    }

    /// Current snapshot.
    ///
    /// Concurrent callers share one fetch. If the fetch fails, the last good
    /// snapshot is returned, or an empty one when none was ever loaded.
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        match self
            .inner
            .cache
            .try_get_with(SNAPSHOT_KEY, self.fetch())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let last_good = self.inner.last_good.read().await.clone();
                warn!(
                    error = %e,
                    has_fallback = last_good.is_some(),
                    "Catalog refresh failed"
                );
                last_good.unwrap_or_default()
            }
        }
    }

    /// Drop the cached snapshot and fetch a new one.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the fetch fails. The previous snapshot
    /// remains available through [`Self::snapshot`].
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<CatalogSnapshot>, BackendError> {
        self.inner.cache.invalidate(SNAPSHOT_KEY).await;
        let snapshot = self.fetch().await?;
        self.inner
            .cache
            .insert(SNAPSHOT_KEY, Arc::clone(&snapshot))
            .await;
        Ok(snapshot)
    }

    async fn fetch(&self) -> Result<Arc<CatalogSnapshot>, BackendError> {
        let source = self.inner.source.as_ref();
        let (products, categories, brands) =
            tokio::try_join!(source.products(), source.categories(), source.brands())?;

        let snapshot = Arc::new(CatalogSnapshot::new(
            products,
            entity_names(categories),
            entity_names(brands),
        ));
        debug!(
            products = snapshot.products.len(),
            categories = snapshot.categories.len(),
            brands = snapshot.brands.len(),
            "Fetched catalog"
        );

        *self.inner.last_good.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
