//! Integration tests for Mercadito.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mercadito-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_sync` - Synchronizer behaviour against a fake backend cart
//! - `assistant_flow` - Full conversational turns, generator reply to cart change
//! - `mirror_storage` - Cart mirror persisted through [`FileStorage`]
//!
//! Every collaborator that would leave the process (backend, language model)
//! is replaced by an in-memory fake from this crate.
//!
//! [`FileStorage`]: mercadito_storefront::storage::FileStorage

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use mercadito_core::{Price, Principal, Product, ProductId};
use mercadito_storefront::assistant::{
    Assistant, AssistantPrompt, GenerationError, TextGenerator,
};
use mercadito_storefront::backend::types::{ProductDto, RemoteCartLine};
use mercadito_storefront::backend::{
    BackendError, CatalogSource, NamedEntity, RemoteCart, RemoteCartService,
};
use mercadito_storefront::cart::{CartSynchronizer, RetryPolicy};
use mercadito_storefront::catalog::CatalogService;
use mercadito_storefront::storage::LocalStorage;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Fixtures
// =============================================================================

/// The catalog used across scenarios.
#[must_use]
pub fn sample_products() -> Vec<Product> {
    let mut cafe = Product::new("p-cafe", "Cafe", Price::from_cents(1000));
    cafe.category = Some("Bebidas".to_string());
    cafe.brand = Some("Altura".to_string());

    let mut pan = Product::new("p-pan", "Pan Integral", Price::from_cents(450));
    pan.category = Some("Panadería".to_string());

    let mut leche = Product::new("p-leche", "Leche Entera", Price::from_cents(320));
    leche.category = Some("Lácteos".to_string());
    leche.brand = Some("La Granja".to_string());

    vec![cafe, pan, leche]
}

/// A signed-in customer; selects remote cart mode.
#[must_use]
pub fn customer() -> Principal {
    Principal::customer("cust-1", SecretString::from("test-token")).with_display_name("Ana")
}

// =============================================================================
// FakeRemoteCart
// =============================================================================

/// Backend cart kept in memory, one entry per unit like the real endpoint.
#[derive(Debug, Default)]
pub struct FakeRemoteCart {
    catalog: Vec<Product>,
    units: Mutex<Vec<Product>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeRemoteCart {
    /// A cart that can hold any product of `catalog`.
    #[must_use]
    pub fn new(catalog: Vec<Product>) -> Self {
        Self {
            catalog,
            ..Self::default()
        }
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls received, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Units of a product currently held remotely.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        let count = lock(&self.units).iter().filter(|p| &p.id == id).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn enter(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn product(&self, id: &ProductId) -> Result<Product, BackendError> {
        self.catalog
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: format!("unknown product {id}"),
            })
    }
}

#[async_trait]
impl RemoteCartService for FakeRemoteCart {
    async fn fetch_cart(&self, _principal: &Principal) -> Result<RemoteCart, BackendError> {
        self.enter()?;
        let lines = lock(&self.units)
            .iter()
            .enumerate()
            .map(|(i, p)| RemoteCartLine {
                line_id: format!("line-{i}").into(),
                product: ProductDto {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    price: p.price.amount(),
                    description: p.description.clone(),
                    category: p.category.clone(),
                    brand: p.brand.clone(),
                },
                quantity: None,
            })
            .collect();
        Ok(RemoteCart { lines })
    }

    async fn add(
        &self,
        _principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        self.enter()?;
        let product = self.product(product_id)?;
        let mut units = lock(&self.units);
        for _ in 0..quantity {
            units.push(product.clone());
        }
        Ok(())
    }

    async fn remove(
        &self,
        _principal: &Principal,
        product_id: &ProductId,
    ) -> Result<(), BackendError> {
        self.enter()?;
        lock(&self.units).retain(|p| &p.id != product_id);
        Ok(())
    }

    async fn set_quantity(
        &self,
        _principal: &Principal,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        self.enter()?;
        let product = self.product(product_id)?;
        let mut units = lock(&self.units);
        units.retain(|p| &p.id != product_id);
        for _ in 0..quantity {
            units.push(product.clone());
        }
        Ok(())
    }

    async fn clear(&self, _principal: &Principal) -> Result<(), BackendError> {
        self.enter()?;
        lock(&self.units).clear();
        Ok(())
    }
}

// =============================================================================
// StaticCatalog
// =============================================================================

/// Catalog source that always answers with the same data.
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    products: Vec<Product>,
}

impl StaticCatalog {
    #[must_use]
    pub const fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    fn names(&self, pick: fn(&Product) -> Option<&String>) -> Vec<NamedEntity> {
        let mut names: Vec<String> = Vec::new();
        for name in self.products.iter().filter_map(pick) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
            .into_iter()
            .map(|name| NamedEntity { id: None, name })
            .collect()
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn products(&self) -> Result<Vec<Product>, BackendError> {
        Ok(self.products.clone())
    }

    async fn categories(&self) -> Result<Vec<NamedEntity>, BackendError> {
        Ok(self.names(|p| p.category.as_ref()))
    }

    async fn brands(&self) -> Result<Vec<NamedEntity>, BackendError> {
        Ok(self.names(|p| p.brand.as_ref()))
    }
}

// =============================================================================
// ScriptedGenerator
// =============================================================================

/// Text generator that plays back queued replies and records each prompt.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<AssistantPrompt>>,
}

impl ScriptedGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(&self, text: impl Into<String>) {
        lock(&self.replies).push_back(Ok(text.into()));
    }

    /// Queue a failure with a provider message.
    pub fn fail(&self, message: impl Into<String>) {
        lock(&self.replies).push_back(Err(GenerationError::new(message)));
    }

    /// Prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<AssistantPrompt> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &AssistantPrompt) -> Result<String, GenerationError> {
        lock(&self.prompts).push(prompt.clone());
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::new("script exhausted")))
    }
}

// =============================================================================
// TestContext
// =============================================================================

/// A fully wired assistant over fakes.
pub struct TestContext {
    pub remote: Arc<FakeRemoteCart>,
    pub generator: Arc<ScriptedGenerator>,
    pub assistant: Assistant,
}

impl TestContext {
    /// Wire an assistant for `principal`, mirroring the cart into `storage`.
    #[must_use]
    pub fn new(principal: Principal, storage: Arc<dyn LocalStorage>) -> Self {
        Self::with_remote(
            principal,
            storage,
            Arc::new(FakeRemoteCart::new(sample_products())),
        )
    }

    /// Same as [`TestContext::new`] but sharing an existing backend cart.
    #[must_use]
    pub fn with_remote(
        principal: Principal,
        storage: Arc<dyn LocalStorage>,
        remote: Arc<FakeRemoteCart>,
    ) -> Self {
        let generator = Arc::new(ScriptedGenerator::new());
        let cart = Arc::new(CartSynchronizer::new(
            principal.clone(),
            remote.clone(),
            storage,
            RetryPolicy::none(),
        ));
        let catalog = CatalogService::new(
            Arc::new(StaticCatalog::new(sample_products())),
            Duration::from_secs(300),
        );
        let assistant =
            Assistant::new(principal, catalog, cart).with_generator(generator.clone());

        Self {
            remote,
            generator,
            assistant,
        }
    }
}
