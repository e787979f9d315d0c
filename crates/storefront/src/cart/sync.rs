//! Cart synchronization.
//!
//! `CartSynchronizer` owns the session's cart and reconciles it with either
//! the remote cart service (customer principals) or durable local storage
//! (everyone else).
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──load──▶ Loading ──▶ Ready ◀──▶ Mutating
//!                                      │
//!                                      └─ (remote fetch failed: Ready on the mirror)
//! ```
//!
//! Mutations are serialized by a FIFO mutex: a new mutation waits until the
//! previous one has returned to `Ready`. In remote mode the remote call is
//! made first and the cart is then rebuilt from a fresh fetch, so rules the
//! backend applies (stock caps, merges) always win over the local delta.
//! Every mutation ends by writing the full cart to the local mirror.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use mercadito_core::{CartLine, CartMode, Principal, Product, ProductId};

use super::mirror::CartMirror;
use super::retry::RetryPolicy;
use super::store::{CartStore, CartSummary};
use crate::backend::{BackendError, RemoteCartService, normalize_remote_cart};
use crate::storage::LocalStorage;

/// Lifecycle state of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Created, nothing loaded yet.
    Uninitialized,
    /// Initial load in progress.
    Loading,
    /// Idle; the cart can be read or mutated.
    Ready,
    /// A mutation is in flight.
    Mutating,
    /// Unrecoverable failure. No current path leads here: every remote
    /// failure falls back to local state.
    Error,
}

/// Errors returned to callers of cart mutations.
///
/// Remote failures are not errors at this level: they degrade to local state
/// and are reported through [`MutationReport::degraded`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// Quantity must be at least 1.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The product has no line in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),
}

/// Outcome of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Mode the cart was loaded in.
    pub mode: CartMode,
    /// True when the remote fetch failed and the mirror was used instead.
    pub degraded: bool,
    /// Units in the loaded cart.
    pub count: u32,
}

/// Outcome of a completed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationReport {
    /// True when the remote side could not be reached and the change was
    /// applied locally only.
    pub degraded: bool,
    /// The cart after the mutation.
    pub summary: CartSummary,
}

/// A cart-changing operation.
#[derive(Debug, Clone)]
enum Mutation {
    Add { product: Product, quantity: u32 },
    RemoveQty { product_id: ProductId, quantity: u32 },
    RemoveAll { product_id: ProductId },
    SetQty { product: Product, quantity: u32 },
    Clear,
}

impl Mutation {
    const fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::RemoveQty { .. } => "remove_qty",
            Self::RemoveAll { .. } => "remove_all",
            Self::SetQty { .. } => "set_qty",
            Self::Clear => "clear",
        }
    }

    /// Apply the change to the in-memory store.
    fn apply(&self, store: &mut CartStore) {
        match self {
            Self::Add { product, quantity } => store.add_line(&product.id, *quantity),
            Self::RemoveQty {
                product_id,
                quantity,
            } => store.remove_qty(product_id, *quantity),
            Self::RemoveAll { product_id } => store.remove_all(product_id),
            Self::SetQty { product, quantity } => store.set_qty(&product.id, *quantity),
            Self::Clear => store.clear(),
        }
    }
}

/// Owns one cart and keeps it reconciled with its source of truth.
pub struct CartSynchronizer {
    principal: Principal,
    mode: CartMode,
    remote: Arc<dyn RemoteCartService>,
    mirror: CartMirror,
    retry: RetryPolicy,
    store: Mutex<CartStore>,
    state: watch::Sender<SyncState>,
}

impl CartSynchronizer {
    /// Create a synchronizer for a session.
    ///
    /// The cart mode is fixed by the principal: customers use the remote
    /// cart, everyone else the local mirror.
    #[must_use]
    pub fn new(
        principal: Principal,
        remote: Arc<dyn RemoteCartService>,
        storage: Arc<dyn LocalStorage>,
        retry: RetryPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SyncState::Uninitialized);
        Self {
            mode: principal.cart_mode(),
            principal,
            remote,
            mirror: CartMirror::new(storage),
            retry,
            store: Mutex::new(CartStore::new()),
            state,
        }
    }

    /// Cart mode for this session.
    #[must_use]
    pub const fn mode(&self) -> CartMode {
        self.mode
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SyncState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Cart state transition");
        }
    }

    /// Load the cart from its source of truth.
    ///
    /// In remote mode a failed fetch falls back to the local mirror; the
    /// synchronizer still ends up `Ready`.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn load(&self) -> LoadReport {
        let mut store = self.store.lock().await;
        self.load_into(&mut store).await
    }

    async fn load_into(&self, store: &mut CartStore) -> LoadReport {
        self.set_state(SyncState::Loading);

        let degraded = match self.mode {
            CartMode::Local => {
                *store = self.mirror.load();
                false
            }
            CartMode::Remote => match self.fetch_remote().await {
                Ok(entries) => {
                    store.replace(entries);
                    self.persist(store);
                    false
                }
                Err(e) => {
                    warn!(error = %e, "Remote cart unavailable, using local mirror");
                    *store = self.mirror.load();
                    true
                }
            },
        };

        self.set_state(SyncState::Ready);
        let report = LoadReport {
            mode: self.mode,
            degraded,
            count: store.count(),
        };
        info!(
            mode = %report.mode,
            degraded = report.degraded,
            count = report.count,
            "Cart loaded"
        );
        report
    }

    /// Add units of a product.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] when `quantity` is zero.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: &Product, quantity: u32) -> Result<MutationReport, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        self.mutate(Mutation::Add {
            product: product.clone(),
            quantity,
        })
        .await
    }

    /// Remove units of a product; the line disappears when none remain.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] when the product has no line.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_qty(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<MutationReport, CartError> {
        self.mutate(Mutation::RemoveQty {
            product_id: product_id.clone(),
            quantity,
        })
        .await
    }

    /// Remove a product's line entirely.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] when the product has no line.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_all(&self, product_id: &ProductId) -> Result<MutationReport, CartError> {
        self.mutate(Mutation::RemoveAll {
            product_id: product_id.clone(),
        })
        .await
    }

    /// Set a product's quantity. Zero is routed to [`Self::remove_all`].
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] when asked to zero a product that
    /// has no line.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn set_qty(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<MutationReport, CartError> {
        if quantity == 0 {
            return self.remove_all(&product.id).await;
        }
        self.mutate(Mutation::SetQty {
            product: product.clone(),
            quantity,
        })
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Never fails today; the signature matches the other mutations.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<MutationReport, CartError> {
        self.mutate(Mutation::Clear).await
    }

    /// Tear the cart down after a completed checkout.
    ///
    /// The backend empties a customer's cart when it accepts the order, so
    /// only local state is reset here.
    #[instrument(skip(self))]
    pub async fn complete_checkout(&self) {
        let mut store = self.store.lock().await;
        store.clear();
        if let Err(e) = self.mirror.clear() {
            warn!(error = %e, "Failed to clear cart mirror after checkout");
        }
        self.set_state(SyncState::Ready);
        info!("Cart cleared after checkout");
    }

    /// Summary of the current cart, loading it first if needed.
    pub async fn summary(&self) -> CartSummary {
        let mut store = self.store.lock().await;
        self.ensure_loaded(&mut store).await;
        store.summary()
    }

    /// Units of a product currently in the cart.
    pub async fn quantity_of(&self, product_id: &ProductId) -> u32 {
        let mut store = self.store.lock().await;
        self.ensure_loaded(&mut store).await;
        store.quantity_of(product_id)
    }

    /// Copy of the current cart.
    pub async fn snapshot(&self) -> CartStore {
        let mut store = self.store.lock().await;
        self.ensure_loaded(&mut store).await;
        store.clone()
    }

    async fn ensure_loaded(&self, store: &mut CartStore) {
        if self.state() == SyncState::Uninitialized {
            self.load_into(store).await;
        }
    }

    async fn mutate(&self, mutation: Mutation) -> Result<MutationReport, CartError> {
        let mut store = self.store.lock().await;
        self.ensure_loaded(&mut store).await;

        match &mutation {
            Mutation::RemoveQty { product_id, .. } | Mutation::RemoveAll { product_id }
                if !store.contains(product_id) =>
            {
                return Err(CartError::NotInCart(product_id.clone()));
            }
            Mutation::Add { product, .. } | Mutation::SetQty { product, .. } => {
                store.remember(product.clone());
            }
            _ => {}
        }

        self.set_state(SyncState::Mutating);

        let degraded = match self.mode {
            CartMode::Local => {
                mutation.apply(&mut store);
                false
            }
            CartMode::Remote => match self.apply_remote(&mutation, &store).await {
                Ok(entries) => {
                    store.replace(entries);
                    false
                }
                Err(e) => {
                    warn!(
                        operation = mutation.label(),
                        error = %e,
                        "Remote cart unavailable, applying change locally"
                    );
                    mutation.apply(&mut store);
                    true
                }
            },
        };

        self.persist(&store);
        self.set_state(SyncState::Ready);

        Ok(MutationReport {
            degraded,
            summary: store.summary(),
        })
    }

    /// Send a mutation to the remote cart, then re-fetch it.
    async fn apply_remote(
        &self,
        mutation: &Mutation,
        store: &CartStore,
    ) -> Result<Vec<(Product, CartLine)>, BackendError> {
        let principal = &self.principal;
        let remote = self.remote.as_ref();
        let label = mutation.label();

        match mutation {
            Mutation::Add { product, quantity } => {
                // Sent once: a repeat after a lost response would add the
                // units a second time.
                remote.add(principal, &product.id, *quantity).await?;
            }
            Mutation::RemoveQty {
                product_id,
                quantity,
            } => {
                let remaining = store.quantity_of(product_id).saturating_sub(*quantity);
                if remaining == 0 {
                    self.retry
                        .run(label, || remote.remove(principal, product_id))
                        .await?;
                } else {
                    self.retry
                        .run(label, || remote.set_quantity(principal, product_id, remaining))
                        .await?;
                }
            }
            Mutation::RemoveAll { product_id } => {
                self.retry
                    .run(label, || remote.remove(principal, product_id))
                    .await?;
            }
            Mutation::SetQty { product, quantity } => {
                self.retry
                    .run(label, || remote.set_quantity(principal, &product.id, *quantity))
                    .await?;
            }
            Mutation::Clear => {
                self.retry.run(label, || remote.clear(principal)).await?;
            }
        }

        self.fetch_remote().await
    }

    async fn fetch_remote(
        &self,
    ) -> Result<Vec<(Product, CartLine)>, BackendError> {
        let cart = self
            .retry
            .run("fetch_cart", || self.remote.fetch_cart(&self.principal))
            .await?;
        Ok(normalize_remote_cart(cart))
    }

    /// Best-effort write of the full cart to the mirror.
    fn persist(&self, store: &CartStore) {
        if let Err(e) = self.mirror.save(store) {
            warn!(error = %e, "Failed to write cart mirror");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use mercadito_core::Price;

    use super::*;
    use crate::backend::types::{ProductDto, RemoteCart, RemoteCartLine};
    use crate::storage::MemoryStorage;

    /// Remote cart keeping one entry per unit, with an optional stock cap.
    #[derive(Default)]
    struct FakeRemote {
        units: StdMutex<Vec<Product>>,
        fail: AtomicBool,
        stock_cap: Option<u32>,
        /// Apply the next `add`, then answer as if it timed out.
        lose_add_response: AtomicBool,
        add_calls: AtomicUsize,
    }

    impl FakeRemote {
        fn check(&self) -> Result<(), BackendError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(BackendError::Api {
                    status: 503,
                    message: "down".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn units(&self) -> std::sync::MutexGuard<'_, Vec<Product>> {
            self.units.lock().expect("lock")
        }

        fn count_of(&self, id: &ProductId) -> u32 {
            u32::try_from(self.units().iter().filter(|p| &p.id == id).count()).expect("count")
        }
    }

    fn catalog_product(id: &ProductId) -> Product {
        Product::new(id.clone(), format!("Producto {id}"), Price::from_cents(100))
    }

    #[async_trait]
    impl RemoteCartService for FakeRemote {
        async fn fetch_cart(&self, _: &Principal) -> Result<RemoteCart, BackendError> {
            self.check()?;
            let lines = self
                .units()
                .iter()
                .enumerate()
                .map(|(i, p)| RemoteCartLine {
                    line_id: format!("line-{i}").into(),
                    product: ProductDto {
                        id: p.id.clone(),
                        name: p.name.clone(),
                        price: p.price.amount(),
                        description: None,
                        category: None,
                        brand: None,
                    },
                    quantity: None,
                })
                .collect();
            Ok(RemoteCart { lines })
        }

        async fn add(&self, _: &Principal, id: &ProductId, qty: u32) -> Result<(), BackendError> {
            self.check()?;
            let current = self.count_of(id);
            let target = self.stock_cap.map_or(current + qty, |cap| (current + qty).min(cap));
            let product = catalog_product(id);
            for _ in current..target {
                self.units().push(product.clone());
            }
            self.add_calls.fetch_add(1, Ordering::SeqCst);
            if self.lose_add_response.swap(false, Ordering::SeqCst) {
                return Err(BackendError::Api {
                    status: 504,
                    message: "gateway timeout".to_string(),
                });
            }
            Ok(())
        }

        async fn remove(&self, _: &Principal, id: &ProductId) -> Result<(), BackendError> {
            self.check()?;
            self.units().retain(|p| &p.id != id);
            Ok(())
        }

        async fn set_quantity(
            &self,
            principal: &Principal,
            id: &ProductId,
            qty: u32,
        ) -> Result<(), BackendError> {
            self.remove(principal, id).await?;
            self.add(principal, id, qty).await
        }

        async fn clear(&self, _: &Principal) -> Result<(), BackendError> {
            self.check()?;
            self.units().clear();
            Ok(())
        }
    }

    fn customer() -> Principal {
        Principal::customer("c1", SecretString::from("token"))
    }

    fn cafe() -> Product {
        Product::new("p1", "Producto p1", Price::from_cents(100))
    }

    fn synchronizer(
        principal: Principal,
        remote: Arc<FakeRemote>,
        storage: Arc<MemoryStorage>,
    ) -> CartSynchronizer {
        CartSynchronizer::new(principal, remote, storage, RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_local_mode_round_trips_through_mirror() {
        let storage = Arc::new(MemoryStorage::new());
        let remote = Arc::new(FakeRemote::default());

        let sync = synchronizer(Principal::anonymous(), remote.clone(), storage.clone());
        assert_eq!(sync.mode(), CartMode::Local);
        assert_eq!(sync.state(), SyncState::Uninitialized);

        sync.load().await;
        sync.add(&cafe(), 3).await.expect("add");
        let before = sync.snapshot().await;

        let reloaded = synchronizer(Principal::anonymous(), remote.clone(), storage);
        let report = reloaded.load().await;

        assert!(!report.degraded);
        assert_eq!(report.count, 3);
        assert_eq!(reloaded.snapshot().await.lines(), before.lines());
        // Local mode never touches the remote cart.
        assert!(remote.units().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_zero_quantity() {
        let sync = synchronizer(
            Principal::anonymous(),
            Arc::new(FakeRemote::default()),
            Arc::new(MemoryStorage::new()),
        );
        assert_eq!(sync.add(&cafe(), 0).await, Err(CartError::InvalidQuantity));
        assert_eq!(sync.summary().await.count, 0);
    }

    #[tokio::test]
    async fn test_remove_missing_product_reports_not_in_cart() {
        let sync = synchronizer(
            Principal::anonymous(),
            Arc::new(FakeRemote::default()),
            Arc::new(MemoryStorage::new()),
        );
        let result = sync.remove_all(&cafe().id).await;
        assert_eq!(result, Err(CartError::NotInCart(cafe().id)));
        assert_eq!(sync.state(), SyncState::Ready);
    }

    #[tokio::test]
    async fn test_set_qty_zero_routes_to_remove_all() {
        let sync = synchronizer(
            Principal::anonymous(),
            Arc::new(FakeRemote::default()),
            Arc::new(MemoryStorage::new()),
        );
        sync.add(&cafe(), 2).await.expect("add");
        let report = sync.set_qty(&cafe(), 0).await.expect("set");
        assert!(report.summary.is_empty());
    }

    #[tokio::test]
    async fn test_remote_mode_rebuilds_from_remote() {
        let remote = Arc::new(FakeRemote {
            stock_cap: Some(4),
            ..FakeRemote::default()
        });
        let sync = synchronizer(customer(), remote.clone(), Arc::new(MemoryStorage::new()));
        assert_eq!(sync.mode(), CartMode::Remote);

        // The backend caps stock at 4; the rebuilt cart follows it.
        let report = sync.add(&cafe(), 6).await.expect("add");
        assert!(!report.degraded);
        assert_eq!(report.summary.count, 4);
        assert_eq!(remote.count_of(&cafe().id), 4);

        let report = sync.remove_qty(&cafe().id, 1).await.expect("remove");
        assert_eq!(report.summary.count, 3);
        assert_eq!(remote.count_of(&cafe().id), 3);

        let report = sync.clear().await.expect("clear");
        assert!(report.summary.is_empty());
        assert!(remote.units().is_empty());
    }

    #[tokio::test]
    async fn test_remote_load_failure_falls_back_to_mirror() {
        let storage = Arc::new(MemoryStorage::new());
        let local = synchronizer(
            Principal::anonymous(),
            Arc::new(FakeRemote::default()),
            storage.clone(),
        );
        local.add(&cafe(), 2).await.expect("add");

        let remote = Arc::new(FakeRemote::default());
        remote.fail.store(true, Ordering::SeqCst);
        let sync = synchronizer(customer(), remote, storage);

        let report = sync.load().await;
        assert!(report.degraded);
        assert_eq!(report.count, 2);
        assert_eq!(sync.state(), SyncState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_with_lost_response_is_not_repeated() {
        let remote = Arc::new(FakeRemote::default());
        let sync = CartSynchronizer::new(
            customer(),
            remote.clone(),
            Arc::new(MemoryStorage::new()),
            RetryPolicy::new(1, Duration::from_millis(10)),
        );
        sync.load().await;

        remote.lose_add_response.store(true, Ordering::SeqCst);
        let report = sync.add(&cafe(), 2).await.expect("add");

        assert_eq!(remote.add_calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.count_of(&cafe().id), 2);
        assert_eq!(report.summary.count, 2);
        assert!(report.degraded);

        // The next successful call resynchronizes from the remote cart.
        let report = sync.add(&cafe(), 1).await.expect("add");
        assert!(!report.degraded);
        assert_eq!(report.summary.count, 3);
        assert_eq!(remote.count_of(&cafe().id), 3);
    }

    #[tokio::test]
    async fn test_remote_mutation_failure_degrades_locally() {
        let storage = Arc::new(MemoryStorage::new());
        let remote = Arc::new(FakeRemote::default());
        let sync = synchronizer(customer(), remote.clone(), storage.clone());
        sync.load().await;

        remote.fail.store(true, Ordering::SeqCst);
        let report = sync.add(&cafe(), 2).await.expect("add");

        assert!(report.degraded);
        assert_eq!(report.summary.count, 2);
        assert_eq!(sync.state(), SyncState::Ready);
        // The change still reached the mirror.
        assert_eq!(CartMirror::new(storage).load().count(), 2);
    }

    #[tokio::test]
    async fn test_state_transitions_are_observable() {
        let sync = synchronizer(
            Principal::anonymous(),
            Arc::new(FakeRemote::default()),
            Arc::new(MemoryStorage::new()),
        );
        let mut rx = sync.subscribe();

        sync.load().await;
        assert!(rx.has_changed().expect("channel open"));
        assert_eq!(*rx.borrow_and_update(), SyncState::Ready);

        sync.add(&cafe(), 1).await.expect("add");
        assert_eq!(*rx.borrow_and_update(), SyncState::Ready);
    }

    #[tokio::test]
    async fn test_complete_checkout_clears_cart_and_mirror() {
        let storage = Arc::new(MemoryStorage::new());
        let sync = synchronizer(
            Principal::anonymous(),
            Arc::new(FakeRemote::default()),
            storage.clone(),
        );
        sync.add(&cafe(), 2).await.expect("add");

        sync.complete_checkout().await;

        assert_eq!(sync.summary().await.count, 0);
        assert!(CartMirror::new(storage).load().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_serialized() {
        let sync = Arc::new(synchronizer(
            customer(),
            Arc::new(FakeRemote::default()),
            Arc::new(MemoryStorage::new()),
        ));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let sync = Arc::clone(&sync);
                tokio::spawn(async move { sync.add(&cafe(), 1).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("join").expect("add");
        }

        assert_eq!(sync.quantity_of(&cafe().id).await, 10);
    }
}
