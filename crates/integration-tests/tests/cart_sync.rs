//! Integration tests for cart synchronization against a fake backend.

use std::sync::Arc;

use mercadito_core::{CartMode, Principal, ProductId};
use mercadito_integration_tests::{FakeRemoteCart, customer, sample_products};
use mercadito_storefront::cart::{CartError, CartSynchronizer, RetryPolicy, SyncState};
use mercadito_storefront::storage::{LocalStorage, MemoryStorage};

fn synchronizer(
    principal: Principal,
    remote: Arc<FakeRemoteCart>,
    storage: Arc<dyn LocalStorage>,
) -> CartSynchronizer {
    CartSynchronizer::new(principal, remote, storage, RetryPolicy::none())
}

fn product(id: &str) -> mercadito_core::Product {
    sample_products()
        .into_iter()
        .find(|p| p.id.as_str() == id)
        .expect("sample product")
}

#[tokio::test]
async fn test_remote_load_failure_falls_back_to_mirror() {
    let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
    let remote = Arc::new(FakeRemoteCart::new(sample_products()));

    let first = synchronizer(customer(), remote.clone(), storage.clone());
    first.load().await;
    first.add(&product("p-cafe"), 2).await.expect("add");

    remote.set_failing(true);
    let second = synchronizer(customer(), remote.clone(), storage);
    let report = second.load().await;

    assert_eq!(report.mode, CartMode::Remote);
    assert!(report.degraded);
    assert_eq!(report.count, 2);
    assert_eq!(second.state(), SyncState::Ready);
}

#[tokio::test]
async fn test_remote_is_source_of_truth_after_mutation() {
    let remote = Arc::new(FakeRemoteCart::new(sample_products()));
    let sync = synchronizer(customer(), remote.clone(), Arc::new(MemoryStorage::new()));
    sync.load().await;

    sync.add(&product("p-cafe"), 1).await.expect("add");
    // Someone else adds to the same account between our calls.
    let other = synchronizer(customer(), remote.clone(), Arc::new(MemoryStorage::new()));
    other.load().await;
    other.add(&product("p-pan"), 2).await.expect("add");

    let report = sync.add(&product("p-cafe"), 1).await.expect("add");
    assert_eq!(report.summary.count, 4);
    assert_eq!(sync.quantity_of(&ProductId::from("p-pan")).await, 2);
}

#[tokio::test]
async fn test_anonymous_cart_never_calls_backend() {
    let remote = Arc::new(FakeRemoteCart::new(sample_products()));
    let sync = synchronizer(
        Principal::anonymous(),
        remote.clone(),
        Arc::new(MemoryStorage::new()),
    );

    sync.load().await;
    sync.add(&product("p-leche"), 3).await.expect("add");
    sync.set_qty(&product("p-leche"), 1).await.expect("set");
    sync.clear().await.expect("clear");

    assert_eq!(sync.mode(), CartMode::Local);
    assert_eq!(remote.calls(), 0);
}

#[tokio::test]
async fn test_removing_absent_product_is_rejected() {
    let remote = Arc::new(FakeRemoteCart::new(sample_products()));
    let sync = synchronizer(customer(), remote.clone(), Arc::new(MemoryStorage::new()));
    sync.load().await;
    let calls = remote.calls();

    let err = sync
        .remove_qty(&ProductId::from("p-pan"), 1)
        .await
        .expect_err("not in cart");

    assert_eq!(err, CartError::NotInCart(ProductId::from("p-pan")));
    assert_eq!(remote.calls(), calls);
    assert_eq!(sync.state(), SyncState::Ready);
}

#[tokio::test]
async fn test_checkout_clears_local_state_only() {
    let storage: Arc<dyn LocalStorage> = Arc::new(MemoryStorage::new());
    let remote = Arc::new(FakeRemoteCart::new(sample_products()));
    let sync = synchronizer(customer(), remote.clone(), storage.clone());
    sync.load().await;
    sync.add(&product("p-cafe"), 2).await.expect("add");

    sync.complete_checkout().await;

    assert!(sync.summary().await.is_empty());
    assert_eq!(remote.quantity_of(&ProductId::from("p-cafe")), 2);
}
