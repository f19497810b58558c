//! Integration tests for the cart store
//!
//! Drives `CartStore` end to end against an in-memory backend: mutation
//! semantics, hydration, persistence ordering and failure handling.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use pharmacart::{
    Cart, CartAction, CartEnvironment, CartStorage, CartStore, ItemId, Lifecycle, LineItem,
    decode, encode,
};
use pharmacart_runtime::StoreConfig;
use pharmacart_testing::{InMemoryKeyValueStore, StorageOperation, init_test_tracing, test_clock};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

const KEY: &str = "pharmacart.cart";
const TIMEOUT: Duration = Duration::from_secs(2);

fn item(id: &str, quantity: u32, price: i64) -> LineItem {
    LineItem::new(id, format!("SKU-{id}"), format!("Item {id}"), Decimal::from(price))
        .with_quantity(quantity)
}

fn environment(backend: &InMemoryKeyValueStore) -> CartEnvironment {
    CartEnvironment::new(
        Some(CartStorage::new(Arc::new(backend.clone()), KEY)),
        Arc::new(test_clock()),
    )
}

async fn ready_cart(backend: &InMemoryKeyValueStore) -> CartStore {
    init_test_tracing();
    let cart = CartStore::start(environment(backend)).await.unwrap();
    cart.wait_until_ready(TIMEOUT).await.unwrap();
    cart
}

fn stored_cart(backend: &InMemoryKeyValueStore) -> Option<Cart> {
    backend.value(KEY).map(|blob| decode(&blob).unwrap())
}

// ============================================================================
// Mutation semantics
// ============================================================================

#[tokio::test]
async fn additive_merge() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 2, 10)).await.unwrap();
    cart.add_item(item("A", 3, 10)).await.unwrap();

    let snapshot = cart.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get(&ItemId::new("A")).unwrap().quantity, 5);
}

#[tokio::test]
async fn absolute_set() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 5, 10)).await.unwrap();
    cart.set_quantity(ItemId::new("A"), 2).await.unwrap();

    assert_eq!(cart.snapshot().await.get(&ItemId::new("A")).unwrap().quantity, 2);
}

#[tokio::test]
async fn total_derivation() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 2, 100)).await.unwrap();
    cart.add_item(item("B", 1, 50)).await.unwrap();

    assert_eq!(cart.total().await, Decimal::from(250));
    assert_eq!(cart.item_count().await, 3);
}

#[tokio::test]
async fn quantity_floor_removes_item() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 1, 10)).await.unwrap();
    cart.add_item(item("B", 4, 10)).await.unwrap();
    cart.set_quantity(ItemId::new("A"), 0).await.unwrap();
    cart.set_quantity(ItemId::new("B"), -2).await.unwrap();

    assert!(cart.snapshot().await.is_empty());
}

#[tokio::test]
async fn remove_absent_is_noop() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 1, 10)).await.unwrap();
    cart.settle(TIMEOUT).await.unwrap();
    let before = cart.state().await;
    let writes_before = backend.history().len();

    cart.remove_item(ItemId::new("nonexistent")).await.unwrap();
    cart.settle(TIMEOUT).await.unwrap();

    assert_eq!(cart.state().await, before);
    assert_eq!(backend.history().len(), writes_before);
}

#[tokio::test]
async fn clear_empties_fully() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 2, 10)).await.unwrap();
    cart.clear().await.unwrap();

    assert_eq!(cart.snapshot().await.len(), 0);
    assert_eq!(cart.total().await, Decimal::ZERO);

    cart.settle(TIMEOUT).await.unwrap();
    assert_eq!(backend.value(KEY), None);
    assert_eq!(
        backend.history().last(),
        Some(&StorageOperation::Remove { key: KEY.to_string() })
    );
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn each_change_writes_resulting_cart_once() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    cart.add_item(item("A", 1, 10)).await.unwrap();
    cart.add_item(item("B", 2, 20)).await.unwrap();
    cart.set_quantity(ItemId::new("Z"), 3).await.unwrap(); // absent: no write
    cart.set_quantity(ItemId::new("A"), 4).await.unwrap();
    cart.settle(TIMEOUT).await.unwrap();

    assert_eq!(backend.history().len(), 3);
    assert_eq!(stored_cart(&backend), Some(cart.snapshot().await));
}

#[tokio::test]
async fn slow_write_never_overwrites_newer_cart() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    backend.push_write_delay(Duration::from_millis(100));
    cart.add_item(item("A", 1, 10)).await.unwrap();
    cart.add_item(item("B", 1, 10)).await.unwrap();
    cart.remove_item(ItemId::new("A")).await.unwrap();
    cart.settle(TIMEOUT).await.unwrap();

    let expected = cart.snapshot().await;
    assert_eq!(expected.len(), 1);
    assert_eq!(stored_cart(&backend), Some(expected.clone()));

    let Some(StorageOperation::Set { value, .. }) = backend.history().last().cloned() else {
        panic!("last storage operation should be a write");
    };
    assert_eq!(value, encode(&expected));
}

#[tokio::test]
async fn write_failure_keeps_in_memory_cart() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;
    let mut feedback = cart.subscribe_feedback();

    backend.fail_writes(true);
    cart.add_item(item("A", 2, 10)).await.unwrap();

    let failed = tokio::time::timeout(TIMEOUT, async {
        loop {
            if let CartAction::PersistFailed { sequence, .. } = feedback.recv().await.unwrap() {
                break sequence;
            }
        }
    })
    .await
    .expect("persistence failure should be reported");
    assert_eq!(failed, 1);

    assert_eq!(cart.snapshot().await.get(&ItemId::new("A")).unwrap().quantity, 2);
    assert_eq!(backend.value(KEY), None);

    // Durability resumes with the next change
    backend.fail_writes(false);
    cart.add_item(item("B", 1, 5)).await.unwrap();
    cart.settle(TIMEOUT).await.unwrap();
    assert_eq!(stored_cart(&backend), Some(cart.snapshot().await));
}

// ============================================================================
// Hydration
// ============================================================================

#[tokio::test]
async fn hydrates_saved_cart() {
    let saved = Cart::from_items(vec![item("A", 2, 10), item("B", 1, 5)]).unwrap();
    let backend = InMemoryKeyValueStore::with_entry(KEY, encode(&saved));

    let cart = ready_cart(&backend).await;

    assert_eq!(cart.snapshot().await, saved);
    cart.settle(TIMEOUT).await.unwrap();
    assert!(backend.history().is_empty(), "hydration must not write");
}

#[tokio::test]
async fn corrupt_blob_hydrates_empty() {
    let backend = InMemoryKeyValueStore::with_entry(KEY, "{\"items\": [ oops");

    let cart = ready_cart(&backend).await;

    assert_eq!(cart.lifecycle().await, Lifecycle::Ready);
    assert!(cart.snapshot().await.is_empty());
}

#[tokio::test]
async fn invariant_violating_blob_hydrates_empty() {
    let blob = r#"{"items":[
        {"id":"A","skuLabel":"A","displayName":"A","unitPrice":1,"quantity":1},
        {"id":"A","skuLabel":"A","displayName":"A","unitPrice":1,"quantity":1}]}"#;
    let backend = InMemoryKeyValueStore::with_entry(KEY, blob);

    let cart = ready_cart(&backend).await;
    assert!(cart.snapshot().await.is_empty());
}

#[tokio::test]
async fn read_failure_hydrates_empty() {
    let backend = InMemoryKeyValueStore::with_entry(KEY, encode(&Cart::new()));
    backend.fail_reads(true);

    let cart = ready_cart(&backend).await;
    assert_eq!(cart.lifecycle().await, Lifecycle::Ready);
    assert!(cart.snapshot().await.is_empty());
}

#[tokio::test]
async fn mutations_during_hydration_apply_on_top_of_saved_cart() {
    let saved = Cart::from_items(vec![item("A", 2, 10)]).unwrap();
    let backend = InMemoryKeyValueStore::with_entry(KEY, encode(&saved));
    backend.delay_reads(Duration::from_millis(100));

    let cart = CartStore::start(environment(&backend)).await.unwrap();
    cart.add_item(item("A", 1, 10)).await.unwrap();
    cart.add_item(item("B", 1, 5)).await.unwrap();

    assert_eq!(cart.lifecycle().await, Lifecycle::Hydrating);
    assert!(cart.snapshot().await.is_empty());

    cart.wait_until_ready(TIMEOUT).await.unwrap();
    let snapshot = cart.snapshot().await;
    assert_eq!(snapshot.get(&ItemId::new("A")).unwrap().quantity, 3);
    assert!(snapshot.contains(&ItemId::new("B")));

    cart.settle(TIMEOUT).await.unwrap();
    assert_eq!(stored_cart(&backend), Some(snapshot));
}

#[tokio::test]
async fn cart_without_storage_is_ready_immediately() {
    let cart = CartStore::start(CartEnvironment::in_memory(Arc::new(test_clock())))
        .await
        .unwrap();

    assert_eq!(cart.lifecycle().await, Lifecycle::Ready);
    cart.add_item(item("A", 1, 10)).await.unwrap();
    assert_eq!(cart.item_count().await, 1);
}

// ============================================================================
// Notification and concurrency
// ============================================================================

#[tokio::test]
async fn subscribers_see_each_change() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;
    let mut rx = cart.subscribe();
    rx.borrow_and_update();

    cart.add_item(item("A", 1, 10)).await.unwrap();
    tokio::time::timeout(TIMEOUT, rx.changed()).await.unwrap().unwrap();
    assert_eq!(rx.borrow_and_update().cart.len(), 1);

    // No-op mutations do not notify
    cart.remove_item(ItemId::new("missing")).await.unwrap();
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn concurrent_consumers_never_duplicate_ids() {
    let backend = InMemoryKeyValueStore::new();
    let cart = ready_cart(&backend).await;

    let adds = (0..20).map(|n| {
        let cart = cart.clone();
        async move { cart.add_item(item(["A", "B", "C"][n % 3], 1, 10)).await }
    });
    for result in futures::future::join_all(adds).await {
        result.unwrap();
    }

    let snapshot = cart.snapshot().await;
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.item_count(), 20);
    cart.settle(TIMEOUT).await.unwrap();
    assert_eq!(stored_cart(&backend), Some(snapshot));
}

#[tokio::test]
async fn shutdown_waits_for_outstanding_writes() {
    let backend = InMemoryKeyValueStore::new();
    let cart = CartStore::start_with_config(
        environment(&backend),
        StoreConfig::default().with_shutdown_timeout(TIMEOUT),
    )
    .await
    .unwrap();
    cart.wait_until_ready(TIMEOUT).await.unwrap();

    backend.push_write_delay(Duration::from_millis(50));
    cart.add_item(item("A", 1, 10)).await.unwrap();
    cart.shutdown().await.unwrap();

    assert!(backend.contains_key(KEY));
    assert!(cart.add_item(item("B", 1, 10)).await.is_err());
}
