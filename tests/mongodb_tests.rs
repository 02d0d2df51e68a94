//! Integration tests for the MongoDB stores using the triage test harness.
//!
//! Invokes `triage_service_tests!` to validate that the MongoDB backend
//! honours the same triage contract as the in-memory one, plus a few
//! checks that only make sense against a real database.
//!
//! # Requirements
//!
//! - Docker must be running (testcontainers launches a MongoDB container)
//! - Feature flag `mongodb_backend` must be enabled
//!
//! # Running
//!
//! ```sh
//! cargo test --features mongodb_backend --test mongodb_tests -- --test-threads=1
//! ```
//!
//! # Test isolation
//!
//! All tests share a single MongoDB container (via `OnceLock`). Each test
//! gets its own database, so the order code counter starts from scratch.

#![cfg(feature = "mongodb_backend")]

#[macro_use]
mod triage_harness;

use mongodb::Client;
use naya::core::error::{ConflictError, NayaError};
use naya::core::order::{OrderPatch, PartyPatch};
use naya::core::store::{InboxStore, OrderStore, TrashStore};
use naya::storage::{MongoInboxStore, MongoOrderStore, MongoTrashStore};
use naya::triage::TriageService;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mongo::Mongo;
use triage_harness::*;

// ---------------------------------------------------------------------------
// Shared test environment (single container, fresh database per test)
// ---------------------------------------------------------------------------

/// Holds the testcontainer handle (keeps it alive) and the connection URL.
struct MongoTestEnv {
    /// Container handle; dropping it stops the MongoDB container.
    _container: testcontainers::ContainerAsync<Mongo>,
    connection_url: String,
}

/// Global test environment, initialized once per test binary.
static TEST_ENV: OnceLock<MongoTestEnv> = OnceLock::new();

/// Initialize the shared MongoDB container (if not already started).
async fn init_mongo_env() -> &'static MongoTestEnv {
    if let Some(env) = TEST_ENV.get() {
        return env;
    }

    let container = Mongo::default()
        .start()
        .await
        .expect("Failed to start MongoDB container, is Docker running?");
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(27017).await.unwrap();
    let url = format!("mongodb://{}:{}", host, port);

    let env = MongoTestEnv {
        _container: container,
        connection_url: url,
    };

    let _ = TEST_ENV.set(env);
    TEST_ENV.get().unwrap()
}

/// Atomic counter to generate unique database names per test.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh, empty database for one test
async fn mongo_database() -> mongodb::Database {
    let env = init_mongo_env().await;
    let client = Client::with_uri_str(&env.connection_url)
        .await
        .expect("Failed to connect to MongoDB");
    let db_num = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    client.database(&format!("naya_test_{}", db_num))
}

// ---------------------------------------------------------------------------
// Factory helpers
// ---------------------------------------------------------------------------

async fn mongo_order_store(db: &mongodb::Database) -> MongoOrderStore {
    let store = MongoOrderStore::new(db.clone());
    store.ensure_indexes().await.expect("Failed to create order indexes");
    store
}

/// A `TriageService` over the three MongoDB stores of a fresh database
async fn mongo_service() -> TriageService {
    let db = mongo_database().await;
    TriageService::new(
        Arc::new(mongo_order_store(&db).await),
        Arc::new(MongoInboxStore::new(db.clone())),
        Arc::new(MongoTrashStore::new(db)),
    )
}

// ---------------------------------------------------------------------------
// Test suites via macros
// ---------------------------------------------------------------------------

triage_service_tests!(mongo_service().await);

// ---------------------------------------------------------------------------
// Backend-specific checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_code_counter_survives_new_store_instance() {
    let db = mongo_database().await;

    let first = mongo_order_store(&db).await;
    first.create(sample_new_order("Koffi")).await.unwrap();
    first.create(sample_new_order("Aminata")).await.unwrap();

    // A restarted service continues the sequence instead of reusing codes
    let second = mongo_order_store(&db).await;
    let order = second.create(sample_new_order("Yao")).await.unwrap();
    assert_eq!(order.code, "CMD-003");
}

#[tokio::test]
async fn test_insert_existing_order_conflicts() {
    let db = mongo_database().await;
    let store = mongo_order_store(&db).await;

    let order = store.create(sample_new_order("Koffi")).await.unwrap();
    let err = store.insert(order).await.unwrap_err();
    assert!(matches!(err, NayaError::Conflict(ConflictError::AlreadyExists { .. })));
}

#[tokio::test]
async fn test_restore_finishes_after_partial_failure() {
    let db = mongo_database().await;
    let orders = mongo_order_store(&db).await;
    let inbox = MongoInboxStore::new(db.clone());
    let trash = MongoTrashStore::new(db);

    let order = orders.create(sample_new_order("Koffi")).await.unwrap();
    let entry = trash
        .add(naya::core::trash::TrashSnapshot::Order(order.clone()))
        .await
        .unwrap();

    // The order is still in its store, as if a previous restore died
    // between its insert and its delete
    let restored = trash.restore(&entry.id, &orders, &inbox).await.unwrap();
    assert_eq!(restored.id, entry.id);
    assert!(trash.get(&entry.id).await.unwrap().is_none());
    assert_eq!(orders.get(&order.id).await.unwrap(), Some(order));
}

#[tokio::test]
async fn test_restore_onto_reused_code_keeps_trash_entry() {
    let db = mongo_database().await;
    let orders = mongo_order_store(&db).await;
    let inbox = MongoInboxStore::new(db.clone());
    let trash = MongoTrashStore::new(db.clone());

    let first = orders.create(sample_new_order("Koffi")).await.unwrap();
    let removed = orders.remove(&first.id).await.unwrap().unwrap();
    let entry = trash
        .add(naya::core::trash::TrashSnapshot::Order(removed))
        .await
        .unwrap();

    // A reset counter hands out CMD-001 again
    db.collection::<mongodb::bson::Document>("counters")
        .drop()
        .await
        .unwrap();
    let second = orders.create(sample_new_order("Aminata")).await.unwrap();
    assert_eq!(second.code, first.code);

    let err = trash.restore(&entry.id, &orders, &inbox).await.unwrap_err();
    assert!(matches!(
        err,
        NayaError::Conflict(ConflictError::DuplicateCode { ref code }) if code == "CMD-001"
    ));
    assert!(trash.get(&entry.id).await.unwrap().is_some());
    assert!(orders.get(&first.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_conflict_and_keep_one_patch() {
    let db = mongo_database().await;
    let orders = Arc::new(mongo_order_store(&db).await);
    let order = orders.create(sample_new_order("Koffi")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let orders = orders.clone();
        let id = order.id;
        handles.push(tokio::spawn(async move {
            let patch = OrderPatch {
                sender: Some(PartyPatch {
                    phone: Some(format!("22507000000{:02}", i)),
                    ..Default::default()
                }),
                ..Default::default()
            };
            orders.update_pending(&id, &patch).await
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok((updated, changes)) => {
                assert!(changes.contains_key("sender.phone"));
                winners.push(updated);
            }
            Err(NayaError::Conflict(ConflictError::ConcurrentModification { id, .. })) => {
                assert_eq!(id, order.id);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert!(!winners.is_empty());
    assert!(conflicts > 0, "16 simultaneous edits never collided");

    // The stored document is the last winner's write, untouched by losers
    let stored = orders.get(&order.id).await.unwrap().unwrap();
    let last = winners.iter().max_by_key(|o| o.updated_at).unwrap();
    assert_eq!(&stored, last);
    assert!(stored.is_pending());
}

#[tokio::test]
async fn test_purge_all_counts_documents() {
    let db = mongo_database().await;
    let trash = MongoTrashStore::new(db.clone());
    let inbox = MongoInboxStore::new(db);

    assert_eq!(trash.purge_all().await.unwrap(), 0);

    for reference in ["CMD-001", "CMD-002", "CMD-003"] {
        let entry = inbox
            .append(naya::core::inbox::NewInboxEntry {
                item_type: naya::core::inbox::InboxItemType::Order,
                action: naya::core::inbox::InboxAction::Validation,
                reference: reference.to_string(),
                client: "Koffi".to_string(),
                details: String::new(),
                price: Some(1000.0),
                changes: Default::default(),
            })
            .await
            .unwrap();
        trash
            .add(naya::core::trash::TrashSnapshot::Inbox(entry))
            .await
            .unwrap();
    }

    assert_eq!(trash.purge_all().await.unwrap(), 3);
    assert!(trash.list().await.unwrap().is_empty());
}
