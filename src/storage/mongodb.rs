//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides `MongoOrderStore`, `MongoInboxStore` and `MongoTrashStore`,
//! backed by a `mongodb::Database`.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! naya-triage = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! One collection per store: `orders`, `inbox` and `trash`. Order codes come
//! from a `counters` collection holding one document per sequence.
//!
//! # Serialization strategy
//!
//! Records are serialized via `serde_json::Value` as an intermediate format,
//! then converted to BSON documents, so UUIDs and timestamps are stored as
//! strings. The top-level `id` field is mapped to MongoDB's `_id`.
//!
//! # Compare-and-set
//!
//! Status transitions replace the document with a filter on
//! `status: "Pending"`; edits additionally filter on the `updated_at` that
//! was read. A write that matches nothing lost the race.

use crate::core::error::{ConflictError, NayaError, NayaResult, NotFoundError, StorageError};
use crate::core::inbox::{self, FieldChanges, InboxEntry, NewInboxEntry};
use crate::core::order::{self, DEFAULT_CODE_PREFIX, MIN_ORDER_PRICE, NewOrder, Order, OrderPatch};
use crate::core::store::{InboxStore, OrderStore, TrashStore};
use crate::core::trash::{self, TrashEntry, TrashSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::Database;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

const BACKEND: &str = "MongoDB";

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Serialize a record into a BSON document, renaming `id` → `_id`.
fn to_document<T: Serialize>(record: &T) -> NayaResult<Document> {
    let json = serde_json::to_value(record).map_err(|e| StorageError::Serialization {
        message: e.to_string(),
    })?;
    let bson_val = mongodb::bson::to_bson(&json).map_err(|e| StorageError::Serialization {
        message: e.to_string(),
    })?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => {
            return Err(StorageError::Serialization {
                message: "expected a document, got a non-object value".to_string(),
            }
            .into());
        }
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }

    Ok(doc)
}

/// Deserialize a BSON document back into a record, renaming `_id` → `id`.
fn from_document<T: DeserializeOwned>(mut doc: Document) -> NayaResult<T> {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }

    let json = Bson::Document(doc).into_relaxed_extjson();
    serde_json::from_value(json).map_err(|e| {
        StorageError::Serialization {
            message: e.to_string(),
        }
        .into()
    })
}

fn uuid_bson(id: &Uuid) -> Bson {
    Bson::String(id.to_string())
}

fn backend_error(context: &str, err: mongodb::error::Error) -> NayaError {
    tracing::error!(backend = BACKEND, error = %err, "{}", context);
    StorageError::backend(BACKEND, format!("{}: {}", context, err)).into()
}

/// Index named in a duplicate key message: `... index: <name> dup key: { ... }`
fn index_in_dup_message(message: &str) -> &str {
    message
        .split("index: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default()
}

/// Index named by an E11000 duplicate key error, if that is what `err` is
fn duplicate_key_index(err: &mongodb::error::Error) -> Option<String> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000 => {
            Some(index_in_dup_message(&write_error.message).to_string())
        }
        _ => None,
    }
}

async fn collect<T: DeserializeOwned>(
    cursor: mongodb::Cursor<Document>,
    context: &str,
) -> NayaResult<Vec<T>> {
    let docs: Vec<Document> = cursor
        .try_collect()
        .await
        .map_err(|e| backend_error(context, e))?;
    docs.into_iter().map(from_document).collect()
}

/// Insert a whole record, mapping a duplicate `_id` to a conflict
///
/// Collisions on other unique indexes are handed to `on_other_index`.
async fn insert_new<T: Serialize>(
    collection: mongodb::Collection<Document>,
    record: &T,
    resource: &'static str,
    id: Uuid,
    on_other_index: impl FnOnce(&str) -> NayaError,
) -> NayaResult<()> {
    let doc = to_document(record)?;
    match collection.insert_one(doc).await {
        Ok(_) => Ok(()),
        Err(e) => match duplicate_key_index(&e) {
            Some(index) if index == "_id_" => Err(ConflictError::AlreadyExists { resource, id }.into()),
            Some(index) => Err(on_other_index(&index)),
            None => Err(backend_error("insert failed", e)),
        },
    }
}

/// Only `_id` is unique outside of `orders`
fn unexpected_index(index: &str) -> NayaError {
    StorageError::backend(BACKEND, format!("unexpected duplicate key on index '{}'", index)).into()
}

// ---------------------------------------------------------------------------
// MongoOrderStore
// ---------------------------------------------------------------------------

/// Order store backed by the `orders` collection.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use naya::storage::MongoOrderStore;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let store = MongoOrderStore::new(client.database("naya"));
/// store.ensure_indexes().await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoOrderStore {
    database: Database,
    code_prefix: String,
}

impl MongoOrderStore {
    pub fn new(database: Database) -> Self {
        Self::with_code_prefix(database, DEFAULT_CODE_PREFIX)
    }

    pub fn with_code_prefix(database: Database, prefix: impl Into<String>) -> Self {
        Self {
            database,
            code_prefix: prefix.into(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self) -> mongodb::Collection<Document> {
        self.database.collection("orders")
    }

    /// Create indexes used by the pending view and code lookups.
    ///
    /// Idempotent, safe to call on every startup.
    pub async fn ensure_indexes(&self) -> NayaResult<()> {
        use mongodb::IndexModel;
        use mongodb::options::IndexOptions;

        let indexes = vec![
            IndexModel::builder()
                .keys(doc! { "status": 1, "created_at": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "code": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
        ];

        self.collection()
            .create_indexes(indexes)
            .await
            .map_err(|e| backend_error("failed to create indexes on orders", e))?;
        Ok(())
    }

    /// Atomically bump the order counter and return the new value
    async fn next_seq(&self) -> NayaResult<u64> {
        let counter = self
            .database
            .collection::<Document>("counters")
            .find_one_and_update(doc! { "_id": "order_code" }, doc! { "$inc": { "seq": 1i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| backend_error("failed to bump order counter", e))?
            .ok_or_else(|| StorageError::backend(BACKEND, "order counter missing after upsert"))?;

        let seq = counter
            .get_i64("seq")
            .map_err(|e| StorageError::backend(BACKEND, e))?;
        Ok(seq.max(0) as u64)
    }

    /// Insert an order; a taken code is its own conflict
    async fn insert_order(&self, order: &Order) -> NayaResult<()> {
        let inserted = insert_new(self.collection(), order, "order", order.id, |_| {
            ConflictError::DuplicateCode {
                code: order.code.clone(),
            }
            .into()
        })
        .await;

        // The server names one violated index; the same id counts first
        match inserted {
            Err(NayaError::Conflict(ConflictError::DuplicateCode { .. })) if self.get(&order.id).await?.is_some() => {
                Err(ConflictError::AlreadyExists {
                    resource: "order",
                    id: order.id,
                }
                .into())
            }
            other => other,
        }
    }

    /// Read a pending order, or NotFound
    async fn get_pending(&self, id: &Uuid) -> NayaResult<Order> {
        match self.get(id).await? {
            Some(order) if order.is_pending() => Ok(order),
            _ => Err(NotFoundError::Order { id: *id }.into()),
        }
    }

    /// Replace a document that must still be pending (and, optionally, at
    /// the given `updated_at`). Returns false if nothing matched.
    async fn replace_if_pending(&self, previous: &Order, updated: &Order, check_version: bool) -> NayaResult<bool> {
        let mut filter = doc! { "_id": uuid_bson(&previous.id), "status": "Pending" };
        if check_version {
            let version = serde_json::to_value(previous.updated_at).map_err(|e| StorageError::Serialization {
                message: e.to_string(),
            })?;
            if let Some(version) = version.as_str() {
                filter.insert("updated_at", version);
            }
        }

        let replaced = self
            .collection()
            .find_one_and_replace(filter, to_document(updated)?)
            .await
            .map_err(|e| backend_error("failed to update order", e))?;
        Ok(replaced.is_some())
    }
}

#[async_trait]
impl OrderStore for MongoOrderStore {
    async fn create(&self, new_order: NewOrder) -> NayaResult<Order> {
        let new_order = new_order.trimmed();
        new_order.check()?;

        let seq = self.next_seq().await?;
        let order = Order::from_new(new_order, order::format_order_code(&self.code_prefix, seq), Utc::now());
        self.insert_order(&order).await?;
        Ok(order)
    }

    async fn insert(&self, order: Order) -> NayaResult<Order> {
        self.insert_order(&order).await?;
        Ok(order)
    }

    async fn get(&self, id: &Uuid) -> NayaResult<Option<Order>> {
        let doc = self
            .collection()
            .find_one(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| backend_error("failed to get order", e))?;
        doc.map(from_document).transpose()
    }

    async fn list_pending(&self) -> NayaResult<Vec<Order>> {
        let cursor = self
            .collection()
            .find(doc! { "status": "Pending" })
            .await
            .map_err(|e| backend_error("failed to list pending orders", e))?;

        // Timestamps are strings; sort on the parsed values
        let mut orders: Vec<Order> = collect(cursor, "failed to collect pending orders").await?;
        order::sort_newest_first(&mut orders);
        Ok(orders)
    }

    async fn set_validated(&self, id: &Uuid, price: f64) -> NayaResult<Order> {
        order::check_price(price, MIN_ORDER_PRICE)?;

        let previous = self.get_pending(id).await?;
        let mut updated = previous.clone();
        updated.mark_validated(price, Utc::now())?;

        if !self.replace_if_pending(&previous, &updated, false).await? {
            return Err(NotFoundError::Order { id: *id }.into());
        }
        Ok(updated)
    }

    async fn set_cancelled(&self, id: &Uuid) -> NayaResult<Order> {
        let previous = self.get_pending(id).await?;
        let mut updated = previous.clone();
        updated.mark_cancelled(Utc::now())?;

        if !self.replace_if_pending(&previous, &updated, false).await? {
            return Err(NotFoundError::Order { id: *id }.into());
        }
        Ok(updated)
    }

    async fn update_pending(&self, id: &Uuid, patch: &OrderPatch) -> NayaResult<(Order, FieldChanges)> {
        let previous = self.get_pending(id).await?;
        let mut updated = previous.clone();
        let changes = updated.apply_patch(patch, Utc::now())?;
        if changes.is_empty() {
            return Ok((previous, changes));
        }

        if !self.replace_if_pending(&previous, &updated, true).await? {
            // Either no longer pending, or edited by someone else meanwhile
            return match self.get(id).await? {
                Some(current) if current.is_pending() => Err(ConflictError::ConcurrentModification {
                    resource: "order",
                    id: *id,
                }
                .into()),
                _ => Err(NotFoundError::Order { id: *id }.into()),
            };
        }
        Ok((updated, changes))
    }

    async fn remove(&self, id: &Uuid) -> NayaResult<Option<Order>> {
        let doc = self
            .collection()
            .find_one_and_delete(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| backend_error("failed to delete order", e))?;
        doc.map(from_document).transpose()
    }
}

// ---------------------------------------------------------------------------
// MongoInboxStore
// ---------------------------------------------------------------------------

/// Inbox store backed by the `inbox` collection.
#[derive(Clone, Debug)]
pub struct MongoInboxStore {
    database: Database,
}

impl MongoInboxStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self) -> mongodb::Collection<Document> {
        self.database.collection("inbox")
    }
}

#[async_trait]
impl InboxStore for MongoInboxStore {
    async fn append(&self, new_entry: NewInboxEntry) -> NayaResult<InboxEntry> {
        let entry = InboxEntry::from_new(new_entry, Utc::now())?;
        insert_new(self.collection(), &entry, "inbox entry", entry.id, unexpected_index).await?;
        Ok(entry)
    }

    async fn insert(&self, entry: InboxEntry) -> NayaResult<InboxEntry> {
        insert_new(self.collection(), &entry, "inbox entry", entry.id, unexpected_index).await?;
        Ok(entry)
    }

    async fn get(&self, id: &Uuid) -> NayaResult<Option<InboxEntry>> {
        let doc = self
            .collection()
            .find_one(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| backend_error("failed to get inbox entry", e))?;
        doc.map(from_document).transpose()
    }

    async fn list(&self) -> NayaResult<Vec<InboxEntry>> {
        let cursor = self
            .collection()
            .find(doc! {})
            .await
            .map_err(|e| backend_error("failed to list inbox", e))?;

        let mut entries: Vec<InboxEntry> = collect(cursor, "failed to collect inbox").await?;
        inbox::sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn remove(&self, id: &Uuid) -> NayaResult<Option<InboxEntry>> {
        let doc = self
            .collection()
            .find_one_and_delete(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| backend_error("failed to delete inbox entry", e))?;
        doc.map(from_document).transpose()
    }
}

// ---------------------------------------------------------------------------
// MongoTrashStore
// ---------------------------------------------------------------------------

/// Trash store backed by the `trash` collection.
#[derive(Clone, Debug)]
pub struct MongoTrashStore {
    database: Database,
}

impl MongoTrashStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self) -> mongodb::Collection<Document> {
        self.database.collection("trash")
    }
}

#[async_trait]
impl TrashStore for MongoTrashStore {
    async fn add(&self, snapshot: TrashSnapshot) -> NayaResult<TrashEntry> {
        let entry = TrashEntry::new(snapshot, Utc::now());
        insert_new(self.collection(), &entry, "trash entry", entry.id, unexpected_index).await?;
        Ok(entry)
    }

    async fn get(&self, id: &Uuid) -> NayaResult<Option<TrashEntry>> {
        let doc = self
            .collection()
            .find_one(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| backend_error("failed to get trash entry", e))?;
        doc.map(from_document).transpose()
    }

    async fn list(&self) -> NayaResult<Vec<TrashEntry>> {
        let cursor = self
            .collection()
            .find(doc! {})
            .await
            .map_err(|e| backend_error("failed to list trash", e))?;

        let mut entries: Vec<TrashEntry> = collect(cursor, "failed to collect trash").await?;
        trash::sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn remove(&self, id: &Uuid) -> NayaResult<Option<TrashEntry>> {
        let doc = self
            .collection()
            .find_one_and_delete(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| backend_error("failed to delete trash entry", e))?;
        doc.map(from_document).transpose()
    }

    async fn purge_all(&self) -> NayaResult<usize> {
        let result = self
            .collection()
            .delete_many(doc! {})
            .await
            .map_err(|e| backend_error("failed to empty trash", e))?;
        Ok(result.deleted_count as usize)
    }
}
