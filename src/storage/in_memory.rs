//! In-memory stores for testing and development
//!
//! Each store is an `Arc<RwLock<HashMap>>`. Compare-and-set on order status
//! happens under a single write lock, so two concurrent validations of the
//! same order cannot both succeed.

use crate::core::error::{ConflictError, NayaResult, NotFoundError, StorageError};
use crate::core::inbox::{self, FieldChanges, InboxEntry, NewInboxEntry};
use crate::core::order::{self, DEFAULT_CODE_PREFIX, MIN_ORDER_PRICE, NewOrder, Order, OrderPatch};
use crate::core::store::{InboxStore, OrderStore, TrashStore};
use crate::core::trash::{self, TrashEntry, TrashSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

fn read<'a, T>(lock: &'a RwLock<T>, store: &'static str) -> NayaResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| StorageError::LockPoisoned { store }.into())
}

fn write<'a, T>(lock: &'a RwLock<T>, store: &'static str) -> NayaResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| StorageError::LockPoisoned { store }.into())
}

// =============================================================================
// Orders
// =============================================================================

/// In-memory order store
///
/// Codes come from a counter shared by clones of the store; the counter is
/// bumped under the write lock so codes follow creation order.
#[derive(Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
    seq: Arc<AtomicU64>,
    code_prefix: String,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::with_code_prefix(DEFAULT_CODE_PREFIX)
    }

    pub fn with_code_prefix(prefix: impl Into<String>) -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
            code_prefix: prefix.into(),
        }
    }

    /// Number of stored orders, whatever their status
    pub fn len(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pending_mut<'a>(orders: &'a mut HashMap<Uuid, Order>, id: &Uuid) -> NayaResult<&'a mut Order> {
        match orders.get_mut(id) {
            Some(order) if order.is_pending() => Ok(order),
            _ => Err(NotFoundError::Order { id: *id }.into()),
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, new_order: NewOrder) -> NayaResult<Order> {
        let new_order = new_order.trimmed();
        new_order.check()?;

        let mut orders = write(&self.orders, "orders")?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let code = order::format_order_code(&self.code_prefix, seq);
        let order = Order::from_new(new_order, code, Utc::now());
        orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn insert(&self, order: Order) -> NayaResult<Order> {
        let mut orders = write(&self.orders, "orders")?;
        if orders.contains_key(&order.id) {
            return Err(ConflictError::AlreadyExists {
                resource: "order",
                id: order.id,
            }
            .into());
        }
        if orders.values().any(|o| o.code == order.code) {
            return Err(ConflictError::DuplicateCode { code: order.code }.into());
        }
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: &Uuid) -> NayaResult<Option<Order>> {
        let orders = read(&self.orders, "orders")?;
        Ok(orders.get(id).cloned())
    }

    async fn list_pending(&self) -> NayaResult<Vec<Order>> {
        let orders = read(&self.orders, "orders")?;
        let mut pending: Vec<Order> = orders.values().filter(|o| o.is_pending()).cloned().collect();
        order::sort_newest_first(&mut pending);
        Ok(pending)
    }

    async fn set_validated(&self, id: &Uuid, price: f64) -> NayaResult<Order> {
        order::check_price(price, MIN_ORDER_PRICE)?;

        let mut orders = write(&self.orders, "orders")?;
        let order = Self::pending_mut(&mut orders, id)?;
        order.mark_validated(price, Utc::now())?;
        Ok(order.clone())
    }

    async fn set_cancelled(&self, id: &Uuid) -> NayaResult<Order> {
        let mut orders = write(&self.orders, "orders")?;
        let order = Self::pending_mut(&mut orders, id)?;
        order.mark_cancelled(Utc::now())?;
        Ok(order.clone())
    }

    async fn update_pending(&self, id: &Uuid, patch: &OrderPatch) -> NayaResult<(Order, FieldChanges)> {
        let mut orders = write(&self.orders, "orders")?;
        let order = Self::pending_mut(&mut orders, id)?;
        let changes = order.apply_patch(patch, Utc::now())?;
        Ok((order.clone(), changes))
    }

    async fn remove(&self, id: &Uuid) -> NayaResult<Option<Order>> {
        let mut orders = write(&self.orders, "orders")?;
        Ok(orders.remove(id))
    }
}

// =============================================================================
// Inbox
// =============================================================================

/// In-memory inbox store
#[derive(Clone, Default)]
pub struct InMemoryInboxStore {
    entries: Arc<RwLock<HashMap<Uuid, InboxEntry>>>,
}

impl InMemoryInboxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InboxStore for InMemoryInboxStore {
    async fn append(&self, new_entry: NewInboxEntry) -> NayaResult<InboxEntry> {
        let entry = InboxEntry::from_new(new_entry, Utc::now())?;
        let mut entries = write(&self.entries, "inbox")?;
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn insert(&self, entry: InboxEntry) -> NayaResult<InboxEntry> {
        let mut entries = write(&self.entries, "inbox")?;
        if entries.contains_key(&entry.id) {
            return Err(ConflictError::AlreadyExists {
                resource: "inbox entry",
                id: entry.id,
            }
            .into());
        }
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: &Uuid) -> NayaResult<Option<InboxEntry>> {
        let entries = read(&self.entries, "inbox")?;
        Ok(entries.get(id).cloned())
    }

    async fn list(&self) -> NayaResult<Vec<InboxEntry>> {
        let entries = read(&self.entries, "inbox")?;
        let mut all: Vec<InboxEntry> = entries.values().cloned().collect();
        inbox::sort_newest_first(&mut all);
        Ok(all)
    }

    async fn remove(&self, id: &Uuid) -> NayaResult<Option<InboxEntry>> {
        let mut entries = write(&self.entries, "inbox")?;
        Ok(entries.remove(id))
    }
}

// =============================================================================
// Trash
// =============================================================================

/// In-memory trash store
#[derive(Clone, Default)]
pub struct InMemoryTrashStore {
    entries: Arc<RwLock<HashMap<Uuid, TrashEntry>>>,
}

impl InMemoryTrashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrashStore for InMemoryTrashStore {
    async fn add(&self, snapshot: TrashSnapshot) -> NayaResult<TrashEntry> {
        let entry = TrashEntry::new(snapshot, Utc::now());
        let mut entries = write(&self.entries, "trash")?;
        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn get(&self, id: &Uuid) -> NayaResult<Option<TrashEntry>> {
        let entries = read(&self.entries, "trash")?;
        Ok(entries.get(id).cloned())
    }

    async fn list(&self) -> NayaResult<Vec<TrashEntry>> {
        let entries = read(&self.entries, "trash")?;
        let mut all: Vec<TrashEntry> = entries.values().cloned().collect();
        trash::sort_newest_first(&mut all);
        Ok(all)
    }

    async fn remove(&self, id: &Uuid) -> NayaResult<Option<TrashEntry>> {
        let mut entries = write(&self.entries, "trash")?;
        Ok(entries.remove(id))
    }

    async fn purge_all(&self) -> NayaResult<usize> {
        let mut entries = write(&self.entries, "trash")?;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }
}
