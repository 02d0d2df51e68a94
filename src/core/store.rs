//! Store traits for orders, inbox entries and trash entries
//!
//! The stores are passive persistence. They enforce single-record rules
//! (compare-and-set on order status, required fields) but know nothing of
//! each other; cross-store sequencing belongs to the triage service.

use crate::core::error::{ConflictError, NayaError, NayaResult, NotFoundError};
use crate::core::inbox::{FieldChanges, InboxEntry, NewInboxEntry};
use crate::core::order::{NewOrder, Order, OrderPatch};
use crate::core::trash::{TrashEntry, TrashSnapshot};
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence for delivery orders
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Store a newly submitted order
    ///
    /// Assigns identity, the next sequential code, `Pending` status and
    /// both timestamps.
    async fn create(&self, new_order: NewOrder) -> NayaResult<Order>;

    /// Re-insert a complete order (restore from trash)
    ///
    /// Fails with [`ConflictError::AlreadyExists`] if the id is taken.
    async fn insert(&self, order: Order) -> NayaResult<Order>;

    /// Get an order by id
    async fn get(&self, id: &Uuid) -> NayaResult<Option<Order>>;

    /// All `Pending` orders, newest-created first
    async fn list_pending(&self) -> NayaResult<Vec<Order>>;

    /// Compare-and-set `Pending → Validated`
    ///
    /// Fails with a validation error if `price` is below the floor, and with
    /// [`NotFoundError::Order`] if the order is absent or no longer pending.
    async fn set_validated(&self, id: &Uuid, price: f64) -> NayaResult<Order>;

    /// Compare-and-set `Pending → Cancelled`
    async fn set_cancelled(&self, id: &Uuid) -> NayaResult<Order>;

    /// Compare-and-set edit of a pending order
    ///
    /// Returns the updated order and the fields that changed. An empty
    /// change set leaves the stored record untouched.
    async fn update_pending(&self, id: &Uuid, patch: &OrderPatch) -> NayaResult<(Order, FieldChanges)>;

    /// Hard-delete, returning the removed order if it was there
    ///
    /// Only called as part of moving an order to trash.
    async fn remove(&self, id: &Uuid) -> NayaResult<Option<Order>>;
}

/// Append-only feed of triage events
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Validate, stamp and store a new entry
    async fn append(&self, new_entry: NewInboxEntry) -> NayaResult<InboxEntry>;

    /// Re-insert a complete entry (restore from trash)
    async fn insert(&self, entry: InboxEntry) -> NayaResult<InboxEntry>;

    async fn get(&self, id: &Uuid) -> NayaResult<Option<InboxEntry>>;

    /// All entries, newest event first
    async fn list(&self) -> NayaResult<Vec<InboxEntry>>;

    /// Hard-delete, returning the removed entry if it was there
    async fn remove(&self, id: &Uuid) -> NayaResult<Option<InboxEntry>>;
}

/// Soft-deletion holding area
#[async_trait]
pub trait TrashStore: Send + Sync {
    /// Wrap a snapshot in a new trash entry stamped now
    async fn add(&self, snapshot: TrashSnapshot) -> NayaResult<TrashEntry>;

    async fn get(&self, id: &Uuid) -> NayaResult<Option<TrashEntry>>;

    /// All entries, newest deletion first
    async fn list(&self) -> NayaResult<Vec<TrashEntry>>;

    /// Hard-delete one entry, returning it if it was there
    async fn remove(&self, id: &Uuid) -> NayaResult<Option<TrashEntry>>;

    /// Hard-delete everything; returns how many entries went
    async fn purge_all(&self) -> NayaResult<usize>;

    /// Irreversibly delete one entry
    async fn purge_one(&self, id: &Uuid) -> NayaResult<TrashEntry> {
        self.remove(id)
            .await?
            .ok_or_else(|| NotFoundError::TrashEntry { id: *id }.into())
    }

    /// Put a trashed record back into its origin store, then drop the entry
    ///
    /// Insert happens before delete so a failure in between leaves the
    /// record in both places rather than nowhere. If the origin already
    /// holds the id (an earlier restore died after its insert) the insert
    /// is skipped, which makes a retry finish the job. Any other collision
    /// leaves the entry in the trash.
    async fn restore(
        &self,
        id: &Uuid,
        orders: &dyn OrderStore,
        inbox: &dyn InboxStore,
    ) -> NayaResult<TrashEntry> {
        let entry = self
            .get(id)
            .await?
            .ok_or(NotFoundError::TrashEntry { id: *id })?;

        let inserted = match &entry.snapshot {
            TrashSnapshot::Order(order) => orders.insert(order.clone()).await.map(|_| ()),
            TrashSnapshot::Inbox(inbox_entry) => inbox.insert(inbox_entry.clone()).await.map(|_| ()),
        };

        match inserted {
            Ok(()) => {}
            Err(e @ NayaError::Conflict(ConflictError::AlreadyExists { .. })) => {
                let present = match &entry.snapshot {
                    TrashSnapshot::Order(order) => orders.get(&order.id).await?.is_some(),
                    TrashSnapshot::Inbox(inbox_entry) => inbox.get(&inbox_entry.id).await?.is_some(),
                };
                if !present {
                    return Err(e);
                }
                tracing::warn!(
                    trash_id = %entry.id,
                    item_id = %entry.item_id,
                    origin = %entry.origin,
                    "restore target already present, finishing earlier restore"
                );
            }
            Err(e) => return Err(e),
        }

        self.remove(id)
            .await?
            .ok_or_else(|| NotFoundError::TrashEntry { id: *id }.into())
    }
}
