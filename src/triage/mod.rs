//! The triage service: sequencing of writes across the three stores
//!
//! Stores are passive; every rule that spans more than one record lives
//! here. Write ordering for each operation:
//!
//! - validate / cancel: order compare-and-set first, inbox append second.
//!   The order write is the commit point; an inbox failure after it is
//!   reported to the caller and the order stays transitioned.
//! - move to trash: trash insert first, origin removal second, so a crash
//!   in between leaves the item in its origin store (and a stale trash
//!   entry) instead of nowhere.
//! - restore: origin insert first, trash removal second (see
//!   [`TrashStore::restore`]).
//!
//! After the writes succeed an event is published on the bus, if any.

use crate::core::error::{NayaResult, NotFoundError, ValidationError};
use crate::core::events::{EventBus, TriageEvent};
use crate::core::inbox::{FieldChanges, InboxAction, InboxEntry, InboxItemType, NewInboxEntry};
use crate::core::order::{self, MIN_ORDER_PRICE, NewOrder, Order, OrderPatch};
use crate::core::store::{InboxStore, OrderStore, TrashStore};
use crate::core::trash::{TrashEntry, TrashOrigin, TrashSnapshot};
use std::sync::Arc;
use uuid::Uuid;

/// Display name used when an order carries no sender name
const UNKNOWN_CLIENT: &str = "Unknown client";

/// Orchestrates the pending / inbox / trash workflow
#[derive(Clone)]
pub struct TriageService {
    orders: Arc<dyn OrderStore>,
    inbox: Arc<dyn InboxStore>,
    trash: Arc<dyn TrashStore>,
    event_bus: Option<Arc<EventBus>>,
    min_price: f64,
}

impl TriageService {
    pub fn new(orders: Arc<dyn OrderStore>, inbox: Arc<dyn InboxStore>, trash: Arc<dyn TrashStore>) -> Self {
        Self {
            orders,
            inbox,
            trash,
            event_bus: None,
            min_price: MIN_ORDER_PRICE,
        }
    }

    /// Raise the price floor; values under the hard minimum are ignored
    pub fn with_min_price(mut self, min_price: f64) -> Self {
        if min_price.is_finite() && min_price >= MIN_ORDER_PRICE {
            self.min_price = min_price;
        } else {
            tracing::warn!(min_price, floor = MIN_ORDER_PRICE, "ignoring price floor below the hard minimum");
        }
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn min_price(&self) -> f64 {
        self.min_price
    }

    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }

    pub fn orders(&self) -> &Arc<dyn OrderStore> {
        &self.orders
    }

    pub fn inbox(&self) -> &Arc<dyn InboxStore> {
        &self.inbox
    }

    pub fn trash(&self) -> &Arc<dyn TrashStore> {
        &self.trash
    }

    fn publish(&self, event: TriageEvent) {
        if let Some(bus) = &self.event_bus {
            let seq = bus.publish(event);
            tracing::debug!(seq, "published triage event");
        }
    }

    fn client_name(order: &Order) -> String {
        if order.sender.name.is_empty() {
            UNKNOWN_CLIENT.to_string()
        } else {
            order.sender.name.clone()
        }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Customer order intake
    pub async fn submit_order(&self, new_order: NewOrder) -> NayaResult<Order> {
        let order = self.orders.create(new_order).await?;
        tracing::info!(order_id = %order.id, code = %order.code, "order submitted");
        self.publish(TriageEvent::OrderCreated {
            order_id: order.id,
            code: order.code.clone(),
        });
        Ok(order)
    }

    pub async fn get_order(&self, id: &Uuid) -> NayaResult<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| NotFoundError::Order { id: *id }.into())
    }

    /// Pending orders, newest first
    pub async fn list_pending(&self) -> NayaResult<Vec<Order>> {
        self.orders.list_pending().await
    }

    /// Price a pending order and record the validation in the inbox
    pub async fn validate_order(&self, id: &Uuid, price: f64) -> NayaResult<Order> {
        if let Err(e) = order::check_price(price, self.min_price) {
            tracing::warn!(order_id = %id, price, "rejected validation price");
            return Err(e.into());
        }

        let order = self.orders.set_validated(id, price).await.inspect_err(|e| {
            tracing::warn!(order_id = %id, error = %e, "validation refused by order store");
        })?;

        let entry = self
            .inbox
            .append(NewInboxEntry {
                item_type: InboxItemType::Order,
                action: InboxAction::Validation,
                reference: order.code.clone(),
                client: Self::client_name(&order),
                details: format!("Order validated by manager - Price: {} FCFA", price),
                price: Some(price),
                changes: FieldChanges::new(),
            })
            .await?;

        tracing::info!(order_id = %order.id, code = %order.code, price, "order validated");
        self.publish(TriageEvent::OrderValidated {
            order_id: order.id,
            code: order.code.clone(),
            price,
        });
        self.publish_appended(&entry);
        Ok(order)
    }

    /// Cancel a pending order; the reason goes to the inbox entry
    pub async fn cancel_order(&self, id: &Uuid, reason: &str) -> NayaResult<Order> {
        let reason = reason.trim();
        if reason.is_empty() {
            tracing::warn!(order_id = %id, "rejected cancellation without reason");
            return Err(ValidationError::MissingReason.into());
        }

        let order = self.orders.set_cancelled(id).await.inspect_err(|e| {
            tracing::warn!(order_id = %id, error = %e, "cancellation refused by order store");
        })?;

        let entry = self
            .inbox
            .append(NewInboxEntry {
                item_type: InboxItemType::Order,
                action: InboxAction::Cancellation,
                reference: order.code.clone(),
                client: Self::client_name(&order),
                details: format!("Order cancelled by manager - Reason: {}", reason),
                price: None,
                changes: FieldChanges::new(),
            })
            .await?;

        tracing::info!(order_id = %order.id, code = %order.code, "order cancelled");
        self.publish(TriageEvent::OrderCancelled {
            order_id: order.id,
            code: order.code.clone(),
            reason: reason.to_string(),
        });
        self.publish_appended(&entry);
        Ok(order)
    }

    /// Edit a pending order
    ///
    /// Records one `modification` inbox entry listing the changed fields.
    /// A patch that changes nothing writes nothing.
    pub async fn update_order(&self, id: &Uuid, patch: &OrderPatch) -> NayaResult<(Order, FieldChanges)> {
        let (order, changes) = self.orders.update_pending(id, patch).await?;
        if changes.is_empty() {
            tracing::debug!(order_id = %id, "order patch changed nothing");
            return Ok((order, changes));
        }

        let fields: Vec<String> = changes.keys().cloned().collect();
        let entry = self
            .inbox
            .append(NewInboxEntry {
                item_type: InboxItemType::Order,
                action: InboxAction::Modification,
                reference: order.code.clone(),
                client: Self::client_name(&order),
                details: format!("Order modified by manager - Fields: {}", fields.join(", ")),
                price: None,
                changes: changes.clone(),
            })
            .await?;

        tracing::info!(order_id = %order.id, code = %order.code, fields = ?fields, "order modified");
        self.publish(TriageEvent::OrderModified {
            order_id: order.id,
            code: order.code.clone(),
            fields,
        });
        self.publish_appended(&entry);
        Ok((order, changes))
    }

    // =========================================================================
    // Inbox
    // =========================================================================

    pub async fn list_inbox(&self) -> NayaResult<Vec<InboxEntry>> {
        self.inbox.list().await
    }

    /// Append an entry on a caller's behalf
    pub async fn append_inbox(&self, new_entry: NewInboxEntry) -> NayaResult<InboxEntry> {
        let entry = self.inbox.append(new_entry).await?;
        tracing::info!(entry_id = %entry.id, action = entry.action.as_str(), reference = %entry.reference, "inbox entry appended");
        self.publish_appended(&entry);
        Ok(entry)
    }

    fn publish_appended(&self, entry: &InboxEntry) {
        self.publish(TriageEvent::InboxAppended {
            entry_id: entry.id,
            action: entry.action,
            reference: entry.reference.clone(),
        });
    }

    // =========================================================================
    // Trash
    // =========================================================================

    pub async fn list_trash(&self) -> NayaResult<Vec<TrashEntry>> {
        self.trash.list().await
    }

    /// Soft-delete an order or inbox entry
    ///
    /// Orders in any status can be trashed. If another caller removes the
    /// item between our snapshot and our removal, our trash entry is
    /// dropped again and the caller gets NotFound.
    pub async fn move_to_trash(&self, item_id: &Uuid, origin: TrashOrigin) -> NayaResult<TrashEntry> {
        let snapshot = match origin {
            TrashOrigin::Order => TrashSnapshot::Order(
                self.orders
                    .get(item_id)
                    .await?
                    .ok_or(NotFoundError::Order { id: *item_id })?,
            ),
            TrashOrigin::Inbox => TrashSnapshot::Inbox(
                self.inbox
                    .get(item_id)
                    .await?
                    .ok_or(NotFoundError::InboxEntry { id: *item_id })?,
            ),
        };

        let entry = self.trash.add(snapshot).await?;

        let removed = match origin {
            TrashOrigin::Order => self.orders.remove(item_id).await?.is_some(),
            TrashOrigin::Inbox => self.inbox.remove(item_id).await?.is_some(),
        };

        if !removed {
            tracing::warn!(item_id = %item_id, origin = %origin, "item vanished while trashing, dropping duplicate trash entry");
            self.trash.remove(&entry.id).await?;
            return Err(match origin {
                TrashOrigin::Order => NotFoundError::Order { id: *item_id },
                TrashOrigin::Inbox => NotFoundError::InboxEntry { id: *item_id },
            }
            .into());
        }

        tracing::info!(trash_id = %entry.id, item_id = %item_id, origin = %origin, "moved to trash");
        self.publish(TriageEvent::MovedToTrash {
            trash_id: entry.id,
            item_id: *item_id,
            origin,
        });
        Ok(entry)
    }

    /// Put a trashed item back where it came from, in the state it was trashed in
    pub async fn restore_from_trash(&self, trash_id: &Uuid) -> NayaResult<TrashEntry> {
        let entry = self
            .trash
            .restore(trash_id, self.orders.as_ref(), self.inbox.as_ref())
            .await?;

        tracing::info!(trash_id = %entry.id, item_id = %entry.item_id, origin = %entry.origin, "restored from trash");
        self.publish(TriageEvent::Restored {
            trash_id: entry.id,
            item_id: entry.item_id,
            origin: entry.origin,
        });
        Ok(entry)
    }

    /// Irreversibly delete one trash entry
    pub async fn purge_trash_item(&self, trash_id: &Uuid) -> NayaResult<TrashEntry> {
        let entry = self.trash.purge_one(trash_id).await?;
        tracing::info!(trash_id = %entry.id, origin = %entry.origin, "trash entry purged");
        self.publish(TriageEvent::TrashPurged {
            trash_ids: vec![entry.id],
        });
        Ok(entry)
    }

    /// Irreversibly delete everything in the trash
    ///
    /// Emptying an empty trash succeeds and returns 0.
    pub async fn empty_trash(&self) -> NayaResult<usize> {
        let count = self.trash.purge_all().await?;
        tracing::info!(count, "trash emptied");
        if count > 0 {
            self.publish(TriageEvent::TrashEmptied { count });
        }
        Ok(count)
    }
}
