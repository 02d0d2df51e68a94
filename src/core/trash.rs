//! Trash entries: soft-deleted orders and inbox entries
//!
//! A trash entry owns a deep copy of the removed record. The live record is
//! gone from its origin store by the time the entry is visible.

use crate::core::inbox::InboxEntry;
use crate::core::order::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store an item was trashed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashOrigin {
    #[serde(alias = "commande")]
    Order,
    Inbox,
}

impl TrashOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrashOrigin::Order => "order",
            TrashOrigin::Inbox => "inbox",
        }
    }
}

impl std::fmt::Display for TrashOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full copy of the trashed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashSnapshot {
    Order(Order),
    Inbox(InboxEntry),
}

impl TrashSnapshot {
    pub fn origin(&self) -> TrashOrigin {
        match self {
            TrashSnapshot::Order(_) => TrashOrigin::Order,
            TrashSnapshot::Inbox(_) => TrashOrigin::Inbox,
        }
    }

    /// Id of the record in its origin store
    pub fn item_id(&self) -> Uuid {
        match self {
            TrashSnapshot::Order(order) => order.id,
            TrashSnapshot::Inbox(entry) => entry.id,
        }
    }
}

/// A record waiting in the trash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashEntry {
    pub id: Uuid,

    /// Id the record had (and gets back on restore) in its origin store
    pub item_id: Uuid,

    pub origin: TrashOrigin,

    pub snapshot: TrashSnapshot,

    pub deleted_at: DateTime<Utc>,
}

impl TrashEntry {
    pub fn new(snapshot: TrashSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: snapshot.item_id(),
            origin: snapshot.origin(),
            snapshot,
            deleted_at: now,
        }
    }
}

/// Newest deletion first
pub fn sort_newest_first(entries: &mut [TrashEntry]) {
    entries.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| b.id.cmp(&a.id)));
}
