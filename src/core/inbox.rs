//! Inbox entries: the managers' notification feed
//!
//! One entry per notable triage event. Entries are immutable once appended;
//! the only thing that happens to them afterwards is being moved to trash.

use crate::core::error::{NayaResult, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Field path → before/after values, as recorded by a modification
pub type FieldChanges = BTreeMap<String, FieldChange>;

/// One changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// What the entry is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxItemType {
    #[serde(alias = "commande")]
    Order,
    Other,
}

/// Which triage action produced the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxAction {
    Validation,
    #[serde(alias = "annulation")]
    Cancellation,
    Modification,
}

impl InboxAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboxAction::Validation => "validation",
            InboxAction::Cancellation => "cancellation",
            InboxAction::Modification => "modification",
        }
    }
}

/// Fields a caller supplies when appending to the inbox
///
/// The event date is not part of it: the store stamps every entry at
/// append time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewInboxEntry {
    #[serde(rename = "type")]
    pub item_type: InboxItemType,

    pub action: InboxAction,

    /// Human code of the order concerned
    #[serde(alias = "commandeId")]
    #[validate(length(min = 1, message = "reference is required"))]
    pub reference: String,

    /// Display name of the client, never the acting manager
    #[serde(default)]
    pub client: String,

    #[serde(default)]
    pub details: String,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub changes: FieldChanges,
}

impl NewInboxEntry {
    pub fn check(&self) -> Result<(), ValidationError> {
        self.validate()
            .map_err(|errors| ValidationError::FieldErrors(crate::core::error::field_errors(&errors)))?;
        if self.reference.trim().is_empty() {
            return Err(ValidationError::field("reference", "reference is required"));
        }
        if let Some(price) = self.price
            && !price.is_finite()
        {
            return Err(ValidationError::InvalidPrice);
        }
        Ok(())
    }
}

/// A stored inbox entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxEntry {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub item_type: InboxItemType,

    pub action: InboxAction,

    pub reference: String,

    #[serde(default)]
    pub client: String,

    /// Server-assigned event time; the sort key of the feed
    pub date: DateTime<Utc>,

    #[serde(default)]
    pub details: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: FieldChanges,
}

impl InboxEntry {
    /// Validate and stamp a new entry
    pub fn from_new(new_entry: NewInboxEntry, now: DateTime<Utc>) -> NayaResult<Self> {
        new_entry.check()?;
        Ok(Self {
            id: Uuid::new_v4(),
            item_type: new_entry.item_type,
            action: new_entry.action,
            reference: new_entry.reference.trim().to_string(),
            client: new_entry.client.trim().to_string(),
            date: now,
            details: new_entry.details,
            price: new_entry.price,
            changes: new_entry.changes,
        })
    }
}

/// Newest event first; equal dates fall back to id so the order is total
pub fn sort_newest_first(entries: &mut [InboxEntry]) {
    entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
}
