//! Delivery orders and their triage lifecycle
//!
//! An [`Order`] starts `Pending` and moves exactly once, to `Validated`
//! (priced) or `Cancelled`. Both terminal states are soft: the record stays
//! in the order store, only annotated.

use crate::core::error::{FieldValidationError, NayaError, NayaResult, ValidationError};
use crate::core::inbox::{FieldChange, FieldChanges};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

/// Hard floor for a validated order price, in FCFA
pub const MIN_ORDER_PRICE: f64 = 500.0;

/// Default prefix of the human-facing order code
pub const DEFAULT_CODE_PREFIX: &str = "CMD";

/// Build the human-facing code for the `seq`-th order (`CMD-001`, `CMD-002`, ...)
pub fn format_order_code(prefix: &str, seq: u64) -> String {
    format!("{}-{:03}", prefix, seq)
}

/// Check a price against a minimum
pub fn check_price(price: f64, min: f64) -> Result<(), ValidationError> {
    if !price.is_finite() {
        return Err(ValidationError::InvalidPrice);
    }
    if price < min {
        return Err(ValidationError::PriceTooLow { price, min });
    }
    Ok(())
}

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Validated,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Validated => "Validated",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Sender or recipient of a delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Party {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,

    #[serde(default)]
    pub address: String,
}

/// What is being delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Package {
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[validate(range(min = 1, message = "must be at least 1"))]
    pub count: u32,

    /// Weight in kilograms
    #[serde(default)]
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub weight: f64,

    #[serde(default)]
    pub dimensions: String,

    /// Declared value in FCFA
    #[serde(default)]
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub declared_value: f64,

    #[serde(default)]
    pub insured: bool,
}

/// Requested delivery window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub time_slot: String,

    #[serde(default)]
    pub instructions: String,
}

/// A delivery request as submitted by a customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(nested)]
    pub sender: Party,

    #[validate(nested)]
    pub recipient: Party,

    #[validate(nested)]
    pub package: Package,

    #[serde(default)]
    pub delivery: DeliveryWindow,
}

impl NewOrder {
    /// Trim every free-text field
    pub fn trimmed(mut self) -> Self {
        for party in [&mut self.sender, &mut self.recipient] {
            trim_in_place(&mut party.name);
            trim_in_place(&mut party.phone);
            trim_in_place(&mut party.address);
        }
        trim_in_place(&mut self.package.description);
        trim_in_place(&mut self.package.kind);
        trim_in_place(&mut self.package.dimensions);
        trim_in_place(&mut self.delivery.time_slot);
        trim_in_place(&mut self.delivery.instructions);
        self
    }

    /// Validate required fields
    ///
    /// The recipient needs an address; the sender may be picked up from
    /// whatever address the courier is given.
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut fields = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => crate::core::error::field_errors(&errors),
        };

        if self.recipient.address.trim().is_empty() {
            fields.push(FieldValidationError {
                field: "recipient.address".to_string(),
                message: "address is required".to_string(),
            });
        }

        if fields.is_empty() {
            Ok(())
        } else {
            fields.sort_by(|a, b| a.field.cmp(&b.field));
            Err(ValidationError::FieldErrors(fields))
        }
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// One delivery order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Human-facing sequential code, e.g. `CMD-001`
    pub code: String,

    pub status: OrderStatus,

    pub sender: Party,
    pub recipient: Party,
    pub package: Package,
    pub delivery: DeliveryWindow,

    /// Set if and only if `status == Validated`
    #[serde(default)]
    pub price: Option<f64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a submitted order
    pub fn from_new(new_order: NewOrder, code: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            status: OrderStatus::Pending,
            sender: new_order.sender,
            recipient: new_order.recipient,
            package: new_order.package,
            delivery: new_order.delivery,
            price: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Business payload of the order, without identity or lifecycle fields
    pub fn details(&self) -> NewOrder {
        NewOrder {
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            package: self.package.clone(),
            delivery: self.delivery.clone(),
        }
    }

    /// `Pending → Validated`
    ///
    /// The caller is responsible for the compare-and-set against the stored
    /// record; this only enforces the transition rule on the value.
    pub fn mark_validated(&mut self, price: f64, now: DateTime<Utc>) -> NayaResult<()> {
        check_price(price, MIN_ORDER_PRICE)?;
        if !self.is_pending() {
            return Err(crate::core::error::NotFoundError::Order { id: self.id }.into());
        }
        self.status = OrderStatus::Validated;
        self.price = Some(price);
        self.updated_at = now;
        Ok(())
    }

    /// `Pending → Cancelled`
    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> NayaResult<()> {
        if !self.is_pending() {
            return Err(crate::core::error::NotFoundError::Order { id: self.id }.into());
        }
        self.status = OrderStatus::Cancelled;
        self.price = None;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a manager's edit to a pending order
    ///
    /// Returns the fields that actually changed, keyed by dotted path
    /// (`recipient.address`). An empty map means nothing was touched and
    /// `updated_at` is left alone.
    pub fn apply_patch(&mut self, patch: &OrderPatch, now: DateTime<Utc>) -> NayaResult<FieldChanges> {
        if !self.is_pending() {
            return Err(crate::core::error::NotFoundError::Order { id: self.id }.into());
        }

        let mut current = serde_json::to_value(&*self)?;
        let patch_value = serde_json::to_value(patch)?;
        let mut changes = FieldChanges::new();

        if let (Some(current), Some(sections)) = (current.as_object_mut(), patch_value.as_object()) {
            for (section, fields) in sections {
                let (Some(fields), Some(target)) = (
                    fields.as_object(),
                    current.get_mut(section).and_then(Value::as_object_mut),
                ) else {
                    continue;
                };

                for (key, new_value) in fields {
                    let new_value = match new_value {
                        Value::String(s) => Value::String(s.trim().to_string()),
                        other => other.clone(),
                    };
                    let old_value = target.get(key).cloned().unwrap_or(Value::Null);
                    if old_value != new_value {
                        changes.insert(
                            format!("{}.{}", section, key),
                            FieldChange {
                                old: old_value,
                                new: new_value.clone(),
                            },
                        );
                        target.insert(key.clone(), new_value);
                    }
                }
            }
        }

        if changes.is_empty() {
            return Ok(changes);
        }

        let mut updated: Order = serde_json::from_value(current).map_err(|e| {
            NayaError::from(ValidationError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        updated.details().check()?;
        updated.updated_at = now;
        *self = updated;

        Ok(changes)
    }
}

// =============================================================================
// Modification patches
// =============================================================================

/// A manager's partial edit of a pending order
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<PartyPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<PartyPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackagePatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryPatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insured: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Newest-created first; ties broken by code so the order is total
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| (b.code.len(), &b.code).cmp(&(a.code.len(), &a.code)))
    });
}
