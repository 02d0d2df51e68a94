//! # NAYA triage
//!
//! Backend of the manager triage workflow of the NAYA last-mile delivery
//! platform: customers submit delivery orders, managers price or cancel
//! them, and every notable action lands in an inbox. Orders and inbox
//! entries can be soft-deleted to a trash, restored or purged.
//!
//! ## Features
//!
//! - **Three stores**: orders, inbox and trash behind async traits, with
//!   in-memory and MongoDB backends
//! - **Compare-and-set transitions**: two managers validating the same order
//!   cannot both win
//! - **Safe write ordering**: moving to trash never loses an item, restore is
//!   retriable
//! - **Event stream**: sequence-numbered events over SSE for dashboards
//! - **Typed errors**: every failure maps to a status code and a stable
//!   machine code
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use naya::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     ServerBuilder::new()
//!         .with_in_memory_stores()
//!         .with_event_bus(1024)
//!         .serve()
//!         .await
//! }
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod triage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AuthContext, AuthPolicy, AuthProvider, NoAuthProvider, Role, Session, StaticTokenAuthProvider},
        error::{NayaError, NayaResult, NotFoundError, ValidationError},
        events::{EventBus, EventEnvelope, TriageEvent},
        inbox::{FieldChange, FieldChanges, InboxAction, InboxEntry, InboxItemType, NewInboxEntry},
        order::{NewOrder, Order, OrderPatch, OrderStatus},
        store::{InboxStore, OrderStore, TrashStore},
        trash::{TrashEntry, TrashOrigin, TrashSnapshot},
    };

    // === Triage ===
    pub use crate::triage::TriageService;

    // === Storage ===
    pub use crate::storage::{InMemoryInboxStore, InMemoryOrderStore, InMemoryTrashStore};
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::{MongoInboxStore, MongoOrderStore, MongoTrashStore};

    // === Config ===
    pub use crate::config::{NayaConfig, StorageConfig};

    // === Server ===
    pub use crate::server::{RestExposure, ServerBuilder, ServerHost, SseExposure};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
