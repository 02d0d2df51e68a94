//! Core module containing the domain types and store traits of the triage workflow

pub mod auth;
pub mod error;
pub mod events;
pub mod inbox;
pub mod order;
pub mod store;
pub mod trash;

pub use auth::{AuthContext, AuthPolicy, AuthProvider, NoAuthProvider, Role, Session, StaticTokenAuthProvider};
pub use error::{NayaError, NayaResult};
pub use events::{EventBus, EventEnvelope, TriageEvent};
pub use inbox::{FieldChange, FieldChanges, InboxAction, InboxEntry, InboxItemType, NewInboxEntry};
pub use order::{NewOrder, Order, OrderPatch, OrderStatus};
pub use store::{InboxStore, OrderStore, TrashStore};
pub use trash::{TrashEntry, TrashOrigin, TrashSnapshot};
