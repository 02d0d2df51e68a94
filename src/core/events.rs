//! Triage event bus for real-time dashboards
//!
//! Every successful mutating triage operation publishes one [`TriageEvent`]
//! after its store writes. Publishing never fails and never blocks the
//! mutation; subscribers that fall behind see a `Lagged` error and can
//! re-fetch.
//!
//! # Architecture
//!
//! ```text
//! TriageService ──▶ EventBus::publish() ──▶ broadcast channel ──▶ SSE subscribers (GET /events)
//! ```
//!
//! Each envelope carries a strictly increasing sequence number. A dashboard
//! remembers the last `seq` it saw and counts newer events as unread,
//! instead of comparing list lengths between polls.

use crate::core::inbox::InboxAction;
use crate::core::trash::TrashOrigin;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Something that happened in the triage workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriageEvent {
    /// A customer submitted an order
    OrderCreated { order_id: Uuid, code: String },

    OrderValidated {
        order_id: Uuid,
        code: String,
        price: f64,
    },

    OrderCancelled {
        order_id: Uuid,
        code: String,
        reason: String,
    },

    OrderModified {
        order_id: Uuid,
        code: String,
        fields: Vec<String>,
    },

    /// An entry was appended to the inbox
    InboxAppended {
        entry_id: Uuid,
        action: InboxAction,
        reference: String,
    },

    MovedToTrash {
        trash_id: Uuid,
        item_id: Uuid,
        origin: TrashOrigin,
    },

    Restored {
        trash_id: Uuid,
        item_id: Uuid,
        origin: TrashOrigin,
    },

    /// Trash entries were permanently deleted
    TrashPurged { trash_ids: Vec<Uuid> },

    TrashEmptied { count: usize },
}

impl TriageEvent {
    /// Event name, used as the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            TriageEvent::OrderCreated { .. } => "order_created",
            TriageEvent::OrderValidated { .. } => "order_validated",
            TriageEvent::OrderCancelled { .. } => "order_cancelled",
            TriageEvent::OrderModified { .. } => "order_modified",
            TriageEvent::InboxAppended { .. } => "inbox_appended",
            TriageEvent::MovedToTrash { .. } => "moved_to_trash",
            TriageEvent::Restored { .. } => "restored",
            TriageEvent::TrashPurged { .. } => "trash_purged",
            TriageEvent::TrashEmptied { .. } => "trash_emptied",
        }
    }

    /// Which dashboard view the event affects
    pub fn view(&self) -> &'static str {
        match self {
            TriageEvent::OrderCreated { .. }
            | TriageEvent::OrderValidated { .. }
            | TriageEvent::OrderCancelled { .. }
            | TriageEvent::OrderModified { .. } => "pending",
            TriageEvent::InboxAppended { .. } => "inbox",
            TriageEvent::MovedToTrash { .. }
            | TriageEvent::Restored { .. }
            | TriageEvent::TrashPurged { .. }
            | TriageEvent::TrashEmptied { .. } => "trash",
        }
    }
}

/// Envelope wrapping an event with ordering metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Strictly increasing per bus, starting at 1
    pub seq: u64,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    pub event: TriageEvent,
}

/// Broadcast-based event bus
///
/// Cheap to clone; clones share the channel and the sequence counter.
/// Numbering and sending happen under one lock, so subscribers see `seq`
/// in increasing order even with concurrent publishers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    seq: Arc<Mutex<u64>>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per slow receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            seq: Arc::new(Mutex::new(0)),
        }
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the sequence number assigned to the event. With no
    /// subscribers the event is dropped, but the number is still consumed.
    pub fn publish(&self, event: TriageEvent) -> u64 {
        // A counter is still valid after a panicking publisher
        let mut last = self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *last += 1;
        let envelope = EventEnvelope {
            seq: *last,
            timestamp: Utc::now(),
            event,
        };
        // send() only fails when nobody is listening
        let _ = self.sender.send(envelope);
        *last
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Sequence number of the last published event (0 if none)
    pub fn last_seq(&self) -> u64 {
        *self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(code: &str) -> TriageEvent {
        TriageEvent::OrderCreated {
            order_id: Uuid::new_v4(),
            code: code.to_string(),
        }
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = TriageEvent::OrderValidated {
            order_id: Uuid::nil(),
            code: "CMD-001".to_string(),
            price: 1500.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "order_validated");
        assert_eq!(json["price"], 1500.0);
        assert_eq!(event.name(), "order_validated");
        assert_eq!(event.view(), "pending");
    }

    #[test]
    fn test_publish_without_subscribers_still_numbers_events() {
        let bus = EventBus::new(8);
        assert_eq!(bus.publish(created("CMD-001")), 1);
        assert_eq!(bus.publish(created("CMD-002")), 2);
        assert_eq!(bus.last_seq(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_sequence() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(created("CMD-001"));
        bus.publish(TriageEvent::TrashEmptied { count: 2 });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(second.event, TriageEvent::TrashEmptied { count: 2 });
    }

    #[tokio::test]
    async fn test_clones_share_sequence() {
        let bus = EventBus::new(8);
        let clone = bus.clone();
        let mut rx = bus.subscribe();

        bus.publish(created("CMD-001"));
        clone.publish(created("CMD-002"));

        assert_eq!(rx.recv().await.unwrap().seq, 1);
        assert_eq!(rx.recv().await.unwrap().seq, 2);
        assert_eq!(bus.receiver_count(), 1);
    }

    #[test]
    fn test_concurrent_publishers_deliver_in_order() {
        let bus = EventBus::new(1024);
        let mut rx = bus.subscribe();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        bus.publish(created(&format!("T{}-{:03}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut previous = 0;
        while let Ok(envelope) = rx.try_recv() {
            assert_eq!(envelope.seq, previous + 1);
            previous = envelope.seq;
        }
        assert_eq!(previous, 400);
        assert_eq!(bus.last_seq(), 400);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.publish(created(&format!("CMD-{:03}", i)));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
