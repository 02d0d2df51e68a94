//! Shared test harness for the triage workflow
//!
//! Provides sample orders and the `triage_service_tests!` macro, which runs
//! the full triage contract against whatever stores back a `TriageService`.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod triage_harness;
//! use triage_harness::*;
//!
//! triage_service_tests!(in_memory_service());
//! ```

#![allow(dead_code)]

use naya::core::order::{DeliveryWindow, NewOrder, Package, Party};

pub mod triage_service_tests;

/// A valid order submitted by `sender_name`
pub fn sample_new_order(sender_name: &str) -> NewOrder {
    NewOrder {
        sender: Party {
            name: sender_name.to_string(),
            phone: "2250701020304".to_string(),
            address: "Cocody, Abidjan".to_string(),
        },
        recipient: Party {
            name: "Awa Koné".to_string(),
            phone: "2250505060708".to_string(),
            address: "Yopougon, Abidjan".to_string(),
        },
        package: Package {
            description: "Documents".to_string(),
            kind: "envelope".to_string(),
            count: 1,
            weight: 0.5,
            dimensions: "30x20x2".to_string(),
            declared_value: 10000.0,
            insured: false,
        },
        delivery: DeliveryWindow {
            date: None,
            time_slot: "09:00-12:00".to_string(),
            instructions: "Call before arrival".to_string(),
        },
    }
}

/// The same order as JSON, the way the client app posts it
pub fn sample_order_json(sender_name: &str) -> serde_json::Value {
    serde_json::json!({
        "sender": {
            "name": sender_name,
            "phone": "2250701020304",
            "address": "Cocody, Abidjan"
        },
        "recipient": {
            "name": "Awa Koné",
            "phone": "2250505060708",
            "address": "Yopougon, Abidjan"
        },
        "package": {
            "description": "Documents",
            "type": "envelope",
            "count": 1,
            "weight": 0.5
        },
        "delivery": {
            "time_slot": "09:00-12:00"
        }
    })
}

/// Sleep long enough for two store timestamps to differ
pub async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}
