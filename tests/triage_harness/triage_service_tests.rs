//! Macro-generated test suite for the triage workflow contract.
//!
//! The `triage_service_tests!` macro generates a test module that drives a
//! `TriageService` through order intake, validation, cancellation, edits
//! and the trash lifecycle. Backends plug in through the factory.
//!
//! # Generated Tests
//!
//! ## Orders
//! - `test_submit_assigns_sequential_codes`: CMD-001, CMD-002, ... all pending
//! - `test_list_pending_newest_first`: pending list ordering
//! - `test_validation_scenario`: price below floor refused, then accepted
//! - `test_cancellation_requires_reason`: empty reason refused, then accepted
//! - `test_terminal_orders_cannot_transition`: second validate/cancel → NotFound
//! - `test_unknown_order`: NotFound for absent ids
//! - `test_update_order_records_modification`: changes recorded once
//! - `test_update_non_pending_order_fails`
//!
//! ## Trash
//! - `test_trash_and_restore_order`: full round trip, record unchanged
//! - `test_restore_keeps_terminal_state`
//! - `test_trash_and_restore_inbox_entry`
//! - `test_move_missing_item`: NotFound, trash untouched
//! - `test_purge_one`
//! - `test_empty_trash_is_idempotent`
//! - `test_trash_newest_first`
//!
//! ## Concurrency
//! - `test_concurrent_validation_single_winner`
//! - `test_concurrent_move_to_trash_single_winner`

/// Generate the triage contract test suite.
///
/// `$factory` must be an expression evaluating to a fresh `TriageService`
/// over empty stores. It is re-evaluated for each test.
#[macro_export]
macro_rules! triage_service_tests {
    ($factory:expr) => {
        mod triage_service_contract_tests {
            use super::*;
            use naya::core::error::{NayaError, NotFoundError, ValidationError};
            use naya::core::inbox::{InboxAction, InboxItemType, NewInboxEntry};
            use naya::core::order::{OrderPatch, OrderStatus, PartyPatch};
            use naya::core::trash::{TrashOrigin, TrashSnapshot};
            use std::sync::Arc;
            use uuid::Uuid;

            // ==================================================================
            // Orders
            // ==================================================================

            #[tokio::test]
            async fn test_submit_assigns_sequential_codes() {
                let triage = $factory;

                let mut codes = Vec::new();
                for name in ["Koffi", "Aminata", "Yao"] {
                    let order = triage.submit_order(sample_new_order(name)).await.unwrap();
                    assert_eq!(order.status, OrderStatus::Pending);
                    assert!(order.price.is_none());
                    assert_eq!(order.created_at, order.updated_at);
                    codes.push(order.code);
                }

                assert_eq!(codes, vec!["CMD-001", "CMD-002", "CMD-003"]);
            }

            #[tokio::test]
            async fn test_submit_rejects_incomplete_order() {
                let triage = $factory;

                let mut new_order = sample_new_order("Koffi");
                new_order.recipient.address = "   ".to_string();
                let err = triage.submit_order(new_order).await.unwrap_err();
                assert_eq!(err.error_code(), "VALIDATION_ERROR");

                assert!(triage.list_pending().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_list_pending_newest_first() {
                let triage = $factory;

                for name in ["Koffi", "Aminata", "Yao"] {
                    triage.submit_order(sample_new_order(name)).await.unwrap();
                    tick().await;
                }

                let pending = triage.list_pending().await.unwrap();
                let codes: Vec<&str> = pending.iter().map(|o| o.code.as_str()).collect();
                assert_eq!(codes, vec!["CMD-003", "CMD-002", "CMD-001"]);
            }

            #[tokio::test]
            async fn test_validation_scenario() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();
                assert_eq!(order.code, "CMD-001");

                // Below the floor: nothing changes anywhere
                let err = triage.validate_order(&order.id, 300.0).await.unwrap_err();
                assert!(matches!(
                    err,
                    NayaError::Validation(ValidationError::PriceTooLow { .. })
                ));
                assert!(triage.get_order(&order.id).await.unwrap().is_pending());
                assert!(triage.list_inbox().await.unwrap().is_empty());

                let validated = triage.validate_order(&order.id, 1500.0).await.unwrap();
                assert_eq!(validated.status, OrderStatus::Validated);
                assert_eq!(validated.price, Some(1500.0));
                assert!(triage.list_pending().await.unwrap().is_empty());

                // Still retrievable, only annotated
                let stored = triage.get_order(&order.id).await.unwrap();
                assert_eq!(stored.status, OrderStatus::Validated);

                let inbox = triage.list_inbox().await.unwrap();
                assert_eq!(inbox.len(), 1);
                assert_eq!(inbox[0].item_type, InboxItemType::Order);
                assert_eq!(inbox[0].action, InboxAction::Validation);
                assert_eq!(inbox[0].reference, "CMD-001");
                assert_eq!(inbox[0].client, "Koffi");
                assert_eq!(inbox[0].price, Some(1500.0));
                assert!(inbox[0].details.contains("1500"));
            }

            #[tokio::test]
            async fn test_validation_at_exact_floor() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();

                let validated = triage.validate_order(&order.id, 500.0).await.unwrap();
                assert_eq!(validated.price, Some(500.0));
            }

            #[tokio::test]
            async fn test_cancellation_requires_reason() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();

                for reason in ["", "   "] {
                    let err = triage.cancel_order(&order.id, reason).await.unwrap_err();
                    assert!(matches!(err, NayaError::Validation(ValidationError::MissingReason)));
                }
                assert!(triage.get_order(&order.id).await.unwrap().is_pending());

                let cancelled = triage.cancel_order(&order.id, "Client unreachable").await.unwrap();
                assert_eq!(cancelled.status, OrderStatus::Cancelled);
                assert!(cancelled.price.is_none());

                let inbox = triage.list_inbox().await.unwrap();
                assert_eq!(inbox.len(), 1);
                assert_eq!(inbox[0].action, InboxAction::Cancellation);
                assert_eq!(inbox[0].reference, order.code);
                assert!(inbox[0].details.contains("Client unreachable"));
                assert!(inbox[0].price.is_none());
            }

            #[tokio::test]
            async fn test_terminal_orders_cannot_transition() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();
                triage.validate_order(&order.id, 1500.0).await.unwrap();

                let err = triage.validate_order(&order.id, 2000.0).await.unwrap_err();
                assert!(matches!(err, NayaError::NotFound(NotFoundError::Order { .. })));

                let err = triage.cancel_order(&order.id, "Too late").await.unwrap_err();
                assert!(matches!(err, NayaError::NotFound(NotFoundError::Order { .. })));

                // First price stands, one inbox entry only
                let stored = triage.get_order(&order.id).await.unwrap();
                assert_eq!(stored.price, Some(1500.0));
                assert_eq!(triage.list_inbox().await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_unknown_order() {
                let triage = $factory;
                let id = Uuid::new_v4();

                assert!(matches!(
                    triage.get_order(&id).await.unwrap_err(),
                    NayaError::NotFound(NotFoundError::Order { .. })
                ));
                assert!(matches!(
                    triage.validate_order(&id, 1500.0).await.unwrap_err(),
                    NayaError::NotFound(_)
                ));
                assert!(matches!(
                    triage.cancel_order(&id, "Client unreachable").await.unwrap_err(),
                    NayaError::NotFound(_)
                ));
                assert!(triage.list_inbox().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_update_order_records_modification() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();

                let patch = OrderPatch {
                    recipient: Some(PartyPatch {
                        address: Some("  Plateau, Abidjan ".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                let (updated, changes) = triage.update_order(&order.id, &patch).await.unwrap();

                assert_eq!(updated.recipient.address, "Plateau, Abidjan");
                assert!(updated.is_pending());
                assert!(updated.updated_at >= order.updated_at);
                assert_eq!(changes.len(), 1);
                let change = &changes["recipient.address"];
                assert_eq!(change.old, serde_json::json!("Yopougon, Abidjan"));
                assert_eq!(change.new, serde_json::json!("Plateau, Abidjan"));

                let inbox = triage.list_inbox().await.unwrap();
                assert_eq!(inbox.len(), 1);
                assert_eq!(inbox[0].action, InboxAction::Modification);
                assert!(inbox[0].changes.contains_key("recipient.address"));

                // Same patch again changes nothing and records nothing
                let (_, changes) = triage.update_order(&order.id, &patch).await.unwrap();
                assert!(changes.is_empty());
                assert_eq!(triage.list_inbox().await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_update_non_pending_order_fails() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();
                triage.cancel_order(&order.id, "Client unreachable").await.unwrap();

                let patch = OrderPatch {
                    sender: Some(PartyPatch {
                        phone: Some("2250700000000".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                };
                let err = triage.update_order(&order.id, &patch).await.unwrap_err();
                assert!(matches!(err, NayaError::NotFound(_)));
            }

            // ==================================================================
            // Trash
            // ==================================================================

            #[tokio::test]
            async fn test_trash_and_restore_order() {
                let triage = $factory;
                let mut orders = Vec::new();
                for name in ["Koffi", "Aminata", "Yao"] {
                    orders.push(triage.submit_order(sample_new_order(name)).await.unwrap());
                    tick().await;
                }
                let third = orders[2].clone();

                let entry = triage.move_to_trash(&third.id, TrashOrigin::Order).await.unwrap();
                assert_eq!(entry.origin, TrashOrigin::Order);
                assert_eq!(entry.item_id, third.id);
                assert!(matches!(&entry.snapshot, TrashSnapshot::Order(o) if o == &third));

                // Visible in trash, gone from its origin
                assert_eq!(triage.list_pending().await.unwrap().len(), 2);
                assert!(triage.get_order(&third.id).await.is_err());
                let trash = triage.list_trash().await.unwrap();
                assert_eq!(trash.len(), 1);
                assert_eq!(trash[0].id, entry.id);

                let restored = triage.restore_from_trash(&entry.id).await.unwrap();
                assert_eq!(restored.id, entry.id);
                assert!(triage.list_trash().await.unwrap().is_empty());

                let back = triage.get_order(&third.id).await.unwrap();
                assert_eq!(back, third);
                assert_eq!(triage.list_pending().await.unwrap()[0].code, "CMD-003");
            }

            #[tokio::test]
            async fn test_restore_keeps_terminal_state() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();
                triage.validate_order(&order.id, 2500.0).await.unwrap();

                let entry = triage.move_to_trash(&order.id, TrashOrigin::Order).await.unwrap();
                triage.restore_from_trash(&entry.id).await.unwrap();

                let back = triage.get_order(&order.id).await.unwrap();
                assert_eq!(back.status, OrderStatus::Validated);
                assert_eq!(back.price, Some(2500.0));
                assert!(triage.list_pending().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_trash_and_restore_inbox_entry() {
                let triage = $factory;
                let appended = triage
                    .append_inbox(NewInboxEntry {
                        item_type: InboxItemType::Order,
                        action: InboxAction::Validation,
                        reference: "CMD-042".to_string(),
                        client: "Koffi".to_string(),
                        details: "Validated from the field".to_string(),
                        price: Some(1200.0),
                        changes: Default::default(),
                    })
                    .await
                    .unwrap();

                let entry = triage.move_to_trash(&appended.id, TrashOrigin::Inbox).await.unwrap();
                assert_eq!(entry.origin, TrashOrigin::Inbox);
                assert!(triage.list_inbox().await.unwrap().is_empty());

                triage.restore_from_trash(&entry.id).await.unwrap();
                let inbox = triage.list_inbox().await.unwrap();
                assert_eq!(inbox, vec![appended]);
            }

            #[tokio::test]
            async fn test_move_missing_item() {
                let triage = $factory;

                let err = triage
                    .move_to_trash(&Uuid::new_v4(), TrashOrigin::Order)
                    .await
                    .unwrap_err();
                assert!(matches!(err, NayaError::NotFound(NotFoundError::Order { .. })));

                let err = triage
                    .move_to_trash(&Uuid::new_v4(), TrashOrigin::Inbox)
                    .await
                    .unwrap_err();
                assert!(matches!(err, NayaError::NotFound(NotFoundError::InboxEntry { .. })));

                assert!(triage.list_trash().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_restore_unknown_entry() {
                let triage = $factory;
                let err = triage.restore_from_trash(&Uuid::new_v4()).await.unwrap_err();
                assert!(matches!(err, NayaError::NotFound(NotFoundError::TrashEntry { .. })));
            }

            #[tokio::test]
            async fn test_purge_one() {
                let triage = $factory;
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();
                let entry = triage.move_to_trash(&order.id, TrashOrigin::Order).await.unwrap();

                let purged = triage.purge_trash_item(&entry.id).await.unwrap();
                assert_eq!(purged.id, entry.id);
                assert!(triage.list_trash().await.unwrap().is_empty());

                // Gone for good
                assert!(triage.purge_trash_item(&entry.id).await.is_err());
                assert!(triage.restore_from_trash(&entry.id).await.is_err());
                assert!(triage.get_order(&order.id).await.is_err());
            }

            #[tokio::test]
            async fn test_empty_trash_is_idempotent() {
                let triage = $factory;
                for name in ["Koffi", "Aminata"] {
                    let order = triage.submit_order(sample_new_order(name)).await.unwrap();
                    triage.move_to_trash(&order.id, TrashOrigin::Order).await.unwrap();
                }

                assert_eq!(triage.empty_trash().await.unwrap(), 2);
                assert!(triage.list_trash().await.unwrap().is_empty());
                assert_eq!(triage.empty_trash().await.unwrap(), 0);
            }

            #[tokio::test]
            async fn test_trash_newest_first() {
                let triage = $factory;
                let mut trash_ids = Vec::new();
                for name in ["Koffi", "Aminata", "Yao"] {
                    let order = triage.submit_order(sample_new_order(name)).await.unwrap();
                    let entry = triage.move_to_trash(&order.id, TrashOrigin::Order).await.unwrap();
                    trash_ids.push(entry.id);
                    tick().await;
                }
                trash_ids.reverse();

                let listed: Vec<Uuid> = triage.list_trash().await.unwrap().iter().map(|e| e.id).collect();
                assert_eq!(listed, trash_ids);
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            #[tokio::test]
            async fn test_concurrent_validation_single_winner() {
                let triage = Arc::new($factory);
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();

                let mut handles = Vec::new();
                for i in 0..8u32 {
                    let triage = triage.clone();
                    let id = order.id;
                    handles.push(tokio::spawn(async move {
                        triage.validate_order(&id, 1000.0 + f64::from(i) * 100.0).await
                    }));
                }

                let mut winners = Vec::new();
                for handle in handles {
                    match handle.await.unwrap() {
                        Ok(order) => winners.push(order),
                        Err(e) => assert!(matches!(e, NayaError::NotFound(_)), "unexpected error: {e}"),
                    }
                }

                assert_eq!(winners.len(), 1);
                let stored = triage.get_order(&order.id).await.unwrap();
                assert_eq!(stored.price, winners[0].price);

                let inbox = triage.list_inbox().await.unwrap();
                assert_eq!(inbox.len(), 1);
                assert_eq!(inbox[0].price, winners[0].price);
            }

            #[tokio::test]
            async fn test_concurrent_move_to_trash_single_winner() {
                let triage = Arc::new($factory);
                let order = triage.submit_order(sample_new_order("Koffi")).await.unwrap();

                let mut handles = Vec::new();
                for _ in 0..4 {
                    let triage = triage.clone();
                    let id = order.id;
                    handles.push(tokio::spawn(async move {
                        triage.move_to_trash(&id, TrashOrigin::Order).await
                    }));
                }

                let mut successes = 0;
                for handle in handles {
                    if handle.await.unwrap().is_ok() {
                        successes += 1;
                    }
                }

                assert_eq!(successes, 1);
                assert_eq!(triage.list_trash().await.unwrap().len(), 1);
                assert!(triage.get_order(&order.id).await.is_err());
            }
        }
    };
}
