//! Route table of the triage API

use crate::server::handlers::{
    append_inbox, cancel_order, empty_trash, get_order, list_inbox, list_pending, list_trash,
    move_to_trash, purge_trash_item, restore_from_trash, submit_order, update_order, validate_order,
};
use crate::server::host::ServerHost;
use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;

/// Build the triage routes
///
/// - POST   /orders                 - submit an order (guests allowed)
/// - GET    /orders/pending         - pending orders, newest first
/// - GET    /orders/{id}            - one order
/// - PATCH  /orders/{id}            - edit a pending order
/// - PATCH  /orders/{id}/validate   - price and validate
/// - PATCH  /orders/{id}/cancel     - cancel with a reason
/// - GET    /inbox, POST /inbox     - list / append inbox entries
/// - GET    /trash, DELETE /trash   - list / empty the trash
/// - DELETE /trash/{id}             - purge one trash entry
/// - PATCH  /trash/{id}/restore     - restore a trash entry
/// - POST   /move-to-trash          - soft-delete an order or inbox entry
pub fn build_triage_routes(host: Arc<ServerHost>) -> Router {
    Router::new()
        .route("/orders", post(submit_order))
        .route("/orders/pending", get(list_pending))
        .route("/orders/{id}", get(get_order).patch(update_order))
        .route("/orders/{id}/validate", patch(validate_order))
        .route("/orders/{id}/cancel", patch(cancel_order))
        .route("/inbox", get(list_inbox).post(append_inbox))
        .route("/trash", get(list_trash).delete(empty_trash))
        .route("/trash/{id}", delete(purge_trash_item))
        .route("/trash/{id}/restore", patch(restore_from_trash))
        .route("/move-to-trash", post(move_to_trash))
        .with_state(host)
}
