//! HTTP handlers for the triage API
//!
//! Handlers only translate between HTTP and [`TriageService`]: extract,
//! call, serialize. Each triage call runs inside a span carrying the actor.
//!
//! [`TriageService`]: crate::triage::TriageService

use crate::core::auth::Session;
use crate::core::error::NayaResult;
use crate::core::inbox::{InboxEntry, NewInboxEntry};
use crate::core::order::{NewOrder, Order, OrderPatch};
use crate::core::trash::{TrashEntry, TrashOrigin};
use crate::server::extractors::{JsonBody, ManagerSession, OptionalSession, parse_id};
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

fn actor_span(session: &Session) -> tracing::Span {
    tracing::info_span!("triage", actor = %session.user_id, role = %session.role)
}

/// Request body for `PATCH /orders/{id}/validate`
#[derive(Debug, Deserialize)]
pub struct ValidateOrderRequest {
    pub price: f64,
}

/// Request body for `PATCH /orders/{id}/cancel`
#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for `POST /move-to-trash`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToTrashRequest {
    pub item_id: Uuid,
    pub item_type: TrashOrigin,
}

/// Response of `DELETE /trash`
#[derive(Debug, Serialize, Deserialize)]
pub struct EmptyTrashResponse {
    pub deleted: usize,
}

// =============================================================================
// Orders
// =============================================================================

/// POST /orders - public order intake
pub async fn submit_order(
    State(host): State<Arc<ServerHost>>,
    OptionalSession(session): OptionalSession,
    JsonBody(new_order): JsonBody<NewOrder>,
) -> NayaResult<(StatusCode, Json<Order>)> {
    let span = match &session {
        Some(session) => actor_span(session),
        None => tracing::info_span!("intake", actor = "guest"),
    };
    let order = host.triage.submit_order(new_order).instrument(span).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/pending
pub async fn list_pending(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(_session): ManagerSession,
) -> NayaResult<Json<Vec<Order>>> {
    Ok(Json(host.triage.list_pending().await?))
}

/// GET /orders/{id}
pub async fn get_order(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(_session): ManagerSession,
    Path(id): Path<String>,
) -> NayaResult<Json<Order>> {
    let id = parse_id(&id)?;
    Ok(Json(host.triage.get_order(&id).await?))
}

/// PATCH /orders/{id}
pub async fn update_order(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<OrderPatch>,
) -> NayaResult<Json<Order>> {
    let id = parse_id(&id)?;
    let (order, _changes) = host
        .triage
        .update_order(&id, &patch)
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/{id}/validate
pub async fn validate_order(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<ValidateOrderRequest>,
) -> NayaResult<Json<Order>> {
    let id = parse_id(&id)?;
    let order = host
        .triage
        .validate_order(&id, body.price)
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(order))
}

/// PATCH /orders/{id}/cancel
pub async fn cancel_order(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<CancelOrderRequest>,
) -> NayaResult<Json<Order>> {
    let id = parse_id(&id)?;
    let reason = body.reason.unwrap_or_default();
    let order = host
        .triage
        .cancel_order(&id, &reason)
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(order))
}

// =============================================================================
// Inbox
// =============================================================================

/// GET /inbox
pub async fn list_inbox(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(_session): ManagerSession,
) -> NayaResult<Json<Vec<InboxEntry>>> {
    Ok(Json(host.triage.list_inbox().await?))
}

/// POST /inbox
pub async fn append_inbox(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    JsonBody(new_entry): JsonBody<NewInboxEntry>,
) -> NayaResult<(StatusCode, Json<InboxEntry>)> {
    let entry = host
        .triage
        .append_inbox(new_entry)
        .instrument(actor_span(&session))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// =============================================================================
// Trash
// =============================================================================

/// GET /trash
pub async fn list_trash(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(_session): ManagerSession,
) -> NayaResult<Json<Vec<TrashEntry>>> {
    Ok(Json(host.triage.list_trash().await?))
}

/// POST /move-to-trash
pub async fn move_to_trash(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    JsonBody(body): JsonBody<MoveToTrashRequest>,
) -> NayaResult<Json<TrashEntry>> {
    let entry = host
        .triage
        .move_to_trash(&body.item_id, body.item_type)
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(entry))
}

/// PATCH /trash/{id}/restore
pub async fn restore_from_trash(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    Path(id): Path<String>,
) -> NayaResult<Json<TrashEntry>> {
    let id = parse_id(&id)?;
    let entry = host
        .triage
        .restore_from_trash(&id)
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(entry))
}

/// DELETE /trash/{id}
pub async fn purge_trash_item(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
    Path(id): Path<String>,
) -> NayaResult<Json<TrashEntry>> {
    let id = parse_id(&id)?;
    let entry = host
        .triage
        .purge_trash_item(&id)
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(entry))
}

/// DELETE /trash
pub async fn empty_trash(
    State(host): State<Arc<ServerHost>>,
    ManagerSession(session): ManagerSession,
) -> NayaResult<Json<EmptyTrashResponse>> {
    let deleted = host
        .triage
        .empty_trash()
        .instrument(actor_span(&session))
        .await?;
    Ok(Json(EmptyTrashResponse { deleted }))
}
