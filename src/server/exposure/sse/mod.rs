//! Server-Sent Events exposure for dashboard refresh
//!
//! # Architecture
//!
//! ```text
//! TriageService ──▶ EventBus ──broadcast──▶ GET /events ──SSE──▶ dashboard
//! ```
//!
//! Each SSE message carries the event name in `event:`, the bus sequence
//! number in `id:` and the JSON envelope in `data:`. A subscriber that falls
//! more than the bus capacity behind receives a `lagged` message with the
//! number of skipped events and should re-fetch its lists.

use crate::core::error::NayaResult;
use crate::server::extractors::ManagerSession;
use crate::server::host::ServerHost;
use anyhow::Result;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{Router, routing::get};
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// SSE exposure implementation
///
/// Without an `EventBus` on the host the router is empty and `/events` is
/// not served.
pub struct SseExposure;

impl SseExposure {
    pub fn build_router(host: Arc<ServerHost>) -> Result<Router> {
        if host.event_bus().is_none() {
            tracing::warn!("SseExposure: no EventBus configured on ServerHost, /events is disabled");
            return Ok(Router::new());
        }

        Ok(Router::new()
            .route("/events", get(Self::events))
            .with_state(host))
    }

    /// GET /events
    async fn events(
        State(host): State<Arc<ServerHost>>,
        ManagerSession(session): ManagerSession,
    ) -> NayaResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
        let bus = host
            .event_bus()
            .ok_or_else(|| crate::core::error::NayaError::Internal("event bus disabled".to_string()))?;

        tracing::debug!(actor = %session.user_id, last_seq = bus.last_seq(), "event stream opened");

        let stream = BroadcastStream::new(bus.subscribe()).filter_map(|received| match received {
            Ok(envelope) => Event::default()
                .event(envelope.event.name())
                .id(envelope.seq.to_string())
                .json_data(&envelope)
                .ok()
                .map(Ok),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream subscriber lagged");
                Some(Ok(Event::default().event("lagged").data(skipped.to_string())))
            }
        });

        Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
    }
}
