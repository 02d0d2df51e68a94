//! REST API exposure for the triage service
//!
//! The REST exposure consumes a `ServerHost` and produces an Axum `Router`
//! with health checks, the triage routes and any custom routes, wrapped in
//! request tracing and CORS.

use super::super::host::ServerHost;
use crate::server::router::build_triage_routes;
use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// REST API exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    ///
    /// Returns a router with:
    /// - Health check routes
    /// - Triage routes
    /// - Custom routes
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let cors = Self::cors_layer(&host.config.server.cors_origins)?;

        let mut app = Self::health_routes().merge(build_triage_routes(host));

        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app.layer(cors).layer(TraceLayer::new_for_http()))
    }

    /// CORS for the dashboard; no configured origin means any origin
    fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
        let methods = [Method::GET, Method::POST, Method::PATCH, Method::DELETE];
        let layer = CorsLayer::new().allow_methods(methods).allow_headers(Any);

        if origins.is_empty() {
            return Ok(layer.allow_origin(Any));
        }

        let origins = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{}'", origin))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(layer.allow_origin(AllowOrigin::list(origins)))
    }

    /// Build health check routes
    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    /// Health check endpoint handler
    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "naya-triage"
        }))
    }
}
