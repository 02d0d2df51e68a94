//! Server module for building the triage HTTP server
//!
//! This module provides a `ServerBuilder` that wires:
//! - the three stores and the triage service
//! - authentication
//! - the REST routes and the SSE event stream

pub mod builder;
pub mod exposure;
pub mod extractors;
pub mod handlers;
pub mod host;
pub mod router;

pub use builder::ServerBuilder;
pub use exposure::{RestExposure, SseExposure};
pub use host::ServerHost;
