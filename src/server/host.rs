//! Server host for transport-agnostic API exposure
//!
//! `ServerHost` holds the state every exposure needs: the triage service,
//! the auth provider, the event bus and the configuration. Exposures take an
//! `Arc<ServerHost>` and produce a router.

use crate::config::NayaConfig;
use crate::core::auth::AuthProvider;
use crate::core::events::EventBus;
use crate::triage::TriageService;
use std::sync::Arc;

/// Host context containing all service state
///
/// # Example
///
/// ```rust,ignore
/// let host = Arc::new(ServerBuilder::new().with_in_memory_stores().build_host()?);
/// let rest_app = RestExposure::build_router(host.clone(), vec![])?;
/// let sse_app = SseExposure::build_router(host)?;
/// ```
pub struct ServerHost {
    pub config: Arc<NayaConfig>,

    /// Orchestrator of the pending / inbox / trash workflow
    pub triage: TriageService,

    /// Resolves request credentials to a session
    pub auth: Arc<dyn AuthProvider>,

    /// Optional event bus for real-time notifications (SSE)
    ///
    /// Shared with `triage`, which publishes to it after every mutation.
    pub event_bus: Option<Arc<EventBus>>,
}

impl ServerHost {
    pub fn new(config: NayaConfig, triage: TriageService, auth: Arc<dyn AuthProvider>) -> Self {
        let event_bus = triage.event_bus().cloned();
        Self {
            config: Arc::new(config),
            triage,
            auth,
            event_bus,
        }
    }

    /// Get a reference to the event bus (if configured)
    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.event_bus.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::NoAuthProvider;
    use crate::storage::{InMemoryInboxStore, InMemoryOrderStore, InMemoryTrashStore};

    fn triage() -> TriageService {
        TriageService::new(
            Arc::new(InMemoryOrderStore::new()),
            Arc::new(InMemoryInboxStore::new()),
            Arc::new(InMemoryTrashStore::new()),
        )
    }

    #[test]
    fn test_event_bus_none_by_default() {
        let host = ServerHost::new(NayaConfig::default_config(), triage(), Arc::new(NoAuthProvider));
        assert!(host.event_bus().is_none());
    }

    #[test]
    fn test_event_bus_taken_from_triage() {
        let bus = Arc::new(EventBus::new(16));
        let host = ServerHost::new(
            NayaConfig::default_config(),
            triage().with_event_bus(bus.clone()),
            Arc::new(NoAuthProvider),
        );
        let host_bus = host.event_bus().unwrap();
        assert!(Arc::ptr_eq(host_bus, &bus));
    }
}
