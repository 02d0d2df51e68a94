//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::{RestExposure, SseExposure};
use super::host::ServerHost;
use crate::config::{AuthMode, NayaConfig, StorageConfig};
use crate::core::auth::{AuthProvider, NoAuthProvider};
use crate::core::events::EventBus;
use crate::core::store::{InboxStore, OrderStore, TrashStore};
use crate::storage::{InMemoryInboxStore, InMemoryOrderStore, InMemoryTrashStore};
use crate::triage::TriageService;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for the triage HTTP server
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_in_memory_stores()
///     .with_event_bus(1024)
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: NayaConfig,
    orders: Option<Arc<dyn OrderStore>>,
    inbox: Option<Arc<dyn InboxStore>>,
    trash: Option<Arc<dyn TrashStore>>,
    auth: Option<Arc<dyn AuthProvider>>,
    custom_routes: Vec<Router>,
    event_bus: Option<EventBus>,
    in_memory: bool,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with the development configuration
    pub fn new() -> Self {
        Self {
            config: NayaConfig::default_config(),
            orders: None,
            inbox: None,
            trash: None,
            auth: None,
            custom_routes: Vec::new(),
            event_bus: None,
            in_memory: false,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: NayaConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder wired from a configuration: storage backend, auth and event bus
    pub async fn from_config(config: NayaConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.server.event_capacity;
        let storage = config.storage.clone();
        let builder = Self::new().with_config(config).with_event_bus(capacity);

        match storage {
            StorageConfig::InMemory => {
                tracing::info!("using in-memory storage");
                Ok(builder.with_in_memory_stores())
            }
            StorageConfig::Mongodb { uri, database } => builder.with_mongodb(&uri, &database).await,
        }
    }

    #[cfg(feature = "mongodb_backend")]
    async fn with_mongodb(self, uri: &str, database: &str) -> Result<Self> {
        use crate::storage::{MongoInboxStore, MongoOrderStore, MongoTrashStore};

        let client = mongodb::Client::with_uri_str(uri).await?;
        let db = client.database(database);
        let orders = MongoOrderStore::with_code_prefix(db.clone(), self.config.orders.code_prefix.clone());
        orders.ensure_indexes().await?;

        tracing::info!(database, "using MongoDB storage");
        Ok(self
            .with_order_store(orders)
            .with_inbox_store(MongoInboxStore::new(db.clone()))
            .with_trash_store(MongoTrashStore::new(db)))
    }

    #[cfg(not(feature = "mongodb_backend"))]
    async fn with_mongodb(self, _uri: &str, _database: &str) -> Result<Self> {
        anyhow::bail!("storage backend 'mongodb' requires the 'mongodb_backend' feature")
    }

    pub fn with_order_store(mut self, store: impl OrderStore + 'static) -> Self {
        self.orders = Some(Arc::new(store));
        self
    }

    pub fn with_inbox_store(mut self, store: impl InboxStore + 'static) -> Self {
        self.inbox = Some(Arc::new(store));
        self
    }

    pub fn with_trash_store(mut self, store: impl TrashStore + 'static) -> Self {
        self.trash = Some(Arc::new(store));
        self
    }

    /// Use fresh in-memory stores for any store not set explicitly
    ///
    /// The stores are created by `build_host()` with the final configuration.
    pub fn with_in_memory_stores(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Set the auth provider
    ///
    /// Without one, the provider follows `auth.mode` in the configuration.
    pub fn with_auth_provider(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(provider));
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for routes outside the triage workflow, such as login
    /// endpoints or webhooks.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Enable the event bus for real-time notifications
    ///
    /// The triage service publishes after every mutation and `/events`
    /// streams to subscribers.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Buffer size for the broadcast channel (recommended: 1024)
    pub fn with_event_bus(mut self, capacity: usize) -> Self {
        self.event_bus = Some(EventBus::new(capacity));
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(mut self) -> Result<ServerHost> {
        self.config.validate()?;

        if self.in_memory {
            let prefix = self.config.orders.code_prefix.clone();
            if self.orders.is_none() {
                self = self.with_order_store(InMemoryOrderStore::with_code_prefix(prefix));
            }
            if self.inbox.is_none() {
                self = self.with_inbox_store(InMemoryInboxStore::new());
            }
            if self.trash.is_none() {
                self = self.with_trash_store(InMemoryTrashStore::new());
            }
        }

        let orders = self
            .orders
            .take()
            .ok_or_else(|| anyhow::anyhow!("OrderStore is required. Call .with_order_store() or .with_in_memory_stores()"))?;
        let inbox = self
            .inbox
            .take()
            .ok_or_else(|| anyhow::anyhow!("InboxStore is required. Call .with_inbox_store() or .with_in_memory_stores()"))?;
        let trash = self
            .trash
            .take()
            .ok_or_else(|| anyhow::anyhow!("TrashStore is required. Call .with_trash_store() or .with_in_memory_stores()"))?;

        let auth = match self.auth.take() {
            Some(auth) => auth,
            None => Self::auth_from_config(&self.config),
        };

        let mut triage = TriageService::new(orders, inbox, trash).with_min_price(self.config.pricing.min_price);
        if let Some(event_bus) = self.event_bus.take() {
            triage = triage.with_event_bus(Arc::new(event_bus));
        }

        Ok(ServerHost::new(self.config, triage, auth))
    }

    fn auth_from_config(config: &NayaConfig) -> Arc<dyn AuthProvider> {
        match config.auth.mode {
            AuthMode::None => {
                tracing::warn!("authentication disabled: every request runs as an admin");
                Arc::new(NoAuthProvider)
            }
            AuthMode::Tokens => {
                let provider = config.auth.token_provider();
                tracing::info!(tokens = provider.len(), "static token authentication enabled");
                Arc::new(provider)
            }
        }
    }

    /// Build the final router: REST routes plus the event stream
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        let rest_router = RestExposure::build_router(host.clone(), custom_routes)?;
        let sse_router = SseExposure::build_router(host)?;
        Ok(rest_router.merge(sse_router))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds `server.bind` from the configuration and stops on SIGTERM or
    /// Ctrl+C.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.bind.clone();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
