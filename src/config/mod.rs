//! Configuration loading and management
//!
//! ```yaml
//! server:
//!   bind: "0.0.0.0:5000"
//!   event_capacity: 1024
//!   cors_origins: ["https://naya.example"]
//! pricing:
//!   min_price: 500
//! orders:
//!   code_prefix: CMD
//! storage:
//!   backend: mongodb
//!   uri: "mongodb://localhost:27017"
//!   database: naya
//! auth:
//!   mode: tokens
//!   tokens:
//!     - token: "s3cret"
//!       user_id: "u-1"
//!       name: "Aïcha"
//!       role: manager
//! ```

use crate::core::auth::{Role, Session, StaticTokenAuthProvider};
use crate::core::error::{ConfigError, NayaResult};
use crate::core::order::{DEFAULT_CODE_PREFIX, MIN_ORDER_PRICE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGODB_DATABASE: &str = "naya";

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,

    /// Events buffered per SSE subscriber before it starts lagging
    pub event_capacity: usize,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            event_capacity: 1024,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Price floor for validation, in FCFA; never below 500
    pub min_price: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_price: MIN_ORDER_PRICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    /// Prefix of the human-facing order code (`CMD` → `CMD-001`)
    pub code_prefix: String,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            code_prefix: DEFAULT_CODE_PREFIX.to_string(),
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    InMemory,
    Mongodb {
        #[serde(default = "default_mongodb_uri")]
        uri: String,
        #[serde(default = "default_mongodb_database")]
        database: String,
    },
}

fn default_mongodb_uri() -> String {
    DEFAULT_MONGODB_URI.to_string()
}

fn default_mongodb_database() -> String {
    DEFAULT_MONGODB_DATABASE.to_string()
}

impl StorageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StorageConfig::InMemory => "in_memory",
            StorageConfig::Mongodb { .. } => "mongodb",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Development only: every request is an admin
    None,
    #[default]
    Tokens,
}

/// One static bearer token and the session it opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub tokens: Vec<TokenConfig>,
}

impl AuthConfig {
    pub fn token_provider(&self) -> StaticTokenAuthProvider {
        self.tokens.iter().fold(StaticTokenAuthProvider::new(), |provider, t| {
            provider.with_token(t.token.clone(), Session::new(t.user_id.clone(), t.name.clone(), t.role))
        })
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NayaConfig {
    pub server: ServerConfig,
    pub pricing: PricingConfig,
    pub orders: OrdersConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

impl NayaConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> NayaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path.display(), e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                file: Some(path.display().to_string()),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> NayaResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Create a development configuration: in-memory storage, no auth
    pub fn default_config() -> Self {
        Self {
            auth: AuthConfig {
                mode: AuthMode::None,
                tokens: Vec::new(),
            },
            ..Self::default()
        }
    }

    /// Overlay `NAYA_*` environment variables
    pub fn apply_env(self) -> NayaResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup
    ///
    /// Recognised keys: `NAYA_BIND`, `NAYA_STORAGE`, `NAYA_MONGODB_URI`,
    /// `NAYA_MONGODB_DATABASE`, `NAYA_MIN_PRICE`.
    pub fn apply_env_from<F>(mut self, lookup: F) -> NayaResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("NAYA_BIND") {
            self.server.bind = bind;
        }

        if let Some(backend) = lookup("NAYA_STORAGE") {
            self.storage = match (backend.as_str(), self.storage) {
                ("in_memory" | "memory", _) => StorageConfig::InMemory,
                ("mongodb" | "mongo", current @ StorageConfig::Mongodb { .. }) => current,
                ("mongodb" | "mongo", StorageConfig::InMemory) => StorageConfig::Mongodb {
                    uri: default_mongodb_uri(),
                    database: default_mongodb_database(),
                },
                (other, _) => {
                    return Err(ConfigError::InvalidValue {
                        field: "NAYA_STORAGE".to_string(),
                        value: other.to_string(),
                        message: "expected 'in_memory' or 'mongodb'".to_string(),
                    }
                    .into());
                }
            };
        }

        if let StorageConfig::Mongodb { uri, database } = &mut self.storage {
            if let Some(value) = lookup("NAYA_MONGODB_URI") {
                *uri = value;
            }
            if let Some(value) = lookup("NAYA_MONGODB_DATABASE") {
                *database = value;
            }
        }

        if let Some(raw) = lookup("NAYA_MIN_PRICE") {
            self.pricing.min_price = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "NAYA_MIN_PRICE".to_string(),
                value: raw.clone(),
                message: "not a number".to_string(),
            })?;
        }

        Ok(self)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> NayaResult<()> {
        let bind = self
            .server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| invalid("server.bind", &self.server.bind, e))?;

        // Without auth every caller is an admin
        if self.auth.mode == AuthMode::None && !bind.ip().is_loopback() {
            return Err(invalid(
                "auth.mode",
                "none",
                format!("requires a loopback bind address, got {}", bind),
            ));
        }

        if self.server.event_capacity == 0 {
            return Err(invalid("server.event_capacity", "0", "must be at least 1"));
        }

        let min_price = self.pricing.min_price;
        if !min_price.is_finite() || min_price < MIN_ORDER_PRICE {
            return Err(invalid(
                "pricing.min_price",
                &min_price.to_string(),
                format!("must be a number >= {}", MIN_ORDER_PRICE),
            ));
        }

        let prefix = &self.orders.code_prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("orders.code_prefix", prefix, "must be non-empty ASCII letters or digits"));
        }

        if let StorageConfig::Mongodb { uri, database } = &self.storage {
            if uri.trim().is_empty() {
                return Err(invalid("storage.uri", uri, "must not be empty"));
            }
            if database.trim().is_empty() {
                return Err(invalid("storage.database", database, "must not be empty"));
            }
        }

        let mut seen = HashSet::new();
        for token in &self.auth.tokens {
            if token.token.trim().is_empty() {
                return Err(invalid("auth.tokens.token", "", "must not be empty"));
            }
            if !seen.insert(token.token.as_str()) {
                return Err(invalid("auth.tokens.token", "<redacted>", "duplicate token"));
            }
        }

        if self.auth.mode == AuthMode::Tokens && self.auth.tokens.is_empty() {
            tracing::warn!("auth mode is 'tokens' but no tokens are configured; triage endpoints will refuse every caller");
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, message: impl ToString) -> crate::core::error::NayaError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
    .into()
}
