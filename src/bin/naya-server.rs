//! NAYA triage server
//!
//! Usage: `naya-server [config.yaml]`
//!
//! The config path can also come from `NAYA_CONFIG`. Without one, the
//! development configuration is used (in-memory storage, no auth, bound
//! to 127.0.0.1).
//! `NAYA_*` variables override the file; `RUST_LOG` overrides the log filter.

use anyhow::{Context, Result};
use naya::config::NayaConfig;
use naya::server::ServerBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "naya=info,naya_server=info,tower_http=info";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config() -> Result<NayaConfig> {
    let path = std::env::args().nth(1).or_else(|| std::env::var("NAYA_CONFIG").ok());

    let config = match path {
        Some(path) => {
            tracing::info!(path = %path, "loading configuration");
            NayaConfig::from_yaml_file(&path).with_context(|| format!("failed to load {}", path))?
        }
        None => {
            tracing::warn!("no configuration file given, using development defaults");
            NayaConfig::default_config()
        }
    };

    let config = config.apply_env().context("invalid NAYA_* environment override")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config()?;
    tracing::info!(
        bind = %config.server.bind,
        storage = config.storage.name(),
        min_price = config.pricing.min_price,
        "starting naya-server"
    );

    ServerBuilder::from_config(config).await?.serve().await
}
