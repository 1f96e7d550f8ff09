//! Registry-driven reverse proxy.
//!
//! Backend instances register themselves under
//! `/<root>/<application>/<version>/<instance>` in an etcd-compatible
//! registry; this proxy derives a routing domain from each version
//! directory and round-robins requests across the instances currently
//! registered for the request's Host.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use discovery_proxy::config::loader::{load_config, ConfigError};
use discovery_proxy::config::validation::validate_config;
use discovery_proxy::config::ProxyConfig;
use discovery_proxy::discovery::{load_snapshot, RegistryWatcher};
use discovery_proxy::http::HttpServer;
use discovery_proxy::lifecycle::{signals, Shutdown};
use discovery_proxy::observability::metrics;
use discovery_proxy::registry::HttpRegistryClient;
use discovery_proxy::routing::{DomainScheme, RoutingTable};

/// Host-routing reverse proxy backed by an etcd-compatible registry.
#[derive(Debug, Parser)]
#[command(name = "discovery-proxy", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to run the proxy on.
    #[arg(long)]
    port: Option<u16>,

    /// Url of the registry API.
    #[arg(long)]
    registry: Option<String>,

    /// The path to the node containing the api entries.
    #[arg(long)]
    registry_path: Option<String>,

    /// Base host for API calls (defaults to api.dev:<port>).
    #[arg(long)]
    base_host: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            config.listener.set_port(port);
        }
        if let Some(registry) = &self.registry {
            config.registry.endpoint = registry.clone();
        }
        if let Some(path) = &self.registry_path {
            config.registry.root_path = path.clone();
        }
        if let Some(base_host) = &self.base_host {
            config.registry.base_host = base_host.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    config.finalize();
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "discovery_proxy={},tower_http=info",
                    config.observability.log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        bind_address = %config.listener.bind_address,
        registry = %config.registry.endpoint,
        root_path = %config.registry.root_path,
        base_host = %config.registry.base_host,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let endpoint = Url::parse(&config.registry.endpoint)?;
    let client = Arc::new(HttpRegistryClient::new(&endpoint, &config.registry.root_path)?);
    let table = Arc::new(RoutingTable::new());
    let scheme = DomainScheme::new(
        config.registry.separator.as_str(),
        config.registry.base_host.as_str(),
    );

    // A structurally invalid registry tree aborts startup here.
    let snapshot_index = load_snapshot(&*client, &scheme, &table).await?;
    tracing::info!(domains = table.domain_count(), "initial routing table loaded");

    let shutdown = Arc::new(Shutdown::new());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let watcher = RegistryWatcher::new(
        client,
        table.clone(),
        scheme,
        Duration::from_secs(config.registry.retry_secs),
        snapshot_index.map(|index| index + 1),
    );
    tokio::spawn(watcher.run(shutdown.subscribe()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, table);
    server.run(listener, shutdown.triggered()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
