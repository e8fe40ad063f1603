//! fcti-ta - Foreclosure title analysis service
//!
//! Opens the title store, wires the registry channels, discovery engine and
//! survival engine into a `TitleAnalysisService`, and serves the read API.
//! An optional first argument names the configuration file.

use anyhow::{Context, Result};
use fcti_common::events::EventBus;
use fcti_ta::config::EngineConfig;
use fcti_ta::discovery::DiscoveryEngine;
use fcti_ta::extractor::{DocumentTextExtractor, RuleBasedExtractor};
use fcti_ta::registry::channels::ChannelPolicy;
use fcti_ta::registry::{DocumentRegistry, HttpRegistryClient, RegistryChannels};
use fcti_ta::store::{SqliteTitleStore, TitleStore, WriteGate};
use fcti_ta::survival::SurvivalEngine;
use fcti_ta::{AppState, TitleAnalysisService};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let config_arg = std::env::args().nth(1);
    let config = EngineConfig::load(config_arg.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fcti-ta (title analysis)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.service.database_path);

    let store = SqliteTitleStore::open(Path::new(&config.service.database_path), 4)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open title store: {}", e))?;
    let store: Arc<dyn TitleStore> = Arc::new(store);

    let events = EventBus::new(256);
    let gate = Arc::new(WriteGate::new());

    let primary: Arc<dyn DocumentRegistry> = Arc::new(
        HttpRegistryClient::new("primary", &config.registry.base_url, &config.registry)
            .context("Failed to build primary registry client")?,
    );
    let fallback: Option<Arc<dyn DocumentRegistry>> = match &config.registry.fallback_url {
        Some(url) => {
            let client = HttpRegistryClient::new("fallback", url, &config.registry)
                .context("Failed to build fallback registry client")?;
            Some(Arc::new(client) as Arc<dyn DocumentRegistry>)
        }
        None => None,
    };
    let channels = Arc::new(
        RegistryChannels::new(
            primary,
            fallback,
            ChannelPolicy::from_config(&config.registry, &config.discovery),
        )
        .with_events(events.clone()),
    );
    info!("Registry: {}", config.registry.base_url);

    let extractor: Arc<dyn DocumentTextExtractor> = Arc::new(RuleBasedExtractor::new());
    let discovery = Arc::new(DiscoveryEngine::new(
        channels,
        Arc::clone(&extractor),
        Arc::clone(&store),
        Arc::clone(&gate),
        events.clone(),
        config.discovery.clone(),
    ));
    let service = TitleAnalysisService::new(
        store,
        gate,
        events.clone(),
        discovery,
        extractor,
        SurvivalEngine::new(config.survival.clone()),
        config.service.worker_pool_size,
    );

    let app = fcti_ta::build_router(AppState::new(service, events));

    let listener = tokio::net::TcpListener::bind(&config.service.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.service.bind_addr))?;
    info!("Listening on http://{}", config.service.bind_addr);
    info!("Health check: http://{}/health", config.service.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
