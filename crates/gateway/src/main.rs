use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{ChangePropagator, RuleEngine, ThingRegistry, start_ticks};
use gateway::{api, state::AppState};
use infrastructure::{GatewayConfig, HttpDispatcher, PeerClient, token};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the optional gateway config file
    #[arg(long, default_value = ".")]
    config_dir: String,

    /// API Port (overrides the config file)
    #[arg(long)]
    api_port: Option<u16>,

    /// `.env` file the system token is published through
    #[arg(long)]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,gateway=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("🏠 Hearth Gateway Starting...");

    let mut config = GatewayConfig::load(&args.config_dir)
        .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    if let Some(port) = args.api_port {
        config.api_port = port;
    }
    if let Some(env_file) = args.env_file {
        config.env_file = env_file;
    }

    // Publish the system token so peers can pick it up on their next
    // registration attempt. A configured token is reused verbatim, which
    // keeps already-registered peers valid across restarts.
    let system_token = config
        .system_token
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if let Err(e) = token::store_system_token(Path::new(&config.env_file), &system_token) {
        warn!(env_file = %config.env_file, error = %e, "Could not write system token, peers must be configured manually");
    } else {
        info!(env_file = %config.env_file, "System token published");
    }

    let registry = Arc::new(ThingRegistry::new());
    let dispatcher = Arc::new(HttpDispatcher::new(system_token.clone()));

    // One channel into the single rule-engine task; a second one loops the
    // engine's simulated thermostat updates back through the propagator.
    let (engine_tx, engine_rx) = mpsc::channel(256);
    let (feedback_tx, mut feedback_rx) = mpsc::channel(64);

    let propagator = ChangePropagator::new(registry.clone(), engine_tx.clone());

    let engine = RuleEngine::new(
        config.rules.clone(),
        registry.clone(),
        dispatcher.clone(),
        feedback_tx,
    );
    tokio::spawn(engine.run(engine_rx));
    start_ticks(engine_tx, &config.rules);
    info!("✅ Rule engine and tick timers running");

    // Simulated updates take the same path as real peer notifications.
    let feedback_propagator = propagator.clone();
    tokio::spawn(async move {
        while let Some(update) = feedback_rx.recv().await {
            let mut properties = serde_json::Map::new();
            for (key, value) in &update.properties {
                properties.insert(key.clone(), value.to_json());
            }
            if let Err(e) = feedback_propagator
                .on_thing_update(&update.thing_id, &properties)
                .await
            {
                warn!(thing_id = %update.thing_id, error = %e, "Simulated update not propagated");
            }
        }
    });

    let state = Arc::new(AppState::new(
        registry,
        propagator,
        dispatcher,
        PeerClient::new(),
        system_token,
    ));

    let app = api::create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("🚀 API Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
