use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use domain::ThingKind;
use infrastructure::{GatewayClient, PeerConfig};
use peer::{Thing, server};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the optional peer config file
    #[arg(long, default_value = ".")]
    config_dir: String,

    /// Device kind: lamp, motion or thermostat
    #[arg(long)]
    kind: Option<String>,

    /// Display name (defaults to a name derived from the kind)
    #[arg(long)]
    name: Option<String>,

    /// Listen port (defaults per kind: lamp 3001, thermostat 3002, motion 3003)
    #[arg(long)]
    port: Option<u16>,

    /// Gateway base URL
    #[arg(long)]
    gateway_url: Option<String>,

    /// `.env` file the system token is read from
    #[arg(long)]
    env_file: Option<String>,

    /// Motion peers only: fire simulateMotion every N seconds
    #[arg(long)]
    simulate_motion_secs: Option<u64>,
}

fn default_port(kind: ThingKind) -> u16 {
    match kind {
        ThingKind::Lamp => 3001,
        ThingKind::Thermostat => 3002,
        ThingKind::MotionSensor => 3003,
    }
}

fn default_name(kind: ThingKind) -> &'static str {
    match kind {
        ThingKind::Lamp => "Living Room Lamp",
        ThingKind::Thermostat => "Thermostat",
        ThingKind::MotionSensor => "Motion Sensor",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,peer=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        PeerConfig::load(&args.config_dir).map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    if args.kind.is_some() {
        config.kind = args.kind;
    }
    if args.name.is_some() {
        config.name = args.name;
    }
    if args.port.is_some() {
        config.port = args.port;
    }
    if let Some(url) = args.gateway_url {
        config.gateway_url = url;
    }
    if let Some(env_file) = args.env_file {
        config.env_file = env_file;
    }
    if args.simulate_motion_secs.is_some() {
        config.simulate_motion_secs = args.simulate_motion_secs;
    }

    let kind: ThingKind = config
        .kind
        .as_deref()
        .context("device kind required (--kind lamp|motion|thermostat)")?
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| default_name(kind).to_string());
    let port = config.port.unwrap_or_else(|| default_port(kind));
    let endpoint = format!("http://localhost:{port}");

    info!(kind = %kind, name = %name, port, "🔌 Hearth Peer Starting...");

    let gateway = GatewayClient::new(config.gateway_url.clone(), config.env_file.clone());
    let thing = Arc::new(Thing::new(kind, name, endpoint, gateway));

    // The HTTP surface comes up before registration so the gateway can
    // reach the peer the moment the registration reply lands.
    let app = server::create_router(thing.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Peer listening on http://{}", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "Peer HTTP server stopped");
        }
    });

    // Registration is fatal on exhaustion: without an id the peer cannot
    // report changes and has no reason to keep running.
    thing
        .register(
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
        .await?;

    if kind == ThingKind::MotionSensor {
        if let Some(secs) = config.simulate_motion_secs {
            let thing = thing.clone();
            info!(every_secs = secs, "Motion simulation enabled");
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(secs));
                interval.tick().await; // the first tick completes immediately
                loop {
                    interval.tick().await;
                    if let Err(e) = thing
                        .clone()
                        .execute_action("simulateMotion", &serde_json::json!({}))
                        .await
                    {
                        warn!(error = %e, "Simulated motion failed");
                    }
                }
            });
        }
    }

    // The peer runs until killed.
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
