/// Call bridge server
///
/// Run with: call-bridge --config config.json
/// Every config value can be overridden from the environment (or a .env file).

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use call_bridge::{http_server, BridgeConfig};

#[derive(Debug, Parser)]
#[command(name = "call-bridge", version, about = "Bridge WebRTC callers to an AI voice endpoint")]
struct Args {
    /// Path to the JSON config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("call_bridge=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = BridgeConfig::load(&args.config)?;

    tracing::info!("[INIT] Bridge configuration:");
    tracing::info!("  Broker: {}", config.broker_app_endpoint());
    tracing::info!("  AI endpoint: {}", config.ai_endpoint);
    tracing::info!("  STUN server: {}", config.stun_server);

    http_server::serve(config).await
}
