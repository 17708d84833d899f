//! Microbridge - Entry Point
//!
//! Long-lived relay between the local engine (WebSocket server on
//! localhost) and the cloud orchestration service (authenticated WebSocket
//! session). Runs until terminated.

use microbridge::{Bridge, Config};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Microbridge v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    Bridge::new(config).run().await
}
