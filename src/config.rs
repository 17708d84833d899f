//! Configuration management

use anyhow::Result;
use std::time::Duration;

use crate::auth::TokenBackend;

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the engine-facing WebSocket server binds on localhost
    pub engine_port: u16,

    /// Cloud session endpoint (ws:// or wss://)
    pub cloud_url: String,

    /// Identity the credential is issued for
    pub engine_id: String,

    /// Secret for the session credential (shared with the cloud side)
    pub jwt_secret: String,

    /// Secret for message signing (shared with the verifying party)
    pub shared_secret: String,

    /// Heartbeat cadence while the cloud session is connected
    pub heartbeat_interval: Duration,

    /// Token construction backend
    pub token_backend: TokenBackend,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let engine_port = std::env::var("MICROBRIDGE_ENGINE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let cloud_url = std::env::var("MICROBRIDGE_CLOUD_URL")
            .unwrap_or_else(|_| "ws://localhost:3000/engine".to_string());

        let engine_id = std::env::var("MICROBRIDGE_ENGINE_ID")
            .unwrap_or_else(|_| "engine_local_01".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set - using development default");
            "JWT_SECRET_123456789".to_string()
        });

        let shared_secret = std::env::var("ENGINE_SHARED_SECRET").unwrap_or_else(|_| {
            tracing::warn!("ENGINE_SHARED_SECRET not set - using development default");
            "ENGINE_SHARED_SECRET_123".to_string()
        });

        let heartbeat_interval = std::env::var("MICROBRIDGE_HEARTBEAT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3));

        let token_backend = match std::env::var("MICROBRIDGE_MANUAL_JWT") {
            Ok(v) if v == "true" || v == "1" => TokenBackend::Manual,
            _ => TokenBackend::Standard,
        };

        Ok(Self {
            engine_port,
            cloud_url,
            engine_id,
            jwt_secret,
            shared_secret,
            heartbeat_interval,
            token_backend,
        })
    }
}
