//! Bridge Assembly
//!
//! Owns the connection state and wires the components together: issue the
//! credential, start the engine server, open the cloud session (fatal on
//! failure), then relay until externally terminated.
//!
//! Cooperative single-threaded scheduling: the relay loop, the engine
//! accept loop, and the heartbeat interleave only at await points, so the
//! connection slots need no locking beyond the links' own.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::auth::SessionAuthenticator;
use crate::cloud::CloudLink;
use crate::config::Config;
use crate::engine::EngineLink;
use crate::signer::MessageSigner;
use crate::translator::Translator;

/// The bridge process: one engine link, one cloud session, one relay.
pub struct Bridge {
    config: Config,
}

impl Bridge {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until Ctrl-C. Returns early only on startup failure; after
    /// startup, every per-message failure is a logged warning.
    pub async fn run(self) -> Result<()> {
        let authenticator =
            SessionAuthenticator::new(&self.config.jwt_secret, self.config.token_backend);
        let credential = authenticator
            .issue(&self.config.engine_id)
            .context("credential issuance failed")?;

        let mut engine = EngineLink::start(self.config.engine_port)
            .await
            .context("engine server failed to start")?;

        // No retry and no backoff here: a cloud connection failure at
        // startup is fatal for the process.
        let mut cloud = CloudLink::connect(
            &self.config.cloud_url,
            &credential,
            self.config.heartbeat_interval,
        )
        .await
        .context("cloud connection failed")?;

        let translator = Translator::new(
            MessageSigner::new(&self.config.shared_secret),
            engine.handle(),
            cloud.handle(),
        );

        info!("Bridge running: engine ws://{}", engine.local_addr());

        let mut cloud_open = true;
        loop {
            tokio::select! {
                Some(msg) = engine.recv() => translator.relay_engine(msg),

                frame = cloud.recv(), if cloud_open => match frame {
                    Some(frame) => translator.relay_cloud(frame).await,
                    None => {
                        // The session is gone for good; keep serving the
                        // engine, emits will surface as warnings.
                        warn!("Cloud session lost; no reconnection attempted");
                        cloud_open = false;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }
}
