//! Microbridge
//!
//! Protocol bridge between a local compute engine and a remote
//! orchestration service, translating job-dispatch and telemetry messages
//! between the two wire formats and signing the outbound job lifecycle
//! path.
//!
//! # Architecture
//!
//! ```text
//! Cloud ──► CloudLink ──► Translator ──► EngineLink ──► Engine
//!             (wss)           │             (ws)
//!                             ├── MessageSigner (HMAC envelopes)
//!                             ├── SessionAuthenticator (JWT)
//!                             └── Heartbeat (fixed interval)
//! ```
//!
//! The Translator is the only component that understands both wire
//! vocabularies; EngineLink and CloudLink are dumb transports. Job
//! lifecycle events are signed on the way to the cloud; game telemetry is
//! passed through unsigned.

pub mod auth;
pub mod bridge;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod protocol;
pub mod signer;
pub mod translator;

pub use auth::{AuthError, Claims, SessionAuthenticator, TokenBackend};
pub use bridge::Bridge;
pub use cloud::{CloudError, CloudLink, CloudSender};
pub use config::Config;
pub use engine::{EngineLink, EngineLinkError, EngineSender};
pub use protocol::{CloudFrame, Dispatch, EngineMessage, JobPacket};
pub use signer::{canonical_json, MessageSigner, SignedEnvelope};
pub use translator::{job_packet, map_engine_message, EngineAction, Translator};
