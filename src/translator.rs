//! Translator
//!
//! The relay core: the only component that understands both wire
//! vocabularies. Engine-side messages map to named cloud events (job
//! lifecycle events signed, game telemetry passed through unsigned, tick
//! updates logged locally); cloud dispatches map to engine job packets.
//!
//! The mapping itself is pure ([`map_engine_message`], [`job_packet`]); the
//! [`Translator`] drives it against the two link handles and turns every
//! failure into a warning rather than a fault.

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::cloud::CloudSender;
use crate::engine::{EngineLinkError, EngineSender};
use crate::protocol::{
    CloudFrame, Dispatch, EngineMessage, GameEvent, JobPacket, Telemetry, TelemetryEvent,
    EVENT_DISPATCH, EVENT_GAME_ENDED, EVENT_GAME_STARTED, EVENT_JOB_COMPLETED,
    EVENT_JOB_FAILED, EVENT_JOB_PROGRESS, EVENT_JOB_STARTED, EVENT_READY_ACK,
    EVENT_TELEMETRY,
};
use crate::signer::MessageSigner;

/// Dispatch rejected before reaching the engine.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch rejected: missing jobId")]
    MissingJobId,
}

/// Outbound action produced for one engine message.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    /// Emit a signed job lifecycle event.
    EmitSigned {
        event: &'static str,
        payload: Value,
    },
    /// Emit an unsigned passthrough event.
    Emit {
        event: &'static str,
        data: Value,
    },
    /// Local-only liveness log, never forwarded.
    LogTick { fps: Option<f64> },
}

/// Map one engine message to its outbound action. `now_ms` stamps the
/// signed payloads.
pub fn map_engine_message(msg: EngineMessage, now_ms: i64) -> EngineAction {
    match msg {
        EngineMessage::Telemetry(t) => map_telemetry(t, now_ms),
        EngineMessage::GameTelemetry { data } => EngineAction::Emit {
            event: EVENT_TELEMETRY,
            data,
        },
        EngineMessage::GameEvent { event, data } => EngineAction::Emit {
            event: match event {
                GameEvent::GameStarted => EVENT_GAME_STARTED,
                GameEvent::GameEnded => EVENT_GAME_ENDED,
            },
            data,
        },
    }
}

fn map_telemetry(t: Telemetry, now_ms: i64) -> EngineAction {
    let job_id = t.job_id.map(Value::String).unwrap_or(Value::Null);

    match t.event {
        TelemetryEvent::JobStarted => EngineAction::EmitSigned {
            event: EVENT_JOB_STARTED,
            payload: json!({"jobId": job_id, "timestamp": now_ms}),
        },
        TelemetryEvent::JobProgress => EngineAction::EmitSigned {
            event: EVENT_JOB_PROGRESS,
            payload: json!({
                "jobId": job_id,
                "progress": t.progress.unwrap_or(json!(0)),
                "timestamp": now_ms,
            }),
        },
        TelemetryEvent::JobCompleted => EngineAction::EmitSigned {
            event: EVENT_JOB_COMPLETED,
            payload: json!({
                "jobId": job_id,
                "result": t.result.unwrap_or(json!({"success": true})),
                "timestamp": now_ms,
            }),
        },
        TelemetryEvent::JobFailed => EngineAction::EmitSigned {
            event: EVENT_JOB_FAILED,
            payload: json!({
                "jobId": job_id,
                "error": t.error.unwrap_or(json!("Unknown error")),
                "details": t.details.unwrap_or(json!("")),
                "timestamp": now_ms,
            }),
        },
        TelemetryEvent::TickUpdate => EngineAction::LogTick {
            fps: t
                .data
                .as_ref()
                .and_then(|d| d.get("fps"))
                .and_then(Value::as_f64),
        },
    }
}

/// Build the engine job packet for a dispatch. A dispatch with no jobId is
/// invalid; jobType and payload fall back to an empty string and `{}`.
pub fn job_packet(dispatch: Dispatch) -> Result<JobPacket, DispatchError> {
    let job_id = dispatch
        .job_id
        .filter(|id| !id.is_empty())
        .ok_or(DispatchError::MissingJobId)?;

    Ok(JobPacket {
        job_type: dispatch.job_type.unwrap_or_default(),
        job_id,
        payload: dispatch.payload.unwrap_or_else(|| json!({})),
    })
}

/// Drives the mapping table against the two connection handles.
pub struct Translator {
    signer: MessageSigner,
    engine: EngineSender,
    cloud: CloudSender,
}

impl Translator {
    pub fn new(signer: MessageSigner, engine: EngineSender, cloud: CloudSender) -> Self {
        Self {
            signer,
            engine,
            cloud,
        }
    }

    /// Engine → cloud direction.
    pub fn relay_engine(&self, msg: EngineMessage) {
        let now_ms = chrono::Utc::now().timestamp_millis();

        match map_engine_message(msg, now_ms) {
            EngineAction::EmitSigned { event, payload } => {
                let envelope = self.signer.sign(&payload);
                if let Err(e) = self.cloud.emit(event, &envelope) {
                    warn!("Could not emit {}: {}", event, e);
                }
            }
            EngineAction::Emit { event, data } => {
                if let Err(e) = self.cloud.emit(event, &data) {
                    warn!("Could not emit {}: {}", event, e);
                }
            }
            EngineAction::LogTick { fps } => match fps {
                Some(fps) => info!("Engine tick: {:.1} fps", fps),
                None => debug!("Engine tick"),
            },
        }
    }

    /// Cloud → engine direction.
    pub async fn relay_cloud(&self, frame: CloudFrame) {
        match frame.event.as_str() {
            EVENT_DISPATCH => self.dispatch(frame.data).await,
            EVENT_READY_ACK => info!("Cloud acknowledged ready"),
            other => debug!("Ignoring cloud event: {}", other),
        }
    }

    async fn dispatch(&self, data: Value) {
        let dispatch: Dispatch = match serde_json::from_value(data) {
            Ok(d) => d,
            Err(e) => {
                warn!("Malformed dispatch: {}", e);
                return;
            }
        };

        let packet = match job_packet(dispatch) {
            Ok(p) => p,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        info!("Dispatch: {} ({})", packet.job_type, packet.job_id);

        match self.engine.send(&packet).await {
            Ok(()) => debug!("Forwarded job {} to engine", packet.job_id),
            Err(EngineLinkError::NotConnected) => {
                warn!("No engine connected; dropping job {}", packet.job_id)
            }
            Err(e) => warn!("Could not send job {} to engine: {}", packet.job_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json_text: &str) -> EngineMessage {
        serde_json::from_str(json_text).unwrap()
    }

    #[test]
    fn test_job_started_mapping() {
        let msg = parse(r#"{"type":"TELEMETRY","event":"job_started","jobId":"j1"}"#);
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::EmitSigned {
                event: "job_started",
                payload: json!({"jobId": "j1", "timestamp": 42}),
            }
        );
    }

    #[test]
    fn test_job_progress_mapping_with_default() {
        let msg = parse(r#"{"type":"TELEMETRY","event":"job_progress","jobId":"j1"}"#);
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::EmitSigned {
                event: "job_progress",
                payload: json!({"jobId": "j1", "progress": 0, "timestamp": 42}),
            }
        );
    }

    #[test]
    fn test_job_completed_mapping_with_default() {
        let msg = parse(r#"{"type":"TELEMETRY","event":"job_completed","jobId":"j1"}"#);
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::EmitSigned {
                event: "job_completed",
                payload: json!({"jobId": "j1", "result": {"success": true}, "timestamp": 42}),
            }
        );
    }

    #[test]
    fn test_job_failed_mapping_with_defaults() {
        let msg = parse(
            r#"{"type":"TELEMETRY","event":"job_failed","jobId":"j1","error":"boom"}"#,
        );
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::EmitSigned {
                event: "job_failed",
                payload: json!({
                    "jobId": "j1",
                    "error": "boom",
                    "details": "",
                    "timestamp": 42,
                }),
            }
        );
    }

    #[test]
    fn test_tick_update_not_forwarded() {
        let msg = parse(
            r#"{"type":"TELEMETRY","event":"tick_update","data":{"fps":59.8}}"#,
        );
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::LogTick { fps: Some(59.8) }
        );
    }

    #[test]
    fn test_game_telemetry_forwarded_unsigned() {
        let msg = parse(r#"{"type":"GAME_TELEMETRY","data":{"score":10}}"#);
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::Emit {
                event: "telemetry",
                data: json!({"score": 10}),
            }
        );
    }

    #[test]
    fn test_game_events_forwarded_unsigned() {
        let started = parse(r#"{"type":"GAME_EVENT","event":"game_started","data":{"a":1}}"#);
        assert_eq!(
            map_engine_message(started, 42),
            EngineAction::Emit {
                event: "game:started",
                data: json!({"a": 1}),
            }
        );

        let ended = parse(r#"{"type":"GAME_EVENT","event":"game_ended","data":{"b":2}}"#);
        assert_eq!(
            map_engine_message(ended, 42),
            EngineAction::Emit {
                event: "game:ended",
                data: json!({"b": 2}),
            }
        );
    }

    #[test]
    fn test_missing_job_id_passes_through_as_null() {
        let msg = parse(r#"{"type":"TELEMETRY","event":"job_started"}"#);
        assert_eq!(
            map_engine_message(msg, 42),
            EngineAction::EmitSigned {
                event: "job_started",
                payload: json!({"jobId": null, "timestamp": 42}),
            }
        );
    }

    #[test]
    fn test_job_packet_builds_exact_shape() {
        let dispatch: Dispatch = serde_json::from_value(json!({
            "jobId": "j1",
            "jobType": "RENDER",
            "payload": {"x": 1},
        }))
        .unwrap();

        let packet = job_packet(dispatch).unwrap();
        assert_eq!(
            serde_json::to_value(&packet).unwrap(),
            json!({"jobType": "RENDER", "jobId": "j1", "payload": {"x": 1}})
        );
    }

    #[test]
    fn test_job_packet_defaults() {
        let dispatch: Dispatch = serde_json::from_value(json!({"jobId": "j1"})).unwrap();
        let packet = job_packet(dispatch).unwrap();
        assert_eq!(packet.job_type, "");
        assert_eq!(packet.payload, json!({}));
    }

    #[test]
    fn test_job_packet_rejects_missing_id() {
        let dispatch: Dispatch = serde_json::from_value(json!({"jobType": "RENDER"})).unwrap();
        assert!(matches!(
            job_packet(dispatch),
            Err(DispatchError::MissingJobId)
        ));

        let empty: Dispatch = serde_json::from_value(json!({"jobId": ""})).unwrap();
        assert!(matches!(job_packet(empty), Err(DispatchError::MissingJobId)));
    }
}
