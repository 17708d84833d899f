//! Wire Protocol Types
//!
//! JSON message shapes for both sides of the bridge.
//!
//! Engine side (plain WebSocket text frames): `{"command":"START"}` and job
//! packets outbound; `TELEMETRY` / `GAME_TELEMETRY` / `GAME_EVENT` messages
//! inbound. Cloud side (authenticated session): named event frames
//! `{"event": ..., "data": ...}` in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound: one-time ready signal after the cloud session opens.
pub const EVENT_READY: &str = "engine_ready";
/// Inbound: cloud acknowledgment of the ready signal.
pub const EVENT_READY_ACK: &str = "ready_ack";
/// Outbound: periodic liveness signal while the session is connected.
pub const EVENT_HEARTBEAT: &str = "engine_heartbeat";
/// Inbound: job assignment pushed by the cloud side.
pub const EVENT_DISPATCH: &str = "job:dispatch";
/// Outbound signed job lifecycle events.
pub const EVENT_JOB_STARTED: &str = "job_started";
pub const EVENT_JOB_PROGRESS: &str = "job_progress";
pub const EVENT_JOB_COMPLETED: &str = "job_completed";
pub const EVENT_JOB_FAILED: &str = "job_failed";
/// Outbound unsigned passthrough events.
pub const EVENT_TELEMETRY: &str = "telemetry";
pub const EVENT_GAME_STARTED: &str = "game:started";
pub const EVENT_GAME_ENDED: &str = "game:ended";

/// Command sent to a freshly accepted engine connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCommand {
    pub command: String,
}

impl StartCommand {
    pub fn new() -> Self {
        Self {
            command: "START".to_string(),
        }
    }
}

impl Default for StartCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Job packet forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPacket {
    pub job_type: String,
    pub job_id: String,
    pub payload: Value,
}

/// Messages the engine pushes to the bridge, tagged by `type`.
///
/// Frames that do not match any of these shapes are logged and ignored by
/// the link, never surfaced as errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum EngineMessage {
    #[serde(rename = "TELEMETRY")]
    Telemetry(Telemetry),

    #[serde(rename = "GAME_TELEMETRY")]
    GameTelemetry {
        #[serde(default)]
        data: Value,
    },

    #[serde(rename = "GAME_EVENT")]
    GameEvent {
        event: GameEvent,
        #[serde(default)]
        data: Value,
    },
}

/// One engine telemetry message. Which optional fields are present depends
/// on the event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub event: TelemetryEvent,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub progress: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Job lifecycle and liveness events the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEvent {
    JobStarted,
    JobProgress,
    JobCompleted,
    JobFailed,
    TickUpdate,
}

/// Gameplay lifecycle events, forwarded unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted,
    GameEnded,
}

/// Named event frame on the cloud session (both directions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Job assignment carried by a `job:dispatch` frame. All fields are
/// optional at the wire level; validation happens at translation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_command_shape() {
        let text = serde_json::to_string(&StartCommand::new()).unwrap();
        assert_eq!(text, r#"{"command":"START"}"#);
    }

    #[test]
    fn test_job_packet_field_names() {
        let packet = JobPacket {
            job_type: "RENDER".to_string(),
            job_id: "j1".to_string(),
            payload: json!({"x": 1}),
        };
        let value = serde_json::to_value(&packet).unwrap();
        assert_eq!(value, json!({"jobType": "RENDER", "jobId": "j1", "payload": {"x": 1}}));
    }

    #[test]
    fn test_parse_telemetry() {
        let msg: EngineMessage = serde_json::from_str(
            r#"{"type":"TELEMETRY","event":"job_progress","jobId":"j1","progress":50}"#,
        )
        .unwrap();

        match msg {
            EngineMessage::Telemetry(t) => {
                assert_eq!(t.event, TelemetryEvent::JobProgress);
                assert_eq!(t.job_id.as_deref(), Some("j1"));
                assert_eq!(t.progress, Some(json!(50)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_game_event() {
        let msg: EngineMessage = serde_json::from_str(
            r#"{"type":"GAME_EVENT","event":"game_started","data":{"mode":"demo"}}"#,
        )
        .unwrap();

        match msg {
            EngineMessage::GameEvent { event, data } => {
                assert_eq!(event, GameEvent::GameStarted);
                assert_eq!(data, json!({"mode": "demo"}));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_game_telemetry_defaults_data() {
        let msg: EngineMessage =
            serde_json::from_str(r#"{"type":"GAME_TELEMETRY"}"#).unwrap();
        match msg {
            EngineMessage::GameTelemetry { data } => assert!(data.is_null()),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!(serde_json::from_str::<EngineMessage>(r#"{"type":"NOISE"}"#).is_err());
        assert!(serde_json::from_str::<EngineMessage>(
            r#"{"type":"TELEMETRY","event":"made_up"}"#
        )
        .is_err());
    }

    #[test]
    fn test_cloud_frame_omits_null_data() {
        let frame = CloudFrame {
            event: "engine_heartbeat".to_string(),
            data: Value::Null,
        };
        assert_eq!(serde_json::to_string(&frame).unwrap(), r#"{"event":"engine_heartbeat"}"#);
    }

    #[test]
    fn test_dispatch_fields_all_optional() {
        let dispatch: Dispatch = serde_json::from_value(json!({})).unwrap();
        assert!(dispatch.job_id.is_none());
        assert!(dispatch.job_type.is_none());
        assert!(dispatch.payload.is_none());
    }
}
