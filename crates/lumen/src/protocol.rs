//! Wire protocol for the device channel.
//!
//! JSON text frames in both directions. Outbound frames are the register
//! handshake and device field updates; inbound frames carry an optional
//! `type` discriminator and are classified at the transport boundary.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registration handshake, sent once when the connection opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub sdid: String,
    pub authorization: String,
    pub cid: i64,
}

impl RegisterMessage {
    /// Build a register frame for a device.
    ///
    /// Callers pass the raw token; the `bearer ` prefix is applied here and
    /// nowhere else.
    pub fn new(device_id: &str, device_token: &str) -> Self {
        Self {
            message_type: "register".to_string(),
            sdid: device_id.to_string(),
            authorization: format!("bearer {}", device_token),
            cid: now_millis(),
        }
    }
}

/// Field update reporting a changed device attribute to the cloud.
///
/// Carries no `type` key on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldUpdateMessage {
    pub sdid: String,
    pub data: Value,
    pub cid: i64,
}

impl FieldUpdateMessage {
    pub fn new(device_id: &str, data: Value) -> Self {
        Self {
            sdid: device_id.to_string(),
            data,
            cid: now_millis(),
        }
    }
}

/// Outbound device channel message.
///
/// Untagged because the field-update frame genuinely has no tag on the
/// wire; the register frame carries its own `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceMessage {
    Register(RegisterMessage),
    FieldUpdate(FieldUpdateMessage),
}

impl DeviceMessage {
    /// Serialize to a single JSON text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One inbound action command.
///
/// `name` stays optional through decoding so a malformed element degrades
/// to an unrecognized action instead of failing the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

/// Inbound frame, decoded at the transport boundary.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// An `action` frame carrying a batch of commands.
    Action { actions: Vec<Action> },
    /// A `ping` frame. Recognized, deliberately a no-op.
    Ping,
    /// Any other `type`, or no `type` at all. Ignored.
    Other,
}

/// Classify a raw inbound frame.
///
/// Malformed JSON fails the frame, not the session; the caller decides
/// what to do with the error. Unrecognized fields anywhere are ignored.
pub fn classify(raw: &str) -> Result<InboundFrame, serde_json::Error> {
    let frame: Value = serde_json::from_str(raw)?;

    match frame.get("type").and_then(Value::as_str) {
        Some("action") => Ok(InboundFrame::Action {
            actions: decode_actions(&frame),
        }),
        Some("ping") => Ok(InboundFrame::Ping),
        _ => Ok(InboundFrame::Other),
    }
}

/// Pull `data.actions` out of an action frame.
///
/// Elements are decoded one by one; an element that is not action-shaped
/// becomes a nameless `Action`, which dispatch treats as unrecognized.
fn decode_actions(frame: &Value) -> Vec<Action> {
    let Some(actions) = frame.pointer("/data/actions").and_then(Value::as_array) else {
        tracing::debug!("action frame without data.actions");
        return Vec::new();
    };

    actions
        .iter()
        .map(|raw| serde_json::from_value(raw.clone()).unwrap_or_default())
        .collect()
}

/// Millisecond timestamp used as the outbound correlation id.
///
/// Not unique and not ordered; only good for matching log lines.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_json<T: Serialize>(msg: &T) -> Value {
        serde_json::to_value(msg).unwrap()
    }

    #[test]
    fn register_message_serialization() {
        let msg = RegisterMessage::new("device-1", "secret-token");

        let json = to_json(&msg);
        assert_eq!(json["type"], "register");
        assert_eq!(json["sdid"], "device-1");
        assert_eq!(json["authorization"], "bearer secret-token");
        assert!(json["cid"].is_i64());
    }

    #[test]
    fn field_update_has_no_type_key() {
        let msg = FieldUpdateMessage::new("device-1", serde_json::json!({ "state": true }));

        let json = to_json(&msg);
        assert!(json.get("type").is_none());
        assert_eq!(json["sdid"], "device-1");
        assert_eq!(json["data"], serde_json::json!({ "state": true }));
        assert!(json["cid"].is_i64());
    }

    #[test]
    fn outbound_frames_carry_exactly_the_wire_keys() {
        let register = DeviceMessage::Register(RegisterMessage::new("d", "t"));
        let update = DeviceMessage::FieldUpdate(FieldUpdateMessage::new(
            "d",
            serde_json::json!({ "state": false }),
        ));

        let register: Value = serde_json::from_str(&register.to_text().unwrap()).unwrap();
        let mut keys: Vec<_> = register.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["authorization", "cid", "sdid", "type"]);

        let update: Value = serde_json::from_str(&update.to_text().unwrap()).unwrap();
        let mut keys: Vec<_> = update.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["cid", "data", "sdid"]);
    }

    #[test]
    fn outbound_round_trip_preserves_the_variant() {
        let register = DeviceMessage::Register(RegisterMessage::new("d", "t"));
        let parsed: DeviceMessage =
            serde_json::from_str(&register.to_text().unwrap()).unwrap();
        assert!(matches!(parsed, DeviceMessage::Register(_)));

        let update = DeviceMessage::FieldUpdate(FieldUpdateMessage::new(
            "d",
            serde_json::json!({ "state": true }),
        ));
        let parsed: DeviceMessage = serde_json::from_str(&update.to_text().unwrap()).unwrap();
        assert!(matches!(parsed, DeviceMessage::FieldUpdate(_)));
    }

    #[test]
    fn classify_action_frame() {
        // Shape the cloud actually sends, extra fields included.
        let raw = r#"{
            "type": "action",
            "cts": 1451436813630,
            "ts": 1451436813631,
            "mid": "37e1d61b61b74a3ba962726cb3ef62f1",
            "sdid": "1abe",
            "ddid": "2abc",
            "data": { "actions": [{ "name": "setOn", "parameters": {} }] },
            "mv": 1
        }"#;

        let frame = classify(raw).unwrap();
        let InboundFrame::Action { actions } = frame else {
            panic!("expected an action frame");
        };
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name.as_deref(), Some("setOn"));
        assert!(actions[0].parameters.is_empty());
    }

    #[test]
    fn classify_action_with_parameters() {
        let raw = r#"{"type":"action","data":{"actions":[{"name":"setOn","parameters":{"level":3}}]}}"#;

        let InboundFrame::Action { actions } = classify(raw).unwrap() else {
            panic!("expected an action frame");
        };
        assert_eq!(actions[0].parameters["level"], 3);
    }

    #[test]
    fn malformed_action_elements_become_nameless() {
        let raw = r#"{"type":"action","data":{"actions":[42, {"parameters":{}}, {"name":"setOff"}]}}"#;

        let InboundFrame::Action { actions } = classify(raw).unwrap() else {
            panic!("expected an action frame");
        };
        assert_eq!(actions.len(), 3);
        assert!(actions[0].name.is_none());
        assert!(actions[1].name.is_none());
        assert_eq!(actions[2].name.as_deref(), Some("setOff"));
    }

    #[test]
    fn classify_action_without_actions_list_is_an_empty_batch() {
        let InboundFrame::Action { actions } = classify(r#"{"type":"action"}"#).unwrap() else {
            panic!("expected an action frame");
        };
        assert!(actions.is_empty());
    }

    #[test]
    fn classify_ping_frame() {
        assert!(matches!(classify(r#"{"type":"ping"}"#), Ok(InboundFrame::Ping)));
    }

    #[test]
    fn classify_unknown_and_untyped_frames_as_other() {
        assert!(matches!(
            classify(r#"{"type":"event","data":{}}"#),
            Ok(InboundFrame::Other)
        ));
        // Ack replies and similar frames carry no type at all.
        assert!(matches!(
            classify(r#"{"mid":"9e2a","data":{}}"#),
            Ok(InboundFrame::Other)
        ));
        assert!(matches!(classify(r#"{"type":7}"#), Ok(InboundFrame::Other)));
    }

    #[test]
    fn classify_rejects_malformed_json() {
        assert!(classify("not json at all").is_err());
    }
}
