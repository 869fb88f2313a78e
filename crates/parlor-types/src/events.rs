use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, MembershipState};

/// Events sent FROM server TO client over the realtime socket.
///
/// On the wire each event is a Socket.IO event array `["name", payload]`;
/// `to_wire`/`from_wire` convert between that form and the typed enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Informational notice, e.g. the welcome line sent on connect
    ServerMessage { message: String },

    /// A chat message broadcast to every connected client
    ReceiveMessage(ChatMessage),

    /// Someone joined or left a channel
    ChannelUpdate(ChannelUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub action: MembershipState,
}

/// Events sent FROM client TO server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Post a chat message
    SendMessage(ChatMessage),

    /// Subscribe this connection to a channel
    JoinChannel { channel: String },

    /// Drop this connection from a channel
    LeaveChannel { channel: String },
}

impl ServerEvent {
    pub const NAMES: [&'static str; 3] = ["server_message", "receive_message", "channel_update"];

    /// Returns the channel if this event is scoped to one.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::ReceiveMessage(msg) => msg.channel.as_deref(),
            Self::ChannelUpdate(update) => Some(&update.channel),
            Self::ServerMessage { .. } => None,
        }
    }

    pub fn to_wire(&self) -> serde_json::Result<Value> {
        tagged_to_wire(serde_json::to_value(self)?)
    }

    /// Parse a Socket.IO event array. Returns `Ok(None)` for event names this
    /// client does not know.
    pub fn from_wire(args: Value) -> serde_json::Result<Option<Self>> {
        match wire_to_tagged(args, &Self::NAMES)? {
            Some(tagged) => serde_json::from_value(tagged).map(Some),
            None => Ok(None),
        }
    }
}

impl ClientEvent {
    pub const NAMES: [&'static str; 3] = ["send_message", "join_channel", "leave_channel"];

    pub fn name(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "send_message",
            Self::JoinChannel { .. } => "join_channel",
            Self::LeaveChannel { .. } => "leave_channel",
        }
    }

    pub fn to_wire(&self) -> serde_json::Result<Value> {
        tagged_to_wire(serde_json::to_value(self)?)
    }

    pub fn from_wire(args: Value) -> serde_json::Result<Option<Self>> {
        match wire_to_tagged(args, &Self::NAMES)? {
            Some(tagged) => serde_json::from_value(tagged).map(Some),
            None => Ok(None),
        }
    }
}

// {"event": name, "data": payload}  <->  [name, payload]

fn tagged_to_wire(tagged: Value) -> serde_json::Result<Value> {
    let Value::Object(mut map) = tagged else {
        return Err(serde::ser::Error::custom("event did not serialize to an object"));
    };
    let name = map.remove("event").unwrap_or(Value::Null);
    let data = map.remove("data").unwrap_or(Value::Null);
    Ok(Value::Array(vec![name, data]))
}

fn wire_to_tagged(args: Value, known: &[&str]) -> serde_json::Result<Option<Value>> {
    let Value::Array(mut items) = args else {
        return Err(serde::de::Error::custom("event payload is not an array"));
    };
    if items.is_empty() {
        return Err(serde::de::Error::custom("event array is empty"));
    }
    let name = items.remove(0);
    let Some(name_str) = name.as_str() else {
        return Err(serde::de::Error::custom("event name is not a string"));
    };
    if !known.contains(&name_str) {
        return Ok(None);
    }
    // Extra acknowledgement arguments past the first payload are ignored.
    let data = if items.is_empty() { Value::Null } else { items.remove(0) };
    Ok(Some(serde_json::json!({ "event": name, "data": data })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_event_wire_shape() {
        let event = ClientEvent::SendMessage(ChatMessage::new("ada", "hello"));
        assert_eq!(
            event.to_wire().unwrap(),
            json!(["send_message", {"username": "ada", "message": "hello"}])
        );

        let join = ClientEvent::JoinChannel { channel: "general".into() };
        assert_eq!(join.to_wire().unwrap(), json!(["join_channel", {"channel": "general"}]));
        assert_eq!(join.name(), "join_channel");
    }

    #[test]
    fn server_events_parse_from_wire() {
        let welcome = ServerEvent::from_wire(json!(["server_message", {"message": "Welcome to the chat server!"}]))
            .unwrap()
            .unwrap();
        assert_eq!(
            welcome,
            ServerEvent::ServerMessage { message: "Welcome to the chat server!".into() }
        );

        let msg = ServerEvent::from_wire(json!(["receive_message", {"username": "bob", "message": "yo", "channel": "dev"}]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.channel(), Some("dev"));

        let update = ServerEvent::from_wire(json!(["channel_update", {"channel": "dev", "action": "left"}]))
            .unwrap()
            .unwrap();
        assert_eq!(
            update,
            ServerEvent::ChannelUpdate(ChannelUpdate {
                channel: "dev".into(),
                username: None,
                action: MembershipState::Left,
            })
        );
    }

    #[test]
    fn unknown_event_names_are_skipped() {
        assert_eq!(ServerEvent::from_wire(json!(["typing", {}])).unwrap(), None);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(ServerEvent::from_wire(json!({"event": "server_message"})).is_err());
        assert!(ServerEvent::from_wire(json!([])).is_err());
        assert!(ServerEvent::from_wire(json!(["receive_message", {"username": 3}])).is_err());
    }
}
