//! Text framing for the realtime socket.
//!
//! Two layers ride in each WebSocket text frame:
//!
//! ```text
//! Engine.IO  <type digit><data>
//!            0 open {"sid","upgrades","pingInterval","pingTimeout","maxPayload"}
//!            1 close   2 ping   3 pong   4 message   5 upgrade   6 noop
//!
//! Socket.IO  (inside an Engine.IO message)
//!            <type digit>[<namespace>,][<ack id>][<json>]
//!            0 connect   1 disconnect   2 event   3 ack   4 connect error
//! ```
//!
//! Binary packets (Socket.IO types 5 and 6) are not used by the chat server
//! and are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty packet")]
    Empty,
    #[error("unknown {layer} packet type '{kind}'")]
    UnknownType { layer: &'static str, kind: char },
    #[error("binary Socket.IO packets are not supported")]
    Binary,
    #[error("malformed {layer} payload: {reason}")]
    Payload { layer: &'static str, reason: String },
}

/// Handshake sent by the server in the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long to wait for the next server ping before declaring the
    /// connection dead.
    pub fn liveness_window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

// ── Engine.IO ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(DecodeError::Empty)?;
        let data = chars.as_str();
        Ok(match kind {
            '0' => Self::Open(serde_json::from_str(data).map_err(|e| DecodeError::Payload {
                layer: "Engine.IO",
                reason: e.to_string(),
            })?),
            '1' => Self::Close,
            '2' => Self::Ping(data.to_string()),
            '3' => Self::Pong(data.to_string()),
            '4' => Self::Message(data.to_string()),
            '5' => Self::Upgrade,
            '6' => Self::Noop,
            other => {
                return Err(DecodeError::UnknownType {
                    layer: "Engine.IO",
                    kind: other,
                });
            }
        })
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            Self::Close => "1".into(),
            Self::Ping(data) => format!("2{}", data),
            Self::Pong(data) => format!("3{}", data),
            Self::Message(data) => format!("4{}", data),
            Self::Upgrade => "5".into(),
            Self::Noop => "6".into(),
        }
    }
}

// ── Socket.IO ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, data: Option<Value> },
    Disconnect { namespace: String },
    Event { namespace: String, id: Option<u64>, args: Value },
    Ack { namespace: String, id: u64, args: Value },
    ConnectError { namespace: String, data: Option<Value> },
}

impl SocketPacket {
    pub fn connect() -> Self {
        Self::Connect {
            namespace: DEFAULT_NAMESPACE.into(),
            data: None,
        }
    }

    pub fn disconnect() -> Self {
        Self::Disconnect {
            namespace: DEFAULT_NAMESPACE.into(),
        }
    }

    pub fn event(args: Value) -> Self {
        Self::Event {
            namespace: DEFAULT_NAMESPACE.into(),
            id: None,
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let mut chars = payload.chars();
        let kind = chars.next().ok_or(DecodeError::Empty)?;
        if matches!(kind, '5' | '6') {
            return Err(DecodeError::Binary);
        }
        let rest = chars.as_str();

        let (namespace, rest) = match rest.strip_prefix('/') {
            Some(_) => match rest.find(',') {
                Some(idx) => (rest[..idx].to_string(), &rest[idx + 1..]),
                // A namespace with nothing after it, e.g. "1/chat".
                None => (rest.to_string(), ""),
            },
            None => (DEFAULT_NAMESPACE.to_string(), rest),
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (id, json) = rest.split_at(digits);
        let id: Option<u64> = if id.is_empty() {
            None
        } else {
            Some(id.parse().map_err(|e: std::num::ParseIntError| payload_error(e.to_string()))?)
        };
        let data: Option<Value> = if json.is_empty() {
            None
        } else {
            Some(serde_json::from_str(json).map_err(|e| payload_error(e.to_string()))?)
        };

        Ok(match kind {
            '0' => Self::Connect { namespace, data },
            '1' => Self::Disconnect { namespace },
            '2' => Self::Event {
                namespace,
                id,
                args: data.ok_or_else(|| payload_error("event without arguments".into()))?,
            },
            '3' => Self::Ack {
                namespace,
                id: id.ok_or_else(|| payload_error("ack without id".into()))?,
                args: data.unwrap_or(Value::Array(vec![])),
            },
            '4' => Self::ConnectError { namespace, data },
            other => {
                return Err(DecodeError::UnknownType {
                    layer: "Socket.IO",
                    kind: other,
                });
            }
        })
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        let (kind, id, data) = match self {
            Self::Connect { data, .. } => ('0', None, data.as_ref()),
            Self::Disconnect { .. } => ('1', None, None),
            Self::Event { id, args, .. } => ('2', *id, Some(args)),
            Self::Ack { id, args, .. } => ('3', Some(*id), Some(args)),
            Self::ConnectError { data, .. } => ('4', None, data.as_ref()),
        };
        out.push(kind);
        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Wrap into the Engine.IO message that carries it.
    pub fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }
}

fn payload_error(reason: String) -> DecodeError {
    DecodeError::Payload {
        layer: "Socket.IO",
        reason,
    }
}
