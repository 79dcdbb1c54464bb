//! Socket.IO v5 over Engine.IO v4 text framing, default namespace only.
//!
//! An Engine.IO packet is a one-digit type followed by data. Type `4`
//! (message) wraps a Socket.IO packet: a one-digit type, an optional
//! namespace terminated by `,`, an optional numeric ack id, then JSON.

use crate::events::{ClientEvent, EventError, ServerEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const ENGINE_IO_VERSION: u8 = 4;
pub const SOCKET_IO_PATH: &str = "/socket.io/";
pub const DEFAULT_MAX_PACKET_BYTES: usize = 1_000_000;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("packet exceeds max size: {size} > {max}")]
    Oversized { size: usize, max: usize },
    #[error("unknown engine.io packet type: {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type: {0:?}")]
    UnknownSocketType(char),
    #[error("namespace not supported: {0}")]
    Namespace(String),
    #[error("packet decode failed: {0}")]
    Decode(String),
    #[error("packet encode failed: {0}")]
    Encode(String),
}

/// Body of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

impl Handshake {
    /// How long the server may stay silent before the connection counts as dead.
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        sid: Option<String>,
    },
    Disconnect,
    Event {
        name: String,
        payload: Option<Value>,
        ack_id: Option<u64>,
    },
    Ack {
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        message: String,
    },
}

impl SocketPacket {
    /// Interpret an event packet as a typed server event.
    pub fn into_server_event(self) -> Option<Result<ServerEvent, EventError>> {
        match self {
            SocketPacket::Event { name, payload, .. } => Some(ServerEvent::decode(&name, payload)),
            _ => None,
        }
    }
}

pub fn decode_packet(text: &str, max_packet_bytes: usize) -> Result<EnginePacket, PacketError> {
    if text.len() > max_packet_bytes {
        return Err(PacketError::Oversized {
            size: text.len(),
            max: max_packet_bytes,
        });
    }
    let mut chars = text.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|err| PacketError::Decode(err.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket_packet(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PacketError::UnknownEngineType(other)),
    }
}

fn decode_socket_packet(text: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let mut rest = chars.as_str();

    if let Some(stripped) = rest.strip_prefix('/') {
        let (namespace, remainder) = match stripped.split_once(',') {
            Some((namespace, remainder)) => (namespace, remainder),
            None => (stripped, ""),
        };
        if !namespace.is_empty() {
            return Err(PacketError::Namespace(format!("/{namespace}")));
        }
        rest = remainder;
    }

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        let id = rest[..digits]
            .parse::<u64>()
            .map_err(|err| PacketError::Decode(err.to_string()))?;
        rest = &rest[digits..];
        Some(id)
    } else {
        None
    };

    let data = if rest.trim().is_empty() {
        None
    } else {
        Some(
            serde_json::from_str::<Value>(rest)
                .map_err(|err| PacketError::Decode(err.to_string()))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect {
            sid: data
                .as_ref()
                .and_then(|value| value.get("sid"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let Some(Value::Array(mut args)) = data else {
                return Err(PacketError::Decode("event data must be an array".to_string()));
            };
            if args.is_empty() {
                return Err(PacketError::Decode("event without a name".to_string()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(PacketError::Decode(format!(
                        "event name must be a string, got {other}"
                    )))
                }
            };
            let payload = if args.is_empty() {
                None
            } else {
                Some(args.remove(0))
            };
            Ok(SocketPacket::Event {
                name,
                payload,
                ack_id,
            })
        }
        '3' => {
            let args = match data {
                Some(Value::Array(args)) => args,
                _ => Vec::new(),
            };
            Ok(SocketPacket::Ack {
                ack_id: ack_id.unwrap_or_default(),
                args,
            })
        }
        '4' => {
            let message = match data {
                Some(Value::String(message)) => message,
                Some(value) => value
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string()),
                None => "connection refused".to_string(),
            };
            Ok(SocketPacket::ConnectError { message })
        }
        other => Err(PacketError::UnknownSocketType(other)),
    }
}

/// Socket.IO connect request for the default namespace.
pub fn encode_connect() -> String {
    "40".to_string()
}

pub fn encode_pong(data: &str) -> String {
    format!("3{data}")
}

pub fn encode_event(event: &ClientEvent, max_packet_bytes: usize) -> Result<String, PacketError> {
    let mut args = vec![Value::String(event.name().to_string())];
    if let Some(payload) = event.payload() {
        args.push(payload);
    }
    let body =
        serde_json::to_string(&Value::Array(args)).map_err(|err| PacketError::Encode(err.to_string()))?;
    let frame = format!("42{body}");
    if frame.len() > max_packet_bytes {
        return Err(PacketError::Oversized {
            size: frame.len(),
            max: max_packet_bytes,
        });
    }
    Ok(frame)
}
