use crate::{lines_from_value, list_from_value, BuildLogEntry, LogKind, Outcome, SystemLogEntry, WorkerRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const REQUEST_STATUS: &str = "request_status";
pub const REQUEST_LOGS: &str = "request_logs";
pub const STATUS_UPDATE: &str = "status_update";
pub const LOGS_UPDATE: &str = "logs_update";
pub const SYSTEM_LOGS_UPDATE: &str = "system_logs_update";
pub const CONNECTION_STATUS: &str = "connection_status";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("unknown event: {0}")]
    Unknown(String),
    #[error("event {event} is missing its payload")]
    MissingPayload { event: String },
    #[error("event {event} has an invalid payload: {reason}")]
    InvalidPayload { event: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    RequestStatus,
    RequestLogs { tentacle: String, log_type: LogKind },
}

#[derive(Serialize)]
struct RequestLogsPayload<'a> {
    tentacle: &'a str,
    log_type: LogKind,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RequestStatus => REQUEST_STATUS,
            ClientEvent::RequestLogs { .. } => REQUEST_LOGS,
        }
    }

    pub fn payload(&self) -> Option<Value> {
        match self {
            ClientEvent::RequestStatus => None,
            ClientEvent::RequestLogs { tentacle, log_type } => serde_json::to_value(
                RequestLogsPayload {
                    tentacle,
                    log_type: *log_type,
                },
            )
            .ok(),
        }
    }
}

/// `status_update` carries either the whole table or one worker's statuses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StatusUpdate {
    Snapshot {
        #[serde(deserialize_with = "crate::deserialize_records")]
        tentacles: Vec<WorkerRecord>,
    },
    Delta {
        tentacle: String,
        #[serde(default)]
        build_status: Outcome,
        #[serde(default)]
        start_status: Outcome,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsUpdate {
    pub tentacle: String,
    #[serde(default)]
    pub log_type: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub logs: Value,
}

/// A log delivery after interpretation of `log_type` and `stream`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    Build(Vec<BuildLogEntry>),
    Start(Vec<String>),
    StartLine(String),
}

impl LogPayload {
    pub fn kind(&self) -> LogKind {
        match self {
            LogPayload::Build(_) => LogKind::Build,
            LogPayload::Start(_) | LogPayload::StartLine(_) => LogKind::Start,
        }
    }
}

impl LogsUpdate {
    /// Interpret the update. Streaming only exists for start logs and carries
    /// one line in `logs.output`; everything else is a full replace. Returns
    /// `None` for deliveries that have no visible effect.
    pub fn payload(&self) -> Option<LogPayload> {
        let kind = self.log_type.parse::<LogKind>().ok()?;
        if self.stream {
            if kind != LogKind::Start {
                return None;
            }
            let line = self.logs.get("output").and_then(Value::as_str)?;
            if line.is_empty() {
                return None;
            }
            return Some(LogPayload::StartLine(line.to_string()));
        }
        Some(match kind {
            LogKind::Build => LogPayload::Build(list_from_value(&self.logs)),
            LogKind::Start => LogPayload::Start(lines_from_value(&self.logs)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    StatusUpdate(StatusUpdate),
    LogsUpdate(LogsUpdate),
    SystemLogsUpdate(SystemLogEntry),
    ConnectionStatus(Value),
}

impl ServerEvent {
    pub fn decode(name: &str, payload: Option<Value>) -> Result<Self, EventError> {
        match name {
            STATUS_UPDATE => decode_payload(name, payload).map(ServerEvent::StatusUpdate),
            LOGS_UPDATE => decode_payload(name, payload).map(ServerEvent::LogsUpdate),
            SYSTEM_LOGS_UPDATE => decode_payload(name, payload).map(ServerEvent::SystemLogsUpdate),
            CONNECTION_STATUS => Ok(ServerEvent::ConnectionStatus(payload.unwrap_or(Value::Null))),
            other => Err(EventError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::StatusUpdate(_) => STATUS_UPDATE,
            ServerEvent::LogsUpdate(_) => LOGS_UPDATE,
            ServerEvent::SystemLogsUpdate(_) => SYSTEM_LOGS_UPDATE,
            ServerEvent::ConnectionStatus(_) => CONNECTION_STATUS,
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    name: &str,
    payload: Option<Value>,
) -> Result<T, EventError> {
    let value = match payload {
        Some(Value::Null) | None => {
            return Err(EventError::MissingPayload {
                event: name.to_string(),
            })
        }
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(|err| EventError::InvalidPayload {
        event: name.to_string(),
        reason: err.to_string(),
    })
}
