pub mod events;
pub mod socketio;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use events::{ClientEvent, EventError, LogPayload, LogsUpdate, ServerEvent, StatusUpdate};

/// Build or start outcome of a worker as reported by the server.
///
/// The wire value is a nullable boolean. Anything that is not a boolean
/// decodes as `Pending`, so decoding never fails on this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    Success,
    Failure,
    #[default]
    Pending,
}

impl Outcome {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Outcome::Success,
            Value::Bool(false) => Outcome::Failure,
            _ => Outcome::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Pending => "pending",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Outcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Outcome::Success => serializer.serialize_bool(true),
            Outcome::Failure => serializer.serialize_bool(false),
            Outcome::Pending => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Outcome::from_value(&value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerRecord {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub url: String,
    #[serde(default)]
    pub is_build_success: Outcome,
    #[serde(default)]
    pub is_start_success: Outcome,
    #[serde(default)]
    pub last_commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuildLogEntry {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl BuildLogEntry {
    pub fn label(&self, index: usize) -> String {
        match self.command.as_deref() {
            Some(command) if !command.is_empty() => command.to_string(),
            _ => format!("cmd-{index}"),
        }
    }

    pub fn output_text(&self) -> &str {
        match self.output.as_deref() {
            Some(output) if !output.is_empty() => output,
            _ => "(No output)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SystemLogLevel {
    #[default]
    Info,
    Error,
    Warning,
    Success,
    Header,
    Muted,
}

impl SystemLogLevel {
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some("error") => SystemLogLevel::Error,
            Some("warning") => SystemLogLevel::Warning,
            Some("success") => SystemLogLevel::Success,
            Some("header") => SystemLogLevel::Header,
            Some("grey") => SystemLogLevel::Muted,
            _ => SystemLogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemLogLevel::Info => "info",
            SystemLogLevel::Error => "error",
            SystemLogLevel::Warning => "warning",
            SystemLogLevel::Success => "success",
            SystemLogLevel::Header => "header",
            SystemLogLevel::Muted => "grey",
        }
    }
}

impl fmt::Display for SystemLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SystemLogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SystemLogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(SystemLogLevel::from_value(&value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemLogEntry {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub log_type: SystemLogLevel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Build,
    Start,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Build => "build",
            LogKind::Start => "start",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "build" => Ok(LogKind::Build),
            "start" => Ok(LogKind::Start),
            other => Err(format!("unknown log type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WorkersResponse {
    #[serde(default, deserialize_with = "deserialize_records")]
    pub tentacles: Vec<WorkerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BuildLogsResponse {
    #[serde(default, deserialize_with = "deserialize_lenient_list")]
    pub logs: Vec<BuildLogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StartLogsResponse {
    #[serde(default, deserialize_with = "deserialize_lines")]
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SystemLogsResponse {
    #[serde(default, deserialize_with = "deserialize_lenient_list")]
    pub logs: Vec<SystemLogEntry>,
}

/// Turn any JSON value into a list of lines. Strings pass through, other
/// scalars are stringified, and a non-array value yields an empty list.
pub fn lines_from_value(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(line) => line.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect()
}

/// Decode a JSON array leniently: a non-array decodes as empty and
/// malformed elements are skipped.
pub fn list_from_value<T: serde::de::DeserializeOwned>(value: &Value) -> Vec<T> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

fn deserialize_lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(lines_from_value(&value))
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Must be an array; elements that fail to decode are dropped.
pub(crate) fn deserialize_records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn deserialize_lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(list_from_value(&value))
}
