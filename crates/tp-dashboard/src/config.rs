//! Runtime configuration: command-line flags first, then `TP_*` environment
//! variables, then built-in defaults.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RECONNECT_MAX_SECS: u64 = 10;
pub const DEFAULT_NOTIFICATION_TTL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid server url {value:?}: {reason}")]
    ServerUrl { value: String, reason: String },
    #[error("server url must use http or https, got {0}")]
    Scheme(String),
    #[error("{name} must be a positive number of seconds, got {value:?}")]
    Seconds { name: &'static str, value: String },
}

#[derive(Parser, Debug, Default)]
#[command(name = "tp-dashboard", about = "Live status and log tailing for tentacle workers")]
pub struct Args {
    /// Base URL of the tentacle preview server.
    #[arg(long, default_value = "")]
    pub server: String,
    /// Seconds between fallback pulls while the push channel is down.
    #[arg(long, default_value = "")]
    pub poll_interval: String,
    /// Where to write the rendered dashboard page.
    #[arg(long, default_value = "")]
    pub html_out: String,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
    #[arg(long, default_value = "")]
    pub reconnect_max: String,
    #[arg(long, default_value = "")]
    pub request_timeout: String,
    #[arg(long, default_value = "")]
    pub notification_ttl: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_url: Url,
    pub poll_interval: Duration,
    pub html_out: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub reconnect_max: Duration,
    pub request_timeout: Option<Duration>,
    pub notification_ttl: Duration,
}

impl Config {
    pub fn for_server(server_url: Url) -> Self {
        Self {
            server_url,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            html_out: None,
            log_dir: None,
            log_level: "info".to_string(),
            reconnect_max: Duration::from_secs(DEFAULT_RECONNECT_MAX_SECS),
            request_timeout: None,
            notification_ttl: Duration::from_secs(DEFAULT_NOTIFICATION_TTL_SECS),
        }
    }
}

pub fn load_config(args: &Args) -> Result<Config, ConfigError> {
    load_config_with(args, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(args: &Args, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |flag: &str, key: &str| -> Option<String> {
        if !flag.trim().is_empty() {
            return Some(flag.trim().to_string());
        }
        env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let server_raw =
        pick(&args.server, "TP_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let server_url = parse_server_url(&server_raw)?;

    let poll_interval = match pick(&args.poll_interval, "TP_POLL_INTERVAL_SECS") {
        Some(value) => parse_seconds("poll interval", &value)?,
        None => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
    };
    let reconnect_max = match pick(&args.reconnect_max, "TP_RECONNECT_MAX_SECS") {
        Some(value) => parse_seconds("reconnect max", &value)?,
        None => Duration::from_secs(DEFAULT_RECONNECT_MAX_SECS),
    };
    let request_timeout = pick(&args.request_timeout, "TP_REQUEST_TIMEOUT_SECS")
        .map(|value| parse_seconds("request timeout", &value))
        .transpose()?;
    let notification_ttl = match pick(&args.notification_ttl, "TP_NOTIFICATION_TTL_SECS") {
        Some(value) => parse_seconds("notification ttl", &value)?,
        None => Duration::from_secs(DEFAULT_NOTIFICATION_TTL_SECS),
    };

    let log_level = if args.debug || env("TP_DEBUG").as_deref().and_then(parse_bool_flag) == Some(true)
    {
        "debug".to_string()
    } else {
        env("TP_LOG_LEVEL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "info".to_string())
    };

    Ok(Config {
        server_url,
        poll_interval,
        html_out: pick(&args.html_out, "TP_HTML_OUT").map(PathBuf::from),
        log_dir: pick(&args.log_dir, "TP_LOG_DIR").map(PathBuf::from),
        log_level,
        reconnect_max,
        request_timeout,
        notification_ttl,
    })
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|err| ConfigError::ServerUrl {
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Scheme(url.scheme().to_string()));
    }
    // Paths are joined onto the base, so it must end with a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_seconds(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Seconds {
            name,
            value: value.to_string(),
        }),
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
