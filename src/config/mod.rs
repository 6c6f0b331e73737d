use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum accepted size of an inbound multipart body (10 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 << 20;

/// Default listen port when `BIND_ADDRESS` is not set
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FORWARD_URL must be set")]
    MissingForwardUrl,

    #[error("Invalid FORWARD_URL {value:?}: {reason}")]
    InvalidForwardUrl { value: String, reason: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime configuration for the relay service
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP server listens on (default: 0.0.0.0:8080)
    pub bind_address: SocketAddr,

    /// Downstream endpoint receiving the converted audio
    pub forward_url: Url,

    /// Default log filter when RUST_LOG is unset (default: "info")
    pub log_level: String,

    /// Maximum inbound multipart body size in bytes (default: 10 MiB)
    pub max_upload_size: usize,

    /// Converter executable, looked up on PATH unless absolute (default: "ffmpeg")
    pub converter_path: String,

    /// Directory holding staged uploads and conversion output
    pub temp_dir: PathBuf,

    /// Upper bound on a single converter run (default: unbounded)
    pub convert_timeout: Option<Duration>,

    /// Upper bound on the downstream call (default: unbounded)
    pub forward_timeout: Option<Duration>,
}

impl RelayConfig {
    /// Build a config with defaults for everything except the downstream URL.
    pub fn new(forward_url: Url) -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            forward_url,
            log_level: "info".to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            converter_path: "ffmpeg".to_string(),
            temp_dir: env::temp_dir(),
            convert_timeout: None,
            forward_timeout: None,
        }
    }

    /// Load `.env.local` then `.env`. Variables already present in the
    /// process environment are never overwritten, so `.env.local` wins over
    /// `.env`. Returns whether `.env.local` was found.
    pub fn load_env_files() -> bool {
        let local = dotenvy::from_filename(".env.local").is_ok();
        dotenvy::dotenv().ok();
        local
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let forward_url = lookup("FORWARD_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingForwardUrl)?;
        let mut config = Self::new(parse_forward_url(forward_url.trim())?);

        if let Some(v) = lookup("BIND_ADDRESS") {
            config.bind_address = parse_bind_address(&v)?;
        }

        if let Some(v) = lookup("LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            config.log_level = v.trim().to_lowercase();
        }

        if let Some(v) = lookup("MAX_UPLOAD_SIZE") {
            config.max_upload_size = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "MAX_UPLOAD_SIZE",
                value: v.clone(),
            })?;
        }

        if let Some(v) = lookup("CONVERTER_PATH").filter(|v| !v.trim().is_empty()) {
            config.converter_path = v.trim().to_string();
        }

        if let Some(v) = lookup("TEMP_DIR").filter(|v| !v.trim().is_empty()) {
            config.temp_dir = PathBuf::from(v.trim());
        }

        config.convert_timeout = parse_timeout("CONVERT_TIMEOUT_SECS", lookup("CONVERT_TIMEOUT_SECS"))?;
        config.forward_timeout = parse_timeout("FORWARD_TIMEOUT_SECS", lookup("FORWARD_TIMEOUT_SECS"))?;

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_address.set_port(port);
        self
    }
}

/// Accepts `host:port`, `:port` or a bare port number.
pub fn parse_bind_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidValue {
        key: "BIND_ADDRESS",
        value: value.to_string(),
    };

    let port_only = value.strip_prefix(':').unwrap_or(value);
    if let Ok(port) = port_only.parse::<u16>() {
        return Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)));
    }

    value.parse().map_err(|_| invalid())
}

pub fn parse_forward_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidForwardUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidForwardUrl {
            value: value.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn parse_timeout(key: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") | Some("0") => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidValue {
                key,
                value: v.to_string(),
            }),
    }
}
