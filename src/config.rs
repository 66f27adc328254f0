//! Console configuration.
//!
//! Read from an optional JSON file, then overridden from the environment.
//! Every field has a default, so an empty object `{}` is a valid file.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use hyper::Uri;
use serde::Deserialize;
use thiserror::Error;

use crate::export::DEFAULT_REPORT_TITLE;

pub const ENV_LISTEN: &str = "SIM_CONSOLE_LISTEN";
pub const ENV_ENGINE_URL: &str = "SIM_CONSOLE_ENGINE_URL";
pub const ENV_ENGINE_TIMEOUT_MS: &str = "SIM_CONSOLE_ENGINE_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Address the console HTTP service binds to
    #[serde(default = "ConsoleConfig::default_listen")]
    pub listen: SocketAddr,

    /// Execution engine endpoint receiving command POSTs
    #[serde(default = "ConsoleConfig::default_engine_url")]
    pub engine_url: String,

    /// Give up on an engine reply after this long. No limit when unset.
    #[serde(default)]
    pub engine_timeout_ms: Option<u64>,

    /// Pending messages the session queue holds before senders wait
    #[serde(default = "ConsoleConfig::default_queue_depth")]
    pub queue_depth: usize,

    #[serde(default = "ConsoleConfig::default_report_title")]
    pub report_title: String,
}

impl ConsoleConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 3030))
    }

    fn default_engine_url() -> String {
        "http://127.0.0.1:5000/".to_string()
    }

    fn default_queue_depth() -> usize {
        32
    }

    fn default_report_title() -> String {
        DEFAULT_REPORT_TITLE.to_string()
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: ConsoleConfig = serde_json::from_str(text)?;
        config.validate()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// File (if any), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_LISTEN) {
            self.listen = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: ENV_LISTEN, value })?;
        }
        if let Some(value) = lookup(ENV_ENGINE_URL) {
            self.engine_url = value;
        }
        if let Some(value) = lookup(ENV_ENGINE_TIMEOUT_MS) {
            let ms = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: ENV_ENGINE_TIMEOUT_MS, value })?;
            self.engine_timeout_ms = Some(ms);
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        self.engine_uri()?;
        if self.queue_depth == 0 {
            return Err(ConfigError::InvalidValue {
                key: "queue_depth",
                value: "0".to_string(),
            });
        }
        Ok(self)
    }

    pub fn engine_uri(&self) -> Result<Uri, ConfigError> {
        let uri: Uri = self.engine_url.parse().map_err(|_| ConfigError::InvalidValue {
            key: "engine_url",
            value: self.engine_url.clone(),
        })?;
        if uri.scheme_str() != Some("http") {
            return Err(ConfigError::InvalidValue {
                key: "engine_url",
                value: self.engine_url.clone(),
            });
        }
        Ok(uri)
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            engine_url: Self::default_engine_url(),
            engine_timeout_ms: None,
            queue_depth: Self::default_queue_depth(),
            report_title: Self::default_report_title(),
        }
    }
}
