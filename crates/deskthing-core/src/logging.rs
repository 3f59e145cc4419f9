//! Log records forwarded by apps and clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Level;

/// Log level vocabulary shared by apps and clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "message")]
    Message,
    #[default]
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "warning")]
    Warn,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "debugging")]
    Debug,
    #[serde(rename = "fatal")]
    Fatal,
}

impl LogLevel {
    /// Every level, in wire order.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Message,
        LogLevel::Log,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Debug,
        LogLevel::Fatal,
    ];

    /// Wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Log => "log",
            Self::Warn => "warning",
            Self::Error => "error",
            Self::Debug => "debugging",
            Self::Fatal => "fatal",
        }
    }

    /// The tracing level a host should re-emit this record at.
    pub fn as_tracing_level(&self) -> Level {
        match self {
            Self::Message | Self::Log => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error | Self::Fatal => Level::ERROR,
            Self::Debug => Level::DEBUG,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known log level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLogLevel(s.to_string()))
    }
}

/// Which part of the system produced a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDomain {
    App,
    Server,
    Connector,
    Client,
}

/// A structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub level: LogLevel,
    pub message: String,
    /// Only logged when debugging is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<LogDomain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Log {
    /// Creates a record with only a level and message.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            data: None,
            source: None,
            function: None,
            domain: None,
            date: None,
        }
    }

    /// Builder: set the source app.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builder: set the producing domain.
    pub fn with_domain(mut self, domain: LogDomain) -> Self {
        self.domain = Some(domain);
        self
    }
}
