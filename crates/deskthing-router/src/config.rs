//! Router configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use deskthing_protocol::MAX_MESSAGE_SIZE;

use crate::error::{RouterError, RouterResult};

/// Router configuration.
///
/// Loadable from TOML; missing keys keep their defaults.
///
/// ```toml
/// mailbox_capacity = 64
/// handler_timeout_ms = 5000
/// max_message_size = 1048576
/// log_unhandled = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Envelopes buffered per mailbox before `send` waits.
    pub mailbox_capacity: usize,

    /// Time a handler may run before it is abandoned, in milliseconds.
    pub handler_timeout_ms: u64,

    /// Upper bound for encoded envelopes.
    pub max_message_size: usize,

    /// Whether the default fallback logs unrouted envelopes.
    pub log_unhandled: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
            handler_timeout_ms: 30_000,
            max_message_size: MAX_MESSAGE_SIZE,
            log_unhandled: true,
        }
    }
}

impl RouterConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    /// Builder: set mailbox capacity. Zero is raised to one.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Builder: set handler timeout.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Builder: set max message size.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Builder: set whether unrouted envelopes are logged.
    pub fn with_log_unhandled(mut self, log: bool) -> Self {
        self.log_unhandled = log;
        self
    }

    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> RouterResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RouterError::config(format!("failed to parse config: {}", e)))?;
        let capacity = config.mailbox_capacity;
        Ok(config.with_mailbox_capacity(capacity))
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RouterError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}
