//! Tracing setup shared by the deskthing crates.
//!
//! Hosts embedding the router call [`init_tracing`] once at startup:
//!
//! ```ignore
//! use deskthing_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::daemon()).expect("failed to initialize tracing");
//! ```
//!
//! Legacy upgrade failures are emitted under the [`PROTOCOL_AUDIT_TARGET`]
//! target so they can be filtered separately, e.g.
//! `RUST_LOG=deskthing=info,deskthing::protocol_audit=error`.

use std::io;

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, MakeWriter, format::FmtSpan},
    prelude::*,
};

/// Root target prefix for every deskthing crate.
pub const ROOT_TARGET: &str = "deskthing";

/// Target used for protocol audit records (undocumented legacy shapes).
pub const PROTOCOL_AUDIT_TARGET: &str = "deskthing::protocol_audit";

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive.
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for tracing logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Human-readable multi-line format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON lines, one record per envelope event.
    Json,
}

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level applied to the deskthing targets when `RUST_LOG` is not set.
    pub default_level: Level,
    /// Output format for log records.
    pub output_format: TracingOutputFormat,
    /// Whether to include file/line information.
    pub include_location: bool,
    /// Whether to include the target (module path).
    pub include_target: bool,
    /// Whether to include timestamps.
    pub include_timestamp: bool,
    /// Whether to emit a record when a span closes (one per dispatch).
    pub include_span_events: bool,
    /// Custom env filter directive; overrides `default_level` if set.
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Pretty,
            include_location: false,
            include_target: true,
            include_timestamp: true,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Verbose single-line output for local debugging of envelope flows.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Compact,
            include_location: true,
            include_target: true,
            include_timestamp: false,
            include_span_events: false,
            env_filter: None,
        }
    }

    /// Structured JSON output for a long-running host process.
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Json,
            include_location: true,
            include_target: true,
            include_timestamp: true,
            include_span_events: true,
            env_filter: None,
        }
    }

    /// Set the default log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set a custom env filter directive.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// The directive used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn default_directive(&self) -> String {
        format!(
            "{ROOT_TARGET}={level},{PROTOCOL_AUDIT_TARGET}=error",
            level = self.default_level
        )
    }

    fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(ref filter) = self.env_filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.default_directive())?),
        }
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the env filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = build_subscriber(&config, io::stderr)?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Builds the subscriber described by `config` without installing it.
///
/// Hosts that route logs elsewhere, and tests, pass their own `writer`.
pub fn build_subscriber<W>(
    config: &TracingConfig,
    writer: W,
) -> Result<impl Subscriber + Send + Sync + 'static, TracingError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = config.build_filter()?;
    let layer = config.fmt_layer(writer).with_filter(filter);
    Ok(tracing_subscriber::registry().with(layer))
}

impl TracingConfig {
    /// Dispatch spans record their elapsed time before closing, so only
    /// the close event is worth emitting.
    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn fmt_layer<W>(&self, writer: W) -> Box<dyn Layer<Registry> + Send + Sync + 'static>
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target)
            .with_span_events(self.span_events());

        match (self.output_format, self.include_timestamp) {
            (TracingOutputFormat::Pretty, true) => layer.pretty().boxed(),
            (TracingOutputFormat::Pretty, false) => layer.pretty().without_time().boxed(),
            (TracingOutputFormat::Compact, true) => layer.compact().boxed(),
            (TracingOutputFormat::Compact, false) => layer.compact().without_time().boxed(),
            // Envelope fields live on the dispatch and mailbox spans.
            (TracingOutputFormat::Json, true) => {
                layer.json().with_current_span(true).with_span_list(false).boxed()
            }
            (TracingOutputFormat::Json, false) => layer
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .without_time()
                .boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.output_format, TracingOutputFormat::Pretty);
        assert!(!config.include_span_events);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn daemon_config_emits_json_spans() {
        let config = TracingConfig::daemon();
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert!(config.include_span_events);
    }

    #[test]
    fn default_directive_keeps_audit_target() {
        let config = TracingConfig::default().with_level(Level::DEBUG);
        assert_eq!(
            config.default_directive(),
            "deskthing=DEBUG,deskthing::protocol_audit=error"
        );
    }

    #[test]
    fn explicit_filter_wins() {
        let config = TracingConfig::cli_debug().with_env_filter("deskthing_router=trace");
        assert!(config.build_filter().is_ok());
        assert_eq!(config.env_filter.as_deref(), Some("deskthing_router=trace"));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[test]
    fn json_output_filters_audit_target() {
        let config = TracingConfig::default()
            .with_format(TracingOutputFormat::Json)
            .with_level(Level::INFO);
        let config = config.clone().with_env_filter(config.default_directive());
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = build_subscriber(&config, move || writer.clone()).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "deskthing::router", domain = "task", "Dispatched");
            tracing::warn!(target: PROTOCOL_AUDIT_TARGET, "Skipped");
            tracing::error!(target: PROTOCOL_AUDIT_TARGET, domain = "settings", "Upgrade failed");
            tracing::info!(target: "hyper", "Ignored");
        });

        let lines = captured.lines();
        let targets: Vec<_> = lines.iter().map(|l| l["target"].as_str().unwrap()).collect();
        assert_eq!(targets, ["deskthing::router", PROTOCOL_AUDIT_TARGET]);
        assert_eq!(lines[0]["fields"]["domain"], "task");
        assert_eq!(lines[1]["level"], "ERROR");
    }

    #[test]
    fn span_close_is_the_only_span_event() {
        assert_eq!(TracingConfig::daemon().span_events(), FmtSpan::CLOSE);
        assert_eq!(TracingConfig::cli_debug().span_events(), FmtSpan::NONE);
    }

    #[test]
    fn invalid_filter_is_reported() {
        let config = TracingConfig::default().with_env_filter("deskthing=bogus");
        assert!(matches!(config.build_filter(), Err(TracingError::EnvFilter(_))));
    }
}
