//! Logging configuration for filemap
//!
//! The stores emit `tracing` events (replay summaries, torn-tail recovery,
//! skipped lines). This module wires those events to stdout and/or a daily
//! rolling file for applications that don't install a subscriber themselves.

use filemap_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_subscriber::{Layer, Registry};

const DEFAULT_LOG_FILE: &str = "filemap.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a file, rotated daily
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable format (default)
    Pretty,
    /// Single-line format
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level filter, in `EnvFilter` directive syntax
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Info level to stdout
    pub fn info() -> Self {
        Self::default()
    }

    /// Debug level to stdout
    pub fn debug() -> Self {
        Self::default().with_level("debug")
    }

    /// Warn level to stdout
    pub fn warn() -> Self {
        Self::default().with_level("warn")
    }

    /// Send output to a daily rolling file
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Send output to stdout and a daily rolling file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set log level filter
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    /// Installs the global subscriber described by this configuration.
    ///
    /// `RUST_LOG` overrides [`LogConfig::level`] when set. File output
    /// returns a guard that must be kept alive; dropping it stops the
    /// background writer. Fails with [`Error::InvalidConfig`] if the level
    /// doesn't parse or a global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use filemap::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().with_file("./logs/filemap.log").try_init()?;
    /// # Ok::<(), filemap::Error>(())
    /// ```
    pub fn try_init(self) -> Result<Option<WorkerGuard>> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                Error::InvalidConfig(format!("invalid log level {:?}: {}", self.level, e))
            })?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if matches!(self.output, LogOutput::Stdout | LogOutput::Both(_)) {
            layers.push(fmt_layer(self.format, std::io::stdout, true));
        }
        if let LogOutput::File(path) | LogOutput::Both(path) = &self.output {
            let (directory, file_name) = split_log_path(path);
            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, worker) = tracing_appender::non_blocking(appender);
            layers.push(fmt_layer(self.format, writer, false));
            guard = Some(worker);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| Error::InvalidConfig(format!("failed to install subscriber: {}", e)))?;

        Ok(guard)
    }
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (directory, file_name)
}
