//! Process-wide structured logging.
//!
//! [`init_logging`] installs a `tracing-subscriber` formatter exactly once.
//! Output goes to stderr unless a log file is configured, since stdout
//! carries protocol traffic when the aggregator itself is served over stdio.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::OpenOptions;
use cap_std::fs_utf8::Dir;
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::fs::File;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Filter directive used when neither `RUST_LOG` nor the configuration sets
/// one.
pub const DEFAULT_FILTER: &str = "info";

static LOGGING: OnceCell<LoggingGuard> = OnceCell::new();

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::UnknownFormat(value.to_owned())),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    filter: String,
    format: LogFormat,
    file: Option<Utf8PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_owned(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Creates the default configuration: `info`, compact, stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter directive, for example `mcp_mashup=debug,info`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Appends log output to `path` instead of stderr.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Returns the configured filter directive.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Returns the output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Returns the log file, if one is configured.
    #[must_use]
    pub fn file(&self) -> Option<&Utf8Path> {
        self.file.as_deref()
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter {
        /// Rejected directive.
        directive: String,
        /// Parser message.
        reason: String,
    },

    /// The format name is not recognised.
    #[error("unknown log format {0:?}")]
    UnknownFormat(String),

    /// The log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        /// Log file path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Another global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Handle to the installed subscriber's output.
#[derive(Debug)]
pub struct LoggingGuard {
    format: LogFormat,
    file: Option<(Utf8PathBuf, Arc<File>)>,
}

impl LoggingGuard {
    /// Returns the active output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Returns the log file receiving output, if any.
    #[must_use]
    pub fn file(&self) -> Option<&Utf8Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Flushes buffered output to its destination.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while syncing the log file.
    pub fn flush(&self) -> std::io::Result<()> {
        match &self.file {
            Some((_, file)) => file.sync_all(),
            None => std::io::stderr().flush(),
        }
    }
}

/// Installs the global subscriber on first call; later calls return the
/// guard from the first call and ignore `config`.
///
/// A non-empty `RUST_LOG` takes precedence over the configured filter.
///
/// # Errors
///
/// Returns [`LoggingError`] when the filter is invalid, the log file cannot
/// be opened, or another subscriber was installed by someone else.
pub fn init_logging(config: &LoggingConfig) -> Result<&'static LoggingGuard, LoggingError> {
    LOGGING.get_or_try_init(|| install(config))
}

fn install(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let env_directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty());
    let filter = build_filter(config.filter(), env_directive.as_deref())?;

    let file = config
        .file()
        .map(|path| open_log_file(path).map(|handle| (path.to_owned(), Arc::new(handle))))
        .transpose()?;
    let writer = file.as_ref().map_or_else(
        || BoxMakeWriter::new(std::io::stderr),
        |(_, handle)| BoxMakeWriter::new(Arc::clone(handle)),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    let installed = match config.format() {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| LoggingError::Install(err.to_string()))?;

    tracing::debug!(
        format = config.format().as_str(),
        file = ?config.file(),
        "logging initialized"
    );
    Ok(LoggingGuard {
        format: config.format(),
        file,
    })
}

fn build_filter(configured: &str, env_directive: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directive = env_directive.unwrap_or(configured);
    EnvFilter::try_new(directive).map_err(|err| LoggingError::InvalidFilter {
        directive: directive.to_owned(),
        reason: err.to_string(),
    })
}

fn open_log_file(path: &Utf8Path) -> Result<File, LoggingError> {
    let to_error = |source| LoggingError::LogFile {
        path: path.to_owned(),
        source,
    };
    let file_name = path.file_name().ok_or_else(|| {
        to_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "log path must name a file",
        ))
    })?;
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(to_error)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(to_error)?;
    let file = dir
        .open_with(file_name, OpenOptions::new().create(true).append(true))
        .map_err(to_error)?;
    Ok(file.into_std())
}
