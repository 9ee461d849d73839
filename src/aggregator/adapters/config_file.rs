//! Loads aggregator configuration from a JSON document on disk.

use crate::aggregator::domain::AggregatorConfig;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The path does not name a file.
    #[error("configuration path {0} does not name a file")]
    InvalidPath(Utf8PathBuf),

    /// The file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// Configuration path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The document is not a valid aggregator configuration.
    #[error("invalid configuration {path}: {source}")]
    Parse {
        /// Configuration path.
        path: Utf8PathBuf,
        /// Decoding or validation failure.
        source: serde_json::Error,
    },
}

/// Reads and validates the configuration at `path`.
///
/// The document has the shape `{"servers": [ ... ]}`; see
/// [`AggregatorConfig`] for the validation rules.
///
/// # Errors
///
/// Returns [`ConfigLoadError`] when the file cannot be read or does not hold
/// a valid configuration.
pub fn load_config(path: &Utf8Path) -> Result<AggregatorConfig, ConfigLoadError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| ConfigLoadError::InvalidPath(path.to_owned()))?;
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    let contents = Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name))
        .map_err(|source| ConfigLoadError::Io {
            path: path.to_owned(),
            source,
        })?;

    let config: AggregatorConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
            path: path.to_owned(),
            source,
        })?;
    debug!(path = %path, servers = config.servers().len(), "loaded configuration");
    Ok(config)
}
