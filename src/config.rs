//! Configuration loading and merging.
//!
//! Config is loaded from two TOML files, the workspace file taking precedence:
//! 1. User-level: `~/.muxlog/config.toml`
//! 2. Workspace-level: `<cwd>/.muxlog/config.toml`, or the file given with `--config`
//!
//! Command line flags are applied on top by the binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use nix::sys::signal::Signal;
use serde::Deserialize;

use crate::error::{ConfigError, Error, Result};
use crate::logger::{DEFAULT_PREFIX_LENGTH, DEFAULT_TIMESTAMP_FORMAT, LoggerOptions};
use crate::output::DEFAULT_MAX_BUFFER_LINES;
use crate::shutdown::{DEFAULT_KILL_TIMEOUT, ShutdownOptions};

const CONFIG_DIR: &str = ".muxlog";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_STREAM_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub logger: LoggerOptions,
    pub max_buffer_lines: usize,
    pub shutdown: ShutdownOptions,
    /// Lines a lagging output subscriber may fall behind
    pub stream_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        merge_config(None, None)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    logger: Option<RawLogger>,
    grid: Option<RawGrid>,
    shutdown: Option<RawShutdown>,
    streams: Option<RawStreams>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLogger {
    prefix: Option<String>,
    #[serde(alias = "timestampFormat")]
    timestamp_format: Option<String>,
    #[serde(alias = "prefixLength")]
    prefix_length: Option<usize>,
    colors: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGrid {
    #[serde(alias = "maxBufferLines")]
    max_buffer_lines: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RawShutdown {
    signal: Option<String>,
    #[serde(alias = "timeoutMs")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStreams {
    capacity: Option<usize>,
}

/// Parse a signal name such as `SIGTERM`, `term` or `INT`
pub fn parse_signal(value: &str) -> Result<Signal> {
    let upper = value.trim().to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).map_err(|_| Error::InvalidValue {
        what: "signal",
        value: value.to_string(),
    })
}

/// Kill timeout from milliseconds, 0 meaning no timeout
pub fn timeout_from_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}

fn read_toml(path: &Path) -> std::result::Result<Option<RawConfig>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if contents.trim().is_empty() {
        return Ok(None);
    }
    toml::from_str::<RawConfig>(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Read an optional config file, warning about files that cannot be used
fn read_optional(path: &Path) -> Option<RawConfig> {
    match read_toml(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring config file");
            None
        }
    }
}

fn merge_config(user: Option<RawConfig>, workspace: Option<RawConfig>) -> Config {
    let workspace_logger = workspace.as_ref().and_then(|c| c.logger.as_ref());
    let user_logger = user.as_ref().and_then(|c| c.logger.as_ref());
    let prefix = workspace_logger
        .and_then(|l| l.prefix.clone())
        .or_else(|| user_logger.and_then(|l| l.prefix.clone()));
    let timestamp_format = workspace_logger
        .and_then(|l| l.timestamp_format.clone())
        .or_else(|| user_logger.and_then(|l| l.timestamp_format.clone()))
        .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string());
    let prefix_length = workspace_logger
        .and_then(|l| l.prefix_length)
        .or_else(|| user_logger.and_then(|l| l.prefix_length))
        .unwrap_or(DEFAULT_PREFIX_LENGTH);
    let colors = workspace_logger
        .and_then(|l| l.colors)
        .or_else(|| user_logger.and_then(|l| l.colors))
        .unwrap_or(true);

    let max_buffer_lines = workspace
        .as_ref()
        .and_then(|c| c.grid.as_ref())
        .and_then(|g| g.max_buffer_lines)
        .or_else(|| {
            user.as_ref()
                .and_then(|c| c.grid.as_ref())
                .and_then(|g| g.max_buffer_lines)
        })
        .unwrap_or(DEFAULT_MAX_BUFFER_LINES);

    let workspace_shutdown = workspace.as_ref().and_then(|c| c.shutdown.as_ref());
    let user_shutdown = user.as_ref().and_then(|c| c.shutdown.as_ref());
    let signal = workspace_shutdown
        .and_then(|s| s.signal.clone())
        .or_else(|| user_shutdown.and_then(|s| s.signal.clone()))
        .and_then(|name| match parse_signal(&name) {
            Ok(signal) => Some(signal),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring configured shutdown signal");
                None
            }
        })
        .unwrap_or(Signal::SIGINT);
    let timeout = match workspace_shutdown
        .and_then(|s| s.timeout_ms)
        .or_else(|| user_shutdown.and_then(|s| s.timeout_ms))
    {
        Some(millis) => timeout_from_millis(millis),
        None => Some(DEFAULT_KILL_TIMEOUT),
    };

    let stream_capacity = workspace
        .as_ref()
        .and_then(|c| c.streams.as_ref())
        .and_then(|s| s.capacity)
        .or_else(|| {
            user.as_ref()
                .and_then(|c| c.streams.as_ref())
                .and_then(|s| s.capacity)
        })
        .unwrap_or(DEFAULT_STREAM_CAPACITY);

    Config {
        logger: LoggerOptions {
            prefix,
            timestamp_format,
            prefix_length,
            colors,
        },
        max_buffer_lines,
        shutdown: ShutdownOptions { signal, timeout },
        stream_capacity,
    }
}

fn config_path_from_root(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR).join(CONFIG_FILE)
}

pub fn user_config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(config_path_from_root(&home))
}

/// Load the user config and the workspace config under `root`
///
/// An `explicit` path replaces the workspace file and must exist and parse.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<Config> {
    load_config_from(user_config_path().as_deref(), root, explicit)
}

fn load_config_from(user: Option<&Path>, root: &Path, explicit: Option<&Path>) -> Result<Config> {
    let user_config = user.and_then(read_optional);
    let workspace_config = match explicit {
        Some(path) => match read_toml(path)? {
            Some(raw) => Some(raw),
            None if path.exists() => None,
            None => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                }
                .into());
            }
        },
        None => read_optional(&config_path_from_root(root)),
    };
    Ok(merge_config(user_config, workspace_config))
}
