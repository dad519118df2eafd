use std::io;
use std::path::PathBuf;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Terminal or process I/O failed
    #[error(transparent)]
    Io(#[from] io::Error),

    /// `LogOutput::handle` was given an empty command list
    #[error("at least one command is required")]
    NoCommands,

    /// `LogOutput::handle` was called twice on the same instance
    #[error("commands are already being rendered")]
    AlreadyHandled,

    /// Drawing the grid failed
    #[error("failed to render: {0}")]
    Render(String),

    /// The grid event loop task panicked or was cancelled
    #[error("grid renderer stopped unexpectedly: {0}")]
    RendererStopped(#[from] tokio::task::JoinError),

    /// Sending the signal to the host process failed
    #[error("failed to signal host process: {0}")]
    HostSignal(#[source] nix::Error),

    /// Command line or configuration value could not be parsed
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: String },

    /// Configuration file error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
