mod process;

pub use process::ProcessCommand;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use nix::sys::signal::Signal;
use ratatui::style::Color;

/// Subscription to one output stream of a command
///
/// Yields chunks in emission order and ends when the process closes the pipe.
pub type ChunkStream = BoxStream<'static, String>;

/// Completion of a termination request
pub type KillFuture = BoxFuture<'static, Result<(), KillError>>;

/// Termination request failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KillError {
    /// Signal delivery was rejected by the OS
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        pid: u32,
        signal: Signal,
        #[source]
        source: nix::Error,
    },
    /// The process has no known pid
    #[error("process id is not available")]
    NoPid,
    /// The exit status can no longer be observed
    #[error("exit status of the process was lost")]
    Lost,
}

/// An already-running child process as seen by the renderer and the shutdown path
///
/// Implementations must be multicast: every call to [`Command::stdout`] or
/// [`Command::stderr`] returns an independent subscription.
pub trait Command: Send + Sync {
    /// Position of the command in the list it was started with
    fn index(&self) -> usize;

    /// Display name (may be empty)
    fn name(&self) -> &str;

    /// Command line the process was started with
    fn command_line(&self) -> &str;

    /// Process id, if the process was started
    fn pid(&self) -> Option<u32>;

    /// Color used for the prefix and the pane border
    fn prefix_color(&self) -> Color;

    /// Subscribe to stdout
    fn stdout(&self) -> ChunkStream;

    /// Subscribe to stderr
    fn stderr(&self) -> ChunkStream;

    /// Send `signal` to the process
    ///
    /// The signal is delivered before this method returns. The returned
    /// future resolves exactly once, after the process has exited, or
    /// immediately with an error when delivery failed.
    fn kill(&self, signal: Signal) -> KillFuture;
}
