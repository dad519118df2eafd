use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::{Error, Result};

/// Capability to end the host process once every command has stopped
pub trait HostTerminator: Send + Sync {
    fn terminate(&self, signal: Signal) -> Result<()>;
}

/// Sends the signal to the current process
///
/// With the default disposition this ends the process the same way an
/// interrupt from the terminal would, including the exit status.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfSignal;

impl HostTerminator for SelfSignal {
    fn terminate(&self, signal: Signal) -> Result<()> {
        tracing::info!(%signal, "signalling host process");
        signal::kill(Pid::this(), signal).map_err(Error::HostSignal)
    }
}
