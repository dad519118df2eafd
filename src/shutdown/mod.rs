mod coordinator;
mod host;

pub use coordinator::{
    CommandOutcome, DEFAULT_KILL_TIMEOUT, KillOutcome, ShutdownCoordinator, ShutdownOptions,
    ShutdownReport, ShutdownState,
};
pub use host::{HostTerminator, SelfSignal};
