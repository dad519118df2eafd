use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use nix::sys::signal::Signal;

use crate::command::{Command, KillError, KillFuture};
use crate::error::Result;
use crate::shutdown::HostTerminator;

/// Default time a command gets to exit after each signal
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Shutdown settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOptions {
    /// Signal sent to every command, and to the host afterwards
    pub signal: Signal,
    /// Per-command limit before escalating to `SIGKILL`; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            signal: Signal::SIGINT,
            timeout: Some(DEFAULT_KILL_TIMEOUT),
        }
    }
}

/// Shutdown progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Idle,
    ShuttingDown,
    AllStopped,
    ProcessExiting,
}

/// How one command ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    /// Exited after the shutdown signal
    Stopped,
    /// The termination call failed
    Failed(KillError),
    /// Ignored the shutdown signal and exited after `SIGKILL`
    Escalated,
    /// Still running after `SIGKILL`
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub index: usize,
    pub name: String,
    pub outcome: KillOutcome,
}

/// Result of a completed shutdown, one entry per command in command order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub outcomes: Vec<CommandOutcome>,
}

impl ShutdownReport {
    /// Outcomes other than a clean stop
    pub fn problems(&self) -> impl Iterator<Item = &CommandOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome != KillOutcome::Stopped)
    }

    pub fn is_clean(&self) -> bool {
        self.problems().next().is_none()
    }
}

/// Stops every command on abort and ends the host once all of them exited
///
/// The abort is idempotent: only the first [`begin`](Self::begin) starts a
/// shutdown. A failing or hung command never blocks the others; it is
/// recorded in the [`ShutdownReport`] instead.
pub struct ShutdownCoordinator {
    commands: Vec<Arc<dyn Command>>,
    host: Arc<dyn HostTerminator>,
    options: ShutdownOptions,
    state: ShutdownState,
    pending: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new(
        commands: Vec<Arc<dyn Command>>,
        host: Arc<dyn HostTerminator>,
        options: ShutdownOptions,
    ) -> Self {
        Self {
            commands,
            host,
            options,
            state: ShutdownState::Idle,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Commands that have not finished stopping yet
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Signal every command and return the join of their completions
    ///
    /// All signals are sent before this returns. Returns `None` unless the
    /// coordinator is idle.
    pub fn begin(&mut self) -> Option<BoxFuture<'static, ShutdownReport>> {
        if self.state != ShutdownState::Idle {
            tracing::debug!(state = ?self.state, "abort ignored, shutdown already started");
            return None;
        }
        self.state = ShutdownState::ShuttingDown;
        self.pending.store(self.commands.len(), Ordering::SeqCst);
        tracing::info!(
            count = self.commands.len(),
            signal = %self.options.signal,
            "stopping commands"
        );

        let stops: Vec<_> = self
            .commands
            .iter()
            .map(|command| {
                let kill = command.kill(self.options.signal);
                stop(
                    Arc::clone(command),
                    kill,
                    self.options.timeout,
                    Arc::clone(&self.pending),
                )
            })
            .collect();

        Some(
            async move {
                ShutdownReport {
                    outcomes: join_all(stops).await,
                }
            }
            .boxed(),
        )
    }

    /// Record that the join completed
    pub fn finish(&mut self, report: &ShutdownReport) {
        if self.state != ShutdownState::ShuttingDown {
            tracing::warn!(state = ?self.state, "shutdown finished in unexpected state");
        }
        self.state = ShutdownState::AllStopped;
        tracing::info!(
            stopped = report.outcomes.len(),
            problems = report.problems().count(),
            "all commands stopped"
        );
    }

    /// Signal the host process; only valid once all commands stopped
    pub fn exit_host(&mut self) -> Result<()> {
        if self.state != ShutdownState::AllStopped {
            tracing::warn!(state = ?self.state, "host exit requested before commands stopped");
            return Ok(());
        }
        self.state = ShutdownState::ProcessExiting;
        self.host.terminate(self.options.signal)
    }

    /// Run the whole protocol: signal, join, then end the host
    ///
    /// Returns `None` if a shutdown was already started.
    pub async fn shutdown(&mut self) -> Option<ShutdownReport> {
        let report = self.begin()?.await;
        self.finish(&report);
        if let Err(e) = self.exit_host() {
            tracing::error!(error = %e, "failed to end host process");
        }
        Some(report)
    }
}

async fn stop(
    command: Arc<dyn Command>,
    kill: KillFuture,
    timeout: Option<Duration>,
    pending: Arc<AtomicUsize>,
) -> CommandOutcome {
    let outcome = match timeout {
        None => outcome_of(kill.await, KillOutcome::Stopped),
        Some(limit) => match tokio::time::timeout(limit, kill).await {
            Ok(result) => outcome_of(result, KillOutcome::Stopped),
            Err(_) => {
                tracing::warn!(
                    index = command.index(),
                    command = command.name(),
                    "command did not stop in time, sending SIGKILL"
                );
                match tokio::time::timeout(limit, command.kill(Signal::SIGKILL)).await {
                    Ok(result) => outcome_of(result, KillOutcome::Escalated),
                    Err(_) => KillOutcome::TimedOut,
                }
            }
        },
    };

    match &outcome {
        KillOutcome::Failed(e) => {
            tracing::error!(
                index = command.index(),
                command = command.name(),
                error = %e,
                "failed to stop command"
            );
        }
        KillOutcome::TimedOut => {
            tracing::error!(
                index = command.index(),
                command = command.name(),
                "command survived SIGKILL"
            );
        }
        KillOutcome::Stopped | KillOutcome::Escalated => {}
    }
    pending.fetch_sub(1, Ordering::SeqCst);

    CommandOutcome {
        index: command.index(),
        name: command.name().to_string(),
        outcome,
    }
}

fn outcome_of(result: std::result::Result<(), KillError>, ok: KillOutcome) -> KillOutcome {
    match result {
        Ok(()) => ok,
        Err(e) => KillOutcome::Failed(e),
    }
}
