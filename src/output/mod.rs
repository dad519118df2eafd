//! Rendering of command output, either as one prefixed log or as a grid of panes.

mod grid;
mod sequential;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::shutdown::{HostTerminator, SelfSignal, ShutdownCoordinator, ShutdownOptions};
use crate::tui::init_terminal;

/// Default maximum lines kept per pane
pub const DEFAULT_MAX_BUFFER_LINES: usize = 10_000;

/// How output is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Every chunk goes to the logger as it arrives
    #[default]
    Sequential,
    /// One scrollable pane per command; aborting stops every command
    Grid,
}

impl RenderMode {
    pub fn from_grid_flag(grid: bool) -> Self {
        if grid { Self::Grid } else { Self::Sequential }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub mode: RenderMode,
    /// Lines kept per pane in grid mode (0 for unlimited)
    pub max_buffer_lines: usize,
    pub shutdown: ShutdownOptions,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            max_buffer_lines: DEFAULT_MAX_BUFFER_LINES,
            shutdown: ShutdownOptions::default(),
        }
    }
}

/// Attaches output rendering to already-running commands
pub struct LogOutput {
    logger: Arc<dyn Logger>,
    options: OutputOptions,
    host: Arc<dyn HostTerminator>,
    handled: bool,
    forwarders: Vec<JoinHandle<()>>,
    renderer: Option<JoinHandle<Result<()>>>,
}

impl LogOutput {
    pub fn new(logger: Arc<dyn Logger>, options: OutputOptions) -> Self {
        Self {
            logger,
            options,
            host: Arc::new(SelfSignal),
            handled: false,
            forwarders: Vec::new(),
            renderer: None,
        }
    }

    /// Replace the capability used to end the host process after a grid shutdown
    pub fn with_host(mut self, host: Arc<dyn HostTerminator>) -> Self {
        self.host = host;
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.options.mode
    }

    /// Start rendering `commands` and hand the same list back
    ///
    /// Output keeps flowing in background tasks after this returns. In grid
    /// mode this takes over the terminal.
    pub fn handle(&mut self, commands: Vec<Arc<dyn Command>>) -> Result<Vec<Arc<dyn Command>>> {
        if commands.is_empty() {
            return Err(Error::NoCommands);
        }
        if self.handled {
            return Err(Error::AlreadyHandled);
        }

        match self.options.mode {
            RenderMode::Sequential => {
                self.forwarders = sequential::attach(&commands, &self.logger);
            }
            RenderMode::Grid => {
                let terminal = init_terminal()?;
                let surface = grid::build_surface(
                    &commands,
                    self.logger.as_ref(),
                    self.options.max_buffer_lines,
                );
                let chunks = grid::attach(&commands);
                let coordinator = ShutdownCoordinator::new(
                    commands.clone(),
                    Arc::clone(&self.host),
                    self.options.shutdown,
                );
                self.renderer = Some(tokio::spawn(grid::run(
                    terminal,
                    surface,
                    chunks,
                    coordinator,
                )));
            }
        }
        self.handled = true;
        tracing::debug!(count = commands.len(), mode = ?self.options.mode, "rendering commands");

        Ok(commands)
    }

    /// Wait until rendering ends
    ///
    /// Sequential mode ends when every output stream has closed. Grid mode
    /// normally never returns: the host is signalled after shutdown.
    pub async fn wait(self) -> Result<()> {
        for forwarder in self.forwarders {
            if let Err(e) = forwarder.await {
                tracing::error!(error = %e, "output forwarder failed");
            }
        }
        match self.renderer {
            Some(renderer) => renderer.await?,
            None => Ok(()),
        }
    }
}
