use std::io;
use std::sync::Arc;

use crossterm::event::{Event, EventStream};
use futures::{Stream, StreamExt};
use ratatui::Terminal;
use ratatui::backend::Backend;
use tokio::sync::mpsc;

use crate::buffer::StreamKind;
use crate::command::{ChunkStream, Command};
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::shutdown::{KillOutcome, ShutdownCoordinator, ShutdownReport};
use crate::tui::{InputAction, Pane, RenderSurface, Tui, handle_event, restore_terminal};

/// Most output chunks applied between two redraws
const MAX_CHUNKS_PER_REDRAW: usize = 256;

/// Output chunk addressed to one pane
#[derive(Debug)]
pub(crate) struct PaneChunk {
    pub pane: usize,
    pub kind: StreamKind,
    pub text: String,
}

/// One pane per command, labelled with the logger prefix
pub(crate) fn build_surface(
    commands: &[Arc<dyn Command>],
    logger: &dyn Logger,
    max_lines: usize,
) -> RenderSurface {
    let panes = commands
        .iter()
        .map(|command| {
            Pane::new(
                logger.prefix(command.as_ref()),
                command.prefix_color(),
                max_lines,
            )
        })
        .collect();
    RenderSurface::new(panes)
}

/// Subscribe to every stream, tagging chunks with the pane they belong to
///
/// The channel is unbounded so a slow redraw never holds back a stream.
pub(crate) fn attach(commands: &[Arc<dyn Command>]) -> mpsc::UnboundedReceiver<PaneChunk> {
    let (tx, rx) = mpsc::unbounded_channel();
    for (pane, command) in commands.iter().enumerate() {
        tokio::spawn(forward(pane, StreamKind::Stdout, command.stdout(), tx.clone()));
        tokio::spawn(forward(pane, StreamKind::Stderr, command.stderr(), tx.clone()));
    }
    rx
}

async fn forward(
    pane: usize,
    kind: StreamKind,
    mut stream: ChunkStream,
    tx: mpsc::UnboundedSender<PaneChunk>,
) {
    while let Some(text) = stream.next().await {
        if tx.send(PaneChunk { pane, kind, text }).is_err() {
            // renderer is gone
            break;
        }
    }
}

/// Run the grid until shutdown completes, then restore the terminal and end the host
pub(crate) async fn run(
    mut terminal: Tui,
    mut surface: RenderSurface,
    mut chunks: mpsc::UnboundedReceiver<PaneChunk>,
    mut coordinator: ShutdownCoordinator,
) -> Result<()> {
    let result = drive(
        &mut terminal,
        &mut surface,
        &mut chunks,
        &mut coordinator,
        EventStream::new(),
    )
    .await;

    if let Err(e) = restore_terminal(&mut terminal) {
        tracing::error!(error = %e, "failed to restore terminal");
    }

    let Some(report) = result? else {
        return Ok(());
    };
    print_problems(&report);
    coordinator.exit_host()
}

/// Run the event loop, stopping every command if it fails
///
/// Commands never outlive a failed grid: the error is returned only after
/// the shutdown join has settled.
async fn drive<B, E>(
    terminal: &mut Terminal<B>,
    surface: &mut RenderSurface,
    chunks: &mut mpsc::UnboundedReceiver<PaneChunk>,
    coordinator: &mut ShutdownCoordinator,
    events: E,
) -> Result<Option<ShutdownReport>>
where
    B: Backend,
    E: Stream<Item = io::Result<Event>> + Unpin,
{
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let result = event_loop(
        terminal,
        surface,
        chunks,
        coordinator,
        events,
        &done_tx,
        &mut done_rx,
    )
    .await;
    let e = match result {
        Ok(report) => return Ok(report),
        Err(e) => e,
    };

    tracing::error!(error = %e, "grid failed, stopping commands");
    let report = match coordinator.begin() {
        Some(join) => Some(join.await),
        // a shutdown is already running
        None => done_rx.recv().await,
    };
    if let Some(report) = report {
        coordinator.finish(&report);
        print_problems(&report);
    }
    Err(e)
}

/// Drive the surface from output chunks and terminal events
///
/// Returns the shutdown report once every command has stopped, or `None`
/// if both the input and the output sources ran dry.
async fn event_loop<B, E>(
    terminal: &mut Terminal<B>,
    surface: &mut RenderSurface,
    chunks: &mut mpsc::UnboundedReceiver<PaneChunk>,
    coordinator: &mut ShutdownCoordinator,
    mut events: E,
    done_tx: &mpsc::UnboundedSender<ShutdownReport>,
    done_rx: &mut mpsc::UnboundedReceiver<ShutdownReport>,
) -> Result<Option<ShutdownReport>>
where
    B: Backend,
    E: Stream<Item = io::Result<Event>> + Unpin,
{
    draw(terminal, surface)?;

    loop {
        tokio::select! {
            Some(report) = done_rx.recv() => {
                coordinator.finish(&report);
                return Ok(Some(report));
            }
            Some(chunk) = chunks.recv() => {
                surface.append(chunk.pane, chunk.kind, &chunk.text);
                // coalesce what is already queued, leaving room for input
                for _ in 1..MAX_CHUNKS_PER_REDRAW {
                    let Ok(chunk) = chunks.try_recv() else {
                        break;
                    };
                    surface.append(chunk.pane, chunk.kind, &chunk.text);
                }
            }
            Some(event) = events.next() => {
                match handle_event(surface, &event?) {
                    InputAction::Abort => {
                        if let Some(join) = coordinator.begin() {
                            surface.set_status(Some(format!(
                                "stopping {} command(s)...",
                                coordinator.pending()
                            )));
                            let done_tx = done_tx.clone();
                            tokio::spawn(async move {
                                let _ = done_tx.send(join.await);
                            });
                        }
                    }
                    InputAction::Redraw => {}
                    InputAction::Ignore => continue,
                }
            }
            else => return Ok(None),
        }
        draw(terminal, surface)?;
    }
}

fn draw<B: Backend>(terminal: &mut Terminal<B>, surface: &mut RenderSurface) -> Result<()> {
    terminal
        .draw(|frame| surface.render(frame))
        .map_err(|e| Error::Render(e.to_string()))?;
    Ok(())
}

fn print_problems(report: &ShutdownReport) {
    for problem in report.problems() {
        match &problem.outcome {
            KillOutcome::Failed(e) => eprintln!("[{}] failed to stop: {e}", problem.name),
            KillOutcome::Escalated => eprintln!("[{}] killed with SIGKILL", problem.name),
            KillOutcome::TimedOut => eprintln!("[{}] still running after SIGKILL", problem.name),
            KillOutcome::Stopped => {}
        }
    }
}
