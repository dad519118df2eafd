//! Fakes for the command and host boundaries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{FutureExt, StreamExt, stream};
use nix::sys::signal::Signal;
use ratatui::style::Color;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;

use crate::command::{ChunkStream, Command, KillError, KillFuture};
use crate::logger::Logger;
use crate::shutdown::HostTerminator;

/// How a [`FakeCommand`] responds to `kill`
#[derive(Debug, Clone)]
pub enum KillBehavior {
    /// Resolve immediately
    Immediate,
    /// Resolve after a delay
    Delay(Duration),
    /// Fail signal delivery
    Fail,
    /// Never resolve for the given signal; other signals resolve immediately
    IgnoreSignal(Signal),
}

/// In-memory command with hand-driven output streams
pub struct FakeCommand {
    index: usize,
    name: String,
    command_line: String,
    color: Color,
    stdout: Mutex<Option<broadcast::Sender<String>>>,
    stderr: Mutex<Option<broadcast::Sender<String>>>,
    behavior: KillBehavior,
    kills: Arc<Mutex<Vec<(Signal, Instant)>>>,
    stopped: Arc<Mutex<Option<Instant>>>,
}

impl FakeCommand {
    pub fn new(index: usize, name: &str) -> Self {
        let (stdout, _) = broadcast::channel(256);
        let (stderr, _) = broadcast::channel(256);
        Self {
            index,
            name: name.to_string(),
            command_line: format!("run {name}"),
            color: Color::Green,
            stdout: Mutex::new(Some(stdout)),
            stderr: Mutex::new(Some(stderr)),
            behavior: KillBehavior::Immediate,
            kills: Arc::default(),
            stopped: Arc::default(),
        }
    }

    pub fn with_command_line(mut self, command_line: &str) -> Self {
        self.command_line = command_line.to_string();
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_kill(mut self, behavior: KillBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn emit_stdout(&self, chunk: &str) {
        emit(&self.stdout, chunk);
    }

    pub fn emit_stderr(&self, chunk: &str) {
        emit(&self.stderr, chunk);
    }

    /// Close both streams
    pub fn finish(&self) {
        self.stdout.lock().unwrap().take();
        self.stderr.lock().unwrap().take();
    }

    /// Signals received, in order
    pub fn kills(&self) -> Vec<Signal> {
        self.kills.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    /// When the first signal was received
    pub fn killed_at(&self) -> Option<Instant> {
        self.kills.lock().unwrap().first().map(|(_, at)| *at)
    }

    /// When the kill future resolved successfully
    pub fn stopped_at(&self) -> Option<Instant> {
        *self.stopped.lock().unwrap()
    }
}

fn emit(sender: &Mutex<Option<broadcast::Sender<String>>>, chunk: &str) {
    if let Some(sender) = sender.lock().unwrap().as_ref() {
        let _ = sender.send(chunk.to_string());
    }
}

fn subscribe(sender: &Mutex<Option<broadcast::Sender<String>>>) -> ChunkStream {
    match sender.lock().unwrap().as_ref() {
        Some(sender) => BroadcastStream::new(sender.subscribe())
            .filter_map(|item| async move { item.ok() })
            .boxed(),
        None => stream::empty().boxed(),
    }
}

impl Command for FakeCommand {
    fn index(&self) -> usize {
        self.index
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn command_line(&self) -> &str {
        &self.command_line
    }

    fn pid(&self) -> Option<u32> {
        Some(4242)
    }

    fn prefix_color(&self) -> Color {
        self.color
    }

    fn stdout(&self) -> ChunkStream {
        subscribe(&self.stdout)
    }

    fn stderr(&self) -> ChunkStream {
        subscribe(&self.stderr)
    }

    fn kill(&self, signal: Signal) -> KillFuture {
        self.kills.lock().unwrap().push((signal, Instant::now()));
        let stopped = Arc::clone(&self.stopped);
        let behavior = self.behavior.clone();
        async move {
            match behavior {
                KillBehavior::Immediate => {}
                KillBehavior::Delay(delay) => tokio::time::sleep(delay).await,
                KillBehavior::Fail => {
                    return Err(KillError::Signal {
                        pid: 4242,
                        signal,
                        source: nix::Error::EPERM,
                    });
                }
                KillBehavior::IgnoreSignal(ignored) if ignored == signal => {
                    futures::future::pending::<()>().await;
                }
                KillBehavior::IgnoreSignal(_) => {}
            }
            *stopped.lock().unwrap() = Some(Instant::now());
            Ok(())
        }
        .boxed()
    }
}

/// Host terminator that records calls instead of signalling
#[derive(Default)]
pub struct RecordingHost {
    calls: AtomicUsize,
    at: Mutex<Option<Instant>>,
}

impl RecordingHost {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn terminated_at(&self) -> Option<Instant> {
        *self.at.lock().unwrap()
    }
}

impl HostTerminator for RecordingHost {
    fn terminate(&self, _signal: Signal) -> crate::error::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.at.lock().unwrap().get_or_insert_with(Instant::now);
        Ok(())
    }
}

/// Logger that keeps every chunk with the index of its command
#[derive(Default)]
pub struct RecordingLogger {
    chunks: Mutex<Vec<(usize, String)>>,
}

impl RecordingLogger {
    /// Chunks from the command at `index`, in the order they were logged
    pub fn chunks_for(&self, index: usize) -> Vec<String> {
        self.chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| *i == index)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn prefix(&self, command: &dyn Command) -> String {
        format!("[{}]", command.name())
    }

    fn log_command_text(&self, text: &str, command: &dyn Command) {
        self.chunks
            .lock()
            .unwrap()
            .push((command.index(), text.to_string()));
    }

    fn log_command_exit(&self, _command: &dyn Command, _exit_code: i32) {}
}
