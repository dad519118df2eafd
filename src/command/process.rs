use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;

use futures::{FutureExt, StreamExt, future, stream};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use ratatui::style::Color;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as ShellCommand;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::{ChunkStream, Command, KillError, KillFuture};

/// Shell command spawned with `sh -c` in its own process group
///
/// Signals go to the whole group, so everything the shell starts is
/// stopped with it. stdout and stderr are read line by line and published to broadcast
/// channels, so any number of subscribers can attach. Lines published
/// before the first subscription are dropped; on a current-thread runtime
/// the reader tasks do not run before the spawning task yields.
pub struct ProcessCommand {
    index: usize,
    name: String,
    command_line: String,
    color: Color,
    pid: Option<u32>,
    stdout: broadcast::WeakSender<String>,
    stderr: broadcast::WeakSender<String>,
    exit: watch::Receiver<Option<i32>>,
}

impl ProcessCommand {
    /// Spawn `command_line` through the shell
    ///
    /// `stream_capacity` bounds how many lines a lagging subscriber may fall
    /// behind before it starts missing lines.
    pub fn spawn(
        index: usize,
        name: impl Into<String>,
        command_line: impl Into<String>,
        color: Color,
        stream_capacity: usize,
    ) -> std::io::Result<Self> {
        let command_line = command_line.into();
        let mut child = ShellCommand::new("sh")
            .arg("-c")
            .arg(&command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;
        let pid = child.id();

        let capacity = stream_capacity.max(1);
        let (stdout_tx, _) = broadcast::channel(capacity);
        let (stderr_tx, _) = broadcast::channel(capacity);
        let stdout = stdout_tx.downgrade();
        let stderr = stderr_tx.downgrade();

        if let Some(pipe) = child.stdout.take() {
            tokio::spawn(publish_lines(pipe, stdout_tx));
        }
        if let Some(pipe) = child.stderr.take() {
            tokio::spawn(publish_lines(pipe, stderr_tx));
        }

        let (exit_tx, exit) = watch::channel(None);
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status
                    .code()
                    .or_else(|| status.signal().map(|sig| 128 + sig))
                    .unwrap_or(-1),
                Err(e) => {
                    tracing::error!(pid = ?pid, error = %e, "failed to wait for child");
                    -1
                }
            };
            tracing::debug!(pid = ?pid, code, "child exited");
            let _ = exit_tx.send(Some(code));
        });

        Ok(Self {
            index,
            name: name.into(),
            command_line,
            color,
            pid,
            stdout,
            stderr,
            exit,
        })
    }

    /// Wait for the process to exit and return its exit code
    ///
    /// Processes terminated by a signal report `128 + signal`.
    pub async fn wait(&self) -> i32 {
        let mut exit = self.exit.clone();
        let code = match exit.wait_for(Option::is_some).await {
            Ok(code) => *code,
            Err(_) => None,
        };
        code.unwrap_or(-1)
    }

    /// Exit code if the process has already exited
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    fn subscribe(&self, sender: &broadcast::WeakSender<String>) -> ChunkStream {
        let Some(sender) = sender.upgrade() else {
            return stream::empty().boxed();
        };
        let pid = self.pid;
        BroadcastStream::new(sender.subscribe())
            .filter_map(move |item| {
                future::ready(match item {
                    Ok(line) => Some(line),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(pid = ?pid, skipped, "subscriber lagged, lines dropped");
                        Some(lag_marker(skipped))
                    }
                })
            })
            .boxed()
    }
}

/// Line standing in for output a slow subscriber missed
fn lag_marker(skipped: u64) -> String {
    format!("... {skipped} line(s) skipped ...")
}

/// Read `pipe` line by line into `sender` until EOF
async fn publish_lines<R>(pipe: R, sender: broadcast::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                // No subscribers yet is not an error
                let _ = sender.send(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read child output");
                break;
            }
        }
    }
}

impl Command for ProcessCommand {
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
        self.pid
    }

    fn prefix_color(&self) -> Color {
        self.color
    }

    fn stdout(&self) -> ChunkStream {
        self.subscribe(&self.stdout)
    }

    fn stderr(&self) -> ChunkStream {
        self.subscribe(&self.stderr)
    }

    fn kill(&self, signal: Signal) -> KillFuture {
        let Some(pid) = self.pid else {
            return future::ready(Err(KillError::NoPid)).boxed();
        };
        let Ok(raw_pid) = i32::try_from(pid) else {
            return future::ready(Err(KillError::NoPid)).boxed();
        };

        tracing::debug!(pid, %signal, "signalling process group");
        match signal::killpg(Pid::from_raw(raw_pid), signal) {
            // the whole group is already gone
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(source) => {
                return future::ready(Err(KillError::Signal {
                    pid,
                    signal,
                    source,
                }))
                .boxed();
            }
        }

        let mut exit = self.exit.clone();
        async move {
            let exited = exit.wait_for(Option::is_some).await.is_ok();
            if exited { Ok(()) } else { Err(KillError::Lost) }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn(command_line: &str) -> ProcessCommand {
        ProcessCommand::spawn(0, "test", command_line, Color::Green, 64).unwrap()
    }

    #[tokio::test]
    async fn process_command_spawn_succeeds_for_invalid_command() {
        // sh itself starts; the inner command fails
        let command = spawn("/nonexistent/command");
        assert!(command.pid().is_some());
        assert_eq!(command.wait().await, 127);
    }

    #[tokio::test]
    async fn process_command_stdout_yields_lines_in_order() {
        let command = spawn("echo line1; echo line2; echo line3");
        let lines: Vec<String> = command.stdout().collect().await;
        assert_eq!(lines, vec!["line1", "line2", "line3"]);
    }

    #[tokio::test]
    async fn process_command_stderr_is_separate_from_stdout() {
        let command = spawn("echo out; echo err >&2");
        let stdout = command.stdout();
        let stderr = command.stderr();

        let (out, err): (Vec<String>, Vec<String>) =
            futures::join!(stdout.collect(), stderr.collect());
        assert_eq!(out, vec!["out"]);
        assert_eq!(err, vec!["err"]);
    }

    #[tokio::test]
    async fn process_command_streams_are_multicast() {
        let command = spawn("echo shared");
        let first = command.stdout();
        let second = command.stdout();

        let (a, b): (Vec<String>, Vec<String>) = futures::join!(first.collect(), second.collect());
        assert_eq!(a, vec!["shared"]);
        assert_eq!(b, vec!["shared"]);
    }

    #[tokio::test]
    async fn process_command_subscribe_after_close_is_empty() {
        let command = spawn("true");
        command.wait().await;
        // give the reader tasks a chance to observe EOF
        tokio::time::sleep(Duration::from_millis(50)).await;

        let lines: Vec<String> = command.stdout().collect().await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn process_command_wait_returns_exit_code() {
        assert_eq!(spawn("exit 0").wait().await, 0);
        assert_eq!(spawn("exit 42").wait().await, 42);
    }

    #[tokio::test]
    async fn process_command_kill_resolves_after_exit() {
        let command = spawn("exec sleep 10");

        command.kill(Signal::SIGINT).await.unwrap();
        assert_eq!(command.exit_code(), Some(128 + Signal::SIGINT as i32));
    }

    #[tokio::test]
    async fn process_command_kill_stops_every_process_the_shell_started() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("survived");
        let command = spawn(&format!("sleep 1; touch '{}'", marker.display()));

        tokio::time::timeout(Duration::from_millis(900), command.kill(Signal::SIGTERM))
            .await
            .expect("shell stops without escalation")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn process_command_kill_reaches_background_children() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("survived");
        let command = spawn(&format!("(sleep 1; touch '{}') & exit 0", marker.display()));
        assert_eq!(command.wait().await, 0);

        command.kill(Signal::SIGTERM).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn process_command_lagging_subscriber_sees_skip_marker() {
        let command =
            ProcessCommand::spawn(0, "test", r"printf 'a\nb\nc\nd\n'", Color::Green, 1).unwrap();
        let stdout = command.stdout();
        command.wait().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let lines: Vec<String> = stdout.collect().await;

        assert_eq!(lines, vec![lag_marker(3), "d".to_string()]);
    }

    #[tokio::test]
    async fn process_command_kill_after_exit_is_ok() {
        let command = spawn("exit 3");
        command.wait().await;

        assert_eq!(command.kill(Signal::SIGINT).await, Ok(()));
    }
}
