use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use clap::Parser;
use futures::future::{join_all, pending};
use ratatui::style::Color;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use muxlog::command::{Command, ProcessCommand};
use muxlog::config::{self, Config};
use muxlog::error::{Error, Result};
use muxlog::logger::{Logger, PrefixLogger};
use muxlog::output::{LogOutput, OutputOptions, RenderMode};
use muxlog::shutdown::{SelfSignal, ShutdownCoordinator, ShutdownOptions};

/// Prefix colors used when none are given
const DEFAULT_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];

#[derive(Parser, Debug)]
#[command(
    name = "muxlog",
    author,
    version,
    about = "Run commands and multiplex their output into a prefixed log or a terminal grid",
    long_about = None
)]
struct Args {
    /// Commands to run, each through `sh -c`
    #[arg(required = true)]
    commands: Vec<String>,

    /// Show each command in its own pane; Esc, q or Ctrl-C stops them all
    #[arg(short, long)]
    grid: bool,

    /// Comma separated command names
    #[arg(short, long, value_delimiter = ',')]
    names: Vec<String>,

    /// Comma separated prefix colors, cycled over the commands
    #[arg(short = 'c', long, value_delimiter = ',')]
    prefix_colors: Vec<String>,

    /// Prefix template or one of index, name, command, pid, time, none
    #[arg(short, long)]
    prefix: Option<String>,

    /// chrono format for the {time} placeholder
    #[arg(long)]
    timestamp_format: Option<String>,

    /// Maximum length of the {command} placeholder
    #[arg(short = 'l', long)]
    prefix_length: Option<usize>,

    /// Disable prefix colors
    #[arg(long)]
    no_color: bool,

    /// Maximum buffer lines per pane (0 for unlimited)
    #[arg(short = 'b', long)]
    max_buffer_lines: Option<usize>,

    /// Milliseconds a command gets to exit before SIGKILL (0 waits forever)
    #[arg(long)]
    kill_timeout: Option<u64>,

    /// Signal sent to every command on shutdown
    #[arg(long)]
    kill_signal: Option<String>,

    /// Write diagnostics to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Use this config file instead of ./.muxlog/config.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Apply command line flags on top of the loaded config
    fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(prefix) = &self.prefix {
            config.logger.prefix = Some(prefix.clone());
        }
        if let Some(format) = &self.timestamp_format {
            config.logger.timestamp_format = format.clone();
        }
        if let Some(length) = self.prefix_length {
            config.logger.prefix_length = length;
        }
        if self.no_color {
            config.logger.colors = false;
        }
        if let Some(lines) = self.max_buffer_lines {
            config.max_buffer_lines = lines;
        }
        if let Some(millis) = self.kill_timeout {
            config.shutdown.timeout = config::timeout_from_millis(millis);
        }
        if let Some(signal) = &self.kill_signal {
            config.shutdown.signal = config::parse_signal(signal)?;
        }
        Ok(config)
    }

    fn colors(&self) -> Result<Vec<Color>> {
        if self.prefix_colors.is_empty() {
            return Ok(DEFAULT_COLORS.to_vec());
        }
        self.prefix_colors
            .iter()
            .map(|name| {
                Color::from_str(name.trim()).map_err(|_| Error::InvalidValue {
                    what: "color",
                    value: name.clone(),
                })
            })
            .collect()
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let writer = match &args.log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(File::create(path)?)),
        // never write over the grid
        None if args.grid => BoxMakeWriter::new(std::io::sink),
        None => BoxMakeWriter::new(std::io::stderr),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MUXLOG_LOG").unwrap_or_else(|_| "muxlog=info".into()),
        )
        .with_writer(writer)
        .with_ansi(args.log_file.is_none())
        .init();
    Ok(())
}

fn spawn_commands(args: &Args, config: &Config) -> Result<Vec<Arc<ProcessCommand>>> {
    let colors = args.colors()?;
    args.commands
        .iter()
        .enumerate()
        .map(|(index, command_line)| {
            let name = args.names.get(index).cloned().unwrap_or_default();
            let color = colors[index % colors.len()];
            let command = ProcessCommand::spawn(
                index,
                name,
                command_line.as_str(),
                color,
                config.stream_capacity,
            )?;
            tracing::debug!(index, pid = ?command.pid(), command = %command_line, "spawned");
            Ok(Arc::new(command))
        })
        .collect()
}

async fn run(args: Args) -> Result<bool> {
    let config = config::load_config(&env::current_dir()?, args.config.as_deref())?;
    let config = args.apply(config)?;
    tracing::debug!(?config, "configuration loaded");

    let logger = Arc::new(PrefixLogger::stdout(config.logger.clone()));
    let mut output = LogOutput::new(
        Arc::clone(&logger) as Arc<dyn Logger>,
        OutputOptions {
            mode: RenderMode::from_grid_flag(args.grid),
            max_buffer_lines: config.max_buffer_lines,
            shutdown: config.shutdown,
        },
    );

    let processes = spawn_commands(&args, &config)?;
    let commands = processes
        .iter()
        .map(|process| Arc::clone(process) as Arc<dyn Command>)
        .collect();
    let commands = output.handle(commands)?;

    if output.mode() == RenderMode::Grid {
        output.wait().await?;
        return Ok(true);
    }

    let exits = join_all(processes.iter().map(|process| {
        let logger = Arc::clone(&logger);
        async move {
            let code = process.wait().await;
            logger.log_command_exit(process.as_ref(), code);
            code
        }
    }));
    let interrupt = tokio::spawn(stop_on_interrupt(commands, config.shutdown));
    let (codes, rendered) = tokio::join!(exits, output.wait());
    interrupt.abort();
    rendered?;

    Ok(codes.iter().all(|code| *code == 0))
}

/// Stop every command on Ctrl-C
///
/// Commands run in their own process groups, so the terminal interrupt only
/// reaches muxlog itself.
async fn stop_on_interrupt(commands: Vec<Arc<dyn Command>>, options: ShutdownOptions) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        return pending().await;
    }
    tracing::info!("interrupted, stopping commands");
    let mut coordinator = ShutdownCoordinator::new(commands, Arc::new(SelfSignal), options);
    if let Some(join) = coordinator.begin() {
        let report = join.await;
        coordinator.finish(&report);
        for problem in report.problems() {
            tracing::warn!(
                command = %problem.name,
                outcome = ?problem.outcome,
                "command did not stop cleanly"
            );
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(&args) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "muxlog failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
