use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Local;
use crossterm::style::{self, Stylize};
use ratatui::backend::IntoCrossterm;

use crate::command::Command;

/// Default timestamp format for the `{time}` placeholder
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Default maximum length of the `{command}` placeholder
pub const DEFAULT_PREFIX_LENGTH: usize = 10;

/// Output sink for commands in sequential mode
pub trait Logger: Send + Sync {
    /// Display prefix for `command`, also used as the pane label in grid mode
    fn prefix(&self, command: &dyn Command) -> String;

    /// Write one chunk of output from `command`
    fn log_command_text(&self, text: &str, command: &dyn Command);

    /// Report that `command` exited
    fn log_command_exit(&self, command: &dyn Command, exit_code: i32);
}

/// Logger settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerOptions {
    /// Prefix template or shorthand (`index`, `name`, `command`, `pid`, `time`, `none`)
    ///
    /// `None` picks `name` for named commands and `index` otherwise.
    pub prefix: Option<String>,
    /// chrono format string for `{time}`
    pub timestamp_format: String,
    /// Maximum length of `{command}`
    pub prefix_length: usize,
    /// Color prefixes with the command's prefix color
    pub colors: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            prefix_length: DEFAULT_PREFIX_LENGTH,
            colors: true,
        }
    }
}

/// Logger writing `[prefix] text` lines to a sink
pub struct PrefixLogger<W> {
    options: LoggerOptions,
    out: Mutex<W>,
}

impl PrefixLogger<io::Stdout> {
    /// Create a logger writing to stdout
    pub fn stdout(options: LoggerOptions) -> Self {
        Self::new(options, io::stdout())
    }
}

impl<W: Write + Send> PrefixLogger<W> {
    pub fn new(options: LoggerOptions, out: W) -> Self {
        Self {
            options,
            out: Mutex::new(out),
        }
    }

    /// Consume the logger and return its sink
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn template(&self, command: &dyn Command) -> String {
        let prefix = match self.options.prefix.as_deref() {
            Some(prefix) => prefix,
            None if command.name().is_empty() => "index",
            None => "name",
        };
        match prefix {
            "index" | "name" | "command" | "pid" | "time" => format!("[{{{prefix}}}]"),
            "none" => String::new(),
            template => template.to_string(),
        }
    }

    fn colored(&self, prefix: String, command: &dyn Command) -> String {
        if !self.options.colors || prefix.is_empty() {
            return prefix;
        }
        let color: style::Color = command.prefix_color().into_crossterm();
        prefix.with(color).to_string()
    }

    fn write_line(&self, prefix: &str, text: &str) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = if prefix.is_empty() {
            writeln!(out, "{text}")
        } else {
            writeln!(out, "{prefix} {text}")
        };
        if let Err(e) = result.and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "failed to write command output");
        }
    }
}

impl<W: Write + Send> Logger for PrefixLogger<W> {
    fn prefix(&self, command: &dyn Command) -> String {
        let pid = command
            .pid()
            .map(|pid| pid.to_string())
            .unwrap_or_default();
        self.template(command)
            .replace("{index}", &command.index().to_string())
            .replace("{name}", command.name())
            .replace(
                "{command}",
                &shorten(command.command_line(), self.options.prefix_length),
            )
            .replace("{pid}", &pid)
            .replace(
                "{time}",
                &Local::now()
                    .format(&self.options.timestamp_format)
                    .to_string(),
            )
    }

    fn log_command_text(&self, text: &str, command: &dyn Command) {
        let prefix = self.colored(self.prefix(command), command);
        self.write_line(&prefix, text);
    }

    fn log_command_exit(&self, command: &dyn Command, exit_code: i32) {
        let prefix = self.colored(self.prefix(command), command);
        let text = format!("{} exited with code {exit_code}", command.command_line());
        self.write_line(&prefix, &text);
    }
}

/// Shorten `text` to `max_len` characters by replacing its middle with `..`
fn shorten(text: &str, max_len: usize) -> String {
    let len = text.chars().count();
    if len <= max_len || max_len < 3 {
        return text.to_string();
    }
    let keep = max_len - 2;
    let head = keep.div_ceil(2);
    let tail = keep - head;
    let start: String = text.chars().take(head).collect();
    let end: String = text.chars().skip(len - tail).collect();
    format!("{start}..{end}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeCommand;
    use rstest::rstest;

    fn logger(prefix: Option<&str>) -> PrefixLogger<Vec<u8>> {
        PrefixLogger::new(
            LoggerOptions {
                prefix: prefix.map(str::to_string),
                colors: false,
                ..LoggerOptions::default()
            },
            Vec::new(),
        )
    }

    fn output(logger: PrefixLogger<Vec<u8>>) -> String {
        String::from_utf8(logger.into_inner()).unwrap()
    }

    #[rstest]
    #[case(None, "[web]")]
    #[case(Some("index"), "[2]")]
    #[case(Some("name"), "[web]")]
    #[case(Some("pid"), "[4242]")]
    #[case(Some("command"), "[npm .. dev]")]
    #[case(Some("none"), "")]
    #[case(Some("{index}:{name}"), "2:web")]
    fn prefix_logger_prefix_renders_template(
        #[case] prefix: Option<&str>,
        #[case] expected: &str,
    ) {
        let command = FakeCommand::new(2, "web").with_command_line("npm run dev");
        assert_eq!(logger(prefix).prefix(&command), expected);
    }

    #[test]
    fn prefix_logger_prefix_defaults_to_index_without_name() {
        let command = FakeCommand::new(3, "");
        assert_eq!(logger(None).prefix(&command), "[3]");
    }

    #[test]
    fn prefix_logger_time_prefix_uses_timestamp_format() {
        let logger = PrefixLogger::new(
            LoggerOptions {
                prefix: Some("time".into()),
                timestamp_format: "fixed".into(),
                colors: false,
                ..LoggerOptions::default()
            },
            Vec::new(),
        );
        assert_eq!(logger.prefix(&FakeCommand::new(0, "a")), "[fixed]");
    }

    #[test]
    fn prefix_logger_log_command_text_writes_prefixed_lines() {
        let logger = logger(None);
        let command = FakeCommand::new(0, "api");

        logger.log_command_text("hello", &command);
        logger.log_command_text("world", &command);

        assert_eq!(output(logger), "[api] hello\n[api] world\n");
    }

    #[test]
    fn prefix_logger_none_prefix_writes_bare_text() {
        let logger = logger(Some("none"));
        logger.log_command_text("plain", &FakeCommand::new(0, "api"));

        assert_eq!(output(logger), "plain\n");
    }

    #[test]
    fn prefix_logger_log_command_exit_reports_code() {
        let logger = logger(None);
        let command = FakeCommand::new(0, "api").with_command_line("cargo run");

        logger.log_command_exit(&command, 1);

        assert_eq!(output(logger), "[api] cargo run exited with code 1\n");
    }

    #[test]
    fn prefix_logger_colors_prefix_with_command_color() {
        let logger = PrefixLogger::new(LoggerOptions::default(), Vec::new());
        logger.log_command_text("hi", &FakeCommand::new(0, "api"));

        // ratatui's Green is crossterm's DarkGreen
        let prefix = "[api]".with(style::Color::DarkGreen).to_string();
        let out = output(logger);
        assert_eq!(out, format!("{prefix} hi\n"));
    }

    #[rstest]
    #[case("short", 10, "short")]
    #[case("npm run dev", 10, "npm .. dev")]
    #[case("abcdefgh", 5, "ab..h")]
    fn shorten_keeps_head_and_tail(#[case] text: &str, #[case] max: usize, #[case] expected: &str) {
        assert_eq!(shorten(text, max), expected);
    }
}
