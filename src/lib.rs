pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod layout;
pub mod logger;
pub mod output;
pub mod shutdown;
pub mod tui;

#[cfg(test)]
mod test_utils;
