mod log;

pub use log::{LogBuffer, OutputLine, StreamKind};
