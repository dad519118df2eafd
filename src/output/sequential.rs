use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::command::{ChunkStream, Command};
use crate::logger::Logger;

/// Forward every chunk of every command's stdout and stderr to the logger
///
/// Subscriptions are taken before this returns; one task per stream keeps
/// that stream's order.
pub(crate) fn attach(
    commands: &[Arc<dyn Command>],
    logger: &Arc<dyn Logger>,
) -> Vec<JoinHandle<()>> {
    commands
        .iter()
        .flat_map(|command| {
            [command.stdout(), command.stderr()].map(|stream| {
                tokio::spawn(forward(Arc::clone(command), Arc::clone(logger), stream))
            })
        })
        .collect()
}

async fn forward(command: Arc<dyn Command>, logger: Arc<dyn Logger>, mut stream: ChunkStream) {
    while let Some(chunk) = stream.next().await {
        logger.log_command_text(&chunk, command.as_ref());
    }
    tracing::trace!(index = command.index(), "output stream ended");
}
