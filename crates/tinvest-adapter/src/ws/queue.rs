/*
[INPUT]:  Subscribe/unsubscribe commands issued by the connection manager
[OUTPUT]: Commands written to the socket sink in FIFO order
[POS]:    WebSocket layer - outbound buffering
[UPDATE]: When changing flush or resubscribe semantics
*/

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::{Sink, SinkExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use super::message::OutboundCommand;

/// Unbounded FIFO of commands waiting for an open socket
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<OutboundCommand>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, command: OutboundCommand) {
        self.pending.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutboundCommand> {
        self.pending.iter()
    }

    /// Replace the queue contents, returning how many stale commands were dropped
    pub fn rebuild(&mut self, commands: impl IntoIterator<Item = OutboundCommand>) -> usize {
        let stale = self.pending.len();
        self.pending.clear();
        self.pending.extend(commands);
        stale
    }

    /// Send queued commands in order. A command leaves the queue only after its
    /// send succeeds; the first failure stops the flush and keeps the rest.
    pub async fn flush<S>(&mut self, sink: &mut S) -> Result<usize, String>
    where
        S: Sink<WsMessage> + Unpin,
        S::Error: Display,
    {
        let mut sent = 0;
        while let Some(command) = self.pending.front() {
            let text = command.encode();
            sink.send(WsMessage::Text(text.into()))
                .await
                .map_err(|err| err.to_string())?;

            if let Some(command) = self.pending.pop_front() {
                debug!(
                    event = %command.event(),
                    figi = command.key.figi(),
                    request_id = %command.request_id,
                    "ws command sent"
                );
            }
            sent += 1;
        }
        Ok(sent)
    }
}
