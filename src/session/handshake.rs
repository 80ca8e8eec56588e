//! Handshake reply handling

use std::time::Duration;
use tracing::{debug, warn};

use super::{LineReader, Received, read_line};
use crate::events::EventSink;
use crate::protocol::frame::{self, types};
use crate::{LinkError, Result};

/// Wait for the server's `CACK` or `CERR`.
///
/// Returns the client id carried by `CACK`. Other frames arriving first are
/// logged and skipped. The whole exchange is bounded by `timeout`.
pub(super) async fn await_reply(
    reader: &mut LineReader,
    events: &EventSink,
    timeout: Duration,
) -> Result<String> {
    tokio::time::timeout(timeout, read_reply(reader, events))
        .await
        .map_err(|_| LinkError::Timeout { duration: timeout })?
}

async fn read_reply(reader: &mut LineReader, events: &EventSink) -> Result<String> {
    let mut buffer = Vec::new();

    loop {
        let line = match read_line(reader, &mut buffer).await? {
            Received::Line(line) => line,
            Received::Oversized(e) => {
                warn!(error = %e, "Discarding oversized line during handshake");
                events.log(format!("Discarded line during handshake: {e}"));
                continue;
            }
            Received::End => {
                return Err(LinkError::transport("server closed the connection during the handshake"));
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match frame::decode(&line) {
            Ok(frame) if frame.kind() == types::CONNECT_ACK => {
                return Ok(frame.data().trim().to_string());
            }
            Ok(frame) if frame.kind() == types::CONNECT_ERROR => {
                return Err(LinkError::HandshakeRejected { reason: frame.data().trim().to_string() });
            }
            Ok(frame) => {
                debug!(frame_type = frame.kind(), "Skipping frame received before handshake reply");
                events.log(format!("Ignored {} frame before handshake completed", frame.kind()));
            }
            Err(e) => {
                warn!(error = %e, "Discarding line during handshake");
                events.log(format!("Discarded line during handshake: {e}"));
            }
        }
    }
}
