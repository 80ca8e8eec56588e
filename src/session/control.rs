//! Control-channel read loop

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{LineReader, Received, Shared, read_line};
use crate::LinkError;
use crate::events::AckKind;
use crate::protocol::frame::{self, types};
use crate::protocol::{ConnectedUser, telemetry, users};
use crate::types::{Frame, TelemetrySample};

/// What an inbound control frame means once the session is established.
#[derive(Debug, PartialEq)]
pub(super) enum Inbound {
    CommandAck(AckKind, String),
    UserList(Vec<ConnectedUser>),
    Goodbye,
    Telemetry(TelemetrySample),
    /// Handshake frame after the handshake
    Violation(Frame),
    /// Frame with no telemetry fields
    Ignored(String),
}

pub(super) fn classify(frame: Frame) -> Inbound {
    match frame.kind() {
        types::CONNECT_ACK | types::CONNECT_ERROR => Inbound::Violation(frame),
        types::COMMAND_OK => Inbound::CommandAck(AckKind::Ok, frame.into_data()),
        types::COMMAND_ERROR => Inbound::CommandAck(AckKind::Error, frame.into_data()),
        types::USER_LIST => Inbound::UserList(users::parse(frame.data())),
        types::DISCONNECT_ACK => Inbound::Goodbye,
        kind => {
            let sample = telemetry::parse(frame.data());
            if sample.is_empty() { Inbound::Ignored(kind.to_string()) } else { Inbound::Telemetry(sample) }
        }
    }
}

/// Read lines until the channel closes or the session is cancelled.
///
/// Cancellation is the normal exit. End of stream or a read error while the
/// session is still connected terminates the session.
pub(super) async fn run(shared: Arc<Shared>, mut reader: LineReader, cancel: CancellationToken) {
    info!("Control channel reader started");

    let mut buffer = Vec::new();
    let mut line_count = 0u64;
    let mut goodbye = false;

    let reason = loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(lines = line_count, "Control channel reader cancelled");
                return;
            }
            result = read_line(&mut reader, &mut buffer) => result,
        };

        match result {
            Ok(Received::Line(line)) => {
                line_count += 1;
                goodbye |= handle_line(&shared, &line);
            }
            Ok(Received::Oversized(e)) => {
                line_count += 1;
                warn!(error = %e, "Discarding oversized control line");
                shared.events.log(format!("Discarded line: {e}"));
            }
            Ok(Received::End) if goodbye => break "server closed the session".to_string(),
            Ok(Received::End) => break "connection closed by server".to_string(),
            Err(e) => break format!("control channel read failed: {e}"),
        }
    };

    info!(lines = line_count, reason = %reason, "Control channel reader stopped");
    shared.abort(&reason).await;
}

/// Dispatch one line. Returns true for the server's goodbye.
fn handle_line(shared: &Shared, line: &str) -> bool {
    trace!(line, "Control line");
    if line.trim().is_empty() {
        return false;
    }

    let events = &shared.events;
    let frame = match frame::decode(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Discarding control line");
            events.log(format!("Discarded line: {e}"));
            return false;
        }
    };

    match classify(frame) {
        Inbound::CommandAck(kind, data) => {
            debug!(%kind, data = %data, "Command acknowledged");
            events.command_ack(kind, data);
        }
        Inbound::UserList(users) => {
            debug!(count = users.len(), "User list received");
            events.user_list(users);
        }
        Inbound::Goodbye => {
            info!("Server acknowledged disconnect");
            events.log("Server acknowledged disconnect");
            return true;
        }
        Inbound::Telemetry(sample) => events.telemetry(sample, false),
        Inbound::Violation(frame) => {
            let state = shared.state.borrow().to_string();
            let error = LinkError::protocol_violation(frame.kind(), state);
            warn!(error = %error, data = frame.data(), "Ignoring frame");
            events.log(format!("{error} ({})", frame.data()));
        }
        Inbound::Ignored(kind) => debug!(frame_type = %kind, "Frame carried no telemetry fields"),
    }

    false
}
