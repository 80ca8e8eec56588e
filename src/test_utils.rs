//! Test utilities: a scripted fake vehicle server and event helpers
//!
//! The fake server listens on an ephemeral localhost port, records every
//! line the client writes and answers through a responder closure. Tests can
//! also push unsolicited lines or drop the connection to simulate the peer.

#![cfg(any(test, feature = "test-utils"))]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{ClientEvent, EventStream};
use crate::protocol::frame::{self, types};
use crate::protocol::command::codes;

/// How long helpers wait before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Password accepted by [`FakeVehicleServer::accepting`].
pub const ADMIN_PASSWORD: &str = "admin123";

/// Reply sent by [`FakeVehicleServer::accepting`] to `LIST`.
pub const USER_LIST_REPLY: &str = "2|127.0.0.1:50000:ADMIN:UDP=5556|127.0.0.1:50001:OBSERVER:UDP=0";

enum ServerAction {
    Send(String),
    Close,
}

/// Scripted stand-in for the vehicle server.
pub struct FakeVehicleServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
    actions: mpsc::UnboundedSender<ServerAction>,
    task: JoinHandle<()>,
}

impl FakeVehicleServer {
    /// Start a server that answers each received line with the lines
    /// returned by `responder`.
    pub async fn start<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        let listener =
            TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.expect("fake server should bind");
        let addr = listener.local_addr().expect("fake server has an address");
        let received = Arc::new(Mutex::new(Vec::new()));
        let (actions, actions_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(serve(listener, Arc::clone(&received), actions_rx, responder));

        Self { addr, received, actions, task }
    }

    /// Behaves like the real server: accepts observers and the admin
    /// password, acknowledges known commands and answers `LIST` and `DISC`.
    pub async fn accepting(client_id: &str) -> Self {
        let client_id = client_id.to_string();
        Self::start(move |line| standard_reply(line, &client_id)).await
    }

    /// Rejects every handshake with `reason`.
    pub async fn rejecting(reason: &str) -> Self {
        let reply = line(types::CONNECT_ERROR, reason);
        Self::start(move |_| vec![reply.clone()]).await
    }

    /// Never answers.
    pub async fn silent() -> Self {
        Self::start(|_| Vec::new()).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Push an unsolicited line to the connected client.
    pub fn send_line(&self, line: impl Into<String>) {
        let mut line = line.into();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        let _ = self.actions.send(ServerAction::Send(line));
    }

    /// Drop the current client connection.
    pub fn close_connection(&self) {
        let _ = self.actions.send(ServerAction::Close);
    }

    /// Lines received so far, without terminators.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().expect("received lines lock").clone()
    }

    /// Wait until at least `count` lines have arrived.
    pub async fn wait_for_lines(&self, count: usize) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            let received = self.received();
            if received.len() >= count || tokio::time::Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeVehicleServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<F>(
    listener: TcpListener,
    received: Arc<Mutex<Vec<String>>>,
    mut actions: mpsc::UnboundedReceiver<ServerAction>,
    mut responder: F,
) where
    F: FnMut(&str) -> Vec<String> + Send + 'static,
{
    while let Ok((stream, _)) = listener.accept().await {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { break };
                    received.lock().expect("received lines lock").push(line.clone());
                    for reply in responder(&line) {
                        let _ = write_half.write_all(reply.as_bytes()).await;
                    }
                }
                action = actions.recv() => match action {
                    Some(ServerAction::Send(line)) => {
                        let _ = write_half.write_all(line.as_bytes()).await;
                    }
                    Some(ServerAction::Close) | None => break,
                },
            }
        }
    }
}

/// Encode a server line, panicking on invalid input.
pub fn line(kind: &str, data: &str) -> String {
    frame::encode(kind, data).expect("test frame should encode")
}

fn standard_reply(received: &str, client_id: &str) -> Vec<String> {
    let Ok(frame) = frame::decode(received) else {
        return Vec::new();
    };

    let reply = match frame.kind() {
        types::CONNECT => match frame.data().strip_prefix("ADMIN:") {
            Some(rest) if rest.split(':').next() != Some(ADMIN_PASSWORD) => {
                line(types::CONNECT_ERROR, "BADPASS")
            }
            _ => line(types::CONNECT_ACK, client_id),
        },
        types::DISCONNECT => line(types::DISCONNECT_ACK, "GOODBYE"),
        codes::LIST_USERS => line(types::USER_LIST, USER_LIST_REPLY),
        codes::SPEED_UP | codes::SLOW_DOWN | codes::TURN_LEFT | codes::TURN_RIGHT => {
            line(types::COMMAND_OK, "EXECUTED")
        }
        _ => line(types::COMMAND_ERROR, "UNKNOWN"),
    };
    vec![reply]
}

/// Next event from the stream, panicking after [`WAIT_TIMEOUT`].
pub async fn next_event(events: &mut EventStream) -> ClientEvent {
    tokio::time::timeout(WAIT_TIMEOUT, events.next())
        .await
        .expect("event should arrive in time")
        .expect("event stream should stay open")
}

/// Skip events until one satisfies `predicate`.
pub async fn wait_for_event<P>(events: &mut EventStream, mut predicate: P) -> ClientEvent
where
    P: FnMut(&ClientEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}

/// Events already queued, without waiting.
pub fn pending_events(events: &mut EventStream) -> Vec<ClientEvent> {
    let mut pending = Vec::new();
    while let Ok(event) = events.as_mut().try_recv() {
        pending.push(event);
    }
    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_replies() {
        assert_eq!(standard_reply("CONN|0008|OBSERVER", "C1"), vec!["CACK|0002|C1\n"]);
        assert_eq!(standard_reply("CONN|0011|ADMIN:wrong", "C1"), vec!["CERR|0007|BADPASS\n"]);
        assert_eq!(standard_reply("SPUP|0000|", "C1"), vec!["CMOK|0008|EXECUTED\n"]);
        assert_eq!(standard_reply("DISC|0000|", "C1"), vec!["DACK|0007|GOODBYE\n"]);
    }
}
