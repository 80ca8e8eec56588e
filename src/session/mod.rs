//! Session state machine for the control channel
//!
//! A [`Session`] owns one connection to the vehicle server:
//!
//! ```text
//! Disconnected -> Connecting -> Connected(role) -> Closing -> Disconnected
//!                      |                                         ^
//!                      +------------ CERR / transport error -----+
//! ```
//!
//! State transitions are serialized through a `watch` channel: only the
//! caller that wins a transition performs the work that follows it, and
//! readers observe the state without mutating it. While connected, two
//! tasks run alongside the caller: the control-channel reader and the UDP
//! telemetry pump. Both stop when the session's cancellation token fires.

mod control;
mod handshake;

use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::driver::Driver;
use crate::events::EventSink;
use crate::protocol::frame::{self, types};
use crate::providers::UdpTelemetry;
use crate::types::{ClientIdentity, Command, Credentials, Role, SessionState};
use crate::{LinkError, Result};

type LineReader = BufReader<OwnedReadHalf>;

/// One client-to-server session.
///
/// All methods take `&self`; the session can be shared behind an `Arc` and
/// driven from several tasks at once.
pub struct Session {
    shared: Arc<Shared>,
}

/// Tasks and cancellation token of the active connection.
struct ActiveTasks {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

struct Shared {
    config: SessionConfig,
    events: EventSink,
    state: watch::Sender<SessionState>,
    identity: RwLock<Option<ClientIdentity>>,
    /// Control-channel write path; one frame at a time
    writer: Mutex<Option<OwnedWriteHalf>>,
    active: StdMutex<Option<ActiveTasks>>,
}

impl Session {
    pub fn new(config: SessionConfig, events: EventSink) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                config,
                events,
                state,
                identity: RwLock::new(None),
                writer: Mutex::new(None),
                active: StdMutex::new(None),
            }),
        }
    }

    /// Open the control channel and perform the handshake.
    ///
    /// Fails with [`LinkError::AlreadyConnected`] unless the session is
    /// disconnected. On any failure the session returns to `Disconnected`
    /// and no `on_connected` event is emitted.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: Credentials,
    ) -> Result<ClientIdentity> {
        let shared = &self.shared;
        if !shared.transition(|state| state == SessionState::Disconnected, SessionState::Connecting)
        {
            return Err(LinkError::AlreadyConnected);
        }

        let role = credentials.role();
        info!(host, port, %role, "Connecting to vehicle server");
        shared.events.log(format!("Connecting to {host}:{port} as {role}"));

        match self.establish(host, port, &credentials).await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                shared.state.send_replace(SessionState::Disconnected);
                warn!(host, port, error = %e, "Connect failed");
                shared.events.log(format!("Connection failed: {e}"));
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<ClientIdentity> {
        let shared = &self.shared;
        let role = credentials.role();

        let udp = match shared.config.udp_port {
            Some(udp_port) => match UdpTelemetry::bind(udp_port).await {
                Ok(receiver) => Some(receiver),
                Err(e) => {
                    warn!(udp_port, error = %e, "Continuing without UDP telemetry");
                    shared.events.log(format!("UDP telemetry unavailable: {e}"));
                    None
                }
            },
            None => None,
        };
        let advertised = udp
            .as_ref()
            .filter(|_| shared.config.advertise_udp_port)
            .map(|receiver| receiver.local_addr().port());

        let connect_timeout = shared.config.connect_timeout;
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| LinkError::Timeout { duration: connect_timeout })?
            .map_err(|e| {
                LinkError::transport_with_source(format!("cannot connect to {host}:{port}"), e)
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle's algorithm");
        }

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = frame::encode(types::CONNECT, &credentials.handshake_payload(advertised))?;
        write_half
            .write_all(hello.as_bytes())
            .await
            .map_err(|e| LinkError::transport_with_source("cannot send handshake", e))?;
        debug!(%role, udp_port = ?advertised, "Handshake sent");

        let client_id =
            handshake::await_reply(&mut reader, &shared.events, shared.config.handshake_timeout)
                .await?;
        let identity = ClientIdentity { client_id };

        let cancel = CancellationToken::new();
        shared.install(cancel.clone());
        *shared.writer.lock().await = Some(write_half);
        shared.set_identity(Some(identity.clone()));
        shared.state.send_replace(SessionState::Connected(role));

        info!(client_id = %identity.client_id, %role, "Session established");
        shared.events.connected(identity.client_id.clone(), role);
        shared.events.authorization_changed(role.can_send_commands());

        shared.track(tokio::spawn(control::run(Arc::clone(shared), reader, cancel.clone())));
        if let Some(receiver) = udp {
            shared.track(Driver::spawn(receiver, shared.events.clone(), cancel.child_token()));
        }

        Ok(identity)
    }

    /// Send a command over the control channel.
    ///
    /// Observer sessions are rejected locally with
    /// [`LinkError::NotAuthorized`] and nothing is written. The
    /// [`Command::Disconnect`] command closes the session. Free text that
    /// is not a four character code goes out as a bare line for the server
    /// to accept or refuse.
    pub async fn send_command(&self, command: impl Into<Command>) -> Result<()> {
        let command = command.into();
        let Some(role) = self.state().role() else {
            return Err(LinkError::NotConnected);
        };

        if command == Command::Disconnect {
            return self.disconnect().await;
        }

        let events = &self.shared.events;
        if !role.can_send_commands() {
            warn!(%command, "Command rejected for observer session");
            events.log(format!("Command {command} rejected: observer sessions cannot send commands"));
            return Err(LinkError::not_authorized(command.code()));
        }

        let line = match &command {
            Command::Raw(text) if !frame::is_frame_type(text) => frame::encode_legacy(text),
            _ => frame::encode(command.code(), ""),
        }
        .inspect_err(|e| {
            events.log(format!("Command {command} not sent: {e}"));
        })?;
        self.shared.write_line(&line).await?;

        debug!(%command, "Command sent");
        events.log(format!("Sent {command}"));
        Ok(())
    }

    /// Close the session.
    ///
    /// Sends `DISC` best-effort, then tears the channels down whether or not
    /// the goodbye went out.
    pub async fn disconnect(&self) -> Result<()> {
        let shared = &self.shared;
        if !shared.transition(SessionState::is_connected, SessionState::Closing) {
            return Err(LinkError::NotConnected);
        }

        info!("Disconnecting from vehicle server");
        shared.send_goodbye().await;

        for task in shared.cancel_active() {
            if let Err(e) = task.await {
                debug!(error = %e, "Session task ended abnormally");
            }
        }

        shared.finish("client disconnect");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Stream of state changes, starting with the current state.
    pub fn state_updates(&self) -> WatchStream<SessionState> {
        WatchStream::new(self.shared.state.subscribe())
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Identity assigned by the server, while connected.
    pub fn identity(&self) -> Option<ClientIdentity> {
        self.shared.identity.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn role(&self) -> Option<Role> {
        self.state().role()
    }

    pub fn can_send_commands(&self) -> bool {
        self.role().is_some_and(Role::can_send_commands)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.cancel_active();
    }
}

impl Shared {
    /// Move to `to` if the current state satisfies `from`. Returns whether
    /// this caller performed the transition.
    fn transition(&self, from: impl Fn(SessionState) -> bool, to: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if !from(*state) {
                return false;
            }
            debug!(from = %state, to = %to, "Session transition");
            *state = to;
            true
        })
    }

    fn set_identity(&self, identity: Option<ClientIdentity>) {
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    fn install(&self, cancel: CancellationToken) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active = Some(ActiveTasks { cancel, tasks: Vec::new() });
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = active.as_mut() {
            active.tasks.push(task);
        }
    }

    /// Cancel the active tasks and hand back their handles.
    fn cancel_active(&self) -> Vec<JoinHandle<()>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.take() {
            Some(ActiveTasks { cancel, tasks }) => {
                cancel.cancel();
                tasks
            }
            None => Vec::new(),
        }
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(LinkError::NotConnected);
        };
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LinkError::transport_with_source("cannot write to control channel", e))
    }

    async fn send_goodbye(&self) {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };

        match frame::encode(types::DISCONNECT, "") {
            Ok(line) => {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!(error = %e, "Goodbye not delivered");
                }
            }
            Err(e) => debug!(error = %e, "Goodbye not encoded"),
        }
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Control channel shutdown failed");
        }
    }

    /// Tear down after the peer closed the channel or the read failed.
    ///
    /// Does nothing when a disconnect already owns the teardown.
    async fn abort(&self, reason: &str) {
        if !self.transition(SessionState::is_connected, SessionState::Closing) {
            debug!(reason, "Control channel ended during disconnect");
            return;
        }

        warn!(reason, "Session terminated by the transport");
        self.events.log(format!("Connection lost: {reason}"));
        self.writer.lock().await.take();
        // Our own handle is among these; dropping it detaches the task
        drop(self.cancel_active());
        self.finish(reason);
    }

    /// Final step of every teardown: `Closing -> Disconnected`.
    fn finish(&self, reason: &str) {
        self.set_identity(None);
        self.state.send_replace(SessionState::Disconnected);
        info!(reason, "Session closed");
        self.events.disconnected(reason);
        self.events.authorization_changed(false);
    }
}

/// Outcome of one read from the control channel.
enum Received {
    Line(String),
    /// Line longer than [`frame::MAX_LINE_LEN`], already skipped
    Oversized(LinkError),
    End,
}

/// Read one line without its terminator.
///
/// Invalid UTF-8 is replaced rather than failing the read, so one corrupt
/// line cannot end the session. At most [`frame::MAX_LINE_LEN`] bytes are
/// buffered; the rest of a longer line is discarded up to its newline.
async fn read_line(reader: &mut LineReader, buffer: &mut Vec<u8>) -> std::io::Result<Received> {
    buffer.clear();
    let limit = frame::MAX_LINE_LEN;
    let read = (&mut *reader).take(limit as u64).read_until(b'\n', buffer).await?;
    if read == 0 {
        return Ok(Received::End);
    }

    if read == limit && buffer.last() != Some(&b'\n') {
        let skipped = skip_past_newline(reader).await?;
        let prefix = String::from_utf8_lossy(&buffer[..OVERSIZED_PREFIX.min(buffer.len())]);
        return Ok(Received::Oversized(LinkError::malformed(
            format!("line of {} bytes exceeds the {limit} byte limit", read + skipped),
            prefix,
        )));
    }

    let line = String::from_utf8_lossy(buffer);
    Ok(Received::Line(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Bytes of an oversized line kept for the error report.
const OVERSIZED_PREFIX: usize = 64;

/// Consume input through the next newline. Returns the bytes dropped.
async fn skip_past_newline(reader: &mut LineReader) -> std::io::Result<usize> {
    let mut skipped = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(skipped);
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(skipped + end + 1);
            }
            None => {
                let len = available.len();
                reader.consume(len);
                skipped += len;
            }
        }
    }
}
