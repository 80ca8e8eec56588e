//! Collaborator interface and the delivery context.
//!
//! The protocol engine never calls into the UI from an I/O task. Every
//! notification becomes a [`ClientEvent`] pushed onto one ordered channel;
//! the consumer drains that channel on whichever execution context it needs
//! and hands each event to its [`Collaborator`].
//!
//! ```rust,no_run
//! use drivelink::events::{self, AckKind, Collaborator};
//! use drivelink::{Role, TelemetrySample};
//!
//! struct Console;
//!
//! impl Collaborator for Console {
//!     fn on_log(&mut self, message: &str) { println!("{message}"); }
//!     fn on_telemetry(&mut self, sample: &TelemetrySample, is_demo: bool) {
//!         println!("{}{sample}", if is_demo { "[demo] " } else { "" });
//!     }
//!     fn on_connected(&mut self, client_id: &str, role: Role) {
//!         println!("connected as {client_id} ({role})");
//!     }
//!     fn on_disconnected(&mut self, reason: &str) { println!("disconnected: {reason}"); }
//!     fn on_command_ack(&mut self, kind: AckKind, data: &str) { println!("{kind}: {data}"); }
//!     fn on_authorization_changed(&mut self, can_send_commands: bool) {
//!         println!("commands enabled: {can_send_commands}");
//!     }
//! }
//!
//! # async fn run(stream: events::EventStream) {
//! let mut console = Console;
//! events::deliver(stream, &mut console).await;
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace};

use crate::protocol::ConnectedUser;
use crate::types::{Role, TelemetrySample};

/// Ordered stream of events for the delivery context.
pub type EventStream = UnboundedReceiverStream<ClientEvent>;

/// Outcome carried by a command acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    /// `CMOK`
    Ok,
    /// `CMER`
    Error,
}

impl fmt::Display for AckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckKind::Ok => f.write_str("ok"),
            AckKind::Error => f.write_str("error"),
        }
    }
}

/// Notification produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Log(String),
    Telemetry { sample: TelemetrySample, is_demo: bool },
    Connected { client_id: String, role: Role },
    Disconnected { reason: String },
    CommandAck { kind: AckKind, data: String },
    AuthorizationChanged { can_send_commands: bool },
    UserList(Vec<ConnectedUser>),
}

impl ClientEvent {
    /// Invoke the matching collaborator callback.
    pub fn deliver_to<C: Collaborator + ?Sized>(&self, collaborator: &mut C) {
        match self {
            ClientEvent::Log(message) => collaborator.on_log(message),
            ClientEvent::Telemetry { sample, is_demo } => {
                collaborator.on_telemetry(sample, *is_demo)
            }
            ClientEvent::Connected { client_id, role } => {
                collaborator.on_connected(client_id, *role)
            }
            ClientEvent::Disconnected { reason } => collaborator.on_disconnected(reason),
            ClientEvent::CommandAck { kind, data } => collaborator.on_command_ack(*kind, data),
            ClientEvent::AuthorizationChanged { can_send_commands } => {
                collaborator.on_authorization_changed(*can_send_commands)
            }
            ClientEvent::UserList(users) => collaborator.on_user_list(users),
        }
    }
}

/// Callbacks implemented by the UI layer.
///
/// Callbacks run on the delivery context only, never on an I/O task, so
/// implementations need not be thread-safe.
pub trait Collaborator {
    fn on_log(&mut self, message: &str);

    fn on_telemetry(&mut self, sample: &TelemetrySample, is_demo: bool);

    fn on_connected(&mut self, client_id: &str, role: Role);

    fn on_disconnected(&mut self, reason: &str);

    fn on_command_ack(&mut self, kind: AckKind, data: &str);

    fn on_authorization_changed(&mut self, can_send_commands: bool);

    /// Connected users reported by the server in reply to `LIST`.
    fn on_user_list(&mut self, users: &[ConnectedUser]) {
        self.on_log(&format!("{} connected user(s)", users.len()));
        for user in users {
            self.on_log(&format!(
                "  {}:{} {} udp={}",
                user.address, user.port, user.role, user.udp_port
            ));
        }
    }
}

/// Drive `collaborator` with every event until all senders are gone.
pub async fn deliver<C: Collaborator + ?Sized>(mut events: EventStream, collaborator: &mut C) {
    while let Some(event) = events.next().await {
        event.deliver_to(collaborator);
    }
    debug!("Event stream closed");
}

/// Deliver the events already queued without waiting. Returns how many ran.
///
/// Suited to UI loops that poll once per frame.
pub fn drain_pending<C: Collaborator + ?Sized>(
    events: &mut EventStream,
    collaborator: &mut C,
) -> usize {
    let mut delivered = 0;
    while let Ok(event) = events.as_mut().try_recv() {
        event.deliver_to(collaborator);
        delivered += 1;
    }
    delivered
}

/// Producer side of the delivery channel, shared by all I/O tasks.
///
/// Sends never block; events are dropped silently once the consumer is gone.
/// Telemetry is also merged into a watch channel that always holds the
/// latest view.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
    view: Arc<watch::Sender<TelemetrySample>>,
}

impl EventSink {
    /// Create a sink and the stream that consumes it.
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(TelemetrySample::default());
        (Self { tx, view: Arc::new(view) }, UnboundedReceiverStream::new(rx))
    }

    fn emit(&self, event: ClientEvent) {
        trace!(?event, "Emitting client event");
        let _ = self.tx.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(ClientEvent::Log(message.into()));
    }

    /// Merge `sample` into the view and notify the collaborator.
    pub fn telemetry(&self, sample: TelemetrySample, is_demo: bool) {
        self.view.send_modify(|view| view.merge(&sample));
        self.emit(ClientEvent::Telemetry { sample, is_demo });
    }

    pub fn connected(&self, client_id: impl Into<String>, role: Role) {
        self.emit(ClientEvent::Connected { client_id: client_id.into(), role });
    }

    pub fn disconnected(&self, reason: impl Into<String>) {
        self.emit(ClientEvent::Disconnected { reason: reason.into() });
    }

    pub fn command_ack(&self, kind: AckKind, data: impl Into<String>) {
        self.emit(ClientEvent::CommandAck { kind, data: data.into() });
    }

    pub fn authorization_changed(&self, can_send_commands: bool) {
        self.emit(ClientEvent::AuthorizationChanged { can_send_commands });
    }

    pub fn user_list(&self, users: Vec<ConnectedUser>) {
        self.emit(ClientEvent::UserList(users));
    }

    /// Subscribe to the merged telemetry view.
    pub fn view(&self) -> watch::Receiver<TelemetrySample> {
        self.view.subscribe()
    }

    /// Current merged telemetry view.
    pub fn current_view(&self) -> TelemetrySample {
        self.view.borrow().clone()
    }
}
