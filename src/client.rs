//! Client facade wiring the session and demo mode to the collaborator
//!
//! [`VehicleClient`] is the entry point for UI layers. It owns exactly one
//! [`Session`] and the demo simulator, and routes both into one ordered
//! event stream.

use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::driver::Driver;
use crate::events::{EventSink, EventStream};
use crate::providers::DemoSimulator;
use crate::session::Session;
use crate::types::{ClientIdentity, Command, SessionState, TelemetrySample};
use crate::{LinkError, Result};

struct DemoTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Operator client for one vehicle server.
///
/// Demo mode runs only while no session is connected: connecting stops it,
/// and a transport failure during `connect` can start it as a fallback.
pub struct VehicleClient {
    config: ClientConfig,
    session: Session,
    events: EventSink,
    demo: Mutex<Option<DemoTask>>,
}

impl VehicleClient {
    /// Build a client and the event stream its collaborator consumes.
    pub fn new(config: ClientConfig) -> Result<(Self, EventStream)> {
        config.validate()?;

        let (events, stream) = EventSink::channel();
        let session = Session::new(config.session(), events.clone());
        let client = Self { config, session, events, demo: Mutex::new(None) };
        Ok((client, stream))
    }

    /// Connect to the configured server.
    ///
    /// Transport failures and timeouts start demo mode when
    /// `demo.fallback_on_connect_failure` is set; the error is still
    /// returned so the caller knows the server was not reached.
    pub async fn connect(&self) -> Result<ClientIdentity> {
        if self.session.state() != SessionState::Disconnected {
            return Err(LinkError::AlreadyConnected);
        }
        self.stop_demo();

        let server = &self.config.server;
        let result = self.session.connect(&server.host, server.port, self.config.credentials()).await;

        if let Err(e) = &result {
            let unreachable = matches!(e, LinkError::Transport { .. } | LinkError::Timeout { .. });
            if unreachable && self.config.demo.fallback_on_connect_failure {
                info!("Server unreachable, falling back to demo mode");
                self.start_demo()?;
            }
        }

        result
    }

    /// Send a command.
    ///
    /// In demo mode the command is echoed as simulated instead of failing.
    pub async fn send_command(&self, command: impl Into<Command>) -> Result<()> {
        let command = command.into();

        if !self.session.state().is_connected() && self.is_demo_active() {
            if command == Command::Disconnect {
                self.stop_demo();
                return Ok(());
            }
            debug!(%command, "Simulating command in demo mode");
            self.events.log(format!("[demo] simulated {command}"));
            return Ok(());
        }

        self.session.send_command(command).await
    }

    /// Close the session, or leave demo mode when no session is open.
    pub async fn disconnect(&self) -> Result<()> {
        if self.session.state().is_connected() {
            return self.session.disconnect().await;
        }
        if self.stop_demo() {
            return Ok(());
        }
        Err(LinkError::NotConnected)
    }

    /// Start producing synthetic telemetry.
    ///
    /// Must be called from within a Tokio runtime. Does nothing if demo
    /// mode is already running.
    pub fn start_demo(&self) -> Result<()> {
        if self.session.state() != SessionState::Disconnected {
            return Err(LinkError::AlreadyConnected);
        }

        let mut demo = self.demo.lock().unwrap_or_else(PoisonError::into_inner);
        if demo.is_some() {
            return Ok(());
        }

        let interval = self.config.demo_interval();
        let cancel = CancellationToken::new();
        let task = Driver::spawn(DemoSimulator::new(interval), self.events.clone(), cancel.clone());
        *demo = Some(DemoTask { cancel, task });

        info!(?interval, "Demo mode started");
        self.events.log(format!("Demo mode started, one sample every {interval:?}"));
        Ok(())
    }

    /// Stop demo mode. Returns whether it was running.
    pub fn stop_demo(&self) -> bool {
        let demo = self.demo.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(DemoTask { cancel, task }) = demo else {
            return false;
        };

        cancel.cancel();
        drop(task);
        info!("Demo mode stopped");
        self.events.log("Demo mode stopped");
        true
    }

    pub fn is_demo_active(&self) -> bool {
        self.demo
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|demo| !demo.task.is_finished())
    }

    /// Latest merged telemetry view.
    pub fn telemetry(&self) -> TelemetrySample {
        self.events.current_view()
    }

    /// Stream of merged telemetry views, starting with the current one.
    pub fn telemetry_updates(&self) -> WatchStream<TelemetrySample> {
        WatchStream::new(self.events.view())
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn state_updates(&self) -> WatchStream<SessionState> {
        self.session.state_updates()
    }

    pub fn identity(&self) -> Option<ClientIdentity> {
        self.session.identity()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Drop for VehicleClient {
    fn drop(&mut self) {
        let demo = self.demo.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(demo) = demo {
            demo.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ClientEvent;
    use crate::test_utils::{FakeVehicleServer, next_event, wait_for_event};
    use crate::types::Role;
    use std::net::Ipv4Addr;

    fn config_for(port: u16) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.server.port = port;
        config.udp.enabled = false;
        config.demo.interval_ms = 50;
        config
    }

    async fn closed_port() -> u16 {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_demo() {
        let _ = tracing_subscriber::fmt::try_init();
        let (client, mut events) = VehicleClient::new(config_for(closed_port().await)).unwrap();

        let error = client.connect().await.unwrap_err();
        assert!(matches!(error, LinkError::Transport { .. }));
        assert!(client.is_demo_active());

        let event = wait_for_event(&mut events, |e| matches!(e, ClientEvent::Telemetry { .. })).await;
        assert!(matches!(event, ClientEvent::Telemetry { is_demo: true, .. }));
        assert!(client.telemetry().speed.is_some());
    }

    #[tokio::test]
    async fn fallback_can_be_disabled() {
        let mut config = config_for(closed_port().await);
        config.demo.fallback_on_connect_failure = false;
        let (client, _events) = VehicleClient::new(config).unwrap();

        assert!(client.connect().await.is_err());
        assert!(!client.is_demo_active());
    }

    #[tokio::test]
    async fn rejected_handshake_does_not_start_demo() {
        let server = FakeVehicleServer::rejecting("FULL").await;
        let (client, _events) = VehicleClient::new(config_for(server.port())).unwrap();

        let error = client.connect().await.unwrap_err();
        assert!(matches!(error, LinkError::HandshakeRejected { .. }));
        assert!(!client.is_demo_active());
    }

    #[tokio::test]
    async fn demo_commands_are_simulated() {
        let (client, mut events) = VehicleClient::new(config_for(5555)).unwrap();
        client.start_demo().unwrap();

        client.send_command("turn left").await.expect("demo commands succeed");
        let event = wait_for_event(&mut events, |e| {
            matches!(e, ClientEvent::Log(message) if message.contains("simulated"))
        })
        .await;
        assert_eq!(event, ClientEvent::Log("[demo] simulated TNLF".into()));

        client.disconnect().await.expect("disconnect leaves demo mode");
        assert!(!client.is_demo_active());
        assert!(matches!(client.disconnect().await, Err(LinkError::NotConnected)));
    }

    #[tokio::test]
    async fn connecting_stops_demo_mode() {
        let server = FakeVehicleServer::accepting("A0100").await;
        let mut config = config_for(server.port());
        config.role = Role::Admin;
        config.password = Some(crate::test_utils::ADMIN_PASSWORD.into());
        let (client, mut events) = VehicleClient::new(config).unwrap();

        client.start_demo().unwrap();
        client.connect().await.unwrap();
        assert!(!client.is_demo_active());
        assert!(matches!(client.start_demo(), Err(LinkError::AlreadyConnected)));

        wait_for_event(&mut events, |e| matches!(e, ClientEvent::Connected { .. })).await;
        client.send_command("slow down").await.unwrap();
        let ack = wait_for_event(&mut events, |e| matches!(e, ClientEvent::CommandAck { .. })).await;
        assert!(matches!(ack, ClientEvent::CommandAck { data, .. } if data == "EXECUTED"));

        client.send_command(Command::Disconnect).await.unwrap();
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn telemetry_view_merges_partial_samples() {
        let server = FakeVehicleServer::accepting("C0100").await;
        let (client, mut events) = VehicleClient::new(config_for(server.port())).unwrap();
        client.connect().await.unwrap();

        server.send_line("SPEED=10");
        server.send_line("BATTERY=50");
        for _ in 0..2 {
            wait_for_event(&mut events, |e| matches!(e, ClientEvent::Telemetry { .. })).await;
        }

        let view = client.telemetry();
        assert_eq!(view.speed, Some(10.0));
        assert_eq!(view.battery, Some(50.0));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ClientConfig::default();
        config.role = Role::Admin;
        assert!(matches!(VehicleClient::new(config), Err(LinkError::Config { .. })));
    }

    #[tokio::test]
    async fn first_event_after_connect_is_a_log() {
        let server = FakeVehicleServer::accepting("C0101").await;
        let (client, mut events) = VehicleClient::new(config_for(server.port())).unwrap();
        client.connect().await.unwrap();
        assert!(matches!(next_event(&mut events).await, ClientEvent::Log(_)));
        assert_eq!(client.identity().unwrap().client_id, "C0101");
    }
}
