//! End-to-end tests driving `VehicleClient` against a minimal TCP server.

use std::net::Ipv4Addr;
use std::time::Duration;

use drivelink::events::{self, AckKind, Collaborator};
use drivelink::{
    ClientConfig, ClientEvent, Drivelink, EventStream, LinkError, Role, SessionState,
    TelemetrySample,
};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer each line with `reply` and return every
/// line received once the client hangs up.
async fn serve_once(reply: fn(&str) -> Option<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut received = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(answer) = reply(&line) {
                let _ = write_half.write_all(answer.as_bytes()).await;
            }
            received.push(line);
        }
        received
    });

    (port, handle)
}

fn config(port: u16, role: Role, password: Option<&str>) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.server.port = port;
    config.role = role;
    config.password = password.map(str::to_string);
    config.udp.enabled = false;
    config
}

async fn next_matching<P>(events: &mut EventStream, predicate: P) -> ClientEvent
where
    P: Fn(&ClientEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.next().await.expect("event stream open");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event should arrive")
}

#[derive(Default)]
struct Recorder {
    connected: Vec<(String, Role)>,
    acks: Vec<(AckKind, String)>,
    authorization: Vec<bool>,
    telemetry: Vec<(TelemetrySample, bool)>,
    disconnects: Vec<String>,
}

impl Collaborator for Recorder {
    fn on_log(&mut self, _message: &str) {}

    fn on_telemetry(&mut self, sample: &TelemetrySample, is_demo: bool) {
        self.telemetry.push((sample.clone(), is_demo));
    }

    fn on_connected(&mut self, client_id: &str, role: Role) {
        self.connected.push((client_id.to_string(), role));
    }

    fn on_disconnected(&mut self, reason: &str) {
        self.disconnects.push(reason.to_string());
    }

    fn on_command_ack(&mut self, kind: AckKind, data: &str) {
        self.acks.push((kind, data.to_string()));
    }

    fn on_authorization_changed(&mut self, can_send_commands: bool) {
        self.authorization.push(can_send_commands);
    }
}

#[tokio::test]
async fn rejected_handshake_is_a_distinct_outcome() {
    let _ = tracing_subscriber::fmt::try_init();
    let (port, server) = serve_once(|line| line.starts_with("CONN").then_some("CERR|0007|BADPASS\n")).await;

    let (client, mut events) =
        Drivelink::client(config(port, Role::Admin, Some("wrong"))).unwrap();
    let error = client.connect().await.unwrap_err();

    match &error {
        LinkError::HandshakeRejected { reason } => assert_eq!(reason, "BADPASS"),
        other => panic!("Expected HandshakeRejected, got {other:?}"),
    }
    assert!(!error.is_retryable());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(!client.is_demo_active());

    drop(client);
    let mut recorder = Recorder::default();
    events::deliver(events, &mut recorder).await;
    assert!(recorder.connected.is_empty());
    assert!(recorder.disconnects.is_empty());

    assert_eq!(server.await.unwrap(), vec!["CONN|0011|ADMIN:wrong"]);
}

#[tokio::test]
async fn observer_commands_never_reach_the_wire() {
    let (port, server) = serve_once(|line| line.starts_with("CONN").then_some("CACK|0005|C0001\n")).await;

    let (client, _events) = Drivelink::client(config(port, Role::Observer, None)).unwrap();
    client.connect().await.unwrap();

    for command in ["SPUP", "turn left", "LIST"] {
        let result = client.send_command(command).await;
        assert!(matches!(result, Err(LinkError::NotAuthorized { .. })), "{command} should be refused");
    }

    client.disconnect().await.unwrap();
    assert_eq!(server.await.unwrap(), vec!["CONN|0008|OBSERVER", "DISC|0000|"]);
}

#[tokio::test]
async fn admin_session_end_to_end() {
    let (port, server) = serve_once(|line| match line {
        l if l.starts_with("CONN") => Some("CACK|0005|A0001\nTELE|0016|SPEED:10|TEMP:31\n"),
        "SPUP|0000|" => Some("CMOK|0008|EXECUTED\nBATTERY=50\n"),
        "DISC|0000|" => Some("DACK|0007|GOODBYE\n"),
        _ => Some("CMER|0007|UNKNOWN\n"),
    })
    .await;

    let (client, mut events) =
        Drivelink::client(config(port, Role::Admin, Some("admin123"))).unwrap();
    let identity = client.connect().await.unwrap();
    assert_eq!(identity.client_id, "A0001");

    next_matching(&mut events, |e| matches!(e, ClientEvent::Telemetry { .. })).await;
    client.send_command("speed up").await.unwrap();
    next_matching(&mut events, |e| {
        matches!(e, ClientEvent::Telemetry { sample, .. } if sample.battery.is_some())
    })
    .await;

    let view = client.telemetry();
    assert_eq!(view.speed, Some(10.0));
    assert_eq!(view.temperature, Some(31.0));
    assert_eq!(view.battery, Some(50.0));

    client.disconnect().await.unwrap();
    drop(client);

    let mut recorder = Recorder::default();
    events::deliver(events, &mut recorder).await;
    assert_eq!(recorder.acks, vec![(AckKind::Ok, "EXECUTED".to_string())]);
    assert_eq!(recorder.disconnects, vec!["client disconnect".to_string()]);
    assert_eq!(recorder.authorization.last(), Some(&false));

    assert_eq!(server.await.unwrap(), vec!["CONN|0014|ADMIN:admin123", "SPUP|0000|", "DISC|0000|"]);
}

#[tokio::test]
async fn server_hangup_ends_the_session() {
    let (port, server) = serve_once(|line| line.starts_with("CONN").then_some("CACK|0005|C0002\n")).await;
    let (client, mut events) = Drivelink::client(config(port, Role::Observer, None)).unwrap();
    client.connect().await.unwrap();

    // The server task ends once it reads EOF, which never comes; abort it
    // to close the socket from the server side.
    server.abort();

    let event = next_matching(&mut events, |e| matches!(e, ClientEvent::Disconnected { .. })).await;
    assert_eq!(event, ClientEvent::Disconnected { reason: "connection closed by server".into() });
    assert_eq!(client.state(), SessionState::Disconnected);

    // Still usable: demo mode starts after the failure
    client.start_demo().unwrap();
    assert!(client.is_demo_active());
}
