//! UDP telemetry receiver

use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use crate::protocol::frame::{self, types};
use crate::protocol::telemetry;
use crate::provider::TelemetrySource;
use crate::types::TelemetrySample;
use crate::{LinkError, Result};

/// Receive buffer size, matching the server's message buffer.
const DATAGRAM_CAPACITY: usize = 4096;

/// Best-effort telemetry channel bound to a fixed local port
pub struct UdpTelemetry {
    socket: UdpSocket,
    buffer: Vec<u8>,
    local_addr: SocketAddr,
}

impl UdpTelemetry {
    /// Bind the receiver on `0.0.0.0:<port>`.
    ///
    /// The port is fixed, so a second client on the same host fails here
    /// with a transport error.
    pub async fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await.map_err(|e| {
            LinkError::transport_with_source(format!("cannot bind UDP port {port}"), e)
        })?;
        let local_addr = socket.local_addr()?;

        info!(%local_addr, "UDP telemetry receiver bound");

        Ok(Self { socket, buffer: vec![0; DATAGRAM_CAPACITY], local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl TelemetrySource for UdpTelemetry {
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        loop {
            let (len, peer) = self
                .socket
                .recv_from(&mut self.buffer)
                .await
                .map_err(|e| LinkError::transport_with_source("UDP receive failed", e))?;

            let text = String::from_utf8_lossy(&self.buffer[..len]);
            trace!(%peer, datagram = %text, "UDP datagram");

            let frame = frame::decode(&text)?;
            if frame.kind() != types::TELEMETRY {
                debug!(%peer, frame_type = frame.kind(), "Ignoring non-telemetry datagram");
                continue;
            }

            let sample = telemetry::parse(frame.data());
            if sample.is_empty() {
                debug!(%peer, "Telemetry datagram carried no known fields");
                continue;
            }

            return Ok(Some(sample));
        }
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn send_to(port: u16, payload: &str) {
        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        sender.send_to(payload.as_bytes(), (Ipv4Addr::LOCALHOST, port)).await.unwrap();
    }

    #[tokio::test]
    async fn receives_tele_frames_and_skips_others() {
        let mut receiver = UdpTelemetry::bind(0).await.expect("bind ephemeral port");
        let port = receiver.local_addr().port();

        send_to(port, "CMOK|0008|EXECUTED").await;
        send_to(port, "TELE|0000|").await;
        send_to(port, "TELE|0039|SPEED:45.5|BATTERY:78|TEMP:35.2|DIR:NORTH\n").await;

        let sample = tokio::time::timeout(Duration::from_secs(2), receiver.next_sample())
            .await
            .expect("datagram should arrive")
            .expect("receive should succeed")
            .expect("source should not end");

        assert_eq!(sample.speed, Some(45.5));
        assert_eq!(sample.direction.as_deref(), Some("NORTH"));
    }

    #[tokio::test]
    async fn malformed_datagrams_surface_as_errors() {
        let mut receiver = UdpTelemetry::bind(0).await.unwrap();
        let port = receiver.local_addr().port();

        send_to(port, "   ").await;
        let result = tokio::time::timeout(Duration::from_secs(2), receiver.next_sample())
            .await
            .expect("datagram should arrive");
        assert!(matches!(result, Err(LinkError::MalformedFrame { .. })));
    }

    #[tokio::test]
    async fn bare_payload_datagrams_are_accepted() {
        let mut receiver = UdpTelemetry::bind(0).await.unwrap();
        let port = receiver.local_addr().port();

        send_to(port, "SPEED:12|BATTERY:90").await;
        let sample = tokio::time::timeout(Duration::from_secs(2), receiver.next_sample())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(sample.battery, Some(90.0));
    }

    #[tokio::test]
    async fn second_bind_on_same_port_fails() {
        let first = UdpTelemetry::bind(0).await.unwrap();
        let port = first.local_addr().port();

        let second = UdpTelemetry::bind(port).await;
        assert!(matches!(second, Err(LinkError::Transport { .. })));
    }
}
