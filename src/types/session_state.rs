//! Session roles, states and identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access level requested during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only: receives telemetry, cannot send commands
    Observer,
    /// Read-write: password-gated, may send commands
    Admin,
}

impl Role {
    /// Whether sessions with this role may send commands.
    pub fn can_send_commands(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Observer => f.write_str("OBSERVER"),
            Role::Admin => f.write_str("ADMIN"),
        }
    }
}

/// Handshake credentials. The password never leaves this type except in
/// the `CONN` payload.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Observer,
    Admin { password: String },
}

impl Credentials {
    pub fn role(&self) -> Role {
        match self {
            Credentials::Observer => Role::Observer,
            Credentials::Admin { .. } => Role::Admin,
        }
    }

    /// Data field of the `CONN` frame.
    ///
    /// `udp_port` is appended only when the client advertises its fixed
    /// telemetry port.
    pub fn handshake_payload(&self, udp_port: Option<u16>) -> String {
        match (self, udp_port) {
            (Credentials::Observer, None) => "OBSERVER".to_string(),
            (Credentials::Observer, Some(port)) => format!("OBSERVER:{port}"),
            (Credentials::Admin { password }, None) => format!("ADMIN:{password}"),
            (Credentials::Admin { password }, Some(port)) => format!("ADMIN:{password}:{port}"),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Observer => f.write_str("Observer"),
            Credentials::Admin { .. } => f.write_str("Admin { password: <redacted> }"),
        }
    }
}

/// Connection state owned by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(Role),
    Closing,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    /// Role of the active session, if any.
    pub fn role(self) -> Option<Role> {
        match self {
            SessionState::Connected(role) => Some(role),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => f.write_str("disconnected"),
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::Connected(role) => write!(f, "connected as {role}"),
            SessionState::Closing => f.write_str("closing"),
        }
    }
}

/// Identity assigned by the server in the `CACK` frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: String,
}
