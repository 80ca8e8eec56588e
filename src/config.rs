//! Client configuration
//!
//! All settings are supplied at construction; there is no runtime
//! reconfiguration. Configuration files are YAML:
//!
//! ```yaml
//! server:
//!   host: 127.0.0.1
//!   port: 5555
//! role: admin
//! password: admin123
//! udp:
//!   port: 5556
//! demo:
//!   interval_ms: 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{Credentials, Role};
use crate::{LinkError, Result};

/// Default TCP control port.
pub const DEFAULT_SERVER_PORT: u16 = 5555;

/// Default well-known UDP telemetry port.
pub const DEFAULT_UDP_PORT: u16 = 5556;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub role: Role,
    /// Required when `role` is admin
    pub password: Option<String>,
    pub udp: UdpConfig,
    pub demo: DemoConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Telemetry channel settings.
///
/// The receive port is fixed, so only one client per host can run the UDP
/// receiver at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UdpConfig {
    pub enabled: bool,
    pub port: u16,
    /// Append the receive port to the `CONN` payload
    pub advertise_port: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub interval_ms: u64,
    /// Start demo mode when `connect` cannot reach the server
    pub fallback_on_connect_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub handshake_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            role: Role::Observer,
            password: None,
            udp: UdpConfig::default(),
            demo: DemoConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: DEFAULT_SERVER_PORT }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self { enabled: true, port: DEFAULT_UDP_PORT, advertise_port: false }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self { interval_ms: 2000, fallback_on_connect_failure: true }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect_ms: 6000, handshake_ms: 5000 }
    }
}

impl ClientConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml_ng::from_str(yaml).map_err(|e| {
            LinkError::Config { reason: "invalid YAML".to_string(), source: Some(Box::new(e)) }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| LinkError::Config {
            reason: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(LinkError::config("server.host must not be empty"));
        }
        if self.server.port == 0 {
            return Err(LinkError::config("server.port must not be 0"));
        }
        if self.udp.enabled && self.udp.port == 0 {
            return Err(LinkError::config("udp.port must not be 0 when udp is enabled"));
        }
        if self.role == Role::Admin && self.password.as_deref().is_none_or(str::is_empty) {
            return Err(LinkError::config("admin role requires a password"));
        }
        if self.demo.interval_ms == 0 {
            return Err(LinkError::config("demo.interval_ms must be positive"));
        }
        if self.timeouts.connect_ms == 0 || self.timeouts.handshake_ms == 0 {
            return Err(LinkError::config("timeouts must be positive"));
        }
        Ok(())
    }

    /// Credentials derived from the role and password.
    pub fn credentials(&self) -> Credentials {
        match self.role {
            Role::Observer => Credentials::Observer,
            Role::Admin => {
                Credentials::Admin { password: self.password.clone().unwrap_or_default() }
            }
        }
    }

    /// Session-level settings.
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            udp_port: self.udp.enabled.then_some(self.udp.port),
            advertise_udp_port: self.udp.enabled && self.udp.advertise_port,
            connect_timeout: Duration::from_millis(self.timeouts.connect_ms),
            handshake_timeout: Duration::from_millis(self.timeouts.handshake_ms),
        }
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo.interval_ms)
    }
}

/// Settings consumed by [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Fixed UDP receive port, `None` disables the telemetry channel
    pub udp_port: Option<u16>,
    pub advertise_udp_port: bool,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        ClientConfig::default().session()
    }
}
