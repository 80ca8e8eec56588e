//! Protocol engine for operator clients of a remote vehicle-control server.
//!
//! Drivelink exchanges commands and telemetry with a vehicle server over a
//! text protocol, leaving widgets and rendering to the embedding UI.
//!
//! # Features
//!
//! - **Tolerant framing**: length-prefixed `TYPE|LLLL|DATA` frames and legacy
//!   keyword lines are decoded by the same entry point
//! - **Dual transport**: reliable TCP control channel plus best-effort UDP
//!   telemetry on a fixed local port
//! - **Roles**: observer sessions are read-only, admin sessions may send
//!   commands
//! - **Demo mode**: synthetic telemetry when no server is reachable
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use drivelink::{ClientConfig, ClientEvent, Drivelink};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> drivelink::Result<()> {
//!     let (client, mut events) = Drivelink::client(ClientConfig::default())?;
//!     if let Err(e) = client.connect().await {
//!         eprintln!("connect failed: {e}");
//!     }
//!
//!     while let Some(event) = events.next().await {
//!         if let ClientEvent::Telemetry { sample, is_demo } = event {
//!             println!("{}{sample}", if is_demo { "[demo] " } else { "" });
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod events;
pub mod protocol;
#[cfg_attr(any(test, feature = "test-utils"), path = "test_utils.rs")]
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

// Session and telemetry sources
pub mod client;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod session;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use client::VehicleClient;
pub use config::{ClientConfig, SessionConfig};
pub use events::{AckKind, ClientEvent, Collaborator, EventSink, EventStream};
pub use provider::TelemetrySource;
pub use session::Session;

use std::path::Path;

/// Unified entry point for vehicle clients.
///
/// # Examples
///
/// ## Connect with a configuration file
/// ```rust,no_run
/// use drivelink::Drivelink;
///
/// #[tokio::main]
/// async fn main() -> drivelink::Result<()> {
///     let (client, events) = Drivelink::open("drivelink.yaml")?;
///     client.connect().await?;
///     // Hand `events` to the UI...
///     Ok(())
/// }
/// ```
///
/// ## Demo mode
/// ```rust,no_run
/// use drivelink::{ClientConfig, Drivelink};
///
/// #[tokio::main]
/// async fn main() -> drivelink::Result<()> {
///     let (client, events) = Drivelink::demo(ClientConfig::default())?;
///     // Synthetic telemetry arrives on `events`...
///     Ok(())
/// }
/// ```
pub struct Drivelink;

impl Drivelink {
    /// Build a client from an in-memory configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if the configuration is invalid.
    pub fn client(config: ClientConfig) -> Result<(VehicleClient, EventStream)> {
        VehicleClient::new(config)
    }

    /// Build a client from a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Config`] if the file cannot be read, is not
    /// valid YAML or fails validation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<(VehicleClient, EventStream)> {
        VehicleClient::new(ClientConfig::from_path(path)?)
    }

    /// Build a client that starts in demo mode.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn demo(config: ClientConfig) -> Result<(VehicleClient, EventStream)> {
        let (client, events) = VehicleClient::new(config)?;
        client.start_demo()?;
        Ok((client, events))
    }
}
