//! Core data types shared by the protocol engine.
//!
//! - [`Frame`] is one protocol message, immutable once built
//! - [`TelemetrySample`] is a partial vehicle state with merge-on-update
//! - [`SessionState`], [`Role`] and [`Credentials`] describe the session
//! - [`Command`] is the closed set of operator commands
//!
//! ```rust
//! use drivelink::types::{Command, TelemetrySample};
//!
//! let mut view = TelemetrySample::default();
//! view.merge(&TelemetrySample { speed: Some(10.0), ..Default::default() });
//! view.merge(&TelemetrySample { battery: Some(50.0), ..Default::default() });
//! assert_eq!((view.speed, view.battery), (Some(10.0), Some(50.0)));
//!
//! assert_eq!(Command::parse("speed up").code(), "SPUP");
//! ```

mod command;
mod frame;
mod session_state;
mod telemetry;

pub use command::Command;
pub use frame::Frame;
pub use session_state::{ClientIdentity, Credentials, Role, SessionState};
pub use telemetry::TelemetrySample;
