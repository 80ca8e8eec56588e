//! Wire protocol: framing, telemetry payloads and command codes.
//!
//! Servers evolved from a space-separated keyword protocol
//! (`TELEMETRY SPEED=30 BATTERY=80 DIR=LEFT`) to length-prefixed frames
//! (`TELE|0039|SPEED:45.5|BATTERY:78|TEMP:35.2|DIR:NORTH`). The decoders here
//! accept both without the caller knowing which version it is talking to.
//!
//! ```rust
//! use drivelink::protocol::{frame, telemetry};
//!
//! let wire = frame::encode("CONN", "OBSERVER").unwrap();
//! assert_eq!(wire, "CONN|0008|OBSERVER\n");
//!
//! let frame = frame::decode("TELE|0024|SPEED:12|BATTERY:90|DIR:N").unwrap();
//! let sample = telemetry::parse(frame.data());
//! assert_eq!(sample.speed, Some(12.0));
//! ```

pub mod command;
pub mod frame;
pub mod telemetry;
pub mod users;

pub use command::translate;
pub use frame::{decode, decode_legacy, decode_strict, encode};
pub use users::ConnectedUser;
