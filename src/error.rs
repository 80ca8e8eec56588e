//! Error types for the protocol engine.
//!
//! All errors implement `std::error::Error` and carry enough context for the
//! caller to decide whether the client can keep going.
//!
//! ## Error Categories
//!
//! - **Parse Errors**: unparseable lines or datagrams (`MalformedFrame`)
//! - **Encode Errors**: outbound frames that cannot be represented on the wire
//! - **Transport Errors**: socket-level failures on either channel
//! - **Protocol Errors**: frames that are valid but unexpected for the session state
//! - **Authorization Errors**: commands attempted without the admin role
//! - **Handshake Errors**: the server refused the `CONN` request
//!
//! None of these are fatal to the process. A failed session returns to
//! `Disconnected` and the client can retry or fall back to demo mode:
//!
//! ```rust
//! use drivelink::LinkError;
//!
//! let error = LinkError::transport("connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for protocol engine operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for protocol engine operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("Malformed frame: {details}")]
    MalformedFrame { details: String, input: String },

    #[error("Cannot encode frame: {details}")]
    Encode { details: String },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Protocol violation: unexpected {frame_type} while {state}")]
    ProtocolViolation { frame_type: String, state: String },

    #[error("Not authorized: {action} requires the admin role")]
    NotAuthorized { action: String },

    #[error("Server rejected the handshake: {reason}")]
    HandshakeRejected { reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("No active session")]
    NotConnected,

    #[error("A session is already active")]
    AlreadyConnected,

    #[error("Invalid configuration: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LinkError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Transport { .. } => true,
            LinkError::Timeout { .. } => true,
            LinkError::NotConnected => true,
            LinkError::MalformedFrame { .. } => false,
            LinkError::Encode { .. } => false,
            LinkError::ProtocolViolation { .. } => false,
            LinkError::NotAuthorized { .. } => false,
            LinkError::HandshakeRejected { .. } => false,
            LinkError::AlreadyConnected => false,
            LinkError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LinkError::MalformedFrame { .. } => vec![
                "Check that the server speaks the TYPE|LEN|DATA protocol",
                "Inspect the raw line in the debug log",
            ],
            LinkError::Encode { .. } => vec![
                "Remove line breaks from command text",
                "Keep payloads under 10000 bytes without line breaks",
            ],
            LinkError::Transport { .. } => vec![
                "Check that the vehicle server is running",
                "Verify host and port in the configuration",
                "Retry the connection or switch to demo mode",
            ],
            LinkError::ProtocolViolation { .. } => vec![
                "Check server and client protocol versions",
                "Report the offending frame to the server maintainers",
            ],
            LinkError::NotAuthorized { .. } => {
                vec!["Reconnect with the admin role and a valid password"]
            }
            LinkError::HandshakeRejected { .. } => vec![
                "Check the admin password",
                "Check that the server has free client slots",
            ],
            LinkError::Timeout { .. } => vec![
                "Increase the configured timeout",
                "Check network latency to the server",
            ],
            LinkError::NotConnected => vec!["Connect to a server before sending commands"],
            LinkError::AlreadyConnected => vec!["Disconnect the current session first"],
            LinkError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Provide a password when the role is admin",
            ],
        }
    }

    /// Helper constructor for malformed input.
    pub fn malformed(details: impl Into<String>, input: impl Into<String>) -> Self {
        LinkError::MalformedFrame { details: details.into(), input: input.into() }
    }

    /// Helper constructor for encode failures.
    pub fn encode(details: impl Into<String>) -> Self {
        LinkError::Encode { details: details.into() }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        LinkError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LinkError::Transport { reason: reason.into(), source: Some(Box::new(source)) }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol_violation(frame_type: impl Into<String>, state: impl Into<String>) -> Self {
        LinkError::ProtocolViolation { frame_type: frame_type.into(), state: state.into() }
    }

    /// Helper constructor for authorization failures.
    pub fn not_authorized(action: impl Into<String>) -> Self {
        LinkError::NotAuthorized { action: action.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        LinkError::Config { reason: reason.into(), source: None }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Transport { reason: err.kind().to_string(), source: Some(Box::new(err)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn messages_carry_their_context(reason in "[a-zA-Z0-9_ ]{1,40}", code in "[A-Z]{4}") {
            let rejected = LinkError::HandshakeRejected { reason: reason.clone() };
            prop_assert!(rejected.to_string().contains(&reason));

            let violation = LinkError::protocol_violation(code.clone(), "connected");
            prop_assert!(violation.to_string().contains(&code));

            let transport = LinkError::transport(reason.clone());
            prop_assert!(transport.to_string().contains(&reason));
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();

        let error = LinkError::NotConnected;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(LinkError::transport("reset").is_retryable());
        assert!(LinkError::Timeout { duration: Duration::from_secs(5) }.is_retryable());
        assert!(!LinkError::HandshakeRejected { reason: "BADPASS".into() }.is_retryable());
        assert!(!LinkError::not_authorized("SPUP").is_retryable());

        for error in [
            LinkError::malformed("empty line", ""),
            LinkError::encode("type too long"),
            LinkError::NotConnected,
            LinkError::AlreadyConnected,
            LinkError::config("missing password"),
        ] {
            assert!(!error.recovery_suggestions().is_empty());
        }
    }

    #[test]
    fn io_errors_become_transport_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err: LinkError = io_err.into();

        match err {
            LinkError::Transport { source: Some(source), .. } => {
                assert_eq!(source.to_string(), "peer reset");
            }
            other => panic!("Expected Transport error, got {other:?}"),
        }
    }
}
