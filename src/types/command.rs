//! Operator commands

use std::fmt;

use crate::protocol::command::{self, codes};

/// Closed set of operator commands, plus pass-through raw codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    SpeedUp,
    SlowDown,
    TurnLeft,
    TurnRight,
    ListUsers,
    Disconnect,
    /// Unrecognized input, sent as-is so the server can reject it
    Raw(String),
}

impl Command {
    /// Parse a human-readable phrase or a short code.
    pub fn parse(input: &str) -> Self {
        let code = command::translate(input);
        match code.as_str() {
            codes::SPEED_UP => Command::SpeedUp,
            codes::SLOW_DOWN => Command::SlowDown,
            codes::TURN_LEFT => Command::TurnLeft,
            codes::TURN_RIGHT => Command::TurnRight,
            codes::LIST_USERS => Command::ListUsers,
            codes::DISCONNECT => Command::Disconnect,
            _ => Command::Raw(code),
        }
    }

    /// Wire code transmitted as the frame type.
    pub fn code(&self) -> &str {
        match self {
            Command::SpeedUp => codes::SPEED_UP,
            Command::SlowDown => codes::SLOW_DOWN,
            Command::TurnLeft => codes::TURN_LEFT,
            Command::TurnRight => codes::TURN_RIGHT,
            Command::ListUsers => codes::LIST_USERS,
            Command::Disconnect => codes::DISCONNECT,
            Command::Raw(code) => code,
        }
    }
}

impl From<&str> for Command {
    fn from(input: &str) -> Self {
        Command::parse(input)
    }
}

impl From<String> for Command {
    fn from(input: String) -> Self {
        Command::parse(&input)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
