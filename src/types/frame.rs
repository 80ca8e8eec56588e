//! Protocol frame type

use std::fmt;

/// One protocol message unit: `TYPE|LEN|DATA`.
///
/// Frames are immutable once built. The stored length is always the byte
/// length of `data`; a declared length that disagrees on the wire is not
/// trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    kind: String,
    length: usize,
    data: String,
}

impl Frame {
    /// Create a frame, deriving the length from `data`.
    pub fn new(kind: impl Into<String>, data: impl Into<String>) -> Self {
        let data = data.into();
        Self { kind: kind.into(), length: data.len(), data }
    }

    /// Message type, e.g. `CACK` or `TELE`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Byte length of the payload.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Raw payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Consume the frame and return its payload.
    pub fn into_data(self) -> String {
        self.data
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{:04}|{}", self.kind, self.length, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_tracks_payload_bytes() {
        let frame = Frame::new("CACK", "A0001");
        assert_eq!(frame.length(), 5);

        // Multi-byte characters count in bytes, not chars
        let frame = Frame::new("TELE", "DIR:NORTE\u{f1}");
        assert_eq!(frame.length(), "DIR:NORTE\u{f1}".len());
    }

    #[test]
    fn display_matches_wire_layout() {
        assert_eq!(Frame::new("DISC", "").to_string(), "DISC|0000|");
        assert_eq!(Frame::new("CERR", "BADPASS").to_string(), "CERR|0007|BADPASS");
    }
}
