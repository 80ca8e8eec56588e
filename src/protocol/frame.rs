//! Frame codec for `TYPE|LLLL|DATA` lines
//!
//! Two explicit grammars are kept side by side: the strict pipe-delimited
//! frame and the legacy keyword line. [`decode`] picks between them.

use tracing::{debug, trace};

use super::telemetry;
use crate::types::Frame;
use crate::{LinkError, Result};

/// Width of the type field.
pub const TYPE_WIDTH: usize = 4;

/// Largest payload the 4-digit length field can describe.
pub const MAX_DATA_LEN: usize = 9999;

/// Line terminator appended by [`encode`].
pub const LINE_TERMINATOR: &str = "\n";

/// Longest inbound line accepted, terminator included: a full frame with a
/// [`MAX_DATA_LEN`] payload followed by `\r\n`.
pub const MAX_LINE_LEN: usize = TYPE_WIDTH + 6 + MAX_DATA_LEN + 2;

/// Frame types used by the vehicle protocol.
pub mod types {
    /// Handshake request
    pub const CONNECT: &str = "CONN";
    /// Handshake accepted, data is the client id
    pub const CONNECT_ACK: &str = "CACK";
    /// Handshake or request rejected, data is the reason
    pub const CONNECT_ERROR: &str = "CERR";
    /// Command executed
    pub const COMMAND_OK: &str = "CMOK";
    /// Command refused
    pub const COMMAND_ERROR: &str = "CMER";
    /// Telemetry payload
    pub const TELEMETRY: &str = "TELE";
    /// Client goodbye
    pub const DISCONNECT: &str = "DISC";
    /// Server goodbye
    pub const DISCONNECT_ACK: &str = "DACK";
    /// Connected user list
    pub const USER_LIST: &str = "LIST";
}

/// Encode a frame as `"<TYPE>|<4-digit length>|<data>\n"`.
///
/// The type must be exactly four uppercase ASCII letters or digits. Payloads
/// longer than [`MAX_DATA_LEN`] bytes or containing line breaks are rejected;
/// nothing is ever truncated.
pub fn encode(kind: &str, data: &str) -> Result<String> {
    validate_type(kind)?;

    if data.len() > MAX_DATA_LEN {
        return Err(LinkError::encode(format!(
            "payload of {} bytes exceeds the {MAX_DATA_LEN} byte length field",
            data.len()
        )));
    }
    if data.contains(['\n', '\r']) {
        return Err(LinkError::encode("payload contains a line terminator"));
    }

    Ok(format!("{kind}|{:04}|{data}{LINE_TERMINATOR}", data.len()))
}

/// Encode a free-text line for servers that accept unframed commands.
///
/// The text is sent verbatim. Empty text, line breaks and lines longer than
/// [`MAX_LINE_LEN`] are rejected.
pub fn encode_legacy(text: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(LinkError::encode("command text is empty"));
    }
    if text.contains(['\n', '\r']) {
        return Err(LinkError::encode("command text contains a line terminator"));
    }
    if text.len() + LINE_TERMINATOR.len() > MAX_LINE_LEN {
        return Err(LinkError::encode(format!(
            "command text of {} bytes exceeds the {MAX_LINE_LEN} byte line limit",
            text.len()
        )));
    }
    Ok(format!("{text}{LINE_TERMINATOR}"))
}

/// Whether `kind` can be used as the type field of a frame.
pub fn is_frame_type(kind: &str) -> bool {
    validate_type(kind).is_ok()
}

/// Encode an existing frame.
pub fn encode_frame(frame: &Frame) -> Result<String> {
    encode(frame.kind(), frame.data())
}

fn validate_type(kind: &str) -> Result<()> {
    if kind.len() != TYPE_WIDTH {
        return Err(LinkError::encode(format!(
            "frame type '{kind}' must be exactly {TYPE_WIDTH} characters"
        )));
    }
    if !kind.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
        return Err(LinkError::encode(format!(
            "frame type '{kind}' must be uppercase ASCII letters or digits"
        )));
    }
    Ok(())
}

/// Decode a pipe-delimited frame.
///
/// Splits on `|` into at most three parts. The declared length field is
/// read but not trusted: the payload is returned verbatim and a mismatch
/// is only logged. Input without any `|` falls back to [`decode_legacy`].
pub fn decode_strict(line: &str) -> Result<Frame> {
    let line = strip_terminator(line);
    let mut parts = line.splitn(3, '|');

    let kind = parts.next().unwrap_or_default().trim();
    let Some(declared) = parts.next() else {
        return decode_legacy(line).ok_or_else(|| LinkError::malformed("empty line", line));
    };

    if kind.is_empty() {
        return Err(LinkError::malformed("missing frame type", line));
    }

    let data = parts.next().unwrap_or_default();
    let frame = Frame::new(kind, data);

    match declared.trim().parse::<usize>() {
        Ok(length) if length == frame.length() => {}
        Ok(length) => debug!(
            frame_type = kind,
            declared = length,
            actual = frame.length(),
            "Frame length mismatch, using payload as received"
        ),
        Err(_) => debug!(frame_type = kind, declared, "Unreadable frame length field"),
    }

    Ok(frame)
}

/// Decode a legacy keyword line such as `TELEMETRY SPEED=30 BATTERY=80`.
///
/// The leading token becomes the type and the remainder the payload.
/// Returns `None` for lines that are empty after trimming.
pub fn decode_legacy(line: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match line.split_once(char::is_whitespace) {
        Some((kind, rest)) => Some(Frame::new(kind, rest.trim_start())),
        None => Some(Frame::new(line, "")),
    }
}

/// Decode any inbound line or datagram.
///
/// - A line whose leading token is a known telemetry key/value pair
///   (`SPEED:45.5|BATTERY:78`) is a bare telemetry line and becomes an
///   implicit `TELE` frame. Other `key:value` openers such as
///   `ERROR: busy` stay ordinary lines.
/// - A line containing `|` is decoded with [`decode_strict`].
/// - Anything else goes through [`decode_legacy`].
pub fn decode(line: &str) -> Result<Frame> {
    let trimmed = strip_terminator(line);
    if trimmed.trim().is_empty() {
        return Err(LinkError::malformed("empty line", line));
    }

    trace!(line = trimmed, "Decoding inbound line");

    let leading = trimmed
        .trim_start()
        .split(|c: char| c == '|' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    if leading.split_once(['=', ':']).is_some_and(|(key, _)| telemetry::is_known_key(key)) {
        return Ok(Frame::new(types::TELEMETRY, trimmed.trim()));
    }

    if trimmed.contains('|') {
        return decode_strict(trimmed);
    }

    decode_legacy(trimmed).ok_or_else(|| LinkError::malformed("empty line", line))
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn strict_decode_inverts_encode(
            kind in "[A-Z0-9]{4}",
            data in "[^\r\n]{0,200}",
        ) {
            let wire = encode(&kind, &data).unwrap();
            let frame = decode_strict(&wire).unwrap();
            prop_assert_eq!(frame.kind(), kind.as_str());
            prop_assert_eq!(frame.length(), data.len());
            prop_assert_eq!(frame.data(), data.as_str());
        }

        #[test]
        fn decode_never_panics(line in ".{0,120}") {
            let _ = decode(&line);
            let _ = decode_strict(&line);
            let _ = decode_legacy(&line);
        }
    }

    #[test]
    fn encode_pads_length_to_four_digits() {
        assert_eq!(encode("DISC", "").unwrap(), "DISC|0000|\n");
        assert_eq!(encode("CONN", "ADMIN:admin123").unwrap(), "CONN|0014|ADMIN:admin123\n");
    }

    #[test]
    fn encode_rejects_bad_types() {
        for kind in ["", "CON", "CONNX", "conn", "C|NN", "CO N"] {
            assert!(
                matches!(encode(kind, ""), Err(LinkError::Encode { .. })),
                "type {kind:?} should be rejected"
            );
        }
    }

    #[test]
    fn encode_rejects_oversized_payloads() {
        let max = "x".repeat(MAX_DATA_LEN);
        assert!(encode("TELE", &max).unwrap().starts_with("TELE|9999|"));

        let too_big = "x".repeat(MAX_DATA_LEN + 1);
        assert!(matches!(encode("TELE", &too_big), Err(LinkError::Encode { .. })));
    }

    #[test]
    fn encode_rejects_embedded_newlines() {
        assert!(encode("TELE", "SPEED:1\nCACK|0001|X").is_err());
    }

    #[test]
    fn strict_tolerates_length_mismatch() {
        let frame = decode_strict("CACK|0099|A0001").unwrap();
        assert_eq!(frame.kind(), "CACK");
        assert_eq!(frame.data(), "A0001");
        assert_eq!(frame.length(), 5);

        let frame = decode_strict("CMOK|xx|EXECUTED").unwrap();
        assert_eq!(frame.data(), "EXECUTED");
    }

    #[test]
    fn strict_keeps_pipes_inside_data() {
        let frame = decode_strict("TELE|0038|SPEED:45.5|BATTERY:78|TEMP:35.2\r\n").unwrap();
        assert_eq!(frame.kind(), "TELE");
        assert_eq!(frame.data(), "SPEED:45.5|BATTERY:78|TEMP:35.2");
    }

    #[test]
    fn strict_accepts_type_and_length_only() {
        let frame = decode_strict("DISC|0000").unwrap();
        assert_eq!(frame.kind(), "DISC");
        assert_eq!(frame.data(), "");
    }

    #[test]
    fn strict_falls_back_to_legacy_without_pipes() {
        let frame = decode_strict("TELEMETRY SPEED=30").unwrap();
        assert_eq!(frame.kind(), "TELEMETRY");

        assert!(matches!(decode_strict("   "), Err(LinkError::MalformedFrame { .. })));
        assert!(matches!(decode_strict("|0000|x"), Err(LinkError::MalformedFrame { .. })));
    }

    #[test]
    fn legacy_splits_leading_token() {
        let frame = decode_legacy("TELEMETRY SPEED=30 BATTERY=80 DIR=LEFT").unwrap();
        assert_eq!(frame.kind(), "TELEMETRY");
        assert_eq!(frame.data(), "SPEED=30 BATTERY=80 DIR=LEFT");

        let frame = decode_legacy("PING").unwrap();
        assert_eq!(frame.kind(), "PING");
        assert_eq!(frame.data(), "");

        assert!(decode_legacy(" \t ").is_none());
    }

    #[test]
    fn decode_recognises_bare_telemetry_lines() {
        let frame = decode("SPEED:45.5|BATTERY:78|TEMP:35.2|DIR:NORTH").unwrap();
        assert_eq!(frame.kind(), types::TELEMETRY);
        assert_eq!(frame.data(), "SPEED:45.5|BATTERY:78|TEMP:35.2|DIR:NORTH");

        let frame = decode("SPEED=30 BATTERY=80").unwrap();
        assert_eq!(frame.kind(), types::TELEMETRY);
    }

    #[test]
    fn decode_leaves_unknown_key_value_openers_alone() {
        let frame = decode("ERROR: server busy").unwrap();
        assert_eq!(frame.kind(), "ERROR:");
        assert_eq!(frame.data(), "server busy");

        let frame = decode("MODE=manual").unwrap();
        assert_eq!(frame.kind(), "MODE=manual");

        let frame = decode("speed=12 dir=left").unwrap();
        assert_eq!(frame.kind(), types::TELEMETRY);

        let frame = decode("STATUS:1|0004|BUSY").unwrap();
        assert_eq!(frame.kind(), "STATUS:1");
        assert_eq!(frame.data(), "BUSY");
    }

    #[test]
    fn legacy_encode_sends_text_verbatim() {
        assert_eq!(encode_legacy("GO FAST").unwrap(), "GO FAST\n");
        assert!(is_frame_type("SPUP"));
        assert!(!is_frame_type("GO FAST"));

        for bad in ["", "   ", "GO\nDISC|0000|", "GO\r"] {
            assert!(
                matches!(encode_legacy(bad), Err(LinkError::Encode { .. })),
                "text {bad:?} should be rejected"
            );
        }
        assert!(encode_legacy(&"X".repeat(MAX_LINE_LEN)).is_err());
    }

    #[test]
    fn decode_routes_by_shape() {
        assert_eq!(decode("CERR|0009|BADPASS\n").unwrap().data(), "BADPASS");
        assert_eq!(decode("TELEMETRY SPEED=30").unwrap().kind(), "TELEMETRY");
        assert!(decode("\r\n").is_err());
    }
}
