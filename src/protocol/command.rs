//! Command phrase translation

/// Fixed command codes understood by the vehicle server.
pub mod codes {
    pub const SPEED_UP: &str = "SPUP";
    pub const SLOW_DOWN: &str = "SPDN";
    pub const TURN_LEFT: &str = "TNLF";
    pub const TURN_RIGHT: &str = "TNRT";
    pub const LIST_USERS: &str = "LIST";
    pub const DISCONNECT: &str = "DISC";
}

/// Map a human-readable phrase to its 4-letter command code.
///
/// Input is trimmed, upper-cased and has whitespace runs collapsed before
/// lookup. Short codes and unknown input pass through unchanged, so codes
/// added on the server need no client change.
pub fn translate(input: &str) -> String {
    let normalized = input.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();

    let code = match normalized.as_str() {
        "SPEED UP" | "SPEEDUP" => codes::SPEED_UP,
        "SLOW DOWN" | "SLOWDOWN" => codes::SLOW_DOWN,
        "TURN LEFT" | "TURNLEFT" => codes::TURN_LEFT,
        "TURN RIGHT" | "TURNRIGHT" => codes::TURN_RIGHT,
        _ => return normalized,
    };
    code.to_string()
}
