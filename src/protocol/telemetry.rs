//! Telemetry payload parser
//!
//! Accepts every payload grammar seen across server versions:
//! `SPEED=30 BATTERY=80 DIR=LEFT`, `SPEED:45.5|BATTERY:78|TEMP:35.2|DIR:NORTH`,
//! and mixes of `|`, `;`, `,` and whitespace separators.

use tracing::trace;

use crate::types::TelemetrySample;

/// Field a telemetry key maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Speed,
    Battery,
    Temperature,
    Direction,
}

impl Field {
    fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_uppercase().as_str() {
            "SPEED" => Some(Field::Speed),
            "BATTERY" => Some(Field::Battery),
            "TEMP" | "TEMPERATURE" => Some(Field::Temperature),
            "DIR" | "DIRECTION" => Some(Field::Direction),
            _ => None,
        }
    }
}

/// Whether `key` names a telemetry field this parser understands.
pub fn is_known_key(key: &str) -> bool {
    Field::from_key(key).is_some()
}

/// Extract the known key/value fields from a telemetry payload.
///
/// Keys match case-insensitively and use `=` or `:` as separator. Unknown
/// tokens are ignored, later occurrences of a key overwrite earlier ones, and
/// a numeric value that does not parse is dropped without touching the rest
/// of the sample.
pub fn parse(payload: &str) -> TelemetrySample {
    let mut sample = TelemetrySample::default();

    let normalized: String =
        payload.chars().map(|c| if matches!(c, '|' | ';' | ',') { ' ' } else { c }).collect();

    for token in normalized.split_whitespace() {
        let Some((key, value)) = token.split_once(['=', ':']) else {
            continue;
        };
        let Some(field) = Field::from_key(key) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match field {
            Field::Speed => set_number(&mut sample.speed, key, value),
            Field::Battery => set_number(&mut sample.battery, key, value),
            Field::Temperature => set_number(&mut sample.temperature, key, value),
            Field::Direction => sample.direction = Some(value.to_string()),
        }
    }

    sample
}

fn set_number(slot: &mut Option<f64>, key: &str, value: &str) {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => *slot = Some(number),
        _ => trace!(key, value, "Dropping non-numeric telemetry value"),
    }
}
