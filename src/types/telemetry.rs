//! Telemetry sample with merge-on-update semantics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Partial vehicle state extracted from one telemetry message.
///
/// Any subset of fields may be present. Applying a sample to a view with
/// [`TelemetrySample::merge`] only overwrites the fields it carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Speed in km/h
    pub speed: Option<f64>,
    /// Battery level in percent
    pub battery: Option<f64>,
    /// Temperature in degrees Celsius
    pub temperature: Option<f64>,
    /// Heading as reported by the server (`NORTH`, `LEFT`, ...)
    pub direction: Option<String>,
}

impl TelemetrySample {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.speed.is_none()
            && self.battery.is_none()
            && self.temperature.is_none()
            && self.direction.is_none()
    }

    /// Overwrite the fields present in `update`, keep the rest.
    pub fn merge(&mut self, update: &TelemetrySample) {
        if let Some(speed) = update.speed {
            self.speed = Some(speed);
        }
        if let Some(battery) = update.battery {
            self.battery = Some(battery);
        }
        if let Some(temperature) = update.temperature {
            self.temperature = Some(temperature);
        }
        if let Some(direction) = &update.direction {
            self.direction = Some(direction.clone());
        }
    }

    /// Return a copy of `self` with `update` merged in.
    pub fn merged(mut self, update: &TelemetrySample) -> Self {
        self.merge(update);
        self
    }
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut field = |f: &mut fmt::Formatter<'_>, name: &str, value: &dyn fmt::Display| {
            let sep = if first { "" } else { " " };
            first = false;
            write!(f, "{sep}{name}={value}")
        };

        if let Some(speed) = self.speed {
            field(f, "SPEED", &speed)?;
        }
        if let Some(battery) = self.battery {
            field(f, "BATTERY", &battery)?;
        }
        if let Some(temperature) = self.temperature {
            field(f, "TEMP", &temperature)?;
        }
        if let Some(direction) = &self.direction {
            field(f, "DIR", direction)?;
        }
        Ok(())
    }
}
