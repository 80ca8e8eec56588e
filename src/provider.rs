//! Telemetry source trait

use crate::Result;
use crate::types::TelemetrySample;

/// Trait for telemetry sources
///
/// Sources abstract over where samples come from (the UDP telemetry channel,
/// the demo simulator) and handle their own pacing internally.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + 'static {
    /// Wait for the next sample
    ///
    /// Returns:
    /// - `Ok(Some(sample))` - New sample available
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(LinkError::MalformedFrame { .. })` - One unit of input was discarded
    /// - `Err(e)` - Transport error
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>>;

    /// Whether samples are synthetic
    fn is_demo(&self) -> bool {
        false
    }

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
