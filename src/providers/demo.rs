//! Demo-mode telemetry simulator

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::trace;

use crate::Result;
use crate::provider::TelemetrySource;
use crate::types::TelemetrySample;

/// Upper bound of simulated speed in km/h.
pub const MAX_DEMO_SPEED: u32 = 60;

/// Headings the simulator picks from.
pub const DEMO_DIRECTIONS: [&str; 3] = ["LEFT", "RIGHT", "FORWARD"];

/// Produces one random sample per tick while no server is connected
pub struct DemoSimulator {
    period: Duration,
    interval: Option<Interval>,
    rng: StdRng,
}

impl DemoSimulator {
    pub fn new(period: Duration) -> Self {
        Self::with_rng(period, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests.
    pub fn with_seed(period: Duration, seed: u64) -> Self {
        Self::with_rng(period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(period: Duration, rng: StdRng) -> Self {
        Self { period, interval: None, rng }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Draw one synthetic sample.
    pub fn sample(&mut self) -> TelemetrySample {
        let speed = self.rng.gen_range(0..=MAX_DEMO_SPEED);
        let battery = self.rng.gen_range(0..=100u32);
        let direction = DEMO_DIRECTIONS[self.rng.gen_range(0..DEMO_DIRECTIONS.len())];

        TelemetrySample {
            speed: Some(f64::from(speed)),
            battery: Some(f64::from(battery)),
            temperature: None,
            direction: Some(direction.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for DemoSimulator {
    async fn next_sample(&mut self) -> Result<Option<TelemetrySample>> {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            // First sample after one full period, not immediately
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;

        let sample = self.sample();
        trace!(%sample, "Demo sample");
        Ok(Some(sample))
    }

    fn is_demo(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "demo"
    }
}
