//! Driver spawns and manages telemetry pump tasks

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::LinkError;
use crate::events::EventSink;
use crate::provider::TelemetrySource;

/// Consecutive transport errors tolerated before a source is abandoned.
const MAX_ERRORS: u32 = 10;

/// Driver pumps a telemetry source into the delivery channel
///
/// Telemetry is best-effort: malformed input is skipped and transport errors
/// are reported with backoff, but neither ends the owning session.
pub struct Driver;

impl Driver {
    /// Spawn a pump task for `source` that stops when `cancel` fires.
    pub fn spawn<S>(source: S, sink: EventSink, cancel: CancellationToken) -> JoinHandle<()>
    where
        S: TelemetrySource,
    {
        tokio::spawn(async move {
            Self::pump_task(source, sink, cancel).await;
        })
    }

    async fn pump_task<S>(mut source: S, sink: EventSink, cancel: CancellationToken)
    where
        S: TelemetrySource,
    {
        let name = source.name();
        let is_demo = source.is_demo();
        info!(source = name, "Telemetry pump started");

        let mut sample_count = 0u64;
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(source = name, "Telemetry pump cancelled");
                    break;
                }
                result = source.next_sample() => result,
            };

            match result {
                Ok(Some(sample)) => {
                    sample_count += 1;
                    error_count = 0;
                    sink.telemetry(sample, is_demo);
                }
                Ok(None) => {
                    info!(source = name, "Telemetry source ended");
                    break;
                }
                Err(e @ LinkError::MalformedFrame { .. }) => {
                    warn!(source = name, error = %e, "Discarding telemetry input");
                    sink.log(format!("{name} telemetry discarded: {e}"));
                }
                Err(e) => {
                    error_count += 1;
                    error!(source = name, "Telemetry error ({}/{}): {}", error_count, MAX_ERRORS, e);
                    sink.log(format!("{name} telemetry error: {e}"));

                    if error_count >= MAX_ERRORS {
                        sink.log(format!("{name} telemetry receiver stopped after repeated errors"));
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(source = name, samples = sample_count, "Telemetry pump ended");
    }
}
