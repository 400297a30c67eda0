//! Clock abstraction the coordinator runs against.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Everything the coordinator needs from its surroundings besides the
/// network: a monotonic clock, a wall clock and sleeping.
///
/// `TokioContext` backs it with the real runtime; the simulation harness
/// backs it with a clock that only moves when stepped. Experiment delays
/// are measured through [`DeployContext::now`] alone, so swapping the
/// context makes a whole run reproducible.
#[async_trait]
pub trait DeployContext: Send + Sync + 'static {
    /// Monotonic time since the context was created.
    fn now(&self) -> Duration;

    /// Wall-clock time.
    fn system_time(&self) -> SystemTime;

    /// Waits for `duration` on this context's clock.
    async fn sleep(&self, duration: Duration);

    /// Milliseconds since the Unix epoch, stamped on outgoing envelopes.
    fn timestamp_ms(&self) -> u64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or(0)
    }
}
