//! Production implementation of DeployContext using Tokio.

use crate::DeployContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Runs the coordinator on the Tokio runtime and the host clocks.
///
/// Wall-clock time is anchored at construction and then follows the
/// monotonic clock, so envelope timestamps never jump backwards when the
/// host adjusts its time.
pub struct TokioContext {
    started: Instant,
    started_wall: SystemTime,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_wall: SystemTime::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeployContext for TokioContext {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.started_wall + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_waits_on_real_clock() {
        let ctx = TokioContext::new();
        let before = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        assert!(ctx.now() - before >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_zero_sleep_returns_immediately() {
        let ctx = TokioContext::new();
        ctx.sleep(Duration::ZERO).await;
    }

    #[test]
    fn test_wall_clock_follows_monotonic_clock() {
        let ctx = TokioContext::new();
        let a = ctx.system_time();
        std::thread::sleep(Duration::from_millis(2));
        let b = ctx.system_time();
        assert!(b.duration_since(a).unwrap() >= Duration::from_millis(2));
    }

    #[test]
    fn test_timestamp_is_unix_millis() {
        let ctx = TokioContext::new();
        let host = SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        // Anchored at construction, so within a second of the host clock
        assert!(ctx.timestamp_ms().abs_diff(host) < 1_000);
    }
}
