//! Virtual clock and seeded randomness for simulated runs.

use async_trait::async_trait;
use deploy_env::DeployContext;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time the virtual clock starts at (2024-01-01 00:00:00 UTC).
const DEFAULT_EPOCH_SECS: u64 = 1_704_067_200;

struct SimState {
    /// Virtual time since the start of the run
    elapsed: Duration,

    /// Harness-wide random stream
    rng: ChaCha8Rng,
}

/// `DeployContext` whose clock only moves when the harness moves it.
///
/// Clones share the clock and the random stream, so the coordinator and
/// the harness always agree on "now".
#[derive(Clone)]
pub struct SimContext {
    seed: u64,
    epoch: SystemTime,
    state: Arc<Mutex<SimState>>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            epoch: UNIX_EPOCH + Duration::from_secs(DEFAULT_EPOCH_SECS),
            state: Arc::new(Mutex::new(SimState {
                elapsed: Duration::ZERO,
                rng: ChaCha8Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.state.lock().elapsed += duration;
    }

    /// Jumps the clock to `elapsed` since the start of the run.
    pub fn set_time(&self, elapsed: Duration) {
        self.state.lock().elapsed = elapsed;
    }

    /// Runs `f` with the shared random stream.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        f(&mut self.state.lock().rng)
    }

    /// Independent random stream for `stream`.
    ///
    /// Draws from a fork never shift the shared stream, so adding a random
    /// decision in one place does not change handles or ports elsewhere.
    pub fn fork_rng(&self, stream: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(0x9e3779b97f4a7c15) ^ stream)
    }
}

#[async_trait]
impl DeployContext for SimContext {
    fn now(&self) -> Duration {
        self.state.lock().elapsed
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Nobody else drives the clock, so sleeping is just moving it
        self.advance_time(duration);
    }
}
