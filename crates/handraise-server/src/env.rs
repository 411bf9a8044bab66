//! Environment abstraction for deterministic testing.
//!
//! Decouples hub logic from system resources (time, randomness). Production
//! uses [`crate::SystemEnv`]; tests supply their own implementation so
//! vote-guard deadlines and timestamps are controllable.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleeping.
///
/// Implementations MUST guarantee that `now()` never goes backwards within a
/// single execution context.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; test environments
    /// may use a virtual clock.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::ops::Sub<Output = Duration>
        + std::ops::Add<Duration, Output = Self::Instant>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// The only async method in the trait; used for lock-acquisition
    /// timeouts, never by pure state logic.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`, e.g. for session ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Wall-clock Unix timestamp in seconds, for persisted `created_at` and
    /// `answered_at` fields.
    fn wall_clock_secs(&self) -> u64;
}
