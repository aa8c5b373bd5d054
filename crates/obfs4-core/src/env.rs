//! Environment abstraction for deterministic testing.
//!
//! Decouples the connection state machine from system resources (time,
//! randomness) so the same code path runs under a real clock and OS RNG
//! in production and under `turmoil`'s virtual clock and a seeded RNG in
//! the simulation harness.

use std::time::Duration;

/// Abstract environment providing time and randomness to a [`Connection`](crate::Connection).
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards within a single execution context.
/// - `random_bytes()` uses cryptographically secure entropy in
///   production; a deterministic seeded stream is acceptable (and
///   required) for simulation.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulation
    /// environments use virtual time (e.g. `turmoil::Instant`).
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration. The only async method on this
    /// trait; protocol logic itself never awaits.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills `buffer` with random bytes, used for ephemeral handshake
    /// key material.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Coarse replay-window epoch for the current time, used to key
    /// [`ReplayFilter`](obfs4_crypto::ReplayFilter) entries.
    fn replay_epoch(&self, window: Duration) -> u64;
}
