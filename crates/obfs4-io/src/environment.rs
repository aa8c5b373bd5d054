//! The production [`Environment`](obfs4_core::Environment): OS randomness,
//! real wall-clock time.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use obfs4_core::Environment;
use rand::{RngCore, rngs::OsRng};

/// `Environment` backed by the operating system's clock and CSPRNG.
///
/// Zero-sized and [`Copy`]; cheap to hand to every [`Connection`](obfs4_core::Connection)
/// a listener accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioEnvironment;

impl Environment for TokioEnvironment {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        OsRng.fill_bytes(buffer);
    }

    fn replay_epoch(&self, window: Duration) -> u64 {
        let window_secs = window.as_secs().max(1);
        let now_secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs();
        now_secs / window_secs
    }
}
