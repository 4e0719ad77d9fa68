//! Exponential backoff with bounded positive jitter.
//!
//! | Attempt | Delay before the next attempt (`base = 1 000 ms`) |
//! |---------|---------------------------------------------------|
//! | 1       | 1 000 ms + 0–30 % jitter                          |
//! | 2       | 2 000 ms + 0–30 % jitter                          |
//! | 3       | 4 000 ms + 0–30 % jitter                          |
//!
//! Every delay is clamped to the configured maximum.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest jitter added on top of the exponential delay, as a fraction of it.
const JITTER_RATIO: f64 = 0.3;

/// Computes the delay in milliseconds before retrying after `attempt` failed.
///
/// `base_ms * 2^(attempt - 1)` plus `jitter_fraction * 30 %` of that value,
/// clamped to `max_ms`. Attempts are numbered from 1; `0` is treated as `1`.
/// `jitter_fraction` is clamped into `[0, 1)`.
#[must_use]
pub fn compute_delay_ms(attempt: u32, base_ms: u64, max_ms: u64, jitter_fraction: f64) -> u64 {
    let exponent = attempt.max(1) - 1;
    let exponential = base_ms.saturating_mul(1u64 << exponent.min(32));
    let fraction = if jitter_fraction.is_nan() {
        0.0
    } else {
        jitter_fraction.clamp(0.0, 1.0 - f64::EPSILON)
    };
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jitter = (exponential as f64 * JITTER_RATIO * fraction) as u64;
    exponential.saturating_add(jitter).min(max_ms)
}

/// Backoff calculator with its own jitter source.
///
/// Use [`Backoff::seeded`] when the jitter sequence must be reproducible.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    rng: StdRng,
}

impl Backoff {
    #[must_use]
    pub fn from_entropy(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            rng: StdRng::from_os_rng(),
        }
    }

    #[must_use]
    pub fn seeded(base_ms: u64, max_ms: u64, seed: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws fresh jitter and returns the delay before retrying after `attempt`.
    pub fn delay(&mut self, attempt: u32) -> Duration {
        let jitter_fraction: f64 = self.rng.random();
        Duration::from_millis(compute_delay_ms(
            attempt,
            self.base_ms,
            self.max_ms,
            jitter_fraction,
        ))
    }
}
