//! System configuration parameters
//!
//! Fixed hardware constants plus the tunable [`DieConfig`].  The tunables
//! can be overridden by the firmware image or a provisioning step; the
//! constants describe the silicon and the flash layout shared by every die
//! running the same build.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::settings::RetryPolicy;

// --- Timer peripheral ---
/// Base clock of the timer peripheral (Hz).
pub const TIMER_BASE_HZ: u32 = 16_000_000;
/// Prescaler exponent: counter runs at `TIMER_BASE_HZ / 2^TIMER_PRESCALER`.
pub const TIMER_PRESCALER: u32 = 8;
/// Duration of one counter tick in microseconds (16 MHz / 2^8 = 16 us).
pub const TIMER_TICK_US: u32 = (1 << TIMER_PRESCALER) / (TIMER_BASE_HZ / 1_000_000);
/// Number of compare channels, and so of virtual timers.
pub const MAX_TIMER_SLOTS: usize = 4;

// --- Power ---
/// Default inactivity period before the die goes to sleep (ms).
pub const INACTIVITY_SLEEP_MS: u32 = 5000;

/// Core runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieConfig {
    /// Time without a poke before the die sleeps (milliseconds)
    pub inactivity_sleep_ms: u32,
    /// Retry/wait bounds for the settings transfer handshake
    pub sync_retry: RetryPolicy,
}

impl Default for DieConfig {
    fn default() -> Self {
        Self {
            inactivity_sleep_ms: INACTIVITY_SLEEP_MS,
            sync_retry: RetryPolicy::UNBOUNDED,
        }
    }
}

impl DieConfig {
    /// Range-check every field.
    pub fn validate(&self) -> Result<(), Error> {
        if !(100..=3_600_000).contains(&self.inactivity_sleep_ms) {
            return Err(Error::Config("inactivity_sleep_ms must be 100–3600000"));
        }
        if self.sync_retry.max_send_attempts == Some(0) {
            return Err(Error::Config("sync_retry.max_send_attempts must be > 0"));
        }
        if self.sync_retry.max_wait_ticks == Some(0) {
            return Err(Error::Config("sync_retry.max_wait_ticks must be > 0"));
        }
        Ok(())
    }
}
