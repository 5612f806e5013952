//! Wake latches set from GPIO interrupt context.
//!
//! One flag per wake source.  The pin ISR sets its flag; the sleeping main
//! context polls [`WakeLatch::any`] after every low-power return and then
//! takes each flag independently, so two sources firing together are both
//! observed.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::app::ports::WakeSource;

#[derive(Debug, Default)]
pub struct WakeLatch {
    motion: AtomicBool,
    wireless: AtomicBool,
}

impl WakeLatch {
    pub const fn new() -> Self {
        Self {
            motion: AtomicBool::new(false),
            wireless: AtomicBool::new(false),
        }
    }

    fn flag(&self, source: WakeSource) -> &AtomicBool {
        match source {
            WakeSource::Motion => &self.motion,
            WakeSource::Wireless => &self.wireless,
        }
    }

    /// Latch `source`.  Safe to call from ISR context.
    pub fn set(&self, source: WakeSource) {
        self.flag(source).store(true, Ordering::Release);
    }

    /// Read and clear `source`.
    pub fn take(&self, source: WakeSource) -> bool {
        self.flag(source).swap(false, Ordering::AcqRel)
    }

    pub fn is_set(&self, source: WakeSource) -> bool {
        self.flag(source).load(Ordering::Acquire)
    }

    /// `true` if either source is latched.
    pub fn any(&self) -> bool {
        self.is_set(WakeSource::Motion) || self.is_set(WakeSource::Wireless)
    }

    pub fn reset(&self) {
        self.motion.store(false, Ordering::Release);
        self.wireless.store(false, Ordering::Release);
    }
}
