//! Inactivity sleep and wake.
//!
//! The coordinator is polled by the cooperative scheduler.  Anything that
//! counts as activity calls [`SleepCoordinator::poke`]; once no poke has
//! arrived for the configured threshold the next update puts the die to
//! sleep and blocks until the accelerometer or the radio wakes it.
//!
//! ```text
//!            poke()                         motion / wireless pin
//!              │                                     │
//!   ┌──────────▼──────────┐   idle > threshold   ┌───▼──────────────┐
//!   │        Awake        │ ───────────────────▶ │      Asleep      │
//!   │ timer mux running   │                      │ low-power wait   │
//!   └─────────────────────┘ ◀─────────────────── └──────────────────┘
//!                             latch set: wake sequence
//! ```
//!
//! Every method takes `&self`.  The asleep flag, the activity stamp and the
//! wake latches are atomics, so pin interrupts and the radio callback can
//! reach the coordinator while the main context is blocked in the wait.

pub mod latch;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, error, info};

use crate::app::ports::{
    Clock, LowPower, MotionSensor, PinWake, Pull, Subsystem, Suspendable, UpdateRegistry, WakeLevel,
    WakeLine, WakeSource,
};
use crate::config::DieConfig;
use latch::WakeLatch;

/// Which sources ended a sleep.  Both can be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WakeReason {
    pub motion: bool,
    pub wireless: bool,
}

pub struct SleepCoordinator {
    inactivity_ms: u32,
    last_activity_ms: AtomicU32,
    asleep: AtomicBool,
    latch: WakeLatch,
}

impl SleepCoordinator {
    pub const fn new(inactivity_ms: u32) -> Self {
        Self {
            inactivity_ms,
            last_activity_ms: AtomicU32::new(0),
            asleep: AtomicBool::new(false),
            latch: WakeLatch::new(),
        }
    }

    pub fn from_config(config: &DieConfig) -> Self {
        Self::new(config.inactivity_sleep_ms)
    }

    /// Prepare both wake lines, start the inactivity countdown and register
    /// for updates.  The accelerometer interrupt is open drain, active low.
    pub fn init(
        &self,
        sched: &mut impl UpdateRegistry,
        line: &mut impl WakeLine,
        io: &mut (impl PinWake + Clock),
    ) {
        line.set_pull(Pull::Down);
        io.set_input_pull(WakeSource::Motion, Pull::Up);
        self.latch.reset();
        self.asleep.store(false, Ordering::Release);
        self.last_activity_ms.store(io.now_ms(), Ordering::Release);
        if !sched.register_update(Subsystem::SleepCoordinator) {
            error!("Sleep: could not register for updates");
        }
        info!("Sleep: sleeping after {} ms without activity", self.inactivity_ms);
    }

    /// Restart the inactivity countdown.
    pub fn poke(&self, clock: &impl Clock) {
        self.last_activity_ms.store(clock.now_ms(), Ordering::Release);
    }

    /// One cooperative tick.  Sleeps, and only returns after waking, once
    /// the die has been idle past the threshold.
    pub fn update(
        &self,
        timer: &impl Suspendable,
        indicator: &impl Suspendable,
        io: &mut (impl Clock + MotionSensor + PinWake + LowPower),
    ) -> Option<WakeReason> {
        if self.is_asleep() {
            return None;
        }
        let idle = io.now_ms().wrapping_sub(self.last_activity_ms());
        if idle <= self.inactivity_ms {
            return None;
        }

        info!("Sleep: no activity for {} ms, going to sleep", idle);
        let reason = self.sleep_until_interrupt(timer, indicator, io);
        self.last_activity_ms.store(io.now_ms(), Ordering::Release);
        Some(reason)
    }

    fn sleep_until_interrupt(
        &self,
        timer: &impl Suspendable,
        indicator: &impl Suspendable,
        io: &mut (impl MotionSensor + PinWake + LowPower),
    ) -> WakeReason {
        timer.stop();
        indicator.stop();

        io.enable_transient_interrupt();
        io.arm(WakeSource::Motion, WakeLevel::Low);
        io.arm(WakeSource::Wireless, WakeLevel::High);

        self.asleep.store(true, Ordering::Release);

        while !self.latch.any() {
            io.wait_for_interrupt();
        }

        let reason = WakeReason {
            motion: self.latch.take(WakeSource::Motion),
            wireless: self.latch.take(WakeSource::Wireless),
        };
        if reason.motion {
            info!("Sleep: accelerometer woke us up");
        }
        if reason.wireless {
            info!("Sleep: radio woke us up");
        }

        io.clear_transient_interrupt();
        io.disable_transient_interrupt();
        io.disarm(WakeSource::Motion);
        io.disarm(WakeSource::Wireless);

        self.asleep.store(false, Ordering::Release);
        timer.start();
        reason
    }

    /// GPIO sense interrupt for `source`.
    pub fn on_pin_wake(&self, source: WakeSource) {
        self.latch.set(source);
    }

    /// Radio traffic arrived.  While asleep, pulse the wireless wake line so
    /// its pin-wake fires; otherwise it counts as activity.
    pub fn on_wireless_event(&self, line: &mut impl WakeLine, clock: &impl Clock) {
        if !self.is_asleep() {
            self.poke(clock);
            return;
        }

        debug!("Sleep: radio event while asleep, pulsing wake line");
        line.set_pull(Pull::Up);
        if let Err(e) = line.set_high() {
            error!("Sleep: driving wake line high failed: {:?}", e);
        }
        line.set_pull(Pull::Down);
        if let Err(e) = line.set_low() {
            error!("Sleep: driving wake line low failed: {:?}", e);
        }
    }

    /// Stop putting the die to sleep.
    pub fn stop(&self, sched: &mut impl UpdateRegistry) {
        sched.unregister_update(Subsystem::SleepCoordinator);
        info!("Sleep: stopped");
    }

    pub fn is_asleep(&self) -> bool {
        self.asleep.load(Ordering::Acquire)
    }

    pub fn last_activity_ms(&self) -> u32 {
        self.last_activity_ms.load(Ordering::Acquire)
    }

    pub fn inactivity_ms(&self) -> u32 {
        self.inactivity_ms
    }
}

impl Default for SleepCoordinator {
    fn default() -> Self {
        Self::from_config(&DieConfig::default())
    }
}
