//! Simulated 16-bit compare timer.
//!
//! Implements [`CompareTimer`] for host tests.  Time only moves when the
//! test calls [`SimCompareTimer::advance`]; compare events latch exactly as
//! on the peripheral, whenever the counter steps onto a channel's compare
//! value, interrupt enabled or not.

use crate::app::ports::CompareTimer;
use crate::config::MAX_TIMER_SLOTS;

#[derive(Debug, Default)]
pub struct SimCompareTimer {
    running: bool,
    counter: u16,
    compare: [u16; MAX_TIMER_SLOTS],
    irq_enabled: [bool; MAX_TIMER_SLOTS],
    events: [bool; MAX_TIMER_SLOTS],
}

impl SimCompareTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Step the counter forward by `ticks`, latching every compare match on
    /// the way.  A stopped timer does not count.
    pub fn advance(&mut self, ticks: u32) {
        if !self.running || ticks == 0 {
            return;
        }
        for ch in 0..MAX_TIMER_SLOTS {
            // Ticks until the counter next lands on this compare value.
            let distance = match self.compare[ch].wrapping_sub(self.counter) {
                0 => 1 << 16,
                d => u32::from(d),
            };
            if ticks >= distance {
                self.events[ch] = true;
            }
        }
        self.counter = self.counter.wrapping_add(ticks as u16);
    }

    /// `true` if an enabled channel has a latched event, i.e. the compare
    /// interrupt line would be asserted.
    pub fn irq_pending(&self) -> bool {
        (0..MAX_TIMER_SLOTS).any(|ch| self.events[ch] && self.irq_enabled[ch])
    }

    /// Force the counter to `value`, for wraparound tests.
    pub fn set_counter(&mut self, value: u16) {
        self.counter = value;
    }
}

impl CompareTimer for SimCompareTimer {
    const CHANNELS: usize = MAX_TIMER_SLOTS;

    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn clear(&mut self) {
        self.counter = 0;
    }

    fn counter(&mut self) -> u16 {
        self.counter
    }

    fn compare(&self, channel: usize) -> u16 {
        self.compare[channel]
    }

    fn set_compare(&mut self, channel: usize, value: u16) {
        self.compare[channel] = value;
    }

    fn enable_interrupt(&mut self, channel: usize) {
        self.irq_enabled[channel] = true;
    }

    fn disable_interrupt(&mut self, channel: usize) {
        self.irq_enabled[channel] = false;
    }

    fn interrupt_enabled(&self, channel: usize) -> bool {
        self.irq_enabled[channel]
    }

    fn event_pending(&self, channel: usize) -> bool {
        self.events[channel]
    }

    fn clear_event(&mut self, channel: usize) {
        self.events[channel] = false;
    }
}
