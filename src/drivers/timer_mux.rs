//! Virtual periodic timers multiplexed over one 16-bit compare timer.
//!
//! Each hooked client owns one compare channel.  The counter runs free; a
//! channel's compare register is advanced by that client's own period every
//! time it fires, so clients with different periods share the counter
//! without disturbing each other.
//!
//! ```text
//!  counter ─────────────────────────────────────────────▶ (wraps at 2^16)
//!  CC[0]   ──┬───────┬───────┬───────┬──   period A
//!  CC[1]   ─────┬──────────────┬─────────  period B
//!            fire, CC += period (mod 2^16)
//! ```
//!
//! Slots stay dense: slot `i` always drives channel `i`, and unhooking shifts
//! the higher slots down one channel, carrying their compare values so their
//! phase is preserved.
//!
//! The slot table and the peripheral sit behind one critical section.  The
//! interrupt handler collects due clients under the lock and calls them after
//! releasing it, so a client may hook or unhook from its own tick.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{CompareTimer, Suspendable, TimerClient};
use crate::config::{MAX_TIMER_SLOTS, TIMER_TICK_US};
use crate::error::TimerError;

/// Identity of a hooked client, returned by [`TimerMux::hook`].  Never
/// reused while the multiplexer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u32);

#[derive(Clone, Copy)]
struct Slot<'a> {
    id: HookId,
    client: &'a dyn TimerClient,
    ticks: u16,
}

struct MuxInner<'a, T> {
    hw: T,
    slots: Vec<Slot<'a>, MAX_TIMER_SLOTS>,
    next_id: u32,
}

pub struct TimerMux<'a, T: CompareTimer> {
    inner: Mutex<RefCell<MuxInner<'a, T>>>,
}

impl<'a, T: CompareTimer> TimerMux<'a, T> {
    /// Take ownership of the peripheral, stopped and cleared.  Call
    /// [`Suspendable::start`] to begin counting.
    pub fn new(mut hw: T) -> Self {
        hw.stop();
        hw.clear();
        Self {
            inner: Mutex::new(RefCell::new(MuxInner {
                hw,
                slots: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Usable slots: the smaller of the slot table and the channel count.
    fn capacity() -> usize {
        MAX_TIMER_SLOTS.min(T::CHANNELS)
    }

    /// Call `client` every `period_us` microseconds.
    ///
    /// The period is truncated to whole 16 us ticks and must come to between
    /// 1 and 65535 ticks.  The first call lands one period after the current
    /// counter value.
    pub fn hook(&self, period_us: u32, client: &'a dyn TimerClient) -> Result<HookId, TimerError> {
        let ticks = u16::try_from(period_us / TIMER_TICK_US)
            .ok()
            .filter(|t| *t != 0)
            .ok_or_else(|| {
                warn!("TimerMux: period {} us is outside the tick range", period_us);
                TimerError::PeriodOutOfRange
            })?;

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let inner = &mut *inner;

            let ch = inner.slots.len();
            if ch >= Self::capacity() {
                warn!("TimerMux: too many timer hooks registered");
                return Err(TimerError::SlotTableFull);
            }

            let id = HookId(inner.next_id);
            inner.next_id = inner.next_id.wrapping_add(1);

            let now = inner.hw.counter();
            inner.hw.set_compare(ch, now.wrapping_add(ticks));
            // Unused channels keep matching as the counter passes their
            // compare value; drop anything latched before arming.
            inner.hw.clear_event(ch);
            inner.hw.enable_interrupt(ch);
            inner
                .slots
                .push(Slot { id, client, ticks })
                .map_err(|_| TimerError::SlotTableFull)?;

            info!("TimerMux: hooked {:?} on channel {} ({} ticks)", id, ch, ticks);
            Ok(id)
        })
    }

    /// Stop calling the client registered under `id`.
    pub fn unhook(&self, id: HookId) -> Result<(), TimerError> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let inner = &mut *inner;

            let Some(idx) = inner.slots.iter().position(|s| s.id == id) else {
                warn!("TimerMux: timer hook {:?} was not found", id);
                return Err(TimerError::HandlerNotFound);
            };

            inner.hw.set_compare(idx, 0);
            inner.slots.remove(idx);
            for ch in idx..inner.slots.len() {
                let cc = inner.hw.compare(ch + 1);
                inner.hw.set_compare(ch, cc);
                inner.hw.clear_event(ch);
            }

            let top = inner.slots.len();
            inner.hw.disable_interrupt(top);
            inner.hw.set_compare(top, 0);
            inner.hw.clear_event(top);

            info!("TimerMux: unhooked {:?} from channel {}", id, idx);
            Ok(())
        })
    }

    /// Compare interrupt handler.
    pub fn on_compare_interrupt(&self) {
        let due: Vec<&'a dyn TimerClient, MAX_TIMER_SLOTS> = critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let inner = &mut *inner;
            let mut due = Vec::new();

            for ch in 0..Self::capacity() {
                if !inner.hw.event_pending(ch) {
                    continue;
                }
                inner.hw.clear_event(ch);
                if let Some(slot) = inner.slots.get(ch) {
                    let next = inner.hw.compare(ch).wrapping_add(slot.ticks);
                    inner.hw.set_compare(ch, next);
                    // One entry per slot, cannot overflow.
                    let _ = due.push(slot.client);
                } else if inner.hw.interrupt_enabled(ch) {
                    warn!("TimerMux: timer event {} does not have a registered hook", ch);
                }
            }
            due
        });

        for client in due {
            client.on_tick();
        }
    }

    /// Run `f` against the peripheral under the critical section.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs).hw))
    }

    /// Ids of the hooked clients, in channel order.
    pub fn hook_ids(&self) -> Vec<HookId, MAX_TIMER_SLOTS> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).slots.iter().map(|s| s.id).collect())
    }

    pub fn active_count(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).slots.len())
    }
}

impl<T: CompareTimer> Suspendable for TimerMux<'_, T> {
    fn start(&self) {
        self.with_hardware(|hw| hw.start());
        info!("TimerMux: started");
    }

    fn stop(&self) {
        self.with_hardware(|hw| hw.stop());
        info!("TimerMux: stopped");
    }
}
