//! Fuzz target: `TimerMux` hook / unhook / advance sequences
//!
//! Each input byte pair is one operation against the simulated compare
//! timer.  After every step the slot table must stay dense: channel `i`
//! has its interrupt enabled iff `i < active_count`.
//!
//! cargo fuzz run fuzz_timer_hooks

#![no_main]

use elecdie::adapters::sim_timer::SimCompareTimer;
use elecdie::app::ports::{CompareTimer, Suspendable, TimerClient};
use elecdie::config::{MAX_TIMER_SLOTS, TIMER_TICK_US};
use elecdie::drivers::timer_mux::{HookId, TimerMux};
use libfuzzer_sys::fuzz_target;

struct Nop;

impl TimerClient for Nop {
    fn on_tick(&self) {}
}

static CLIENT: Nop = Nop;

fuzz_target!(|data: &[u8]| {
    let mux = TimerMux::new(SimCompareTimer::new());
    mux.start();
    let mut ids: Vec<HookId> = Vec::new();

    for pair in data.chunks_exact(2) {
        let (op, arg) = (pair[0], pair[1] as u32);
        match op % 4 {
            0 => {
                let period_us = (arg + 1) * 7 * TIMER_TICK_US;
                if let Ok(id) = mux.hook(period_us, &CLIENT) {
                    ids.push(id);
                }
            }
            1 if !ids.is_empty() => {
                let id = ids.remove(arg as usize % ids.len());
                assert!(mux.unhook(id).is_ok());
            }
            2 => mux.stop(),
            _ => {
                mux.start();
                let irq = mux.with_hardware(|hw| {
                    hw.advance(arg * 97);
                    hw.irq_pending()
                });
                if irq {
                    mux.on_compare_interrupt();
                }
            }
        }

        assert!(ids.len() <= MAX_TIMER_SLOTS);
        assert_eq!(mux.hook_ids().as_slice(), ids.as_slice());
        let active = mux.active_count();
        mux.with_hardware(|hw| {
            for ch in 0..MAX_TIMER_SLOTS {
                assert_eq!(hw.interrupt_enabled(ch), ch < active);
            }
        });
    }
});
