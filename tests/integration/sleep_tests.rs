//! Sleep/wake sequencing against the recording board.

use std::cell::RefCell;
use std::rc::Rc;

use elecdie::adapters::sim_timer::SimCompareTimer;
use elecdie::app::ports::{Pull, Subsystem, Suspendable, UpdateDelegate, WakeLevel, WakeSource};
use elecdie::config::DieConfig;
use elecdie::drivers::timer_mux::TimerMux;
use elecdie::power::{SleepCoordinator, WakeReason};
use elecdie::scheduler::UpdateScheduler;

use crate::mock_hw::{BoardCall, CallLog, ClockAt, LineOp, LoggedUnit, MockBoard, RadioLine, TickCounter, WaitEvent};

fn new_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

#[test]
fn idle_die_sleeps_and_motion_wakes_it() {
    let coord = SleepCoordinator::new(5000);
    let log = new_log();
    let (timer, leds) = (LoggedUnit::timer(&log), LoggedUnit::indicator(&log));
    let mut board = MockBoard::new(&coord, &log);
    // Idle since 0: asleep at 5001, shaken at 7000.
    board.then(1999, WaitEvent::Motion);

    board.set_now(0);
    coord.poke(&board);
    board.set_now(4000);
    assert_eq!(coord.update(&timer, &leds, &mut board), None);

    board.set_now(5001);
    let reason = coord.update(&timer, &leds, &mut board);
    assert_eq!(
        reason,
        Some(WakeReason {
            motion: true,
            wireless: false
        })
    );

    assert_eq!(
        board.calls(),
        vec![
            BoardCall::TimerStop,
            BoardCall::IndicatorStop,
            BoardCall::EnableTransient,
            BoardCall::Arm(WakeSource::Motion, WakeLevel::Low),
            BoardCall::Arm(WakeSource::Wireless, WakeLevel::High),
            BoardCall::Wait,
            BoardCall::ClearTransient,
            BoardCall::DisableTransient,
            BoardCall::Disarm(WakeSource::Motion),
            BoardCall::Disarm(WakeSource::Wireless),
            BoardCall::TimerStart,
        ]
    );
    assert!(!coord.is_asleep());
    assert_eq!(coord.last_activity_ms(), 7000);
}

#[test]
fn indicator_is_not_restarted_on_wake() {
    let coord = SleepCoordinator::new(5000);
    let log = new_log();
    let (timer, leds) = (LoggedUnit::timer(&log), LoggedUnit::indicator(&log));
    let mut board = MockBoard::new(&coord, &log);
    board.then(10, WaitEvent::Motion);

    board.set_now(6000);
    coord.update(&timer, &leds, &mut board);
    assert!(!board.calls().contains(&BoardCall::IndicatorStart));
}

#[test]
fn radio_traffic_while_asleep_pulses_the_wake_line() {
    let coord = SleepCoordinator::new(5000);
    let log = new_log();
    let (timer, leds) = (LoggedUnit::timer(&log), LoggedUnit::indicator(&log));
    let mut board = MockBoard::new(&coord, &log);
    board.then(1500, WaitEvent::Radio);

    board.set_now(5001);
    let reason = coord.update(&timer, &leds, &mut board).unwrap();
    assert!(reason.wireless);
    assert!(!reason.motion);
    assert_eq!(
        board.line.ops,
        vec![LineOp::Pull(Pull::Up), LineOp::High, LineOp::Pull(Pull::Down), LineOp::Low]
    );
    assert_eq!(coord.last_activity_ms(), 6501);
}

#[test]
fn both_sources_are_reported_and_cleared() {
    let coord = SleepCoordinator::new(5000);
    let log = new_log();
    let (timer, leds) = (LoggedUnit::timer(&log), LoggedUnit::indicator(&log));
    let mut board = MockBoard::new(&coord, &log);
    board.then(100, WaitEvent::Both).then(100, WaitEvent::Motion);

    board.set_now(5001);
    let reason = coord.update(&timer, &leds, &mut board).unwrap();
    assert_eq!(
        reason,
        WakeReason {
            motion: true,
            wireless: true
        }
    );

    // Latches were consumed: the next sleep waits for a fresh event.
    board.set_now(20_000);
    let reason = coord.update(&timer, &leds, &mut board).unwrap();
    assert!(reason.motion && !reason.wireless);
}

#[test]
fn spurious_wakeups_keep_the_die_asleep() {
    let coord = SleepCoordinator::new(5000);
    let log = new_log();
    let (timer, leds) = (LoggedUnit::timer(&log), LoggedUnit::indicator(&log));
    let mut board = MockBoard::new(&coord, &log);
    board
        .then(10, WaitEvent::Nothing)
        .then(10, WaitEvent::Nothing)
        .then(10, WaitEvent::Motion);

    board.set_now(5001);
    coord.update(&timer, &leds, &mut board);

    let waits = board.calls().iter().filter(|c| **c == BoardCall::Wait).count();
    assert_eq!(waits, 3);
    let starts = board.calls().iter().filter(|c| **c == BoardCall::TimerStart).count();
    assert_eq!(starts, 1);
}

#[test]
fn radio_traffic_while_awake_postpones_sleep() {
    let coord = SleepCoordinator::new(5000);
    let log = new_log();
    let (timer, leds) = (LoggedUnit::timer(&log), LoggedUnit::indicator(&log));
    let mut board = MockBoard::new(&coord, &log);
    let mut line = RadioLine::new(&coord);

    board.set_now(0);
    coord.poke(&board);
    coord.on_wireless_event(&mut line, &ClockAt(4000));
    assert!(line.ops.is_empty());

    board.set_now(8000);
    assert_eq!(coord.update(&timer, &leds, &mut board), None);
    board.set_now(9001);
    board.then(1, WaitEvent::Motion);
    assert!(coord.update(&timer, &leds, &mut board).is_some());
}

/// Main-loop delegate: only the sleep coordinator is registered here.
struct SleepLoop<'a, 'b, 'm> {
    coord: &'b SleepCoordinator,
    mux: &'a TimerMux<'m, SimCompareTimer>,
    leds: &'a LoggedUnit,
    board: &'a mut MockBoard<'b>,
    wakes: Vec<WakeReason>,
}

impl UpdateDelegate for SleepLoop<'_, '_, '_> {
    fn on_update(&mut self, owner: Subsystem, _scheduler: &mut UpdateScheduler) {
        if owner == Subsystem::SleepCoordinator {
            if let Some(reason) = self.coord.update(self.mux, self.leds, &mut *self.board) {
                self.wakes.push(reason);
            }
        }
    }
}

#[test]
fn scheduler_drives_sleep_and_restarts_timer_mux() {
    let coord = SleepCoordinator::from_config(&DieConfig::default());
    let log = new_log();
    let leds = LoggedUnit::indicator(&log);
    let mut board = MockBoard::new(&coord, &log);
    let mut sched = UpdateScheduler::new();
    let client = TickCounter::default();
    let mux = TimerMux::new(SimCompareTimer::new());
    mux.hook(16 * 10, &client).unwrap();
    mux.start();

    let mut line = RadioLine::new(&coord);
    coord.init(&mut sched, &mut line, &mut board);
    assert_eq!(line.ops, vec![LineOp::Pull(Pull::Down)]);
    assert_eq!(board.calls(), vec![BoardCall::InputPull(WakeSource::Motion, Pull::Up)]);

    board.then(3000, WaitEvent::Motion);
    board.set_now(5001);
    let mut main_loop = SleepLoop {
        coord: &coord,
        mux: &mux,
        leds: &leds,
        board: &mut board,
        wakes: Vec::new(),
    };
    sched.tick(&mut main_loop);
    assert_eq!(main_loop.wakes.len(), 1);
    assert!(mux.with_hardware(|hw| hw.is_running()));

    // The restarted mux keeps its phase: first compare is still at 10 ticks.
    let irq = mux.with_hardware(|hw| {
        hw.advance(10);
        hw.irq_pending()
    });
    assert!(irq);
    mux.on_compare_interrupt();
    assert_eq!(client.get(), 1);

    coord.stop(&mut sched);
    sched.tick(&mut main_loop);
    assert_eq!(main_loop.wakes.len(), 1);
}
