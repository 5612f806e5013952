//! Two dies exchanging settings over the mock radio.
//!
//! Each die runs its own `UpdateScheduler`; a dispatch delegate routes the
//! scheduler's owner tokens to the die's sender and receiver state machines,
//! and incoming messages are routed through the die's `HandlerTable`, the way
//! the firmware main loop does it.

use std::cell::Cell;
use std::rc::Rc;

use elecdie::app::ports::{MessagePort, Subsystem, UpdateDelegate};
use elecdie::error::SyncError;
use elecdie::link::MessageType;
use elecdie::scheduler::UpdateScheduler;
use elecdie::settings::{
    DieSettings, ReceiveSettings, RetryPolicy, SETTINGS_VALID_KEY, SendSettings, SendState, SettingsRecord,
    SyncStatus, store_settings,
};

use crate::mock_hw::{MockRadio, radio_pair};

type Token = Rc<Cell<u32>>;

fn bump(token: Token) {
    token.set(token.get() + 1);
}

struct Die {
    sched: UpdateScheduler,
    rx: ReceiveSettings<Token>,
    tx: SendSettings<Token>,
    radio: MockRadio,
    received: Token,
    sent: Token,
    statuses: Vec<(Subsystem, SyncStatus)>,
    dropped: Vec<MessageType>,
}

struct Dispatch<'a> {
    rx: &'a mut ReceiveSettings<Token>,
    tx: &'a mut SendSettings<Token>,
    radio: &'a mut MockRadio,
    statuses: &'a mut Vec<(Subsystem, SyncStatus)>,
}

impl UpdateDelegate for Dispatch<'_> {
    fn on_update(&mut self, owner: Subsystem, scheduler: &mut UpdateScheduler) {
        let status = match owner {
            Subsystem::SettingsReceiver => self.rx.update(scheduler, &mut *self.radio),
            Subsystem::SettingsSender => self.tx.update(scheduler, &mut *self.radio),
            Subsystem::SleepCoordinator => return,
        };
        self.statuses.push((owner, status));
    }
}

impl Die {
    fn new(mut radio: MockRadio, policy: RetryPolicy) -> Self {
        radio.register_handler(MessageType::TransferSettings, Subsystem::SettingsReceiver);
        Self {
            sched: UpdateScheduler::new(),
            rx: ReceiveSettings::new(policy),
            tx: SendSettings::new(policy),
            radio,
            received: Rc::new(Cell::new(0)),
            sent: Rc::new(Cell::new(0)),
            statuses: Vec::new(),
            dropped: Vec::new(),
        }
    }

    fn store(&mut self, settings: &DieSettings) {
        store_settings(&mut self.radio.flash, settings).unwrap();
    }

    fn start_send(&mut self) -> Result<(), SyncError> {
        self.tx
            .setup(self.sent.clone(), bump, &mut self.sched, &self.radio)
    }

    fn tick(&mut self) {
        let Die {
            sched,
            rx,
            tx,
            radio,
            statuses,
            ..
        } = self;
        sched.tick(&mut Dispatch {
            rx,
            tx,
            radio,
            statuses,
        });
    }

    fn deliver(&mut self) {
        while let Some(ty) = self.radio.pop_message() {
            match self.radio.handlers.dispatch(ty) {
                Some(Subsystem::SettingsReceiver) => {
                    let _ = self
                        .rx
                        .setup(self.received.clone(), bump, &mut self.sched, &mut self.radio);
                }
                Some(Subsystem::SettingsSender) => self.tx.on_setup_ack(),
                _ => self.dropped.push(ty),
            }
        }
    }

    fn record(&self) -> SettingsRecord {
        SettingsRecord::load(&self.radio.flash).unwrap()
    }

    fn last_status(&self, owner: Subsystem) -> Option<SyncStatus> {
        self.statuses
            .iter()
            .rev()
            .find(|(o, _)| *o == owner)
            .map(|(_, s)| *s)
    }
}

fn dies(policy: RetryPolicy) -> (Die, Die) {
    let (ra, rb) = radio_pair();
    (Die::new(ra, policy), Die::new(rb, policy))
}

fn step(a: &mut Die, b: &mut Die) {
    a.tick();
    b.tick();
    a.deliver();
    b.deliver();
}

/// Step both dies until neither has anything registered, or `max` steps.
fn run(a: &mut Die, b: &mut Die, max: usize) -> usize {
    for n in 1..=max {
        step(a, b);
        if a.sched.active_count() == 0 && b.sched.active_count() == 0 {
            return n;
        }
    }
    max
}

fn custom_settings() -> DieSettings {
    let mut settings = DieSettings::default();
    settings.name.clear();
    settings.name.push_str("D20-Blue").unwrap();
    settings.face_count = 20;
    settings.brightness = 40;
    settings
}

#[test]
fn two_dies_transfer_settings() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&custom_settings());

    a.start_send().unwrap();
    let steps = run(&mut a, &mut b, 20);
    assert!(steps < 20, "transfer did not settle");

    let record = b.record();
    assert!(record.is_valid());
    assert_eq!(record.settings().unwrap(), custom_settings());
    assert_eq!(record.payload(), a.record().payload());

    assert_eq!(a.sent.get(), 1);
    assert_eq!(b.received.get(), 1);
    assert_eq!(a.last_status(Subsystem::SettingsSender), Some(SyncStatus::Completed));
    assert_eq!(b.last_status(Subsystem::SettingsReceiver), Some(SyncStatus::Completed));

    // Ack route released; the receiver's own route stays for the next transfer.
    assert_eq!(a.radio.handlers.dispatch(MessageType::TransferSettingsAck), None);
    assert_eq!(
        b.radio.handlers.dispatch(MessageType::TransferSettings),
        Some(Subsystem::SettingsReceiver)
    );
    assert_eq!(a.radio.finished_sends, 1);
    assert_eq!(b.radio.finished_receives, 1);
}

#[test]
fn message_order_on_the_air() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&DieSettings::default());
    a.start_send().unwrap();
    run(&mut a, &mut b, 20);

    assert_eq!(a.radio.sent, vec![MessageType::TransferSettings]);
    assert_eq!(b.radio.sent, vec![MessageType::TransferSettingsAck]);
    assert!(a.dropped.is_empty());
    assert!(b.dropped.is_empty());
}

#[test]
fn receiver_replaces_previous_settings() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    b.store(&DieSettings::default());
    a.store(&custom_settings());

    a.start_send().unwrap();
    run(&mut a, &mut b, 20);

    assert_eq!(b.record().settings().unwrap(), custom_settings());
    assert_eq!(b.radio.flash.erase_count(), 2);
}

#[test]
fn sender_with_invalid_record_sends_nothing() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    b.store(&DieSettings::default());

    assert_eq!(a.start_send(), Err(SyncError::StaleSettingsRefusal));
    for _ in 0..5 {
        step(&mut a, &mut b);
    }
    assert!(a.radio.sent.is_empty());
    assert!(b.record().is_valid());
    assert_eq!(a.sent.get(), 0);
}

#[test]
fn refused_sends_are_retried_every_tick() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&custom_settings());
    a.radio.refuse_sends = 5;
    b.radio.refuse_sends = 3;

    a.start_send().unwrap();
    let steps = run(&mut a, &mut b, 40);
    assert!(steps < 40);

    assert_eq!(a.radio.sent, vec![MessageType::TransferSettings]);
    assert_eq!(b.radio.sent, vec![MessageType::TransferSettingsAck]);
    assert_eq!(b.record().settings().unwrap(), custom_settings());
}

#[test]
fn power_cut_during_receive_leaves_invalid_record() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&custom_settings());
    // Head marker lands, payload and tail do not.
    b.radio.flash.cut_power_after_writes(1);

    a.start_send().unwrap();
    run(&mut a, &mut b, 20);

    assert_eq!(
        b.last_status(Subsystem::SettingsReceiver),
        Some(SyncStatus::Aborted(SyncError::FlashWriteFailure))
    );
    let record = b.record();
    assert_eq!(record.head, SETTINGS_VALID_KEY);
    assert!(!record.is_valid());
    assert_eq!(b.received.get(), 0);
    assert!(b.rx.is_done());
}

#[test]
fn wrongly_sized_payload_is_rejected() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);

    // Drive the sender's half by hand.
    assert!(a.radio.send_message(MessageType::TransferSettings));
    b.deliver();
    b.tick();
    assert_eq!(a.radio.pop_message(), Some(MessageType::TransferSettingsAck));

    a.radio.inject_bulk(&[1, 2, 3]);
    b.tick();

    assert_eq!(
        b.last_status(Subsystem::SettingsReceiver),
        Some(SyncStatus::Aborted(SyncError::PayloadSizeMismatch))
    );
    assert_eq!(b.record().head, 0xFFFF_FFFF);
    assert_eq!(b.received.get(), 0);
    assert_eq!(b.sched.active_count(), 0);
}

#[test]
fn silent_peer_stalls_unbounded_sender() {
    let (mut a, _b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&DieSettings::default());
    a.start_send().unwrap();

    for _ in 0..500 {
        a.tick();
    }
    assert_eq!(a.tx.state(), SendState::WaitingForSetupAck { waited: 499 });
    assert_eq!(a.sent.get(), 0);
}

#[test]
fn silent_peer_aborts_bounded_sender() {
    let policy = RetryPolicy {
        max_send_attempts: None,
        max_wait_ticks: Some(10),
    };
    let (mut a, _b) = dies(policy);
    a.store(&DieSettings::default());
    a.start_send().unwrap();

    for _ in 0..20 {
        a.tick();
    }
    assert_eq!(
        a.last_status(Subsystem::SettingsSender),
        Some(SyncStatus::Aborted(SyncError::RetryLimitReached))
    );
    assert!(a.tx.is_done());
    assert_eq!(a.sent.get(), 0);
    assert_eq!(a.radio.handlers.dispatch(MessageType::TransferSettingsAck), None);
    assert_eq!(a.sched.active_count(), 0);
}

#[test]
fn second_transfer_needs_fresh_setup() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&custom_settings());

    a.start_send().unwrap();
    run(&mut a, &mut b, 20);
    assert_eq!(a.tx.update(&mut a.sched, &mut a.radio), SyncStatus::Idle);

    a.start_send().unwrap();
    run(&mut a, &mut b, 20);
    assert_eq!(a.sent.get(), 2);
    assert_eq!(b.received.get(), 2);
}

#[test]
fn setup_during_transfer_is_busy() {
    let (mut a, mut b) = dies(RetryPolicy::UNBOUNDED);
    a.store(&DieSettings::default());
    a.start_send().unwrap();
    step(&mut a, &mut b);

    assert_eq!(a.start_send(), Err(SyncError::Busy));
    run(&mut a, &mut b, 20);
    assert_eq!(a.sent.get(), 1);
}
