//! Sending side of the settings transfer.
//!
//! Announces a transfer, waits for the peer to erase its page and ack, then
//! pushes the stored payload through a bulk session.  The ack arrives via
//! message dispatch, outside the tick, and is delivered with
//! [`SendSettings::on_setup_ack`].

use log::{debug, info, warn};

use super::{Completion, RetryPolicy, SettingsRecord, SyncStatus};
use crate::app::ports::{BulkSend, FlashPort, MessagePort, Subsystem, UpdateRegistry};
use crate::error::SyncError;
use crate::link::MessageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Done,
    /// `TransferSettings` refused `attempts` times so far.
    SendingSetup { attempts: u32 },
    /// Announced; waiting `waited` ticks for the peer's ack.
    WaitingForSetupAck { waited: u32 },
    SetupAckReceived,
    /// Bulk send in progress for `waited` ticks.
    SendingSettings { waited: u32 },
}

pub struct SendSettings<T> {
    state: SendState,
    completion: Option<Completion<T>>,
    policy: RetryPolicy,
}

impl<T> SendSettings<T> {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            state: SendState::Done,
            completion: None,
            policy,
        }
    }

    pub fn state(&self) -> SendState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == SendState::Done
    }

    /// Start a transfer of the locally stored record.  Refuses, without
    /// sending anything, when that record is not valid.
    pub fn setup(
        &mut self,
        token: T,
        callback: fn(T),
        sched: &mut impl UpdateRegistry,
        flash: &impl FlashPort,
    ) -> Result<(), SyncError> {
        if !self.is_done() {
            warn!("SendSettings: setup while in {:?}", self.state);
            return Err(SyncError::Busy);
        }
        if !stored_record_valid(flash) {
            warn!("SendSettings: stored settings are not valid, nothing to send");
            return Err(SyncError::StaleSettingsRefusal);
        }

        self.completion = Some(Completion { token, callback });
        if !sched.register_update(Subsystem::SettingsSender) {
            warn!("SendSettings: could not register for updates");
        }
        self.transition(SendState::SendingSetup { attempts: 0 });
        Ok(())
    }

    /// The peer acknowledged `TransferSettings`.
    pub fn on_setup_ack(&mut self) {
        if let SendState::WaitingForSetupAck { .. } = self.state {
            self.transition(SendState::SetupAckReceived);
        } else {
            debug!("SendSettings: stray setup ack in {:?}", self.state);
        }
    }

    /// One cooperative tick.
    pub fn update(
        &mut self,
        sched: &mut impl UpdateRegistry,
        io: &mut (impl FlashPort + MessagePort + BulkSend),
    ) -> SyncStatus {
        match self.state {
            SendState::Done => SyncStatus::Idle,

            SendState::SendingSetup { attempts } => {
                if io.send_message(MessageType::TransferSettings) {
                    io.register_handler(MessageType::TransferSettingsAck, Subsystem::SettingsSender);
                    self.transition(SendState::WaitingForSetupAck { waited: 0 });
                    return SyncStatus::InProgress;
                }
                let attempts = attempts.saturating_add(1);
                if self.policy.send_exhausted(attempts) {
                    return self.abort(sched, SyncError::RetryLimitReached);
                }
                debug!("SendSettings: setup refused ({} attempts)", attempts);
                self.state = SendState::SendingSetup { attempts };
                SyncStatus::InProgress
            }

            SendState::WaitingForSetupAck { waited } => {
                let waited = waited.saturating_add(1);
                if self.policy.wait_exhausted(waited) {
                    io.unregister_handler(MessageType::TransferSettingsAck);
                    return self.abort(sched, SyncError::RetryLimitReached);
                }
                self.state = SendState::WaitingForSetupAck { waited };
                SyncStatus::InProgress
            }

            SendState::SetupAckReceived => {
                io.unregister_handler(MessageType::TransferSettingsAck);
                match SettingsRecord::load(&*io) {
                    Ok(record) if record.is_valid() => {
                        io.begin_send(record.payload());
                        self.transition(SendState::SendingSettings { waited: 0 });
                        SyncStatus::InProgress
                    }
                    _ => self.abort(sched, SyncError::StaleSettingsRefusal),
                }
            }

            SendState::SendingSettings { waited } => {
                if io.send_complete() {
                    io.finish_send();
                    self.finish(sched);
                    return SyncStatus::Completed;
                }
                let waited = waited.saturating_add(1);
                if self.policy.wait_exhausted(waited) {
                    io.finish_send();
                    return self.abort(sched, SyncError::RetryLimitReached);
                }
                self.state = SendState::SendingSettings { waited };
                SyncStatus::InProgress
            }
        }
    }

    /// Return to `Done` and fire the completion if one is pending.
    pub fn finish(&mut self, sched: &mut impl UpdateRegistry) {
        self.transition(SendState::Done);
        sched.unregister_update(Subsystem::SettingsSender);
        if let Some(completion) = self.completion.take() {
            completion.fire();
        }
    }

    fn abort(&mut self, sched: &mut impl UpdateRegistry, err: SyncError) -> SyncStatus {
        warn!("SendSettings: aborted in {:?}: {}", self.state, err);
        self.completion = None;
        self.transition(SendState::Done);
        sched.unregister_update(Subsystem::SettingsSender);
        SyncStatus::Aborted(err)
    }

    fn transition(&mut self, next: SendState) {
        if core::mem::discriminant(&self.state) != core::mem::discriminant(&next) {
            info!("SendSettings: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }
}

fn stored_record_valid(flash: &impl FlashPort) -> bool {
    match SettingsRecord::load(flash) {
        Ok(record) => record.is_valid(),
        Err(e) => {
            warn!("SendSettings: reading settings failed: {}", e);
            false
        }
    }
}
