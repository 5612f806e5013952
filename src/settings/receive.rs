//! Receiving side of the settings transfer.
//!
//! Started by the message handler for `TransferSettings`.  Erases the
//! settings page up front, acknowledges, pulls the payload through a bulk
//! session and programs the record.

use log::{debug, info, warn};

use super::{Completion, RetryPolicy, SETTINGS_PAGE, SETTINGS_PAYLOAD_SIZE, SyncStatus, write_record};
use crate::app::ports::{BulkReceive, FlashPort, MessagePort, Subsystem, UpdateRegistry};
use crate::error::SyncError;
use crate::link::MessageType;

/// Receiver state.  Each variant carries only what is valid in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    Done,
    /// Transient, only observable from inside `setup`.
    ErasingFlash,
    /// Ack refused `attempts` times so far.
    SendingAck { attempts: u32 },
    /// Bulk receive in progress for `waited` ticks.
    TransferSettings { waited: u32 },
}

pub struct ReceiveSettings<T> {
    state: ReceiveState,
    completion: Option<Completion<T>>,
    policy: RetryPolicy,
}

impl<T> ReceiveSettings<T> {
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ReceiveState::Done,
            completion: None,
            policy,
        }
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ReceiveState::Done
    }

    /// Start receiving.  Erases the settings page before acknowledging, so
    /// the previous record is gone from here on.
    pub fn setup(
        &mut self,
        token: T,
        callback: fn(T),
        sched: &mut impl UpdateRegistry,
        flash: &mut impl FlashPort,
    ) -> Result<(), SyncError> {
        if !self.is_done() {
            warn!("ReceiveSettings: setup while in {:?}", self.state);
            return Err(SyncError::Busy);
        }

        self.transition(ReceiveState::ErasingFlash);
        if let Err(e) = flash.erase_page(SETTINGS_PAGE) {
            warn!("ReceiveSettings: error erasing flash for settings: {}", e);
            self.transition(ReceiveState::Done);
            return Err(SyncError::FlashEraseFailure);
        }

        self.completion = Some(Completion { token, callback });
        if !sched.register_update(Subsystem::SettingsReceiver) {
            warn!("ReceiveSettings: could not register for updates");
        }
        self.transition(ReceiveState::SendingAck { attempts: 0 });
        Ok(())
    }

    /// One cooperative tick.
    pub fn update(
        &mut self,
        sched: &mut impl UpdateRegistry,
        io: &mut (impl FlashPort + MessagePort + BulkReceive),
    ) -> SyncStatus {
        match self.state {
            ReceiveState::Done | ReceiveState::ErasingFlash => SyncStatus::Idle,

            ReceiveState::SendingAck { attempts } => {
                if io.send_message(MessageType::TransferSettingsAck) {
                    io.begin_receive();
                    self.transition(ReceiveState::TransferSettings { waited: 0 });
                    return SyncStatus::InProgress;
                }
                let attempts = attempts.saturating_add(1);
                if self.policy.send_exhausted(attempts) {
                    return self.abort(sched, SyncError::RetryLimitReached);
                }
                debug!("ReceiveSettings: ack refused ({} attempts)", attempts);
                self.state = ReceiveState::SendingAck { attempts };
                SyncStatus::InProgress
            }

            ReceiveState::TransferSettings { waited } => {
                if !io.receive_complete() {
                    let waited = waited.saturating_add(1);
                    if self.policy.wait_exhausted(waited) {
                        io.finish_receive();
                        return self.abort(sched, SyncError::RetryLimitReached);
                    }
                    self.state = ReceiveState::TransferSettings { waited };
                    return SyncStatus::InProgress;
                }

                let received = io.received();
                if received.len() != SETTINGS_PAYLOAD_SIZE {
                    warn!(
                        "ReceiveSettings: payload is {} bytes, expected {}",
                        received.len(),
                        SETTINGS_PAYLOAD_SIZE
                    );
                    io.finish_receive();
                    return self.abort(sched, SyncError::PayloadSizeMismatch);
                }
                let mut payload = [0u8; SETTINGS_PAYLOAD_SIZE];
                payload.copy_from_slice(received);

                let written = write_record(&mut *io, &payload);
                io.finish_receive();
                match written {
                    Ok(()) => {
                        self.finish(sched);
                        SyncStatus::Completed
                    }
                    Err(e) => {
                        warn!("ReceiveSettings: error writing settings: {}", e);
                        self.abort(sched, SyncError::FlashWriteFailure)
                    }
                }
            }
        }
    }

    /// Return to `Done` and fire the completion if one is pending.
    pub fn finish(&mut self, sched: &mut impl UpdateRegistry) {
        self.transition(ReceiveState::Done);
        sched.unregister_update(Subsystem::SettingsReceiver);
        if let Some(completion) = self.completion.take() {
            completion.fire();
        }
    }

    fn abort(&mut self, sched: &mut impl UpdateRegistry, err: SyncError) -> SyncStatus {
        warn!("ReceiveSettings: aborted in {:?}: {}", self.state, err);
        self.completion = None;
        self.transition(ReceiveState::Done);
        sched.unregister_update(Subsystem::SettingsReceiver);
        SyncStatus::Aborted(err)
    }

    fn transition(&mut self, next: ReceiveState) {
        if core::mem::discriminant(&self.state) != core::mem::discriminant(&next) {
            info!("ReceiveSettings: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }
}
