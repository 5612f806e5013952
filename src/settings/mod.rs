//! Persisted die settings and the die-to-die transfer protocol.
//!
//! # Flash layout
//!
//! ```text
//! SETTINGS_ADDRESS
//! ┌──────────────┬──────────────────────────────────┬──────────────┐
//! │ head (u32 LE)│ payload [SETTINGS_PAYLOAD_SIZE]  │ tail (u32 LE)│
//! └──────────────┴──────────────────────────────────┴──────────────┘
//! ```
//!
//! A record is valid only when both markers equal [`SETTINGS_VALID_KEY`].
//! Writers program head, payload, tail in that order on a freshly erased
//! page, so a write interrupted at any point leaves the tail erased and the
//! record reads invalid.
//!
//! The payload is a postcard-encoded [`DieSettings`], zero padded to the
//! fixed block size.  The transfer protocol moves the raw block and never
//! decodes it.
//!
//! # Protocol
//!
//! ```text
//!   Sender                               Receiver
//!   ──────                               ────────
//!   SendingSetup ── TransferSettings ──▶ (setup: erase page)
//!   WaitingForSetupAck ◀── TransferSettingsAck ── SendingAck
//!   SetupAckReceived
//!   SendingSettings ══ bulk payload ══▶ TransferSettings
//!   Done                                 write head/payload/tail, Done
//! ```

pub mod receive;
pub mod send;

use heapless::String;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::FlashPort;
use crate::error::{FlashError, SettingsError};

pub use receive::{ReceiveSettings, ReceiveState};
pub use send::{SendSettings, SendState};

/// Marker word written before and after a valid payload.
pub const SETTINGS_VALID_KEY: u32 = 0x05E7_7165;
/// Erase granularity of the flash array (bytes).
pub const FLASH_PAGE_SIZE: u32 = 1024;
/// Flash page reserved for the settings record.
pub const SETTINGS_PAGE: u8 = 251;
/// Byte address of the settings record.
pub const SETTINGS_ADDRESS: u32 = SETTINGS_PAGE as u32 * FLASH_PAGE_SIZE;
/// Size of one marker word.
pub const MARKER_SIZE: usize = 4;
/// Size of the payload block between the markers.  Multiple of 4 so the
/// tail marker stays word aligned.
pub const SETTINGS_PAYLOAD_SIZE: usize = 64;
/// Total record size in flash.
pub const SETTINGS_RECORD_SIZE: usize = MARKER_SIZE + SETTINGS_PAYLOAD_SIZE + MARKER_SIZE;

const PAYLOAD_ADDRESS: u32 = SETTINGS_ADDRESS + MARKER_SIZE as u32;
const TAIL_ADDRESS: u32 = PAYLOAD_ADDRESS + SETTINGS_PAYLOAD_SIZE as u32;

// ───────────────────────────────────────────────────────────────
// Payload contents
// ───────────────────────────────────────────────────────────────

/// Per-die configuration carried in the settings payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieSettings {
    /// Advertised name.
    pub name: String<16>,
    /// Number of faces on the die.
    pub face_count: u8,
    /// Indicator brightness, 0–255.
    pub brightness: u8,
}

impl Default for DieSettings {
    fn default() -> Self {
        let mut name = String::new();
        // Fits: 4 bytes into a 16-byte string.
        let _ = name.push_str("Dice");
        Self {
            name,
            face_count: 6,
            brightness: 128,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Record
// ───────────────────────────────────────────────────────────────

/// In-memory image of the settings record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsRecord {
    pub head: u32,
    pub payload: [u8; SETTINGS_PAYLOAD_SIZE],
    pub tail: u32,
}

impl SettingsRecord {
    /// Read the record from its fixed flash address.
    pub fn load(flash: &impl FlashPort) -> Result<Self, FlashError> {
        let mut raw = [0u8; SETTINGS_RECORD_SIZE];
        flash.read(SETTINGS_ADDRESS, &mut raw)?;
        Ok(Self::from_bytes(&raw))
    }

    /// Parse a raw record image.
    pub fn from_bytes(raw: &[u8; SETTINGS_RECORD_SIZE]) -> Self {
        let mut head = [0u8; MARKER_SIZE];
        let mut tail = [0u8; MARKER_SIZE];
        let mut payload = [0u8; SETTINGS_PAYLOAD_SIZE];
        head.copy_from_slice(&raw[..MARKER_SIZE]);
        payload.copy_from_slice(&raw[MARKER_SIZE..MARKER_SIZE + SETTINGS_PAYLOAD_SIZE]);
        tail.copy_from_slice(&raw[MARKER_SIZE + SETTINGS_PAYLOAD_SIZE..]);
        Self {
            head: u32::from_le_bytes(head),
            payload,
            tail: u32::from_le_bytes(tail),
        }
    }

    /// Build a valid record around encoded `settings`.
    pub fn from_settings(settings: &DieSettings) -> Result<Self, SettingsError> {
        let mut payload = [0u8; SETTINGS_PAYLOAD_SIZE];
        postcard::to_slice(settings, &mut payload).map_err(|_| SettingsError::Encode)?;
        Ok(Self {
            head: SETTINGS_VALID_KEY,
            payload,
            tail: SETTINGS_VALID_KEY,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.head == SETTINGS_VALID_KEY && self.tail == SETTINGS_VALID_KEY
    }

    /// The bytes between the two markers.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload.  Trailing padding is ignored.
    pub fn settings(&self) -> Result<DieSettings, SettingsError> {
        postcard::take_from_bytes(&self.payload)
            .map(|(settings, _rest)| settings)
            .map_err(|_| SettingsError::Decode)
    }
}

/// Program head marker, payload, tail marker, in that order, on an already
/// erased settings page.  Stops at the first failing write.
pub fn write_record(flash: &mut impl FlashPort, payload: &[u8]) -> Result<(), FlashError> {
    if payload.len() != SETTINGS_PAYLOAD_SIZE {
        return Err(FlashError::OutOfRange);
    }
    flash.write_word(SETTINGS_ADDRESS, SETTINGS_VALID_KEY)?;
    flash.write_block(PAYLOAD_ADDRESS, payload)?;
    flash.write_word(TAIL_ADDRESS, SETTINGS_VALID_KEY)
}

/// Erase the settings page and store `settings` as a fresh valid record.
pub fn store_settings(flash: &mut impl FlashPort, settings: &DieSettings) -> Result<(), crate::error::Error> {
    let record = SettingsRecord::from_settings(settings)?;
    flash.erase_page(SETTINGS_PAGE)?;
    write_record(flash, record.payload()).inspect_err(|e| {
        warn!("Settings: store failed: {}", e);
    })?;
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Shared protocol types
// ───────────────────────────────────────────────────────────────

/// Bounds on the handshake's retry loops.
///
/// `None` waits forever: a peer that never answers stalls the state machine
/// until the next `setup` after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Consecutive ticks a message send may be refused.
    pub max_send_attempts: Option<u32>,
    /// Ticks to wait for an ack or a bulk transfer to complete.
    pub max_wait_ticks: Option<u32>,
}

impl RetryPolicy {
    pub const UNBOUNDED: Self = Self {
        max_send_attempts: None,
        max_wait_ticks: None,
    };

    pub(crate) fn send_exhausted(&self, attempts: u32) -> bool {
        self.max_send_attempts.is_some_and(|max| attempts >= max)
    }

    pub(crate) fn wait_exhausted(&self, waited: u32) -> bool {
        self.max_wait_ticks.is_some_and(|max| waited >= max)
    }
}

/// One-shot completion notification, fired at most once per `setup`.
#[derive(Debug, Clone, Copy)]
pub struct Completion<T> {
    pub token: T,
    pub callback: fn(T),
}

impl<T> Completion<T> {
    pub(crate) fn fire(self) {
        (self.callback)(self.token);
    }
}

/// Result of one `update` tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Not transferring.
    Idle,
    /// Still working; call again next tick.
    InProgress,
    /// Transfer finished and the completion fired during this tick.
    Completed,
    /// Transfer abandoned during this tick; the completion did not fire.
    Aborted(crate::error::SyncError),
}
