//! Message-type dispatch for the radio link.
//!
//! Framing, chunking and connection management live in the radio stack;
//! this module only names the message types the core cares about and
//! provides the fixed-capacity table an adapter uses to route an incoming
//! message type to the subsystem that registered for it.
//!
//! ```text
//!  radio rx ──▶ MessageType::from_u8 ──▶ HandlerTable::dispatch ──▶ Subsystem
//! ```

use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::Subsystem;
use crate::error::LinkError;

/// Maximum number of concurrently registered message handlers.
pub const MAX_HANDLERS: usize = 8;

/// Message types exchanged by the settings transfer handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Sender → receiver: "I have settings for you".
    TransferSettings = 9,
    /// Receiver → sender: flash erased, ready for the bulk transfer.
    TransferSettingsAck = 10,
}

impl MessageType {
    /// Wire code of this message type.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a wire code.  Codes owned by other subsystems return `None`.
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            9 => Some(Self::TransferSettings),
            10 => Some(Self::TransferSettingsAck),
            _ => None,
        }
    }
}

/// Routing table from message type to owning subsystem.
///
/// One handler per message type: registering a type again replaces the
/// previous owner, matching the radio stack's single-slot handler array.
#[derive(Debug, Default)]
pub struct HandlerTable {
    entries: Vec<(MessageType, Subsystem), MAX_HANDLERS>,
}

impl HandlerTable {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Route `ty` to `owner`.
    pub fn register(&mut self, ty: MessageType, owner: Subsystem) -> Result<(), LinkError> {
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == ty) {
            debug!("HandlerTable: {:?} re-registered to {:?}", ty, owner);
            entry.1 = owner;
            return Ok(());
        }
        self.entries.push((ty, owner)).map_err(|_| {
            warn!("HandlerTable: no room to register {:?}", ty);
            LinkError::TableFull
        })
    }

    /// Remove the route for `ty`.  Unknown types are logged and reported.
    pub fn unregister(&mut self, ty: MessageType) -> Result<Subsystem, LinkError> {
        match self.entries.iter().position(|(t, _)| *t == ty) {
            Some(idx) => Ok(self.entries.remove(idx).1),
            None => {
                warn!("HandlerTable: no handler registered for {:?}", ty);
                Err(LinkError::HandlerNotFound)
            }
        }
    }

    /// Owner of `ty`, if any.
    pub fn dispatch(&self, ty: MessageType) -> Option<Subsystem> {
        self.entries.iter().find(|(t, _)| *t == ty).map(|(_, owner)| *owner)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
