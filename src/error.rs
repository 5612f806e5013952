//! Unified error types for the die firmware core.
//!
//! A single `Error` enum that every subsystem converts into, with one `Copy`
//! enum per subsystem underneath.  None of these are surfaced to the radio
//! peer: the protocol state machines log them and fall back to `Done`, and
//! the typed values exist for callers that want to react (and for tests).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Timer multiplexer rejected a hook/unhook.
    Timer(TimerError),
    /// Settings synchronisation aborted or refused to start.
    Sync(SyncError),
    /// Message handler table operation failed.
    Link(LinkError),
    /// Flash primitive failed.
    Flash(FlashError),
    /// Settings payload could not be encoded or decoded.
    Settings(SettingsError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::Sync(e) => write!(f, "settings sync: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timer multiplexer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// All compare channels are already in use; existing slots untouched.
    SlotTableFull,
    /// `unhook` was given an id that is not registered.
    HandlerNotFound,
    /// Period converts to zero ticks or does not fit the 16-bit compare register.
    PeriodOutOfRange,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotTableFull => write!(f, "too many timer hooks registered"),
            Self::HandlerNotFound => write!(f, "timer hook not registered"),
            Self::PeriodOutOfRange => write!(f, "period outside the representable tick range"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Settings synchronisation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    /// `setup` called while a transfer is already running.
    Busy,
    /// The settings page could not be erased; the attempt is abandoned.
    FlashEraseFailure,
    /// A marker or payload write failed; the stored record stays invalid.
    FlashWriteFailure,
    /// The sender's stored record is invalid, so nothing is sent.
    StaleSettingsRefusal,
    /// The bulk transfer delivered a payload of the wrong size.
    PayloadSizeMismatch,
    /// A configured retry or wait bound was exhausted.
    RetryLimitReached,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "transfer already in progress"),
            Self::FlashEraseFailure => write!(f, "error erasing flash for settings"),
            Self::FlashWriteFailure => write!(f, "error writing settings to flash"),
            Self::StaleSettingsRefusal => write!(f, "stored settings are not valid"),
            Self::PayloadSizeMismatch => write!(f, "received payload has the wrong size"),
            Self::RetryLimitReached => write!(f, "retry limit reached"),
        }
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

// ---------------------------------------------------------------------------
// Link (message dispatch) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No handler is registered for the message type.
    HandlerNotFound,
    /// The handler table has no free entry.
    TableFull,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerNotFound => write!(f, "no handler registered for message type"),
            Self::TableFull => write!(f, "message handler table full"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Flash errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Address range falls outside the flash array.
    OutOfRange,
    /// Word write to an address that is not 4-byte aligned.
    Misaligned,
    /// Program operation failed (or power was lost mid-write).
    WriteFailed,
    /// Page erase failed.
    EraseFailed,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "address out of range"),
            Self::Misaligned => write!(f, "misaligned word address"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::EraseFailed => write!(f, "page erase failed"),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

// ---------------------------------------------------------------------------
// Settings payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Settings do not fit in the fixed payload block.
    Encode,
    /// Payload bytes do not decode into settings.
    Decode,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "settings do not fit the payload block"),
            Self::Decode => write!(f, "payload does not decode"),
        }
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
