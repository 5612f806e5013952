//! Port traits: the hexagonal boundary between the core and the rest of the die.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TimerMux / ReceiveSettings / SendSettings / SleepCoordinator
//! ```
//!
//! Register-level peripherals (timer, flash, GPIO sense, accelerometer) and
//! the external collaborators (radio transport, bulk transfer, cooperative
//! scheduler) are reached only through these traits.  The core consumes them
//! via generics passed at call sites, so every state machine can be driven on
//! the host with mock adapters.

use crate::error::FlashError;
use crate::link::MessageType;
use crate::scheduler::UpdateScheduler;

// ───────────────────────────────────────────────────────────────
// Owner tokens
// ───────────────────────────────────────────────────────────────

/// Identifies a core subsystem when registering for scheduler updates or
/// message delivery.  Replaces the `this` pointer the registrations carry
/// on the firmware side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    SettingsReceiver,
    SettingsSender,
    SleepCoordinator,
}

// ───────────────────────────────────────────────────────────────
// Cooperative scheduler
// ───────────────────────────────────────────────────────────────

/// Per-tick update registration.  Subsystems register when they have work
/// to poll and unregister when they return to idle.
pub trait UpdateRegistry {
    /// Register `owner` for per-tick updates.  Registering twice is a no-op.
    /// Returns `false` if the registry is full.
    fn register_update(&mut self, owner: Subsystem) -> bool;

    /// Stop delivering updates to `owner`.
    fn unregister_update(&mut self, owner: Subsystem);
}

/// Callback the [`UpdateScheduler`] invokes for each registered subsystem.
///
/// The firmware implements this by matching on the owner and calling the
/// subsystem's `update`, handing the scheduler back in so the subsystem can
/// unregister itself.
pub trait UpdateDelegate {
    fn on_update(&mut self, owner: Subsystem, scheduler: &mut UpdateScheduler);
}

// ───────────────────────────────────────────────────────────────
// Message transport
// ───────────────────────────────────────────────────────────────

/// Typed-message radio transport.
pub trait MessagePort {
    /// Try to queue a message of type `ty`.  `false` means the radio did not
    /// accept it this tick; callers retry on a later tick.
    fn send_message(&mut self, ty: MessageType) -> bool;

    /// Route incoming messages of type `ty` to `owner`.
    fn register_handler(&mut self, ty: MessageType, owner: Subsystem);

    /// Stop routing `ty`.  Unknown types are a logged no-op.
    fn unregister_handler(&mut self, ty: MessageType);
}

// ───────────────────────────────────────────────────────────────
// Bulk transfer session
// ───────────────────────────────────────────────────────────────

/// Sending side of a chunked bulk transfer, polled for completion.
pub trait BulkSend {
    /// Start sending `data`.  The session keeps its own copy.
    fn begin_send(&mut self, data: &[u8]);
    /// `true` once the peer has acknowledged every chunk.
    fn send_complete(&mut self) -> bool;
    /// Release the session.
    fn finish_send(&mut self);
}

/// Receiving side of a chunked bulk transfer, polled for completion.
pub trait BulkReceive {
    /// Start accepting a transfer.
    fn begin_receive(&mut self);
    /// `true` once the whole buffer has arrived.
    fn receive_complete(&mut self) -> bool;
    /// The received bytes.  Only meaningful after `receive_complete()`.
    fn received(&self) -> &[u8];
    /// Release the session and its buffer.
    fn finish_receive(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Flash
// ───────────────────────────────────────────────────────────────

/// Raw NOR flash primitives.
///
/// Erased flash reads `0xFF`; programming can only clear bits.  Writes are
/// **not** atomic: a power cut between two calls leaves the first one
/// applied, which is what the settings record markers are designed around.
pub trait FlashPort {
    /// Erase one page (every byte back to `0xFF`).
    fn erase_page(&mut self, page: u8) -> Result<(), FlashError>;

    /// Program one little-endian word at a 4-byte aligned address.
    fn write_word(&mut self, addr: u32, value: u32) -> Result<(), FlashError>;

    /// Program a block of bytes starting at `addr`.
    fn write_block(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError>;
}

// ───────────────────────────────────────────────────────────────
// Timer peripheral
// ───────────────────────────────────────────────────────────────

/// A free-running 16-bit timer with one compare register per channel.
///
/// Compare events latch whenever the counter matches a channel's compare
/// value, whether or not that channel's interrupt is enabled.
pub trait CompareTimer {
    /// Number of compare channels on the peripheral.
    const CHANNELS: usize;

    fn start(&mut self);
    fn stop(&mut self);
    /// Reset the counter to zero.
    fn clear(&mut self);
    /// Current counter value.
    fn counter(&mut self) -> u16;

    fn compare(&self, channel: usize) -> u16;
    fn set_compare(&mut self, channel: usize, value: u16);

    fn enable_interrupt(&mut self, channel: usize);
    fn disable_interrupt(&mut self, channel: usize);
    fn interrupt_enabled(&self, channel: usize) -> bool;

    fn event_pending(&self, channel: usize) -> bool;
    fn clear_event(&mut self, channel: usize);
}

/// Client of a virtual periodic timer.  Runs in interrupt context: must
/// not block or allocate.
pub trait TimerClient: Sync {
    fn on_tick(&self);
}

// ───────────────────────────────────────────────────────────────
// Power / wake
// ───────────────────────────────────────────────────────────────

/// A subsystem the sleep coordinator can halt and resume.
pub trait Suspendable {
    fn start(&self);
    fn stop(&self);
}

/// Accelerometer wake-up interrupt control.
pub trait MotionSensor {
    fn enable_transient_interrupt(&mut self);
    fn clear_transient_interrupt(&mut self);
    fn disable_transient_interrupt(&mut self);
}

/// The two interrupt lines that can end a low-power wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    /// Accelerometer interrupt line (active low).
    Motion,
    /// Radio activity line (active high).
    Wireless,
}

/// Pin level that triggers a wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeLevel {
    Low,
    High,
}

/// GPIO sense configuration for wake-on-pin.
pub trait PinWake {
    /// Arm wake-on-pin for `source`, triggering on `level`.
    fn arm(&mut self, source: WakeSource, level: WakeLevel);
    /// Disarm wake-on-pin for `source`.
    fn disarm(&mut self, source: WakeSource);
    /// Configure the line for `source` as an input with `pull`.
    fn set_input_pull(&mut self, source: WakeSource, pull: Pull);
}

/// Pull resistor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
}

/// The wireless wake line, driven by software to synthesise a wake edge.
pub trait WakeLine: embedded_hal::digital::OutputPin {
    fn set_pull(&mut self, pull: Pull);
}

/// Processor low-power wait.
pub trait LowPower {
    /// Halt until any enabled interrupt fires.  May return spuriously.
    fn wait_for_interrupt(&mut self);
}

/// Millisecond uptime source.
pub trait Clock {
    /// Milliseconds since boot, wrapping at `u32::MAX`.
    fn now_ms(&self) -> u32;
}
