//! Application boundary: port traits shared by every core subsystem.
//!
//! The timer multiplexer, settings protocol and sleep coordinator never touch
//! registers or collaborators directly; they go through the **port traits**
//! defined in [`ports`], keeping the core fully testable without a die.

pub mod ports;
