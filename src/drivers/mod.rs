//! Peripheral drivers built on the register-level port traits.

pub mod timer_mux;
