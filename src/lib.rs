//! Electronic die firmware core.
//!
//! The cooperative substructure of a motion-sensing die: periodic callbacks
//! multiplexed over one compare timer, a die-to-die settings transfer that
//! persists to flash, and an inactivity sleep/wake coordinator.  Hardware and
//! radio are reached only through the port traits in [`app::ports`], so the
//! whole core runs on the host against the adapters in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod link;
pub mod power;
pub mod scheduler;
pub mod settings;

pub use error::{Error, Result};
