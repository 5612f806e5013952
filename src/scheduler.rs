//! Cooperative update scheduler.
//!
//! Subsystems that have work to poll register themselves; the main loop
//! calls [`UpdateScheduler::tick`] once per pass and the scheduler notifies
//! an [`UpdateDelegate`] for every registered owner, in registration order.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Main loop pass                          │
//! │                                                              │
//! │   UpdateScheduler::tick ──▶ snapshot of registered owners    │
//! │            │                                                 │
//! │            ▼                                                 │
//! │   for owner in snapshot (FIFO):                              │
//! │       still registered? ──▶ UpdateDelegate::on_update(owner) │
//! │                                  │                           │
//! │                                  ▼                           │
//! │                ReceiveSettings / SendSettings / Sleep update │
//! │                (may register or unregister anything)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dispatching from a snapshot lets an update unregister itself (or a later
//! owner) mid-pass without invalidating the iteration.

use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{Subsystem, UpdateDelegate, UpdateRegistry};

/// Maximum number of concurrently registered update clients.
pub const MAX_UPDATE_CLIENTS: usize = 8;

/// The cooperative scheduler.
///
/// Holds owner tokens only; the delegate maps each token to the subsystem
/// it stands for.  This keeps the scheduler free of references into the
/// subsystems it drives.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    /// Registered owners, in registration order.
    clients: Vec<Subsystem, MAX_UPDATE_CLIENTS>,
    /// Passes executed so far.
    ticks: u64,
}

impl UpdateScheduler {
    pub const fn new() -> Self {
        Self {
            clients: Vec::new(),
            ticks: 0,
        }
    }

    /// Run one pass: notify `delegate` once per registered owner.
    ///
    /// Owners registered during the pass are first updated on the next pass.
    /// Owners unregistered during the pass are skipped if not yet reached.
    pub fn tick(&mut self, delegate: &mut dyn UpdateDelegate) {
        self.ticks += 1;
        let snapshot = self.clients.clone();
        for owner in snapshot {
            if self.is_registered(owner) {
                delegate.on_update(owner, self);
            }
        }
    }

    pub fn is_registered(&self, owner: Subsystem) -> bool {
        self.clients.contains(&owner)
    }

    /// Number of registered owners.
    pub fn active_count(&self) -> usize {
        self.clients.len()
    }

    /// Passes executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl UpdateRegistry for UpdateScheduler {
    fn register_update(&mut self, owner: Subsystem) -> bool {
        if self.is_registered(owner) {
            return true;
        }
        match self.clients.push(owner) {
            Ok(()) => {
                info!("Scheduler: registered {:?} at slot {}", owner, self.clients.len() - 1);
                true
            }
            Err(_) => {
                warn!("Scheduler: no room to register {:?}", owner);
                false
            }
        }
    }

    fn unregister_update(&mut self, owner: Subsystem) {
        if let Some(idx) = self.clients.iter().position(|c| *c == owner) {
            self.clients.remove(idx);
            info!("Scheduler: unregistered {:?}", owner);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
