//! Adapters: host implementations of the register-level port traits.
//!
//! | Adapter     | Implements     | Connects to                      |
//! |-------------|----------------|----------------------------------|
//! | `mem_flash` | FlashPort      | In-memory NOR array, fault hooks |
//! | `sim_timer` | CompareTimer   | Test-driven 16-bit counter       |
//!
//! The firmware image supplies its own register-level adapters; these two
//! back the simulation build, the tests and the fuzz targets.

pub mod mem_flash;
pub mod sim_timer;
