//! In-memory NOR flash.
//!
//! Implements [`FlashPort`] for host tests and simulation.  Behaves like the
//! die's flash array: erase sets a page to `0xFF`, programming can only clear
//! bits (new = old & data), and each call is applied whole or not at all.
//!
//! Fault injection:
//! - [`MemFlash::fail_erase`] makes every erase report failure.
//! - [`MemFlash::cut_power_after_writes`] lets N more program operations
//!   land, then drops every later one, as if power was lost.

use log::{debug, info};

use crate::app::ports::FlashPort;
use crate::error::FlashError;
use crate::settings::FLASH_PAGE_SIZE;

/// Pages in the simulated array.
pub const FLASH_PAGES: u32 = 256;
/// Size of the simulated array in bytes.
pub const FLASH_SIZE: u32 = FLASH_PAGES * FLASH_PAGE_SIZE;

pub struct MemFlash {
    cells: Vec<u8>,
    erase_fails: bool,
    /// Program operations still allowed before the simulated power cut.
    writes_left: Option<u32>,
    erases: u32,
    writes: u32,
}

impl MemFlash {
    /// A fully erased array.
    pub fn new() -> Self {
        info!("MemFlash: simulation backend ({} pages)", FLASH_PAGES);
        Self {
            cells: vec![0xFF; FLASH_SIZE as usize],
            erase_fails: false,
            writes_left: None,
            erases: 0,
            writes: 0,
        }
    }

    pub fn fail_erase(&mut self, fail: bool) {
        self.erase_fails = fail;
    }

    pub fn cut_power_after_writes(&mut self, writes: u32) {
        self.writes_left = Some(writes);
    }

    pub fn restore_power(&mut self) {
        self.writes_left = None;
    }

    /// Successful erases so far.
    pub fn erase_count(&self) -> u32 {
        self.erases
    }

    /// Successful program operations so far.
    pub fn write_count(&self) -> u32 {
        self.writes
    }

    /// Raw view of the array.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    fn range(addr: u32, len: usize) -> Result<core::ops::Range<usize>, FlashError> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(FlashError::OutOfRange)?;
        if end > FLASH_SIZE as usize {
            return Err(FlashError::OutOfRange);
        }
        Ok(start..end)
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        let range = Self::range(addr, data.len())?;
        if let Some(left) = self.writes_left {
            if left == 0 {
                debug!("MemFlash: write at {:#x} dropped (power cut)", addr);
                return Err(FlashError::WriteFailed);
            }
            self.writes_left = Some(left - 1);
        }
        for (cell, byte) in self.cells[range].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.writes += 1;
        Ok(())
    }
}

impl Default for MemFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashPort for MemFlash {
    fn erase_page(&mut self, page: u8) -> Result<(), FlashError> {
        if self.erase_fails {
            return Err(FlashError::EraseFailed);
        }
        let range = Self::range(page as u32 * FLASH_PAGE_SIZE, FLASH_PAGE_SIZE as usize)?;
        self.cells[range].fill(0xFF);
        self.erases += 1;
        Ok(())
    }

    fn write_word(&mut self, addr: u32, value: u32) -> Result<(), FlashError> {
        if addr % 4 != 0 {
            return Err(FlashError::Misaligned);
        }
        self.program(addr, &value.to_le_bytes())
    }

    fn write_block(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        if addr % 4 != 0 {
            return Err(FlashError::Misaligned);
        }
        self.program(addr, data)
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let range = Self::range(addr, buf.len())?;
        buf.copy_from_slice(&self.cells[range]);
        Ok(())
    }
}
