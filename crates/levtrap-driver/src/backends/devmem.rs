// SPDX-License-Identifier: AGPL-3.0-only

//! `/dev/mem` register port
//!
//! Maps the delay/energy page and the gain page of the feedback core. Both
//! mappings are held for the life of the port and released on drop.
//! Requires root (or `CAP_SYS_RAWIO`) and a kernel that allows `/dev/mem`
//! access to the FPGA's address window.

use super::mmap::MmapRegion;
use crate::error::{Result, TrapError};
use crate::port::{BackendType, Page, Register, RegisterPort};
use levtrap_chip::regs;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Where the register pages live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevMemConfig {
    /// Physical memory device
    pub device: PathBuf,
    /// Physical address of the delay / energy page
    pub delay_page_addr: u64,
    /// Physical address of the gain page
    pub gain_page_addr: u64,
}

impl Default for DevMemConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/mem"),
            delay_page_addr: regs::DELAY_PAGE_ADDR,
            gain_page_addr: regs::GAIN_PAGE_ADDR,
        }
    }
}

/// Register port over physical memory
#[derive(Debug)]
pub struct DevMemPort {
    delay_page: MmapRegion,
    gain_page: MmapRegion,
}

impl DevMemPort {
    /// Open the memory device and map both register pages
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened, a page cannot be
    /// mapped, or a mapping is too short to reach its registers.
    pub fn open(config: &DevMemConfig) -> Result<Self> {
        tracing::info!("Opening {}", config.device.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| TrapError::device_open(&config.device, e))?;

        let delay_page = MmapRegion::map(&file, config.delay_page_addr)?;
        delay_page.require(Page::Delay.required_len())?;

        let gain_page = MmapRegion::map(&file, config.gain_page_addr)?;
        gain_page.require(Page::Gain.required_len())?;

        Ok(Self {
            delay_page,
            gain_page,
        })
    }

    fn page(&self, page: Page) -> &MmapRegion {
        match page {
            Page::Delay => &self.delay_page,
            Page::Gain => &self.gain_page,
        }
    }
}

impl RegisterPort for DevMemPort {
    fn read_word(&self, register: Register) -> u32 {
        self.page(register.page()).read_u32(register.offset())
    }

    fn write_word(&mut self, register: Register, word: u32) {
        if !register.is_writable() {
            tracing::warn!("Dropping write of {word:#010x} to read-only {register} register");
            return;
        }
        let page = match register.page() {
            Page::Delay => &mut self.delay_page,
            Page::Gain => &mut self.gain_page,
        };
        page.write_u32(register.offset(), word);
    }

    fn backend_type(&self) -> BackendType {
        BackendType::DevMem
    }
}
