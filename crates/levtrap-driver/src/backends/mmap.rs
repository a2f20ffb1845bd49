// SPDX-License-Identifier: AGPL-3.0-only

//! Memory-mapped register page
//!
//! Maps one system page of physical address space from a memory device and
//! gives volatile 32-bit access into it. The unsafe surface is the mmap
//! itself, the volatile accesses, and the munmap in `Drop`.

use crate::error::{Result, TrapError};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::File;
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// One mapped page of device registers
///
/// The file descriptor may be closed once the page is mapped; the mapping
/// stays valid until the region is dropped.
#[derive(Debug)]
pub struct MmapRegion {
    ptr: NonNull<u8>,
    size: usize,
    address: u64,
}

impl MmapRegion {
    /// Map the page at physical `address` from `device`
    ///
    /// # Errors
    ///
    /// Returns error if `address` is not page aligned or mmap fails.
    pub fn map(device: &File, address: u64) -> Result<Self> {
        let size = rustix::param::page_size();

        if address % size as u64 != 0 {
            return Err(TrapError::map_failed(
                address,
                format!("not aligned to the {size}-byte page size"),
            ));
        }

        tracing::debug!("Mapping register page {address:#010x} ({size} bytes)");

        // SAFETY: mmap of a device file for MMIO.
        // - device is an open read/write file descriptor for the whole call
        // - size is the system page size (non-zero) and address is page aligned
        // - PROT_READ|PROT_WRITE with MAP_SHARED so stores reach the device
        // - the returned pointer is only used through this region and unmapped in Drop
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                device.as_fd(),
                address,
            )
        }
        .map_err(|e| TrapError::map_failed(address, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| TrapError::map_failed(address, "mmap returned null"))?;

        tracing::info!("Mapped register page {address:#010x} at {ptr:p}");

        Ok(Self { ptr, size, address })
    }

    /// Fail unless the mapping covers `len` bytes from its start
    ///
    /// # Errors
    ///
    /// Returns [`TrapError::RegionTooSmall`] when it does not.
    pub fn require(&self, len: usize) -> Result<()> {
        if len > self.size {
            return Err(TrapError::region_too_small(self.address, self.size, len));
        }
        Ok(())
    }

    /// Read the 32-bit word at `offset`
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped size.
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        // SAFETY: read_volatile on MMIO; the hardware may change the value.
        // ptr is from a successful mmap of self.size bytes, offset + 4 <= size,
        // and register words are 4-byte aligned within a page-aligned mapping.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        tracing::trace!("Read u32 @ {:#010x} = {value:#010x}", self.address + offset as u64);
        value
    }

    /// Write the 32-bit word at `offset`
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped size.
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.size, "Register offset out of bounds");
        tracing::trace!("Write u32 @ {:#010x} = {value:#010x}", self.address + offset as u64);
        // SAFETY: write_volatile on MMIO; the store has hardware side effects.
        // Same bounds and alignment invariants as read_u32.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        tracing::debug!("Unmapping register page {:#010x}", self.address);

        // SAFETY: ptr and size are exactly what mmap returned and was given in
        // map(); Drop runs once, so the mapping is still live here.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: the region owns its mapping exclusively; moving it to another
// thread does not invalidate process-wide mmap'd memory.
unsafe impl Send for MmapRegion {}

// SAFETY: reads take &self and are volatile loads of idempotent status
// words; writes require &mut self.
unsafe impl Sync for MmapRegion {}
