//! Memory-mapped access to the cluster register space.
//!
//! Maps the physical register block through `/dev/mem`. All accesses are
//! volatile 32-bit reads/writes; registers are naturally aligned by hardware.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_ptr_alignment)]

use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::OpenOptions;
use std::os::unix::io::AsFd;
use std::time::Duration;

use adsp_chip::REG_SPACE_SIZE;

use crate::bus::RegisterBus;
use crate::error::Result;

/// Mapped cluster register space.
pub struct MmioBus {
    /// Memory-mapped pointer
    ptr: *mut u8,
    /// Size of the mapping
    size: usize,
    /// Physical base the mapping was taken from
    phys_base: u64,
}

impl std::fmt::Debug for MmioBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmioBus")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("phys_base", &format_args!("{:#x}", self.phys_base))
            .finish()
    }
}

// SAFETY: Send - MmioBus owns the mapping exclusively. Moving between threads
// doesn't invalidate it (mmap'd memory is process-wide). No thread-local state.
unsafe impl Send for MmioBus {}

// SAFETY: Sync - all accesses are volatile and bounds-checked; the driver
// serializes register sequences behind its resource locks.
unsafe impl Sync for MmioBus {}

impl MmioBus {
    /// Map the cluster register space at physical address `phys_base`.
    ///
    /// # Errors
    ///
    /// Returns an error if `/dev/mem` cannot be opened or the mapping fails.
    pub fn map(phys_base: u64) -> Result<Self> {
        let mem = OpenOptions::new().read(true).write(true).open("/dev/mem")?;

        // SAFETY: mmap necessary for MMIO - maps the register block into the
        // process address space. Invariants: (1) mem is a freshly opened
        // /dev/mem fd; (2) length is the fixed REG_SPACE_SIZE; (3) ptr valid
        // for size bytes or Err. Caller guarantees: phys_base is the cluster
        // register block and is page-aligned.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                REG_SPACE_SIZE,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                mem.as_fd(),
                phys_base,
            )
            .map_err(std::io::Error::from)?
        };

        tracing::info!(
            "mapped cluster registers at {:p}, phys={:#x}, size={:#x}",
            ptr,
            phys_base,
            REG_SPACE_SIZE
        );

        Ok(Self {
            ptr: ptr.cast(),
            size: REG_SPACE_SIZE,
            phys_base,
        })
    }
}

impl RegisterBus for MmioBus {
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped size.
    fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size, "register offset out of bounds");
        // SAFETY: read_volatile necessary for MMIO - hardware can change the
        // value. Invariants: (1) ptr from mmap in map(), valid for self.size;
        // (2) offset+4 <= size; (3) u32 aligned by hardware layout.
        unsafe { std::ptr::read_volatile(self.ptr.add(offset).cast::<u32>()) }
    }

    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped size.
    fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.size, "register offset out of bounds");
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side
        // effects. Invariants: (1) ptr from mmap; (2) offset+4 <= size;
        // (3) u32 aligned by hardware layout.
        unsafe {
            std::ptr::write_volatile(self.ptr.add(offset).cast::<u32>(), value);
        }
    }

    fn delay(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

impl Drop for MmioBus {
    fn drop(&mut self) {
        // SAFETY: munmap necessary - ptr+size were previously mapped in
        // map(), Drop runs at most once, no references outlive self.
        unsafe {
            // Ignore error in Drop (can't propagate, would need to log)
            let _ = munmap(self.ptr.cast(), self.size);
        }
        tracing::debug!("unmapped cluster registers at phys {:#x}", self.phys_base);
    }
}
