//! Memory-mapped register space access.
//!
//! Maps a Heron BAR through VFIO and exposes the fixed-width read
//! primitives the diagnostic engines consume. rustix covers mmap/munmap;
//! libc is kept only for the VFIO ioctl, which is kernel-specific and
//! outside rustix's standard API.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::ptr_as_ptr)]
#![allow(clippy::cast_ptr_alignment)]

use crate::error::{HeronError, Result};
use crate::regio::RegisterIo;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::File;
use std::os::unix::io::{AsFd, AsRawFd};

/// Heron BAR regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bar {
    /// Register space (BAR0): catalogs, tables, MAC blocks.
    Registers = 0,
    /// Descriptor doorbells (BAR2); not used by diagnostics.
    Doorbells = 2,
}

/// VFIO region info structure
#[repr(C)]
#[derive(Debug, Default)]
struct VfioRegionInfo {
    argsz: u32,
    flags: u32,
    index: u32,
    cap_offset: u32,
    size: u64,
    offset: u64,
}

/// Mapped BAR region.
pub struct MappedBar {
    ptr: *mut u8,
    size: usize,
    bar: Bar,
}

impl std::fmt::Debug for MappedBar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBar")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("bar", &self.bar)
            .finish()
    }
}

// SAFETY: Send - MappedBar owns the mapping exclusively; mmap'd memory is
// process-wide and carries no thread-local state.
unsafe impl Send for MappedBar {}

// SAFETY: Sync - all access is read-only volatile loads through &self, and
// MMIO reads of the diagnostic registers are idempotent.
unsafe impl Sync for MappedBar {}

impl MappedBar {
    /// Map a BAR region via VFIO.
    ///
    /// # Errors
    ///
    /// Returns an error if the VFIO region-info ioctl or the mmap fails.
    pub fn map(device_fd: &File, bar: Bar) -> Result<Self> {
        let mut region_info = VfioRegionInfo {
            argsz: std::mem::size_of::<VfioRegionInfo>() as u32,
            index: bar as u32,
            ..Default::default()
        };

        // VFIO_DEVICE_GET_REGION_INFO = _IOWR(';', 100 + 8, ...)
        const VFIO_DEVICE_GET_REGION_INFO: libc::c_ulong = 0xc018_3b68;

        // SAFETY: the ioctl fills region_info with the BAR size/offset.
        // Invariants: (1) device_fd is an open VFIO device fd; (2)
        // region_info is initialized with argsz = size_of and the BAR
        // index; (3) the struct layout matches the kernel's.
        let ret = unsafe {
            libc::ioctl(
                device_fd.as_raw_fd(),
                VFIO_DEVICE_GET_REGION_INFO,
                &raw mut region_info,
            )
        };

        if ret < 0 {
            return Err(HeronError::region_map_failed(format!(
                "failed to get BAR{} info: {}",
                bar as u32,
                std::io::Error::last_os_error()
            )));
        }

        tracing::debug!(
            "BAR{}: size={:#x}, offset={:#x}, flags={:#x}",
            bar as u32,
            region_info.size,
            region_info.offset,
            region_info.flags
        );

        // SAFETY: maps the BAR into the process address space.
        // Invariants: (1) device_fd valid; (2) size/offset came from the
        // successful ioctl above; (3) the mapping is exclusive via
        // VFIO/IOMMU; (4) ptr is valid for size bytes or this is Err.
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                region_info.size as usize,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                device_fd.as_fd(),
                region_info.offset,
            )
            .map_err(|e| {
                HeronError::region_map_failed(format!("failed to mmap BAR{}: {e}", bar as u32))
            })?
        };

        tracing::info!(
            "mapped BAR{} at {:p}, size={:#x}",
            bar as u32,
            ptr,
            region_info.size
        );

        Ok(Self {
            ptr: ptr.cast(),
            size: region_info.size as usize,
            bar,
        })
    }

    /// Read a 32-bit register.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 4` exceeds the mapped region size.
    pub fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size, "register offset out of bounds");
        // SAFETY: ptr is valid for self.size bytes (from map()), the
        // bound was just checked, and MMIO registers are u32-aligned.
        unsafe { std::ptr::read_volatile(self.ptr.add(offset).cast::<u32>()) }
    }

    /// Read a 64-bit register.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 8` exceeds the mapped region size.
    pub fn read64(&self, offset: usize) -> u64 {
        assert!(offset + 8 <= self.size, "register offset out of bounds");
        // SAFETY: ptr is valid for self.size bytes, bound checked above,
        // u64-aligned by hardware layout.
        unsafe { std::ptr::read_volatile(self.ptr.add(offset).cast::<u64>()) }
    }

    /// Read a 128-bit register as two 64-bit loads, low half first.
    ///
    /// # Panics
    ///
    /// Panics if `offset + 16` exceeds the mapped region size.
    pub fn read128(&self, offset: usize) -> [u8; 16] {
        assert!(offset + 16 <= self.size, "register offset out of bounds");
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.read64(offset).to_le_bytes());
        out[8..].copy_from_slice(&self.read64(offset + 8).to_le_bytes());
        out
    }

    /// Get BAR type
    pub const fn bar(&self) -> Bar {
        self.bar
    }

    /// Get region size
    pub const fn size(&self) -> usize {
        self.size
    }
}

impl RegisterIo for MappedBar {
    fn read_oword(&self, offset: u32) -> [u8; 16] {
        self.read128(offset as usize)
    }

    fn read_oword_table(&self, offset: u32, index: u32) -> [u8; 16] {
        self.read128(offset as usize + 16 * index as usize)
    }

    fn read_sram_qword(&self, offset: u32, index: u32) -> u64 {
        self.read64(offset as usize + 8 * index as usize)
    }

    fn read_dword(&self, offset: u32) -> u32 {
        self.read32(offset as usize)
    }
}

impl Drop for MappedBar {
    fn drop(&mut self) {
        // SAFETY: ptr/size come from the successful mmap in map() and
        // Drop runs at most once.
        unsafe {
            // Ignore error in Drop (can't propagate, would need to log)
            let _ = munmap(self.ptr.cast(), self.size);
        }
        tracing::debug!("unmapped BAR{}", self.bar as u32);
    }
}
