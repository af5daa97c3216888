//! Host buffers the device fills by DMA.
//!
//! Used for interrupt status and MAC statistics. The mapping is
//! page-aligned and zero-filled, so a freshly allocated statistics
//! buffer decodes as all-zero counters until the MAC's first write.

use crate::error::{HeronError, Result};
use rustix::mm::{mmap_anonymous, munmap, MapFlags, ProtFlags};

/// A page-aligned, zero-initialized buffer shared with the device.
pub struct DmaBuffer {
    ptr: *mut u8,
    len: usize,
}

impl std::fmt::Debug for DmaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaBuffer")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("len", &self.len)
            .finish()
    }
}

// SAFETY: Send - DmaBuffer owns the mapping exclusively; no thread-local
// state is involved.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    /// Allocate a zeroed buffer of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be established.
    pub fn alloc(len: usize) -> Result<Self> {
        // SAFETY: anonymous mapping, no fd involved; ptr is valid for
        // len bytes on success. Anonymous pages are zero-filled by the
        // kernel.
        let ptr = unsafe {
            mmap_anonymous(
                std::ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )
            .map_err(|e| {
                HeronError::region_map_failed(format!("failed to map {len}-byte DMA buffer: {e}"))
            })?
        };

        tracing::debug!(len, "allocated DMA buffer");

        Ok(Self {
            ptr: ptr.cast(),
            len,
        })
    }

    /// Buffer length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is zero-length.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The buffer contents as written by the device so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes for the life of self.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Mutable view, for pre-seeding or clearing between samples.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and &mut self guarantees
        // exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr/len come from the successful mmap in alloc() and
        // Drop runs at most once.
        unsafe {
            let _ = munmap(self.ptr.cast(), self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_zeroed_and_writable() {
        let mut buf = DmaBuffer::alloc(4096).unwrap();
        assert_eq!(buf.len(), 4096);
        assert!(buf.as_slice().iter().all(|&b| b == 0));

        buf.as_mut_slice()[10] = 0xAB;
        assert_eq!(buf.as_slice()[10], 0xAB);
    }
}
