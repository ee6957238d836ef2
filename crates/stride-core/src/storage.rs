//! Owned backing storage for allocated descriptors

use crate::constants::STORAGE_ALIGNMENT;
use crate::error::{DescriptorError, Result};
use std::alloc::Layout;
use std::ptr::NonNull;

/// A heap block owned by exactly one descriptor.
///
/// Zero-byte blocks never touch the allocator: they hold an aligned dangling
/// pointer, which is non-null so the owning descriptor still reads as
/// associated.
#[derive(Debug)]
pub struct Storage {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Storage {
    /// Acquire `bytes` zero-initialised bytes aligned to at least
    /// [`STORAGE_ALIGNMENT`].
    pub fn allocate(bytes: usize, alignment: usize) -> Result<Self> {
        let align = alignment.max(STORAGE_ALIGNMENT).next_power_of_two();
        let layout = Layout::from_size_align(bytes, align).map_err(|_| DescriptorError::OutOfMemory {
            requested: bytes as u128,
        })?;

        if layout.size() == 0 {
            // SAFETY: `align` is a non-zero power of two, so this address is
            // non-null and suitably aligned for a zero-sized region.
            let ptr = unsafe { NonNull::new_unchecked(align as *mut u8) };
            return Ok(Self { ptr, layout });
        }

        // SAFETY: layout.size() > 0
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(DescriptorError::OutOfMemory {
            requested: bytes as u128,
        })?;
        Ok(Self { ptr, layout })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: the block is live, `len` bytes long and exclusively owned.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            // SAFETY: allocated in `allocate` with this exact layout.
            unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

// SAFETY: a `Storage` is a uniquely owned heap block with no thread affinity.
unsafe impl Send for Storage {}
// SAFETY: shared access only hands out the raw address.
unsafe impl Sync for Storage {}
