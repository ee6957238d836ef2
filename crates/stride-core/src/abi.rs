//! Stable C ABI for foreign callers
//!
//! Foreign code that embeds descriptors in its own buffers uses these to
//! size and validate them. The signatures must not change without bumping
//! [`ABI_VERSION`].

use crate::constants::{size_for_rank, MAX_DESCRIPTOR_BYTES, MAX_RANK};
use crate::layout::RawDescriptor;
use crate::stat::STAT_OK;

/// C ABI version
pub const ABI_VERSION: u32 = 1;

#[no_mangle]
pub extern "C" fn stride_abi_version() -> u32 {
    ABI_VERSION
}

/// Bytes needed for a descriptor of `rank` without an addendum; 0 for a
/// rank outside `0..=MAX_RANK`.
#[no_mangle]
pub extern "C" fn stride_descriptor_size_for_rank(rank: i32) -> usize {
    match usize::try_from(rank) {
        Ok(rank) if rank <= MAX_RANK => size_for_rank(rank),
        _ => 0,
    }
}

/// Size of a buffer that holds any descriptor.
#[no_mangle]
pub extern "C" fn stride_descriptor_max_bytes() -> usize {
    MAX_DESCRIPTOR_BYTES
}

/// Validate the descriptor image at `image`; returns a status code.
///
/// # Safety
///
/// `image` must be readable for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn stride_descriptor_validate(image: *const u8, len: usize) -> i32 {
    if image.is_null() {
        return crate::stat::CFI_INVALID_DESCRIPTOR;
    }
    // SAFETY: the caller guarantees `len` readable bytes.
    let bytes = unsafe { std::slice::from_raw_parts(image, len) };
    match RawDescriptor::from_bytes(bytes) {
        Ok(_) => STAT_OK,
        Err(err) => err.stat(),
    }
}
