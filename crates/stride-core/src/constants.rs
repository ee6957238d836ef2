//! Constants fixing the descriptor layout contract

/// Maximum supported rank.
pub const MAX_RANK: usize = 15;

/// Value stored in the `version` header field.
pub const CFI_VERSION: i32 = 20240719;

/// Version of this crate's layout contract (field widths and offsets below).
pub const LAYOUT_VERSION: u32 = 1;

/// Size of the fixed header preceding the dimension triples.
pub const HEADER_BYTES: usize = 24;

/// Size of one `(lower_bound, extent, byte_stride)` triple.
pub const DIMENSION_BYTES: usize = 24;

/// Size of the dynamic-type addendum appended after the dimensions.
pub const ADDENDUM_BYTES: usize = 8;

/// Bit set in the header's `extra` byte when an addendum follows the dimensions.
pub const ADDENDUM_FLAG: u8 = 1;

/// Minimum alignment of owned element storage.
pub const STORAGE_ALIGNMENT: usize = 16;

/// Exact byte size of a descriptor of `rank` without an addendum.
pub const fn size_for_rank(rank: usize) -> usize {
    HEADER_BYTES + rank * DIMENSION_BYTES
}

/// Exact byte size of a descriptor of `rank`, optionally with an addendum.
pub const fn size_in_bytes(rank: usize, addendum: bool) -> usize {
    size_for_rank(rank) + if addendum { ADDENDUM_BYTES } else { 0 }
}

/// Largest descriptor image any instance can need.
pub const MAX_DESCRIPTOR_BYTES: usize = size_in_bytes(MAX_RANK, true);
