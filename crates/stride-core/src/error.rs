//! Error types for descriptor operations

use crate::descriptor::Attribute;
use crate::stat;

/// Result type for descriptor operations
pub type Result<T> = std::result::Result<T, DescriptorError>;

/// Recoverable failures of the descriptor engines.
///
/// Contract violations (an out-of-range dimension index, mutating the bounds
/// of a bound descriptor) are not represented here: they always crash
/// through [`crate::terminator::Terminator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    /// Storage acquisition failed or the byte size overflowed
    #[error("out of memory: requested {requested} bytes")]
    OutOfMemory { requested: u128 },

    /// Element counts or shapes do not conform
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// The operation needs an associated descriptor
    #[error("descriptor is not associated")]
    NotAssociated,

    /// The descriptor already owns or aliases storage
    #[error("descriptor is already associated")]
    AlreadyAssociated,

    /// Requested rank exceeds the supported maximum
    #[error("invalid rank {rank} (maximum is {max})")]
    InvalidRank { rank: usize, max: usize },

    /// Dynamic type not admitted by the declared type
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Type code or kind not supported
    #[error("invalid type: {0}")]
    InvalidType(String),

    /// Operation not valid for the descriptor's attribute
    #[error("invalid attribute: expected {expected}, got {actual}")]
    InvalidAttribute { expected: Attribute, actual: Attribute },

    /// Deallocation through a descriptor that only aliases its storage
    #[error("descriptor does not own its storage")]
    NotOwner,

    /// Nullification of a descriptor that owns its storage
    #[error("descriptor owns its storage; deallocate it instead")]
    OwnsStorage,

    /// Destination buffer cannot hold the descriptor image
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Malformed binary descriptor image
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

impl DescriptorError {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Numeric status code reported in status mode.
    pub fn stat(&self) -> i32 {
        match self {
            Self::OutOfMemory { .. } => stat::CFI_ERROR_MEM_ALLOCATION,
            Self::ShapeMismatch(_) => stat::CFI_INVALID_EXTENT,
            Self::NotAssociated => stat::CFI_ERROR_BASE_ADDR_NULL,
            Self::AlreadyAssociated | Self::OwnsStorage => stat::CFI_ERROR_BASE_ADDR_NOT_NULL,
            Self::InvalidRank { .. } => stat::CFI_INVALID_RANK,
            Self::TypeMismatch { .. } | Self::InvalidType(_) => stat::CFI_INVALID_TYPE,
            Self::InvalidAttribute { .. } => stat::CFI_INVALID_ATTRIBUTE,
            Self::NotOwner => stat::STAT_BAD_POINTER_DEALLOCATION,
            Self::BufferTooSmall { .. } | Self::InvalidDescriptor(_) => stat::CFI_INVALID_DESCRIPTOR,
        }
    }
}
