//! Binary descriptor image (layout version 1)
//!
//! The image matches the C interoperability descriptor and is written in
//! native byte order.
//!
//! # Binary Layout
//!
//! ```text
//! offset  width  field
//! 0       8      base_addr   (u64, 0 when unbound)
//! 8       8      elem_len    (u64)
//! 16      4      version     (i32, CFI_VERSION)
//! 20      1      rank        (u8)
//! 21      1      type        (i8, interoperability type code)
//! 22      1      attribute   (u8: 0 other, 1 pointer, 2 allocatable)
//! 23      1      extra       (u8, bit 0: addendum follows)
//! 24      24*r   dim[r]      (lower_bound i64, extent i64, sm i64)
//! 24+24r  8      addendum    (u64 address of the derived type info, if flagged)
//! ```
//!
//! Encoding never writes past `size_in_bytes(rank, addendum)`, so an image
//! placed in a [`StaticDescriptor`] sized for a larger rank leaves the
//! trailing bytes exactly as they were.

use crate::constants::{
    size_in_bytes, ADDENDUM_BYTES, ADDENDUM_FLAG, CFI_VERSION, DIMENSION_BYTES, HEADER_BYTES, MAX_RANK,
};
use crate::derived::DerivedType;
use crate::descriptor::{Addendum, Attribute, Binding, DeclaredType, Descriptor, Dimension};
use crate::error::{DescriptorError, Result};
use crate::type_code::{codes, TypeCode};
use serde::{Deserialize, Serialize};
use std::ptr::NonNull;

/// One encoded dimension triple
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDimension {
    pub lower_bound: i64,
    pub extent: i64,
    /// Byte stride ("stride multiplier")
    pub sm: i64,
}

/// Plain-data form of a descriptor image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDescriptor {
    pub base_addr: u64,
    pub elem_len: u64,
    pub version: i32,
    pub rank: u8,
    #[serde(rename = "type")]
    pub type_code: i8,
    pub attribute: u8,
    pub extra: u8,
    pub dims: Vec<RawDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addendum: Option<u64>,
}

fn put(buffer: &mut [u8], offset: usize, bytes: &[u8]) {
    buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn take<const N: usize>(buffer: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buffer[offset..offset + N]);
    out
}

impl RawDescriptor {
    pub fn has_addendum(&self) -> bool {
        self.extra & ADDENDUM_FLAG != 0
    }

    /// Exact size of the encoded image.
    pub fn byte_len(&self) -> usize {
        size_in_bytes(self.dims.len(), self.has_addendum())
    }

    fn validate(&self) -> Result<()> {
        if self.dims.len() > MAX_RANK {
            return Err(DescriptorError::InvalidRank {
                rank: self.dims.len(),
                max: MAX_RANK,
            });
        }
        if self.rank as usize != self.dims.len() {
            return Err(DescriptorError::InvalidDescriptor(format!(
                "rank {} with {} dimensions",
                self.rank,
                self.dims.len()
            )));
        }
        if self.has_addendum() != self.addendum.is_some() {
            return Err(DescriptorError::InvalidDescriptor(
                "addendum flag disagrees with addendum word".into(),
            ));
        }
        Ok(())
    }

    /// Write the image into the front of `buffer`, returning the bytes written.
    /// Nothing past [`byte_len`](Self::byte_len) is touched.
    pub fn encode_into(&self, buffer: &mut [u8]) -> Result<usize> {
        self.validate()?;
        let needed = self.byte_len();
        if buffer.len() < needed {
            return Err(DescriptorError::BufferTooSmall {
                needed,
                available: buffer.len(),
            });
        }

        put(buffer, 0, &self.base_addr.to_ne_bytes());
        put(buffer, 8, &self.elem_len.to_ne_bytes());
        put(buffer, 16, &self.version.to_ne_bytes());
        buffer[20] = self.rank;
        buffer[21] = self.type_code as u8;
        buffer[22] = self.attribute;
        buffer[23] = self.extra;
        for (index, dim) in self.dims.iter().enumerate() {
            let at = HEADER_BYTES + index * DIMENSION_BYTES;
            put(buffer, at, &dim.lower_bound.to_ne_bytes());
            put(buffer, at + 8, &dim.extent.to_ne_bytes());
            put(buffer, at + 16, &dim.sm.to_ne_bytes());
        }
        if let Some(word) = self.addendum {
            put(buffer, needed - ADDENDUM_BYTES, &word.to_ne_bytes());
        }
        Ok(needed)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; self.byte_len()];
        self.encode_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Decode an image from the front of `bytes`; trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(DescriptorError::BufferTooSmall {
                needed: HEADER_BYTES,
                available: bytes.len(),
            });
        }
        let version = i32::from_ne_bytes(take(bytes, 16));
        if version != CFI_VERSION {
            return Err(DescriptorError::InvalidDescriptor(format!(
                "version {version}, expected {CFI_VERSION}"
            )));
        }
        let rank = bytes[20];
        if rank as usize > MAX_RANK {
            return Err(DescriptorError::InvalidRank {
                rank: rank as usize,
                max: MAX_RANK,
            });
        }
        let extra = bytes[23];
        let needed = size_in_bytes(rank as usize, extra & ADDENDUM_FLAG != 0);
        if bytes.len() < needed {
            return Err(DescriptorError::BufferTooSmall {
                needed,
                available: bytes.len(),
            });
        }

        let dims = (0..rank as usize)
            .map(|index| {
                let at = HEADER_BYTES + index * DIMENSION_BYTES;
                RawDimension {
                    lower_bound: i64::from_ne_bytes(take(bytes, at)),
                    extent: i64::from_ne_bytes(take(bytes, at + 8)),
                    sm: i64::from_ne_bytes(take(bytes, at + 16)),
                }
            })
            .collect();
        let addendum = (extra & ADDENDUM_FLAG != 0).then(|| u64::from_ne_bytes(take(bytes, needed - ADDENDUM_BYTES)));

        Ok(Self {
            base_addr: u64::from_ne_bytes(take(bytes, 0)),
            elem_len: u64::from_ne_bytes(take(bytes, 8)),
            version,
            rank,
            type_code: bytes[21] as i8,
            attribute: bytes[22],
            extra,
            dims,
            addendum,
        })
    }

    /// Pretty-printed JSON, for tooling and debugging.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| DescriptorError::InvalidDescriptor(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(json).map_err(|e| DescriptorError::InvalidDescriptor(e.to_string()))?;
        raw.validate()?;
        Ok(raw)
    }
}

impl Descriptor {
    /// Snapshot this descriptor as a binary-layout image.
    pub fn to_raw(&self) -> RawDescriptor {
        RawDescriptor {
            base_addr: self.base_address() as usize as u64,
            elem_len: self.element_bytes as u64,
            version: CFI_VERSION,
            rank: self.rank as u8,
            type_code: self.type_code.to_raw().unwrap_or(codes::CFI_TYPE_OTHER),
            attribute: self.attribute.to_raw(),
            extra: if self.addendum.is_some() { ADDENDUM_FLAG } else { 0 },
            dims: self
                .dimensions()
                .iter()
                .map(|dim| RawDimension {
                    lower_bound: dim.lower_bound,
                    extent: dim.extent,
                    sm: dim.byte_stride,
                })
                .collect(),
            addendum: self.addendum.map(|a| {
                a.derived_type()
                    .map_or(0, |ty| ty as *const DerivedType as usize as u64)
            }),
        }
    }

    /// Import a foreign image. A non-null base address becomes a non-owning
    /// alias.
    ///
    /// The declared type is reconstructed from the image: intrinsic when there
    /// is no addendum, `CLASS(T)` for an addendum naming `T` and `CLASS(*)`
    /// for an empty addendum.
    ///
    /// # Safety
    ///
    /// A non-zero `base_addr` must address storage valid for the described
    /// shape for as long as the descriptor is used. A non-zero addendum word
    /// must be the address of a `DerivedType` that lives for `'static`.
    pub unsafe fn from_raw(raw: &RawDescriptor) -> Result<Self> {
        raw.validate()?;
        let type_code = TypeCode::from_raw(raw.type_code)
            .ok_or_else(|| DescriptorError::InvalidType(format!("type code {}", raw.type_code)))?;
        let attribute = Attribute::from_raw(raw.attribute)
            .ok_or_else(|| DescriptorError::InvalidDescriptor(format!("attribute {}", raw.attribute)))?;
        let element_bytes = usize::try_from(raw.elem_len)
            .map_err(|_| DescriptorError::InvalidDescriptor(format!("element length {}", raw.elem_len)))?;

        // SAFETY: the caller guarantees a non-zero word addresses a live
        // `'static` DerivedType.
        let derived = raw
            .addendum
            .and_then(|word| unsafe { (word as usize as *const DerivedType).as_ref() });
        let declared = match (raw.addendum, derived) {
            (None, _) if type_code == TypeCode::DERIVED => {
                return Err(DescriptorError::InvalidDescriptor(
                    "derived type without an addendum".into(),
                ));
            }
            (None, _) => DeclaredType::Intrinsic {
                type_code,
                element_bytes,
            },
            (Some(_), Some(ty)) => DeclaredType::Polymorphic(ty),
            (Some(_), None) => DeclaredType::Unlimited,
        };

        let mut dims = [Dimension::EMPTY; MAX_RANK];
        for (slot, dim) in dims.iter_mut().zip(&raw.dims) {
            *slot = Dimension {
                lower_bound: dim.lower_bound,
                extent: dim.extent,
                byte_stride: dim.sm,
            };
        }
        let binding = match NonNull::new(raw.base_addr as usize as *mut u8) {
            Some(base) => Binding::Aliased(base),
            None => Binding::Unbound,
        };

        Ok(Self {
            type_code,
            element_bytes,
            rank: raw.dims.len(),
            attribute,
            dims,
            declared,
            addendum: raw.addendum.map(|_| Addendum::new(derived)),
            binding,
        })
    }
}

/// Zero-initialised, 8-aligned buffer able to hold any descriptor of rank
/// up to `R`, addendum included
#[repr(C, align(8))]
#[derive(Clone, Copy)]
pub struct StaticDescriptor<const R: usize> {
    header: [u8; HEADER_BYTES],
    dims: [[u8; DIMENSION_BYTES]; R],
    addendum: [u8; ADDENDUM_BYTES],
}

// SAFETY: only byte arrays, and the total size (24 + 24R + 8) is a multiple
// of the 8-byte alignment, so there is no padding.
unsafe impl<const R: usize> bytemuck::Zeroable for StaticDescriptor<R> {}
// SAFETY: as above; every bit pattern is a valid byte array.
unsafe impl<const R: usize> bytemuck::Pod for StaticDescriptor<R> {}

/// Buffer sized for the largest supported rank
pub type MaxRankDescriptor = StaticDescriptor<MAX_RANK>;

impl<const R: usize> Default for StaticDescriptor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const R: usize> StaticDescriptor<R> {
    pub fn new() -> Self {
        bytemuck::Zeroable::zeroed()
    }

    pub const fn byte_size() -> usize {
        std::mem::size_of::<Self>()
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }

    /// Write `descriptor`'s image, touching only its rank-appropriate prefix.
    pub fn store(&mut self, descriptor: &Descriptor) -> Result<usize> {
        if descriptor.rank() > R {
            return Err(DescriptorError::InvalidRank {
                rank: descriptor.rank(),
                max: R,
            });
        }
        descriptor.to_raw().encode_into(self.as_bytes_mut())
    }

    pub fn load(&self) -> Result<RawDescriptor> {
        RawDescriptor::from_bytes(self.as_bytes())
    }
}

impl<const R: usize> std::fmt::Debug for StaticDescriptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticDescriptor")
            .field("max_rank", &R)
            .field("bytes", &Self::byte_size())
            .finish()
    }
}
