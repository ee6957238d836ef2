//! The self-describing array/scalar handle
//!
//! A [`Descriptor`] carries everything needed to interpret a block of
//! memory as an array of some rank and element type:
//!
//! - **Type**: a [`TypeCode`] plus the byte size of one element
//! - **Rank and bounds**: up to [`MAX_RANK`] [`Dimension`]s, each a lower
//!   bound, an extent and a byte stride
//! - **Attribute**: pointer, allocatable or plain value
//! - **Binding**: no storage, storage the descriptor owns, or storage it
//!   aliases
//! - **Addendum**: the dynamic derived type, present whenever the declared
//!   type is derived or polymorphic
//!
//! The declared type (what the handle was established with) and the dynamic
//! type (what it currently holds) are separate fields. They only differ for
//! `CLASS(T)` and `CLASS(*)` handles.
//!
//! # Examples
//!
//! ```
//! use stride_core::{Attribute, Descriptor, TypeCode};
//!
//! // REAL(4), POINTER :: p(:)
//! let mut p = Descriptor::establish_intrinsic(TypeCode::real(4), 1, Attribute::Pointer)?;
//! p.set_bounds(0, 2, 11);
//! p.allocate()?;
//! assert!(p.is_associated());
//! assert_eq!(p.elements(), 10);
//! assert_eq!(p.dimension(0).upper_bound(), 11);
//! p.deallocate()?;
//! assert!(!p.is_associated());
//! # Ok::<(), stride_core::DescriptorError>(())
//! ```

use crate::constants::{size_in_bytes, MAX_RANK};
use crate::derived::DerivedType;
use crate::error::{DescriptorError, Result};
use crate::storage::Storage;
use crate::type_code::{TypeCategory, TypeCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ptr::NonNull;

/// How "associated" is interpreted for a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Plain value or dummy argument
    Other,
    Pointer,
    Allocatable,
}

impl Attribute {
    pub fn to_raw(self) -> u8 {
        match self {
            Attribute::Other => 0,
            Attribute::Pointer => 1,
            Attribute::Allocatable => 2,
        }
    }

    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Attribute::Other),
            1 => Some(Attribute::Pointer),
            2 => Some(Attribute::Allocatable),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Attribute::Other => "other",
            Attribute::Pointer => "pointer",
            Attribute::Allocatable => "allocatable",
        })
    }
}

/// One axis of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub(crate) lower_bound: i64,
    pub(crate) extent: i64,
    pub(crate) byte_stride: i64,
}

impl Default for Dimension {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Dimension {
    /// The canonical empty range `1..=0`.
    pub const EMPTY: Dimension = Dimension {
        lower_bound: 1,
        extent: 0,
        byte_stride: 0,
    };

    /// Bounds `lower..=upper`; an empty range is stored as `1..=0`.
    ///
    /// `None` when the extent does not fit in an `i64`.
    pub fn from_bounds(lower: i64, upper: i64) -> Option<Self> {
        let extent = i64::try_from((upper as i128 - lower as i128 + 1).max(0)).ok()?;
        if extent == 0 {
            return Some(Self::EMPTY);
        }
        Some(Self {
            lower_bound: lower,
            extent,
            byte_stride: 0,
        })
    }

    pub fn lower_bound(&self) -> i64 {
        self.lower_bound
    }

    pub fn extent(&self) -> i64 {
        self.extent
    }

    pub fn upper_bound(&self) -> i64 {
        self.lower_bound.saturating_add(self.extent.max(0) - 1)
    }

    /// Zero-based position of `subscript` along this axis, if in range.
    pub(crate) fn position(&self, subscript: i64) -> Option<i64> {
        subscript
            .checked_sub(self.lower_bound)
            .filter(|&position| (0..self.extent).contains(&position))
    }

    pub fn byte_stride(&self) -> i64 {
        self.byte_stride
    }
}

/// The type a handle was declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    /// Intrinsic type with a fixed element size
    Intrinsic { type_code: TypeCode, element_bytes: usize },
    /// `TYPE(T)`: exactly one derived type
    Derived(&'static DerivedType),
    /// `CLASS(T)`: `T` or any extension of it
    Polymorphic(&'static DerivedType),
    /// `CLASS(*)`: any type
    Unlimited,
}

impl DeclaredType {
    /// Whether a value of the given dynamic type may be bound to this declaration.
    pub fn admits(&self, type_code: TypeCode, element_bytes: usize, derived: Option<&'static DerivedType>) -> bool {
        match *self {
            DeclaredType::Intrinsic {
                type_code: code,
                element_bytes: bytes,
            } => derived.is_none() && code == type_code && bytes == element_bytes,
            DeclaredType::Derived(ty) => derived.is_some_and(|d| std::ptr::eq(d, ty)),
            DeclaredType::Polymorphic(ty) => derived.is_some_and(|d| d.extends(ty)),
            DeclaredType::Unlimited => true,
        }
    }

    /// Whether the dynamic type is decided at run time.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self, DeclaredType::Polymorphic(_) | DeclaredType::Unlimited)
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Intrinsic { type_code, .. } => write!(f, "{type_code}"),
            DeclaredType::Derived(ty) => write!(f, "{ty}"),
            DeclaredType::Polymorphic(ty) => write!(f, "CLASS({})", ty.name()),
            DeclaredType::Unlimited => f.write_str("CLASS(*)"),
        }
    }
}

/// Dynamic-type addendum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addendum {
    derived: Option<&'static DerivedType>,
}

impl Addendum {
    pub(crate) fn new(derived: Option<&'static DerivedType>) -> Self {
        Self { derived }
    }

    pub fn derived_type(&self) -> Option<&'static DerivedType> {
        self.derived
    }
}

/// Whether a descriptor owns the memory it is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Unbound,
    /// Allocated through this descriptor; freed by it
    Owned,
    /// Borrowed from another descriptor or foreign code; never freed by it
    Aliased,
}

#[derive(Debug)]
pub(crate) enum Binding {
    Unbound,
    Owned(Storage),
    Aliased(NonNull<u8>),
}

/// Read-only view used by call-boundary classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSummary {
    pub type_code: TypeCode,
    pub element_bytes: usize,
    pub rank: usize,
    pub attribute: Attribute,
}

/// Self-describing handle for an array or scalar
#[derive(Debug)]
pub struct Descriptor {
    pub(crate) type_code: TypeCode,
    pub(crate) element_bytes: usize,
    pub(crate) rank: usize,
    pub(crate) attribute: Attribute,
    pub(crate) dims: [Dimension; MAX_RANK],
    pub(crate) declared: DeclaredType,
    pub(crate) addendum: Option<Addendum>,
    pub(crate) binding: Binding,
}

// SAFETY: owned storage is exclusively held. Aliased storage is only reachable
// through an `unsafe` association whose caller guarantees the target outlives
// the alias and that concurrent mutation is externally synchronised.
unsafe impl Send for Descriptor {}
// SAFETY: `&Descriptor` only permits reads of the storage.
unsafe impl Sync for Descriptor {}

impl Descriptor {
    fn new_unbound(
        type_code: TypeCode,
        element_bytes: usize,
        rank: usize,
        attribute: Attribute,
        declared: DeclaredType,
    ) -> Result<Self> {
        if rank > MAX_RANK {
            return Err(DescriptorError::InvalidRank { rank, max: MAX_RANK });
        }
        let addendum = match declared {
            DeclaredType::Intrinsic { .. } => None,
            DeclaredType::Derived(ty) | DeclaredType::Polymorphic(ty) => Some(Addendum { derived: Some(ty) }),
            DeclaredType::Unlimited => Some(Addendum { derived: None }),
        };
        Ok(Self {
            type_code,
            element_bytes,
            rank,
            attribute,
            dims: [Dimension::EMPTY; MAX_RANK],
            declared,
            addendum,
            binding: Binding::Unbound,
        })
    }

    /// Establish an intrinsic-typed handle with an explicit element size.
    pub fn establish(type_code: TypeCode, element_bytes: usize, rank: usize, attribute: Attribute) -> Result<Self> {
        if matches!(type_code.category(), TypeCategory::Derived | TypeCategory::Other) || !type_code.is_supported() {
            return Err(DescriptorError::InvalidType(format!(
                "{type_code} cannot be established as an intrinsic type"
            )));
        }
        match type_code.element_bytes() {
            Some(natural) if natural != element_bytes => {
                return Err(DescriptorError::InvalidType(format!(
                    "{type_code} elements are {natural} bytes, not {element_bytes}"
                )));
            }
            None if element_bytes % type_code.kind() as usize != 0 => {
                return Err(DescriptorError::InvalidType(format!(
                    "{element_bytes} bytes is not a whole number of {type_code} characters"
                )));
            }
            _ => {}
        }
        let declared = DeclaredType::Intrinsic {
            type_code,
            element_bytes,
        };
        Self::new_unbound(type_code, element_bytes, rank, attribute, declared)
    }

    /// Establish a numeric or logical handle; the element size follows from the code.
    pub fn establish_intrinsic(type_code: TypeCode, rank: usize, attribute: Attribute) -> Result<Self> {
        let element_bytes = type_code
            .element_bytes()
            .ok_or_else(|| DescriptorError::InvalidType(format!("{type_code} needs an explicit element size")))?;
        Self::establish(type_code, element_bytes, rank, attribute)
    }

    /// Establish `CHARACTER(KIND=kind, LEN=len)`. A zero length gives zero-byte elements.
    pub fn establish_character(kind: u8, len: usize, rank: usize, attribute: Attribute) -> Result<Self> {
        Self::establish(TypeCode::character(kind), kind as usize * len, rank, attribute)
    }

    /// Establish `TYPE(T)`.
    pub fn establish_derived(ty: &'static DerivedType, rank: usize, attribute: Attribute) -> Result<Self> {
        Self::new_unbound(TypeCode::DERIVED, ty.size_in_bytes(), rank, attribute, DeclaredType::Derived(ty))
    }

    /// Establish `CLASS(T)`; the dynamic type starts out as `T`.
    pub fn establish_polymorphic(ty: &'static DerivedType, rank: usize, attribute: Attribute) -> Result<Self> {
        Self::new_unbound(
            TypeCode::DERIVED,
            ty.size_in_bytes(),
            rank,
            attribute,
            DeclaredType::Polymorphic(ty),
        )
    }

    /// Establish `CLASS(*)`; the dynamic type stays undetermined until a mold,
    /// source or target supplies one.
    pub fn establish_unlimited(rank: usize, attribute: Attribute) -> Result<Self> {
        Self::new_unbound(TypeCode::OTHER, 0, rank, attribute, DeclaredType::Unlimited)
    }

    /// Set every dimension to `1..=extent`.
    ///
    /// # Panics
    ///
    /// If `extents.len()` differs from the rank or the descriptor is bound.
    #[track_caller]
    pub fn with_extents(mut self, extents: &[i64]) -> Self {
        crate::terminator::Terminator::here().check(
            extents.len() == self.rank,
            format_args!("{} extents given for a rank-{} descriptor", extents.len(), self.rank),
        );
        for (dim, &extent) in extents.iter().enumerate() {
            self.set_bounds(dim, 1, extent);
        }
        self
    }

    pub fn type_code(&self) -> TypeCode {
        self.type_code
    }

    pub fn element_bytes(&self) -> usize {
        self.element_bytes
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn declared_type(&self) -> DeclaredType {
        self.declared
    }

    pub fn addendum(&self) -> Option<&Addendum> {
        self.addendum.as_ref()
    }

    /// Dynamic derived type, if the handle currently holds a derived value.
    pub fn derived_type(&self) -> Option<&'static DerivedType> {
        self.addendum.and_then(|a| a.derived)
    }

    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            type_code: self.type_code,
            element_bytes: self.element_bytes,
            rank: self.rank,
            attribute: self.attribute,
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dims[..self.rank]
    }

    /// # Panics
    ///
    /// If `dim >= rank`.
    #[track_caller]
    pub fn dimension(&self, dim: usize) -> &Dimension {
        crate::terminator::Terminator::here().check(
            dim < self.rank,
            format_args!("dimension {dim} out of range for rank {}", self.rank),
        );
        &self.dims[dim]
    }

    /// Total element count; 1 for a scalar.
    pub fn elements(&self) -> usize {
        self.dimensions()
            .iter()
            .map(|d| d.extent.max(0) as usize)
            .fold(1usize, |acc, extent| acc.saturating_mul(extent))
    }

    /// Byte size of the element data under dense layout.
    pub fn data_bytes(&self) -> Option<usize> {
        self.elements().checked_mul(self.element_bytes)
    }

    /// Base address of the bound storage, null when unbound.
    pub fn base_address(&self) -> *mut u8 {
        match &self.binding {
            Binding::Unbound => std::ptr::null_mut(),
            Binding::Owned(storage) => storage.as_ptr(),
            Binding::Aliased(ptr) => ptr.as_ptr(),
        }
    }

    /// Associated (pointer) or allocated (allocatable): the base address is non-null.
    pub fn is_associated(&self) -> bool {
        !self.base_address().is_null()
    }

    pub fn ownership(&self) -> Ownership {
        match self.binding {
            Binding::Unbound => Ownership::Unbound,
            Binding::Owned(_) => Ownership::Owned,
            Binding::Aliased(_) => Ownership::Aliased,
        }
    }

    /// Exact byte size of this descriptor's binary image.
    pub fn size_in_bytes(&self) -> usize {
        size_in_bytes(self.rank, self.addendum.is_some())
    }

    /// Whether the elements occupy one gap-free column-major block.
    pub fn is_contiguous(&self) -> bool {
        let dims = self.dimensions();
        if dims.iter().any(|d| d.extent == 0) {
            return true;
        }
        let mut expected = self.element_bytes as i64;
        for dim in dims {
            if dim.extent != 1 && dim.byte_stride != expected {
                return false;
            }
            expected = expected.saturating_mul(dim.extent);
        }
        true
    }

    /// Name of the dynamic type, for diagnostics.
    pub fn dynamic_type_name(&self) -> String {
        match self.derived_type() {
            Some(ty) => ty.to_string(),
            None => self.type_code.to_string(),
        }
    }

    pub(crate) fn check_admits(&self, other: &Descriptor) -> Result<()> {
        if self
            .declared
            .admits(other.type_code, other.element_bytes, other.derived_type())
        {
            Ok(())
        } else {
            Err(DescriptorError::type_mismatch(self.declared, other.dynamic_type_name()))
        }
    }

    /// Whether `other` has the same dynamic type (code, size and derived type).
    pub fn same_dynamic_type(&self, other: &Descriptor) -> bool {
        self.type_code == other.type_code
            && self.element_bytes == other.element_bytes
            && match (self.derived_type(), other.derived_type()) {
                (Some(a), Some(b)) => std::ptr::eq(a, b),
                (None, None) => true,
                _ => false,
            }
    }

    /// Copy the dynamic type of `other` into this handle.
    pub(crate) fn take_dynamic_type(&mut self, other: &Descriptor) {
        self.type_code = other.type_code;
        self.element_bytes = other.element_bytes;
        if let Some(addendum) = self.addendum.as_mut() {
            addendum.derived = other.derived_type();
        }
    }

    /// Return the dynamic type to what the declaration implies.
    pub(crate) fn reset_dynamic_type(&mut self) {
        match self.declared {
            DeclaredType::Intrinsic { .. } => {}
            DeclaredType::Derived(ty) | DeclaredType::Polymorphic(ty) => {
                self.type_code = TypeCode::DERIVED;
                self.element_bytes = ty.size_in_bytes();
                self.addendum = Some(Addendum { derived: Some(ty) });
            }
            DeclaredType::Unlimited => {
                self.type_code = TypeCode::OTHER;
                self.element_bytes = 0;
                self.addendum = Some(Addendum { derived: None });
            }
        }
    }

    /// Alignment the dynamic type requires of owned storage.
    pub(crate) fn required_alignment(&self) -> usize {
        match self.derived_type() {
            Some(ty) => ty.alignment(),
            None => self.type_code.alignment(),
        }
    }

    /// Byte offset of the element at `subscripts`, or `None` when the
    /// subscripts are out of bounds or of the wrong count.
    pub fn element_offset(&self, subscripts: &[i64]) -> Option<i64> {
        if subscripts.len() != self.rank {
            return None;
        }
        let mut offset = 0i64;
        for (dim, &subscript) in self.dimensions().iter().zip(subscripts) {
            let step = dim.position(subscript)?.checked_mul(dim.byte_stride)?;
            offset = offset.checked_add(step)?;
        }
        Some(offset)
    }

    /// Byte offset of the `index`-th element in column-major order.
    pub(crate) fn linear_offset(&self, mut index: usize) -> i64 {
        let mut offset = 0i64;
        for dim in self.dimensions() {
            let extent = dim.extent.max(1) as usize;
            offset += (index % extent) as i64 * dim.byte_stride;
            index /= extent;
        }
        offset
    }

    fn check_pod<T: bytemuck::Pod>(&self) -> Result<()> {
        if !self.is_associated() {
            return Err(DescriptorError::NotAssociated);
        }
        let size = std::mem::size_of::<T>();
        if size != self.element_bytes {
            return Err(DescriptorError::type_mismatch(
                format!("{}-byte elements", self.element_bytes),
                format!("{} ({size} bytes)", std::any::type_name::<T>()),
            ));
        }
        Ok(())
    }

    fn out_of_bounds(&self, subscripts: &[i64]) -> DescriptorError {
        DescriptorError::ShapeMismatch(format!(
            "subscripts {subscripts:?} out of bounds for rank-{} descriptor",
            self.rank
        ))
    }

    /// Read the element at `subscripts`.
    pub fn element<T: bytemuck::Pod>(&self, subscripts: &[i64]) -> Result<T> {
        self.check_pod::<T>()?;
        let offset = self.element_offset(subscripts).ok_or_else(|| self.out_of_bounds(subscripts))?;
        // SAFETY: the offset lies within the bound storage (bounds checked
        // above) and `T` is exactly one element wide.
        Ok(unsafe { self.base_address().offset(offset as isize).cast::<T>().read_unaligned() })
    }

    /// Write the element at `subscripts`.
    pub fn set_element<T: bytemuck::Pod>(&mut self, subscripts: &[i64], value: T) -> Result<()> {
        self.check_pod::<T>()?;
        let offset = self.element_offset(subscripts).ok_or_else(|| self.out_of_bounds(subscripts))?;
        // SAFETY: as in `element`.
        unsafe { self.base_address().offset(offset as isize).cast::<T>().write_unaligned(value) };
        Ok(())
    }

    /// Store `value` into every element.
    pub fn fill<T: bytemuck::Pod>(&mut self, value: T) -> Result<()> {
        self.check_pod::<T>()?;
        let base = self.base_address();
        for index in 0..self.elements() {
            // SAFETY: linear offsets of in-range indices stay inside the storage.
            unsafe { base.offset(self.linear_offset(index) as isize).cast::<T>().write_unaligned(value) };
        }
        Ok(())
    }

    /// All elements in column-major order.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        self.check_pod::<T>()?;
        let base = self.base_address();
        Ok((0..self.elements())
            // SAFETY: linear offsets of in-range indices stay inside the storage.
            .map(|index| unsafe { base.offset(self.linear_offset(index) as isize).cast::<T>().read_unaligned() })
            .collect())
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        if matches!(self.binding, Binding::Owned(_)) {
            self.release_owned();
        }
    }
}
