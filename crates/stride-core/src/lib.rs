//! # stride-core - Array Descriptors
//!
//! Self-describing handles for arrays and scalars whose rank, element type
//! and bounds are decided at run time, plus the engines that bind storage
//! to them.
//!
//! ## Architecture
//!
//! Everything operates on a [`Descriptor`]; the engines hold no state of
//! their own.
//!
//! - **Bounds** ([`Descriptor::set_bounds`]): per-dimension lower bound and
//!   extent, dense column-major strides
//! - **Allocation** ([`Descriptor::allocate`], [`Descriptor::allocate_with_mold`],
//!   [`Descriptor::allocate_with_source`]): owned, zero-initialised storage
//! - **Association** ([`Descriptor::associate`], [`Descriptor::associate_remapping`]):
//!   non-owning aliases of existing storage, optionally under a new rank
//! - **Destruction** ([`Descriptor::deallocate`]): finalization driven by the
//!   dynamic type, then release
//!
//! Ownership is explicit: a descriptor is [`Ownership::Unbound`],
//! [`Ownership::Owned`] or [`Ownership::Aliased`], and only owned storage is
//! ever freed.
//!
//! ## Binary Layout
//!
//! [`layout`] encodes descriptors in the C interoperability layout.
//! [`StaticDescriptor`] is a fixed buffer for embedding one; storing into it
//! never writes past [`size_in_bytes`] for the stored rank.
//!
//! ## Example
//!
//! ```
//! use stride_core::{Attribute, Descriptor, TypeCode};
//!
//! // REAL(4), POINTER :: p(:, :);  ALLOCATE(p(0:1, 3), SOURCE=3.4)
//! let mut scalar = Descriptor::establish_intrinsic(TypeCode::real(4), 0, Attribute::Allocatable)?;
//! scalar.allocate()?;
//! scalar.set_element(&[], 3.4f32)?;
//!
//! let mut p = Descriptor::establish_intrinsic(TypeCode::real(4), 2, Attribute::Pointer)?;
//! p.set_bounds(0, 0, 1);
//! p.set_bounds(1, 1, 3);
//! p.allocate_with_source(&scalar)?;
//! assert_eq!(p.to_vec::<f32>()?, vec![3.4; 6]);
//!
//! // q(1:6) => p
//! let mut q = Descriptor::establish_intrinsic(TypeCode::real(4), 1, Attribute::Pointer)?;
//! unsafe { q.associate_remapping(&p, &[(1, 6)])? };
//! assert_eq!(q.element::<f32>(&[6])?, 3.4);
//! # Ok::<(), stride_core::DescriptorError>(())
//! ```

pub mod abi;
mod allocate;
mod associate;
mod bounds;
pub mod constants;
mod deallocate;
pub mod derived;
pub mod descriptor;
pub mod entry;
pub mod error;
pub mod layout;
pub mod stat;
mod storage;
pub mod terminator;
pub mod type_code;

// Re-export primary types
pub use constants::{size_for_rank, size_in_bytes, MAX_DESCRIPTOR_BYTES, MAX_RANK};
pub use derived::{DerivedType, FinalRoutine};
pub use descriptor::{Addendum, Attribute, DeclaredType, Descriptor, DescriptorSummary, Dimension, Ownership};
pub use error::{DescriptorError, Result};
pub use layout::{MaxRankDescriptor, RawDescriptor, RawDimension, StaticDescriptor};
pub use stat::StatMode;
pub use terminator::{SourceLocation, Terminator};
pub use type_code::{TypeCategory, TypeCode};
