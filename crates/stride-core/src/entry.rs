//! Runtime entry points with the status/abort reporting surface
//!
//! These are the calls generated code makes for `ALLOCATE`, `DEALLOCATE`,
//! pointer assignment and `NULLIFY`. Each fallible entry point takes a
//! [`StatMode`] and the [`SourceLocation`] of the statement and returns the
//! numeric status; in abort mode any failure crashes with that location.
//!
//! ```
//! use stride_core::entry::{pointer_allocate, pointer_deallocate, pointer_set_bounds};
//! use stride_core::stat::{StatMode, CFI_ERROR_BASE_ADDR_NULL, STAT_OK};
//! use stride_core::{source_location, Attribute, Descriptor, TypeCode};
//!
//! let mut p = Descriptor::establish_intrinsic(TypeCode::integer(4), 1, Attribute::Pointer)?;
//! pointer_set_bounds(&mut p, 0, 1, 8);
//! assert_eq!(pointer_allocate(&mut p, StatMode::report(), source_location!()), STAT_OK);
//! assert_eq!(pointer_deallocate(&mut p, StatMode::report(), source_location!()), STAT_OK);
//!
//! let mut errmsg = [0u8; 40];
//! let stat = pointer_deallocate(&mut p, StatMode::report_into(&mut errmsg), source_location!());
//! assert_eq!(stat, CFI_ERROR_BASE_ADDR_NULL);
//! # Ok::<(), stride_core::DescriptorError>(())
//! ```

use crate::descriptor::Descriptor;
use crate::stat::StatMode;
use crate::terminator::SourceLocation;

/// Set the bounds of one dimension ahead of allocation.
///
/// # Panics
///
/// On a contract violation (see [`Descriptor::set_bounds`]), regardless of mode.
#[track_caller]
pub fn pointer_set_bounds(pointer: &mut Descriptor, dim: usize, lower: i64, upper: i64) {
    pointer.set_bounds(dim, lower, upper);
}

pub fn pointer_apply_mold(
    pointer: &mut Descriptor,
    mold: &Descriptor,
    stat: StatMode<'_>,
    location: SourceLocation,
) -> i32 {
    stat.finish(pointer.apply_mold(mold), location)
}

pub fn pointer_allocate(pointer: &mut Descriptor, stat: StatMode<'_>, location: SourceLocation) -> i32 {
    stat.finish(pointer.allocate(), location)
}

pub fn pointer_allocate_source(
    pointer: &mut Descriptor,
    source: &Descriptor,
    stat: StatMode<'_>,
    location: SourceLocation,
) -> i32 {
    stat.finish(pointer.allocate_with_source(source), location)
}

/// Pointer assignment `pointer => target`.
///
/// # Safety
///
/// See [`Descriptor::associate`].
pub unsafe fn pointer_associate(
    pointer: &mut Descriptor,
    target: &Descriptor,
    stat: StatMode<'_>,
    location: SourceLocation,
) -> i32 {
    // SAFETY: forwarded from the caller.
    stat.finish(unsafe { pointer.associate(target) }, location)
}

/// Bounds-remapping pointer assignment `pointer(l:u, ...) => target`.
///
/// # Safety
///
/// See [`Descriptor::associate`].
pub unsafe fn pointer_associate_remapping(
    pointer: &mut Descriptor,
    target: &Descriptor,
    bounds: &Descriptor,
    stat: StatMode<'_>,
    location: SourceLocation,
) -> i32 {
    // SAFETY: forwarded from the caller.
    stat.finish(unsafe { pointer.associate_remapping_with(target, bounds) }, location)
}

pub fn pointer_deallocate(pointer: &mut Descriptor, stat: StatMode<'_>, location: SourceLocation) -> i32 {
    stat.finish(pointer.deallocate(), location)
}

pub fn pointer_deallocate_polymorphic(pointer: &mut Descriptor, stat: StatMode<'_>, location: SourceLocation) -> i32 {
    stat.finish(pointer.deallocate_polymorphic(), location)
}

pub fn pointer_nullify(pointer: &mut Descriptor, stat: StatMode<'_>, location: SourceLocation) -> i32 {
    stat.finish(pointer.nullify(), location)
}

/// `ASSOCIATED(pointer)`
pub fn pointer_is_associated(pointer: &Descriptor) -> bool {
    pointer.is_associated()
}

/// `ASSOCIATED(pointer, target)`; with no target this is [`pointer_is_associated`].
pub fn pointer_is_associated_with(pointer: &Descriptor, target: Option<&Descriptor>) -> bool {
    match target {
        Some(target) => pointer.is_associated_with(target),
        None => pointer.is_associated(),
    }
}
