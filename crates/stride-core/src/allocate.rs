//! Allocation engine: plain, mold and source allocation
//!
//! All three paths allocate dense column-major storage for the descriptor's
//! current bounds. A failed call leaves the descriptor unbound with its
//! bounds and dynamic type as they were before the call.

use crate::descriptor::{Binding, DeclaredType, Descriptor};
use crate::error::{DescriptorError, Result};
use crate::storage::Storage;
use crate::type_code::TypeCode;

/// Dynamic type fields that mold and source allocation may overwrite.
struct SavedType {
    type_code: TypeCode,
    element_bytes: usize,
    addendum: Option<crate::descriptor::Addendum>,
}

impl Descriptor {
    fn save_type(&self) -> SavedType {
        SavedType {
            type_code: self.type_code,
            element_bytes: self.element_bytes,
            addendum: self.addendum,
        }
    }

    fn restore_type(&mut self, saved: SavedType) {
        self.type_code = saved.type_code;
        self.element_bytes = saved.element_bytes;
        self.addendum = saved.addendum;
        self.set_dense_strides();
    }

    /// Allocate zero-initialised storage for the current bounds.
    ///
    /// A zero-element shape still yields an associated descriptor.
    #[tracing::instrument(skip(self), fields(rank = self.rank, dynamic_type = %self.dynamic_type_name()))]
    pub fn allocate(&mut self) -> Result<()> {
        if !matches!(self.binding, Binding::Unbound) {
            return Err(DescriptorError::AlreadyAssociated);
        }
        if self.declared == DeclaredType::Unlimited && self.type_code == TypeCode::OTHER {
            return Err(DescriptorError::type_mismatch(
                "a mold or source for CLASS(*)",
                "no dynamic type",
            ));
        }

        self.set_dense_strides();
        let (elements, bytes) = self.dense_size()?;
        let storage = Storage::allocate(bytes, self.required_alignment())?;
        self.binding = Binding::Owned(storage);

        tracing::debug!(elements, bytes, "allocated");
        Ok(())
    }

    /// Take the dynamic type of `mold` without allocating. Rank and bounds
    /// are kept; strides follow the new element size.
    pub fn apply_mold(&mut self, mold: &Descriptor) -> Result<()> {
        if !matches!(self.binding, Binding::Unbound) {
            return Err(DescriptorError::AlreadyAssociated);
        }
        self.check_admits(mold)?;
        self.take_dynamic_type(mold);
        self.set_dense_strides();
        tracing::trace!(dynamic_type = %self.dynamic_type_name(), "applied mold");
        Ok(())
    }

    /// [`apply_mold`](Self::apply_mold) followed by [`allocate`](Self::allocate).
    pub fn allocate_with_mold(&mut self, mold: &Descriptor) -> Result<()> {
        let saved = self.save_type();
        self.apply_mold(mold)?;
        self.allocate().map_err(|err| {
            self.restore_type(saved);
            err
        })
    }

    /// Allocate and copy `source` in.
    ///
    /// A scalar source is broadcast to every element. An array source must
    /// have the same element count; its elements are copied in column-major
    /// order into this descriptor's own shape.
    #[tracing::instrument(skip(self, source), fields(rank = self.rank, source_rank = source.rank))]
    pub fn allocate_with_source(&mut self, source: &Descriptor) -> Result<()> {
        if !matches!(self.binding, Binding::Unbound) {
            return Err(DescriptorError::AlreadyAssociated);
        }
        if !source.is_associated() {
            return Err(DescriptorError::NotAssociated);
        }
        self.check_admits(source)?;

        let elements = self.elements();
        if source.rank > 0 && source.elements() != elements {
            return Err(DescriptorError::ShapeMismatch(format!(
                "source has {} elements, destination has {elements}",
                source.elements()
            )));
        }

        let saved = self.save_type();
        self.take_dynamic_type(source);
        if let Err(err) = self.allocate() {
            self.restore_type(saved);
            return Err(err);
        }

        let width = self.element_bytes;
        let from = source.base_address();
        let to = self.base_address();
        for index in 0..elements {
            let src_offset = if source.rank == 0 { 0 } else { source.linear_offset(index) };
            // SAFETY: both offsets address one in-range element of their
            // descriptor; the destination is freshly allocated so the ranges
            // cannot overlap.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    from.offset(src_offset as isize),
                    to.offset(self.linear_offset(index) as isize),
                    width,
                );
            }
        }
        tracing::debug!(elements, broadcast = source.rank == 0, "copied source");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Attribute, DerivedType, Descriptor, DescriptorError, Ownership, TypeCode};

    static PAIR: DerivedType = DerivedType::new("pair", 16, 8);

    fn real4_vector(lower: i64, upper: i64) -> Descriptor {
        let mut d = Descriptor::establish_intrinsic(TypeCode::real(4), 1, Attribute::Pointer).unwrap();
        d.set_bounds(0, lower, upper);
        d
    }

    #[test]
    fn test_allocate_twice_is_already_associated() {
        let mut d = real4_vector(1, 4);
        d.allocate().unwrap();
        assert_eq!(d.ownership(), Ownership::Owned);
        assert_eq!(d.allocate(), Err(DescriptorError::AlreadyAssociated));
    }

    #[test]
    fn test_zero_size_allocation_is_associated() {
        let mut d = real4_vector(3, 1);
        d.allocate().unwrap();
        assert!(d.is_associated());
        assert_eq!(d.elements(), 0);
        assert_eq!(d.dimension(0).lower_bound(), 1);
        assert_eq!(d.dimension(0).upper_bound(), 0);
    }

    #[test]
    fn test_failed_allocation_keeps_bounds() {
        let mut d = Descriptor::establish_intrinsic(TypeCode::real(8), 2, Attribute::Allocatable).unwrap();
        d.set_bounds(0, 1, i64::MAX / 4);
        d.set_bounds(1, 1, 1 << 20);
        assert!(matches!(d.allocate(), Err(DescriptorError::OutOfMemory { .. })));
        assert!(!d.is_associated());
        assert_eq!(d.dimension(1).extent(), 1 << 20);
    }

    #[test]
    fn test_unlimited_without_mold_is_rejected() {
        let mut d = Descriptor::establish_unlimited(0, Attribute::Pointer).unwrap();
        assert!(matches!(d.allocate(), Err(DescriptorError::TypeMismatch { .. })));
    }

    #[test]
    fn test_mold_keeps_rank_and_bounds() {
        let mold = Descriptor::establish_derived(&PAIR, 0, Attribute::Other).unwrap();
        let mut d = Descriptor::establish_unlimited(1, Attribute::Pointer).unwrap();
        d.set_bounds(0, 0, 2);
        d.allocate_with_mold(&mold).unwrap();
        assert_eq!(d.type_code(), TypeCode::DERIVED);
        assert_eq!(d.element_bytes(), 16);
        assert_eq!(d.derived_type(), Some(&PAIR));
        assert_eq!(d.rank(), 1);
        assert_eq!(d.dimension(0).lower_bound(), 0);
        assert_eq!(d.dimension(0).byte_stride(), 16);
    }

    #[test]
    fn test_mold_of_wrong_type_for_fixed_declaration() {
        let mold = Descriptor::establish_intrinsic(TypeCode::integer(4), 0, Attribute::Other).unwrap();
        let mut d = real4_vector(1, 2);
        assert_eq!(
            d.allocate_with_mold(&mold),
            Err(DescriptorError::type_mismatch("REAL(4)", "INTEGER(4)"))
        );
        assert!(!d.is_associated());
    }

    #[test]
    fn test_source_of_wrong_type_for_fixed_declaration() {
        let mut source = Descriptor::establish_intrinsic(TypeCode::integer(4), 0, Attribute::Allocatable).unwrap();
        source.allocate().unwrap();
        let mut d = real4_vector(1, 2);
        assert_eq!(
            d.allocate_with_source(&source),
            Err(DescriptorError::type_mismatch("REAL(4)", "INTEGER(4)"))
        );
        assert!(!d.is_associated());
        assert_eq!(d.type_code(), TypeCode::real(4));
        assert_eq!(d.element_bytes(), 4);
        assert_eq!(d.dimension(0).byte_stride(), 4);

        static OTHER: DerivedType = DerivedType::new("other", 8, 8);
        let mut other = Descriptor::establish_derived(&OTHER, 0, Attribute::Allocatable).unwrap();
        other.allocate().unwrap();
        let mut pair = Descriptor::establish_derived(&PAIR, 1, Attribute::Pointer)
            .unwrap()
            .with_extents(&[2]);
        assert_eq!(
            pair.allocate_with_source(&other),
            Err(DescriptorError::type_mismatch("TYPE(pair)", "TYPE(other)"))
        );
        assert!(!pair.is_associated());
        assert_eq!(pair.derived_type(), Some(&PAIR));
        assert_eq!(pair.element_bytes(), 16);
    }

    #[test]
    fn test_array_source_copies_in_column_major_order() {
        let mut source = Descriptor::establish_intrinsic(TypeCode::integer(4), 2, Attribute::Allocatable)
            .unwrap()
            .with_extents(&[2, 2]);
        source.allocate().unwrap();
        for (index, subs) in [[1, 1], [2, 1], [1, 2], [2, 2]].iter().enumerate() {
            source.set_element(subs, index as i32 + 10).unwrap();
        }

        let mut d = Descriptor::establish_intrinsic(TypeCode::integer(4), 1, Attribute::Pointer).unwrap();
        d.set_bounds(0, 0, 3);
        d.allocate_with_source(&source).unwrap();
        assert_eq!(d.to_vec::<i32>().unwrap(), vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_source_element_count_must_match() {
        let mut source = Descriptor::establish_intrinsic(TypeCode::integer(4), 1, Attribute::Allocatable)
            .unwrap()
            .with_extents(&[3]);
        source.allocate().unwrap();
        let mut d = Descriptor::establish_intrinsic(TypeCode::integer(4), 1, Attribute::Pointer)
            .unwrap()
            .with_extents(&[4]);
        assert!(matches!(d.allocate_with_source(&source), Err(DescriptorError::ShapeMismatch(_))));
        assert!(!d.is_associated());
    }

    #[test]
    fn test_unassociated_source_is_rejected() {
        let source = Descriptor::establish_intrinsic(TypeCode::real(4), 0, Attribute::Pointer).unwrap();
        let mut d = real4_vector(1, 2);
        assert_eq!(d.allocate_with_source(&source), Err(DescriptorError::NotAssociated));
    }
}
