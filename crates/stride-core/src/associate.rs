//! Association engine: pointer assignment and rank-changing remap
//!
//! Every operation here binds a descriptor to storage it does not own. The
//! resulting [`Ownership::Aliased`](crate::Ownership::Aliased) binding is
//! never freed by the descriptor, so the caller must keep the target's
//! storage alive for as long as the alias is used. That obligation is why
//! these functions are `unsafe`.

use crate::bounds::dimensions_from_bounds;
use crate::constants::MAX_RANK;
use crate::descriptor::{Attribute, Binding, Descriptor, Dimension};
use crate::error::{DescriptorError, Result};
use std::ptr::NonNull;

impl Descriptor {
    fn check_can_alias(&self) -> Result<()> {
        if self.attribute != Attribute::Pointer {
            return Err(DescriptorError::InvalidAttribute {
                expected: Attribute::Pointer,
                actual: self.attribute,
            });
        }
        if matches!(self.binding, Binding::Owned(_)) {
            return Err(DescriptorError::AlreadyAssociated);
        }
        Ok(())
    }

    fn target_base(target: &Descriptor) -> Result<NonNull<u8>> {
        NonNull::new(target.base_address()).ok_or(DescriptorError::NotAssociated)
    }

    fn bind_alias(&mut self, base: NonNull<u8>, rank: usize, dims: impl IntoIterator<Item = Dimension>) {
        self.rank = rank;
        self.dims = [Dimension::EMPTY; MAX_RANK];
        for (slot, dim) in self.dims.iter_mut().zip(dims) {
            *slot = dim;
        }
        self.binding = Binding::Aliased(base);
    }

    /// `self => target`: same shape, bounds and strides as `target`.
    ///
    /// # Safety
    ///
    /// `target`'s storage must outlive every use of `self` while the
    /// association lasts.
    pub unsafe fn associate(&mut self, target: &Descriptor) -> Result<()> {
        self.check_can_alias()?;
        let base = Self::target_base(target)?;
        self.check_admits(target)?;
        self.take_dynamic_type(target);
        self.bind_alias(base, target.rank, target.dimensions().iter().copied());
        tracing::debug!(rank = self.rank, elements = self.elements(), "associated");
        Ok(())
    }

    /// `self(lb1:, lb2:, ...) => target`: `target`'s shape under new lower bounds.
    ///
    /// # Safety
    ///
    /// As for [`associate`](Self::associate).
    pub unsafe fn associate_lower_bounds(&mut self, target: &Descriptor, lower_bounds: &[i64]) -> Result<()> {
        self.check_can_alias()?;
        let base = Self::target_base(target)?;
        if lower_bounds.len() != target.rank {
            return Err(DescriptorError::ShapeMismatch(format!(
                "{} lower bounds for a rank-{} target",
                lower_bounds.len(),
                target.rank
            )));
        }
        self.check_admits(target)?;
        self.take_dynamic_type(target);
        let dims = target.dimensions().iter().zip(lower_bounds).map(|(dim, &lower)| Dimension {
            lower_bound: if dim.extent == 0 { 1 } else { lower },
            ..*dim
        });
        self.bind_alias(base, target.rank, dims);
        Ok(())
    }

    /// `self(l1:u1, l2:u2, ...) => target`: alias contiguous `target` under a
    /// new rank and bounds.
    ///
    /// The new shape must hold exactly as many elements as `target`. On any
    /// failure the descriptor is left as it was.
    ///
    /// # Safety
    ///
    /// As for [`associate`](Self::associate).
    #[tracing::instrument(skip(self, target), fields(target_rank = target.rank))]
    pub unsafe fn associate_remapping(&mut self, target: &Descriptor, bounds: &[(i64, i64)]) -> Result<()> {
        self.check_can_alias()?;
        if bounds.len() > MAX_RANK {
            return Err(DescriptorError::InvalidRank {
                rank: bounds.len(),
                max: MAX_RANK,
            });
        }
        let base = Self::target_base(target)?;
        if !target.is_contiguous() {
            return Err(DescriptorError::ShapeMismatch("remap target is not contiguous".into()));
        }
        let dims = dimensions_from_bounds(bounds)?;
        let requested = dims
            .iter()
            .try_fold(1u128, |count, dim| count.checked_mul(dim.extent as u128))
            .ok_or_else(|| DescriptorError::ShapeMismatch("remap bounds overflow the element count".into()))?;
        if requested != target.elements() as u128 {
            return Err(DescriptorError::ShapeMismatch(format!(
                "remap bounds describe {requested} elements, target has {}",
                target.elements()
            )));
        }
        self.check_admits(target)?;

        self.take_dynamic_type(target);
        self.bind_alias(base, bounds.len(), dims);
        self.set_dense_strides();
        tracing::debug!(rank = self.rank, elements = self.elements(), "remapped");
        Ok(())
    }

    /// [`associate_remapping`](Self::associate_remapping) with the bounds read from
    /// an integer array shaped `[2, new_rank]`: `bounds(1, j)` is the lower and
    /// `bounds(2, j)` the upper bound of dimension `j`.
    ///
    /// # Safety
    ///
    /// As for [`associate`](Self::associate).
    pub unsafe fn associate_remapping_with(&mut self, target: &Descriptor, bounds: &Descriptor) -> Result<()> {
        let pairs = read_bound_pairs(bounds)?;
        // SAFETY: forwarded from the caller.
        unsafe { self.associate_remapping(target, &pairs) }
    }

    /// Bind the current shape densely to external memory at `base`.
    ///
    /// # Safety
    ///
    /// `base` must address at least `elements() * element_bytes()` bytes that
    /// stay valid, and suitably aligned for the element type, for every use
    /// of the association.
    pub unsafe fn associate_storage(&mut self, base: NonNull<u8>) -> Result<()> {
        self.check_can_alias()?;
        self.set_dense_strides();
        self.binding = Binding::Aliased(base);
        Ok(())
    }

    /// Bind the current shape to external memory at `base` with explicit
    /// per-dimension byte strides.
    ///
    /// # Safety
    ///
    /// Every element addressed through `strides` must lie in memory that
    /// stays valid for every use of the association.
    pub unsafe fn associate_storage_with_strides(&mut self, base: NonNull<u8>, strides: &[i64]) -> Result<()> {
        self.check_can_alias()?;
        if strides.len() != self.rank {
            return Err(DescriptorError::ShapeMismatch(format!(
                "{} strides for rank {}",
                strides.len(),
                self.rank
            )));
        }
        for (dim, &stride) in self.dims[..self.rank].iter_mut().zip(strides) {
            dim.byte_stride = stride;
        }
        self.binding = Binding::Aliased(base);
        Ok(())
    }

    /// Drop a non-owning association (`NULLIFY`).
    ///
    /// A polymorphic pointer's dynamic type reverts to its declared type.
    pub fn nullify(&mut self) -> Result<()> {
        if matches!(self.binding, Binding::Owned(_)) {
            return Err(DescriptorError::OwnsStorage);
        }
        self.binding = Binding::Unbound;
        if self.declared.is_polymorphic() {
            self.reset_dynamic_type();
        }
        Ok(())
    }

    /// `ASSOCIATED(self, target)`: same storage, dynamic type, shape and
    /// strides, with a non-empty target.
    pub fn is_associated_with(&self, target: &Descriptor) -> bool {
        if !self.is_associated() || !target.is_associated() || target.elements() == 0 {
            return false;
        }
        if self.base_address() != target.base_address() || !self.same_dynamic_type(target) {
            return false;
        }
        self.rank == target.rank
            && self
                .dimensions()
                .iter()
                .zip(target.dimensions())
                .all(|(a, b)| a.extent == b.extent && (a.extent == 1 || a.byte_stride == b.byte_stride))
    }
}

fn read_bound_pairs(bounds: &Descriptor) -> Result<Vec<(i64, i64)>> {
    if !bounds.is_associated() {
        return Err(DescriptorError::NotAssociated);
    }
    if !bounds.type_code().is_integer() {
        return Err(DescriptorError::type_mismatch("an integer bounds array", bounds.dynamic_type_name()));
    }
    if bounds.rank() != 2 || bounds.dimension(0).extent() != 2 {
        return Err(DescriptorError::ShapeMismatch(
            "remap bounds must be shaped [2, new_rank]".into(),
        ));
    }
    let row = bounds.dimension(0).lower_bound();
    let first_column = bounds.dimension(1).lower_bound();
    (0..bounds.dimension(1).extent())
        .map(|j| {
            let column = first_column + j;
            Ok((
                integer_at(bounds, &[row, column])?,
                integer_at(bounds, &[row + 1, column])?,
            ))
        })
        .collect()
}

fn integer_at(d: &Descriptor, subscripts: &[i64]) -> Result<i64> {
    let value: i128 = match d.element_bytes() {
        1 => d.element::<i8>(subscripts)?.into(),
        2 => d.element::<i16>(subscripts)?.into(),
        4 => d.element::<i32>(subscripts)?.into(),
        8 => d.element::<i64>(subscripts)?.into(),
        16 => d.element::<i128>(subscripts)?,
        other => return Err(DescriptorError::InvalidType(format!("{other}-byte integer"))),
    };
    i64::try_from(value).map_err(|_| DescriptorError::ShapeMismatch(format!("bound {value} out of range")))
}
