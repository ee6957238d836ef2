//! Bounds engine: per-dimension bounds and dense column-major strides

use crate::descriptor::{Binding, Descriptor, Dimension};
use crate::error::{DescriptorError, Result};
use crate::terminator::Terminator;

impl Descriptor {
    /// Set dimension `dim` to `lower..=upper` ahead of allocation.
    ///
    /// An empty range is stored as `1..=0`. Byte strides are refreshed to the
    /// dense layout for the current element size.
    ///
    /// # Panics
    ///
    /// If `dim >= rank`, the descriptor already has storage bound, or the
    /// extent of `lower..=upper` does not fit in an `i64`.
    #[track_caller]
    pub fn set_bounds(&mut self, dim: usize, lower: i64, upper: i64) {
        let terminator = Terminator::here();
        terminator.check(
            dim < self.rank,
            format_args!("set_bounds: dimension {dim} out of range for rank {}", self.rank),
        );
        terminator.check(
            matches!(self.binding, Binding::Unbound),
            "set_bounds: descriptor already has storage bound",
        );
        let Some(dimension) = Dimension::from_bounds(lower, upper) else {
            terminator.crash(format_args!("set_bounds: extent of {lower}..={upper} overflows"));
        };
        self.dims[dim] = dimension;
        self.set_dense_strides();
    }

    /// Assign column-major strides: dimension 0 advances by one element,
    /// every later one by the span of the dimensions before it.
    pub(crate) fn set_dense_strides(&mut self) {
        let mut stride = self.element_bytes as i64;
        for dim in &mut self.dims[..self.rank] {
            dim.byte_stride = stride;
            stride = stride.saturating_mul(dim.extent);
        }
    }

    /// Element count and total byte size for dense storage, checking for overflow.
    pub(crate) fn dense_size(&self) -> Result<(usize, usize)> {
        let mut elements: u128 = 1;
        for dim in self.dimensions() {
            elements = elements.saturating_mul(dim.extent.max(0) as u128);
        }
        let bytes = elements.saturating_mul(self.element_bytes as u128);
        if bytes > isize::MAX as u128 {
            return Err(DescriptorError::OutOfMemory { requested: bytes });
        }
        Ok((elements as usize, bytes as usize))
    }
}

/// Dimensions for a fresh shape given as `(lower, upper)` pairs.
pub(crate) fn dimensions_from_bounds(bounds: &[(i64, i64)]) -> Result<Vec<Dimension>> {
    bounds
        .iter()
        .map(|&(lower, upper)| {
            Dimension::from_bounds(lower, upper)
                .ok_or_else(|| DescriptorError::ShapeMismatch(format!("extent of {lower}..={upper} overflows")))
        })
        .collect()
}
