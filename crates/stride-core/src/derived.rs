//! Runtime type information for derived (structure) types
//!
//! A [`DerivedType`] is meant to live in a `static` so descriptors can refer
//! to it by `&'static` reference. The dynamic-type addendum of a descriptor
//! points at one of these, which is how deallocation finds the right final
//! routine for a value whose declared type is `CLASS(*)` or `CLASS(T)`.
//!
//! ```
//! use stride_core::{DerivedType, FinalRoutine};
//!
//! fn release_handle(value: &mut [u8]) {
//!     value.fill(0);
//! }
//!
//! static SHAPE: DerivedType = DerivedType::new("shape", 8, 8);
//! static CIRCLE: DerivedType = DerivedType::new("circle", 16, 8)
//!     .extending(&SHAPE)
//!     .with_final(FinalRoutine::Elemental(release_handle));
//!
//! assert!(CIRCLE.extends(&SHAPE));
//! assert!(!SHAPE.extends(&CIRCLE));
//! ```

use std::fmt;

/// Finalization routine attached to a derived type
#[derive(Clone, Copy)]
pub enum FinalRoutine {
    /// Called once per element with that element's bytes
    Elemental(fn(&mut [u8])),
    /// Called once with every element's bytes and the element count
    Array(fn(&mut [u8], usize)),
}

impl fmt::Debug for FinalRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalRoutine::Elemental(_) => f.write_str("Elemental"),
            FinalRoutine::Array(_) => f.write_str("Array"),
        }
    }
}

/// Type information for one derived type
#[derive(Debug)]
pub struct DerivedType {
    name: &'static str,
    size_in_bytes: usize,
    alignment: usize,
    parent: Option<&'static DerivedType>,
    final_routine: Option<FinalRoutine>,
}

impl DerivedType {
    pub const fn new(name: &'static str, size_in_bytes: usize, alignment: usize) -> Self {
        Self {
            name,
            size_in_bytes,
            alignment,
            parent: None,
            final_routine: None,
        }
    }

    /// Declare `parent` as the type this one extends.
    pub const fn extending(mut self, parent: &'static DerivedType) -> Self {
        self.parent = Some(parent);
        self
    }

    pub const fn with_final(mut self, routine: FinalRoutine) -> Self {
        self.final_routine = Some(routine);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn alignment(&self) -> usize {
        self.alignment.max(1)
    }

    pub fn parent(&self) -> Option<&'static DerivedType> {
        self.parent
    }

    pub fn final_routine(&self) -> Option<FinalRoutine> {
        self.final_routine
    }

    /// The type itself followed by its ancestors, nearest first.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static DerivedType> {
        std::iter::successors(Some(self), |ty| ty.parent)
    }

    /// Whether `self` is `ancestor` or (transitively) extends it.
    pub fn extends(&self, ancestor: &DerivedType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if std::ptr::eq(ty, ancestor) {
                return true;
            }
            current = ty.parent;
        }
        false
    }

    /// Whether any type in the lineage has a final routine.
    pub fn needs_finalization(&'static self) -> bool {
        self.lineage().any(|ty| ty.final_routine.is_some())
    }

    /// Run the final routines of this type and then of each ancestor over
    /// `bytes`, which holds `elements` contiguous values of this type.
    pub(crate) fn finalize(&'static self, bytes: &mut [u8], elements: usize) {
        let stride = self.size_in_bytes;
        for ty in self.lineage() {
            match ty.final_routine {
                Some(FinalRoutine::Elemental(routine)) if stride > 0 => {
                    for element in bytes.chunks_exact_mut(stride).take(elements) {
                        routine(element);
                    }
                }
                Some(FinalRoutine::Elemental(routine)) => {
                    for _ in 0..elements {
                        routine(&mut []);
                    }
                }
                Some(FinalRoutine::Array(routine)) => routine(bytes, elements),
                None => {}
            }
        }
    }
}

impl PartialEq for DerivedType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for DerivedType {}

impl fmt::Display for DerivedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TYPE({})", self.name)
    }
}
