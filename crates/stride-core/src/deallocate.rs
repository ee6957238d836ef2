//! Destruction engine
//!
//! Owned storage is finalized according to the descriptor's dynamic type
//! (the type's own final routine first, then each ancestor's) and only then
//! returned to the allocator.

use crate::descriptor::{Binding, Descriptor};
use crate::error::{DescriptorError, Result};

impl Descriptor {
    /// Finalize and free owned storage. Bounds and dynamic type are kept.
    #[tracing::instrument(skip(self), fields(rank = self.rank, dynamic_type = %self.dynamic_type_name()))]
    pub fn deallocate(&mut self) -> Result<()> {
        match self.binding {
            Binding::Unbound => Err(DescriptorError::NotAssociated),
            Binding::Aliased(_) => Err(DescriptorError::NotOwner),
            Binding::Owned(_) => {
                self.release_owned();
                tracing::debug!("deallocated");
                Ok(())
            }
        }
    }

    /// [`deallocate`](Self::deallocate), then revert the dynamic type to the
    /// declared one.
    pub fn deallocate_polymorphic(&mut self) -> Result<()> {
        self.deallocate()?;
        self.reset_dynamic_type();
        Ok(())
    }

    pub(crate) fn release_owned(&mut self) {
        let Binding::Owned(mut storage) = std::mem::replace(&mut self.binding, Binding::Unbound) else {
            return;
        };
        if let Some(ty) = self.derived_type() {
            if ty.needs_finalization() {
                let elements = self.elements();
                tracing::trace!(ty = ty.name(), elements, bytes = storage.len(), "finalizing");
                ty.finalize(storage.as_mut_slice(), elements);
            }
        }
        drop(storage);
    }
}
