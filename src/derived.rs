//! Scoped derived block types.
//!
//! A [`DerivedBlockType`] denotes `block_length` contiguous base elements. It
//! is constructed and committed on the native layer right before a transfer
//! and freed when the guard goes out of scope, whichever way the transfer
//! ended. A block length of one needs no construction: the guard then simply
//! carries the base type.

use crate::datatype::DatatypeTag;
use crate::error::{Error, Result};
use crate::native::{NativeFile, RawDatatype};

/// A committed contiguous block type, owned for the duration of one operation.
///
/// The type is released exactly once, on drop. Dropping cannot report a
/// failing release, so it is logged instead.
pub struct DerivedBlockType<'a, F: NativeFile + ?Sized> {
    file: &'a F,
    handle: RawDatatype,
    block_length: i32,
    owned: bool,
}

impl<'a, F: NativeFile + ?Sized> DerivedBlockType<'a, F> {
    /// Build and commit a block of `block_length` elements of `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeConstruction`] if the native layer refuses to
    /// construct or commit the type. A type that was constructed but could
    /// not be committed is still released.
    pub fn build(file: &'a F, base: DatatypeTag, block_length: i32) -> Result<Self> {
        if block_length <= 1 {
            return Ok(DerivedBlockType {
                file,
                handle: base.into(),
                block_length: 1,
                owned: false,
            });
        }

        let handle = file
            .type_contiguous(block_length, base.into())
            .map_err(|code| Error::TypeConstruction { code })?;
        // guard first: a failed commit still frees the handle
        let block = DerivedBlockType {
            file,
            handle,
            block_length,
            owned: true,
        };
        file.type_commit(handle)
            .map_err(|code| Error::TypeConstruction { code })?;

        tracing::trace!(handle = handle.0, block_length, ?base, "derived block type committed");
        Ok(block)
    }

    /// Raw handle to pass to the native transfer.
    pub fn raw(&self) -> RawDatatype {
        self.handle
    }

    /// Base elements per instance of this type.
    pub fn block_length(&self) -> i32 {
        self.block_length
    }

    /// Returns `true` if a type was constructed (and will be freed).
    pub fn is_constructed(&self) -> bool {
        self.owned
    }
}

impl<F: NativeFile + ?Sized> Drop for DerivedBlockType<'_, F> {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        match self.file.type_free(self.handle) {
            Ok(()) => tracing::trace!(handle = self.handle.0, "derived block type freed"),
            Err(code) => tracing::warn!(
                handle = self.handle.0,
                code,
                "failed to free derived block type"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimGroup;

    #[test]
    fn unit_block_passes_base_through() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        {
            let block = DerivedBlockType::build(&file, DatatypeTag::F64, 1).unwrap();
            assert!(!block.is_constructed());
            assert_eq!(block.raw(), RawDatatype::from(DatatypeTag::F64));
            assert_eq!(block.block_length(), 1);
        }
        let types = group.type_stats();
        assert_eq!(types.created, 0);
        assert_eq!(types.freed, 0);
    }

    #[test]
    fn block_is_freed_on_drop() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        {
            let block = DerivedBlockType::build(&file, DatatypeTag::U8, 3).unwrap();
            assert!(block.is_constructed());
            assert!(block.raw().is_derived());
            assert_eq!(group.type_stats().live, 1);
            assert!(group.is_committed(block.raw()));
        }
        let types = group.type_stats();
        assert_eq!((types.created, types.freed, types.live), (1, 1, 0));
    }

    #[test]
    fn refused_construction_is_reported() {
        let group = SimGroup::new(1);
        group.refuse_type_construction(Some(crate::sim::ERR_NO_MEM));
        let file = group.participant(0);
        let err = DerivedBlockType::build(&file, DatatypeTag::U8, 4)
            .err()
            .unwrap();
        assert_eq!(
            err,
            Error::TypeConstruction {
                code: crate::sim::ERR_NO_MEM
            }
        );
        assert_eq!(group.type_stats().live, 0);
    }

    #[test]
    fn failed_commit_still_frees() {
        let group = SimGroup::new(1);
        group.fail_type_commit(Some(crate::sim::ERR_TYPE));
        let file = group.participant(0);
        let err = DerivedBlockType::build(&file, DatatypeTag::I32, 2)
            .err()
            .unwrap();
        assert_eq!(
            err,
            Error::TypeConstruction {
                code: crate::sim::ERR_TYPE
            }
        );
        let types = group.type_stats();
        assert_eq!((types.created, types.freed, types.live), (1, 1, 0));
    }
}
