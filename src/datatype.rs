//! Base element types and their tag mapping.
//!
//! This module provides the [`MpiDatatype`] trait, a sealed trait that maps Rust
//! primitive types to the tags the native layer understands. A base element is
//! the unit a caller counts in; the derived block types built for large counts
//! are always contiguous runs of one base element type.
//!
//! # Supported Types
//!
//! | Rust Type | MPI Equivalent     | Tag Value | Size |
//! |-----------|-------------------|-----------|------|
//! | `f32`     | `MPI_FLOAT`       | 0         | 4    |
//! | `f64`     | `MPI_DOUBLE`      | 1         | 8    |
//! | `i32`     | `MPI_INT32_T`     | 2         | 4    |
//! | `i64`     | `MPI_INT64_T`     | 3         | 8    |
//! | `u8`      | `MPI_UINT8_T`     | 4         | 1    |
//! | `u32`     | `MPI_UINT32_T`    | 5         | 4    |
//! | `u64`     | `MPI_UINT64_T`    | 6         | 8    |
//! | `i8`      | `MPI_INT8_T`      | 7         | 1    |
//! | `i16`     | `MPI_INT16_T`     | 8         | 2    |
//! | `u16`     | `MPI_UINT16_T`    | 9         | 2    |

/// Internal module to seal the trait — prevents external implementations.
mod sealed {
    pub trait Sealed {}
}

/// Tag values matching C-side `BIGCOUNT_*` defines.
///
/// These discriminants must stay in sync with the `#define BIGCOUNT_*` values
/// in `csrc/bigcount.h`. They double as the raw handles of the predefined
/// types on both sides of the native seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DatatypeTag {
    /// 32-bit floating point (`MPI_FLOAT`)
    F32 = 0,
    /// 64-bit floating point (`MPI_DOUBLE`)
    F64 = 1,
    /// 32-bit signed integer (`MPI_INT32_T`)
    I32 = 2,
    /// 64-bit signed integer (`MPI_INT64_T`)
    I64 = 3,
    /// 8-bit unsigned integer (`MPI_UINT8_T`)
    U8 = 4,
    /// 32-bit unsigned integer (`MPI_UINT32_T`)
    U32 = 5,
    /// 64-bit unsigned integer (`MPI_UINT64_T`)
    U64 = 6,
    /// 8-bit signed integer (`MPI_INT8_T`)
    I8 = 7,
    /// 16-bit signed integer (`MPI_INT16_T`)
    I16 = 8,
    /// 16-bit unsigned integer (`MPI_UINT16_T`)
    U16 = 9,
}

impl DatatypeTag {
    /// Every tag, in discriminant order.
    pub const ALL: [DatatypeTag; 10] = [
        DatatypeTag::F32,
        DatatypeTag::F64,
        DatatypeTag::I32,
        DatatypeTag::I64,
        DatatypeTag::U8,
        DatatypeTag::U32,
        DatatypeTag::U64,
        DatatypeTag::I8,
        DatatypeTag::I16,
        DatatypeTag::U16,
    ];

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DatatypeTag::U8 | DatatypeTag::I8 => 1,
            DatatypeTag::I16 | DatatypeTag::U16 => 2,
            DatatypeTag::F32 | DatatypeTag::I32 | DatatypeTag::U32 => 4,
            DatatypeTag::F64 | DatatypeTag::I64 | DatatypeTag::U64 => 8,
        }
    }

    /// Look up a tag by its discriminant.
    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

/// Trait for types that can be used as the base element of a transfer.
///
/// This is a **sealed trait** — it cannot be implemented outside this crate.
/// Supported types: [`f32`], [`f64`], [`i8`], [`i16`], [`i32`], [`i64`],
/// [`u8`], [`u16`], [`u32`], [`u64`].
pub trait MpiDatatype: sealed::Sealed + Copy + Send + 'static {
    /// The datatype tag used for FFI dispatch to the C layer.
    const TAG: DatatypeTag;
}

macro_rules! impl_mpi_datatype {
    ($ty:ty, $tag:expr) => {
        impl sealed::Sealed for $ty {}
        impl MpiDatatype for $ty {
            const TAG: DatatypeTag = $tag;
        }
    };
}

impl_mpi_datatype!(f32, DatatypeTag::F32);
impl_mpi_datatype!(f64, DatatypeTag::F64);
impl_mpi_datatype!(i32, DatatypeTag::I32);
impl_mpi_datatype!(i64, DatatypeTag::I64);
impl_mpi_datatype!(u8, DatatypeTag::U8);
impl_mpi_datatype!(u32, DatatypeTag::U32);
impl_mpi_datatype!(u64, DatatypeTag::U64);
impl_mpi_datatype!(i8, DatatypeTag::I8);
impl_mpi_datatype!(i16, DatatypeTag::I16);
impl_mpi_datatype!(u16, DatatypeTag::U16);

/// View a slice of base elements as raw bytes.
pub(crate) fn as_bytes<T: MpiDatatype>(buf: &[T]) -> &[u8] {
    // SAFETY: every MpiDatatype is a plain primitive with no padding and no
    // invalid bit patterns; the byte view covers exactly the slice's memory.
    unsafe { std::slice::from_raw_parts(buf.as_ptr().cast::<u8>(), std::mem::size_of_val(buf)) }
}

/// View a mutable slice of base elements as raw bytes.
pub(crate) fn as_bytes_mut<T: MpiDatatype>(buf: &mut [T]) -> &mut [u8] {
    // SAFETY: as above; any byte pattern is a valid value of the primitive
    // types that implement MpiDatatype.
    unsafe {
        std::slice::from_raw_parts_mut(buf.as_mut_ptr().cast::<u8>(), std::mem::size_of_val(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatype_tags_match_c_defines() {
        assert_eq!(f32::TAG as i32, 0); // BIGCOUNT_F32
        assert_eq!(f64::TAG as i32, 1); // BIGCOUNT_F64
        assert_eq!(i32::TAG as i32, 2); // BIGCOUNT_I32
        assert_eq!(i64::TAG as i32, 3); // BIGCOUNT_I64
        assert_eq!(u8::TAG as i32, 4); // BIGCOUNT_U8
        assert_eq!(u32::TAG as i32, 5); // BIGCOUNT_U32
        assert_eq!(u64::TAG as i32, 6); // BIGCOUNT_U64
        assert_eq!(i8::TAG as i32, 7); // BIGCOUNT_I8
        assert_eq!(i16::TAG as i32, 8); // BIGCOUNT_I16
        assert_eq!(u16::TAG as i32, 9); // BIGCOUNT_U16
    }

    #[test]
    fn datatype_tag_values_are_sequential() {
        for (i, tag) in DatatypeTag::ALL.iter().enumerate() {
            assert_eq!(*tag as i32, i as i32, "Tag {tag:?} should have value {i}");
            assert_eq!(DatatypeTag::from_raw(i as i32), Some(*tag));
        }
        assert_eq!(DatatypeTag::from_raw(-1), None);
        assert_eq!(DatatypeTag::from_raw(DatatypeTag::ALL.len() as i32), None);
    }

    #[test]
    fn sizes_match_rust_types() {
        fn size_of_tag<T: MpiDatatype>() -> (usize, usize) {
            (T::TAG.size(), std::mem::size_of::<T>())
        }
        for (tag_size, rust_size) in [
            size_of_tag::<f32>(),
            size_of_tag::<f64>(),
            size_of_tag::<i8>(),
            size_of_tag::<i16>(),
            size_of_tag::<i32>(),
            size_of_tag::<i64>(),
            size_of_tag::<u8>(),
            size_of_tag::<u16>(),
            size_of_tag::<u32>(),
            size_of_tag::<u64>(),
        ] {
            assert_eq!(tag_size, rust_size);
        }
    }

    #[test]
    fn byte_views_cover_whole_slice() {
        let mut values = [1u32, 2, 3];
        assert_eq!(as_bytes(&values).len(), 12);
        as_bytes_mut(&mut values)[0..4].copy_from_slice(&7u32.to_ne_bytes());
        assert_eq!(values, [7, 2, 3]);
    }
}
