//! Large-count positioned I/O.
//!
//! [`LargeCountIo`] adds the `_c` (64-bit count) variants of the five
//! positioned transfer routines to every [`NativeFile`]. Each call:
//!
//! 1. checks that the buffer holds `count` elements,
//! 2. decomposes `count` into `outer_count * block_length`,
//! 3. builds and commits a contiguous block type of `block_length` elements,
//! 4. issues exactly one native call with `(outer_count, block type)`,
//! 5. frees the block type and translates the native result.
//!
//! Nothing touches the file before step 4, so a count that cannot be
//! decomposed fails without side effects. Collective routines stay collective:
//! every participant issues the one matching collective native call.
//!
//! # Example
//!
//! ```
//! use bigcount_io::sim::SimGroup;
//! use bigcount_io::LargeCountIo;
//!
//! // A native layer accepting at most 16 elements per call
//! let group = SimGroup::with_count_limit(1, 16);
//! let file = group.participant(0);
//!
//! let data: Vec<u8> = (0..60).collect();
//! let status = file.write_at_c(0, &data, 60).unwrap();
//! assert_eq!((status.elements(), status.block_length), (60, 4));
//! assert_eq!(status.blocks(), 15);
//!
//! let mut back = vec![0u8; 60];
//! file.read_at_c(0, &mut back, 60).unwrap();
//! assert_eq!(back, data);
//! ```

use crate::datatype::{as_bytes, as_bytes_mut, DatatypeTag, MpiDatatype};
use crate::decompose::decompose_with_limit;
use crate::derived::DerivedBlockType;
use crate::error::{Error, Result};
use crate::native::{NativeFile, NativeResult, Operation, RawDatatype};
use crate::status::Status;

/// 64-bit count variants of the positioned transfer routines.
///
/// Implemented for every [`NativeFile`]. Offsets are byte offsets. The
/// `*_slice_*` forms transfer the whole slice.
pub trait LargeCountIo: NativeFile {
    /// Write `count` elements of `buf` at `offset` (independent).
    fn write_at_c<T: MpiDatatype>(&self, offset: u64, buf: &[T], count: u64) -> Result<Status> {
        let bytes = prefix(buf, count)?;
        dispatch(self, Operation::WriteAt, count, T::TAG, |file, n, ty| {
            file.write_at(offset, bytes, n, ty)
        })
    }

    /// Read `count` elements into `buf` from `offset` (independent).
    fn read_at_c<T: MpiDatatype>(&self, offset: u64, buf: &mut [T], count: u64) -> Result<Status> {
        let bytes = prefix_mut(buf, count)?;
        dispatch(self, Operation::ReadAt, count, T::TAG, |file, n, ty| {
            file.read_at(offset, bytes, n, ty)
        })
    }

    /// Write `count` elements of `buf` at `offset` (collective).
    ///
    /// Every participant of the file's group must make the matching call.
    fn write_at_all_c<T: MpiDatatype>(
        &self,
        offset: u64,
        buf: &[T],
        count: u64,
    ) -> Result<Status> {
        let bytes = prefix(buf, count)?;
        dispatch(self, Operation::WriteAtAll, count, T::TAG, |file, n, ty| {
            file.write_at_all(offset, bytes, n, ty)
        })
    }

    /// Read `count` elements into `buf` from `offset` (collective).
    ///
    /// Every participant of the file's group must make the matching call.
    fn read_at_all_c<T: MpiDatatype>(
        &self,
        offset: u64,
        buf: &mut [T],
        count: u64,
    ) -> Result<Status> {
        let bytes = prefix_mut(buf, count)?;
        dispatch(self, Operation::ReadAtAll, count, T::TAG, |file, n, ty| {
            file.read_at_all(offset, bytes, n, ty)
        })
    }

    /// Write `count` elements of `buf` through the shared file pointer, in rank order.
    ///
    /// Every participant of the file's group must make the matching call.
    fn write_ordered_c<T: MpiDatatype>(&self, buf: &[T], count: u64) -> Result<Status> {
        let bytes = prefix(buf, count)?;
        dispatch(self, Operation::WriteOrdered, count, T::TAG, |file, n, ty| {
            file.write_ordered(bytes, n, ty)
        })
    }

    /// Write all of `buf` at `offset` (independent).
    fn write_slice_at<T: MpiDatatype>(&self, offset: u64, buf: &[T]) -> Result<Status> {
        self.write_at_c(offset, buf, buf.len() as u64)
    }

    /// Fill `buf` from `offset` (independent).
    fn read_slice_at<T: MpiDatatype>(&self, offset: u64, buf: &mut [T]) -> Result<Status> {
        let count = buf.len() as u64;
        self.read_at_c(offset, buf, count)
    }

    /// Write all of `buf` at `offset` (collective).
    fn write_slice_at_all<T: MpiDatatype>(&self, offset: u64, buf: &[T]) -> Result<Status> {
        self.write_at_all_c(offset, buf, buf.len() as u64)
    }

    /// Fill `buf` from `offset` (collective).
    fn read_slice_at_all<T: MpiDatatype>(&self, offset: u64, buf: &mut [T]) -> Result<Status> {
        let count = buf.len() as u64;
        self.read_at_all_c(offset, buf, count)
    }

    /// Write all of `buf` in rank order (collective).
    fn write_slice_ordered<T: MpiDatatype>(&self, buf: &[T]) -> Result<Status> {
        self.write_ordered_c(buf, buf.len() as u64)
    }
}

impl<F: NativeFile + ?Sized> LargeCountIo for F {}

/// Run one transfer with `count` decomposed against the file's native limit.
fn dispatch<F, R>(
    file: &F,
    op: Operation,
    count: u64,
    base: DatatypeTag,
    transfer: R,
) -> Result<Status>
where
    F: NativeFile + ?Sized,
    R: FnOnce(&F, i32, RawDatatype) -> NativeResult<Status>,
{
    let decomposition = decompose_with_limit(count, file.count_limit()).map_err(|e| {
        tracing::debug!(op = op.mpi_name(), count, error = %e, "count not decomposable");
        e
    })?;

    let block = DerivedBlockType::build(file, base, decomposition.block_length)?;
    tracing::debug!(
        op = op.mpi_name(),
        count,
        outer_count = decomposition.outer_count,
        block_length = decomposition.block_length,
        "dispatching"
    );
    let result = transfer(file, decomposition.outer_count, block.raw());
    drop(block);

    let status = result.map_err(|code| {
        tracing::debug!(op = op.mpi_name(), code, "native transfer failed");
        Error::Native { code }
    })?;
    Ok(Status {
        count: status.count,
        block_length: decomposition.block_length,
    })
}

fn checked_len(available: usize, count: u64) -> Result<usize> {
    match usize::try_from(count) {
        Ok(n) if n <= available => Ok(n),
        _ => Err(Error::InvalidBuffer {
            requested: count,
            available: available as u64,
        }),
    }
}

/// Bytes of the first `count` elements of `buf`.
fn prefix<T: MpiDatatype>(buf: &[T], count: u64) -> Result<&[u8]> {
    let n = checked_len(buf.len(), count)?;
    Ok(as_bytes(&buf[..n]))
}

/// Mutable bytes of the first `count` elements of `buf`.
fn prefix_mut<T: MpiDatatype>(buf: &mut [T], count: u64) -> Result<&mut [u8]> {
    let n = checked_len(buf.len(), count)?;
    Ok(as_bytes_mut(&mut buf[..n]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{result_code, DECOMPOSITION_FAILURE_CODE, SUCCESS};
    use crate::native::Group;
    use crate::sim::{SimGroup, ERR_IO, ERR_NO_MEM};

    /// Per-participant pattern used by the two-participant scenarios.
    fn pattern(rank: i32, len: usize) -> Vec<u8> {
        let mut buf = vec![b'?'; len];
        buf[0] = b'A' + rank as u8;
        buf[len - 1] = b'a' + rank as u8;
        buf
    }

    #[test]
    fn small_counts_use_base_type() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        let status = file.write_slice_at(8, &[1.0f64, 2.0, 3.0]).unwrap();
        assert_eq!(status.count, 3);
        assert_eq!(status.block_length, 1);

        let transfers = group.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].count, 3);
        assert_eq!(transfers[0].datatype, RawDatatype::from(DatatypeTag::F64));
        assert_eq!(group.type_stats().created, 0);
        assert_eq!(group.len(), 8 + 24);
    }

    #[test]
    fn large_counts_use_one_derived_call() {
        let group = SimGroup::with_count_limit(1, 16);
        let file = group.participant(0);
        let data = vec![7u8; 60];
        let status = file.write_at_c(0, &data, 60).unwrap();
        assert_eq!((status.count, status.block_length), (60, 4));

        let transfers = group.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].op, Operation::WriteAt);
        assert_eq!(transfers[0].count, 15);
        assert!(transfers[0].datatype.is_derived());

        let types = group.type_stats();
        assert_eq!((types.created, types.freed, types.live), (1, 1, 0));
    }

    #[test]
    fn undecomposable_count_never_reaches_native_layer() {
        let group = SimGroup::with_count_limit(1, 16);
        let file = group.participant(0);
        let data = vec![1u8; 17];

        let result = file.write_slice_at(0, &data);
        assert_eq!(result, Err(Error::Decomposition { count: 17, limit: 16 }));
        assert_eq!(result_code(&result), DECOMPOSITION_FAILURE_CODE);

        let mut back = vec![0u8; 17];
        assert!(file.read_slice_at(0, &mut back).is_err());
        assert!(file.write_slice_ordered(&data).is_err());

        assert!(group.transfers().is_empty());
        assert!(group.is_empty());
        assert_eq!(group.type_stats().created, 0);
    }

    #[test]
    fn zero_count_still_calls_native() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        let status = file.write_at_all_c::<u8>(0, &[], 0).unwrap();
        assert_eq!(status.elements(), 0);
        let transfers = group.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].count, 0);
        assert!(group.is_empty());
    }

    #[test]
    fn short_buffer_is_rejected_before_dispatch() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        let result = file.write_at_c(0, &[1u32, 2], 3);
        assert_eq!(
            result,
            Err(Error::InvalidBuffer {
                requested: 3,
                available: 2
            })
        );
        let mut small = [0u16; 1];
        assert!(file.read_at_c(0, &mut small, 2).is_err());
        assert!(group.transfers().is_empty());
    }

    #[test]
    fn count_prefix_of_larger_buffer() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        file.write_at_c(0, b"abcdef", 4).unwrap();
        assert_eq!(group.contents(), b"abcd");
    }

    #[test]
    fn round_trip_matches_single_call_reference() {
        let data: Vec<u32> = (0..36).map(|i| i * 0x0101_0101).collect();
        let offset = 5;

        let reference = SimGroup::new(1);
        reference
            .participant(0)
            .write_slice_at(offset, &data)
            .unwrap();

        // 36 = 6 blocks of 6 under a limit of 8
        let narrow = SimGroup::with_count_limit(1, 8);
        let file = narrow.participant(0);
        let status = file.write_slice_at(offset, &data).unwrap();
        assert_eq!((status.count, status.block_length), (36, 6));
        assert_eq!(narrow.contents(), reference.contents());

        let mut back = vec![0u32; 36];
        let status = file.read_slice_at(offset, &mut back).unwrap();
        assert_eq!(status.elements(), 36);
        assert_eq!(back, data);
        assert_eq!(narrow.type_stats().live, 0);
    }

    #[test]
    fn short_read_through_block_type_counts_every_element() {
        let data: Vec<u8> = (0..58).collect();

        let reference = SimGroup::new(1);
        let file = reference.participant(0);
        file.write_slice_at(0, &data).unwrap();
        let mut expected = vec![0u8; 60];
        let full = file.read_at_c(0, &mut expected, 60).unwrap();
        assert_eq!(full.elements(), 58);

        // 60 = 15 blocks of 4: the file ends two elements into the last block
        let narrow = SimGroup::with_count_limit(1, 16);
        let file = narrow.participant(0);
        file.write_slice_at(0, &data).unwrap();
        let mut back = vec![0u8; 60];
        let status = file.read_at_c(0, &mut back, 60).unwrap();
        assert_eq!(status.block_length, 4);
        assert_eq!(status.elements(), full.elements());
        assert_eq!(status.blocks(), 14);
        assert_eq!(back, expected);
    }

    #[test]
    fn native_failure_passes_code_through_and_frees_type() {
        let group = SimGroup::with_count_limit(1, 16);
        let file = group.participant(0);
        let data = vec![0u8; 60];

        group.fail_next_transfer(0, ERR_IO);
        let result = file.write_slice_at(0, &data);
        assert_eq!(result, Err(Error::Native { code: ERR_IO }));
        assert_eq!(result_code(&result), ERR_IO);

        let types = group.type_stats();
        assert_eq!((types.created, types.live), (1, 0));
        assert_eq!(result_code(&file.write_slice_at(0, &data)), SUCCESS);
    }

    #[test]
    fn refused_type_construction_skips_transfer() {
        let group = SimGroup::with_count_limit(1, 16);
        group.refuse_type_construction(Some(ERR_NO_MEM));
        let file = group.participant(0);
        let result = file.write_slice_at(0, &[0u8; 60]);
        assert_eq!(result, Err(Error::TypeConstruction { code: ERR_NO_MEM }));
        assert!(group.transfers().is_empty());

        // identity decompositions need no construction
        assert!(file.write_slice_at(0, &[0u8; 16]).is_ok());
    }

    #[test]
    fn no_derived_type_outlives_any_operation() {
        let group = SimGroup::with_count_limit(1, 16);
        let file = group.participant(0);
        let data = vec![3u8; 60];
        let mut back = vec![0u8; 60];

        for fail in [false, true] {
            if fail {
                group.fail_next_transfer(0, ERR_IO);
            }
            let _ = file.write_slice_at(0, &data);
            assert_eq!(group.type_stats().live, 0);
            if fail {
                group.fail_next_transfer(0, ERR_IO);
            }
            let _ = file.read_slice_at(0, &mut back);
            assert_eq!(group.type_stats().live, 0);
            if fail {
                group.fail_next_transfer(0, ERR_IO);
            }
            let _ = file.write_slice_at_all(0, &data);
            assert_eq!(group.type_stats().live, 0);
            if fail {
                group.fail_next_transfer(0, ERR_IO);
            }
            let _ = file.read_slice_at_all(0, &mut back);
            assert_eq!(group.type_stats().live, 0);
            if fail {
                group.fail_next_transfer(0, ERR_IO);
            }
            let _ = file.write_slice_ordered(&data);
            assert_eq!(group.type_stats().live, 0);
        }
        let types = group.type_stats();
        assert_eq!(types.created, 10);
        assert_eq!(types.freed, 10);
    }

    /// Two participants, collective writes of `2 * limit + 4` bytes each at
    /// offsets `0` and `n`, then collective reads of each region.
    #[test]
    fn collective_scenario() {
        let limit = 127;
        let n = 2 * 127 + 4; // 258 = 86 * 3
        let group = SimGroup::with_count_limit(2, limit);

        std::thread::scope(|s| {
            for file in group.participants() {
                s.spawn(move || {
                    crate::error::require_group_size(&file, 2);
                    let rank = file.rank();
                    let offset = rank as u64 * n as u64;
                    let status = file.write_slice_at_all(offset, &pattern(rank, n)).unwrap();
                    assert_eq!((status.count, status.block_length), (258, 3));

                    let mut back = vec![0u8; n];
                    file.read_slice_at_all(offset, &mut back).unwrap();
                    assert_eq!(back, pattern(rank, n));
                });
            }
        });

        let contents = group.contents();
        assert_eq!(contents.len(), 2 * n);
        assert_eq!(&contents[..n], pattern(0, n).as_slice());
        assert_eq!(&contents[n..], pattern(1, n).as_slice());

        let transfers = group.transfers();
        let writes: Vec<_> = transfers
            .iter()
            .filter(|t| t.op.is_write())
            .collect();
        assert_eq!(writes.len(), 2, "one collective write per participant");
        assert!(writes.iter().all(|t| t.op == Operation::WriteAtAll));
        assert!(transfers.iter().all(|t| t.op.is_collective()));
        assert_eq!(group.type_stats().live, 0);
    }

    /// Two participants, rank-ordered writes of `2 * limit + 4` bytes each.
    #[test]
    fn rank_ordered_scenario() {
        let limit = 127;
        let n = 2 * 127 + 4;
        let group = SimGroup::with_count_limit(2, limit);

        std::thread::scope(|s| {
            // spawn rank 1 first: placement must not depend on arrival order
            for file in group.participants().into_iter().rev() {
                s.spawn(move || {
                    let rank = file.rank();
                    file.write_slice_ordered(&pattern(rank, n)).unwrap();
                });
            }
        });

        let contents = group.contents();
        assert_eq!(contents.len(), 2 * n);
        assert_eq!(&contents[..n], pattern(0, n).as_slice());
        assert_eq!(&contents[n..], pattern(1, n).as_slice());
        assert!(group
            .transfers()
            .iter()
            .all(|t| t.op == Operation::WriteOrdered && t.offset.is_none() && t.count == 86));
    }

    #[test]
    fn collective_decomposition_failure_on_every_rank_issues_nothing() {
        let group = SimGroup::with_count_limit(2, 16);
        std::thread::scope(|s| {
            for file in group.participants() {
                s.spawn(move || {
                    let data = vec![0u8; 17];
                    assert!(file.write_slice_at_all(0, &data).is_err());
                });
            }
        });
        assert!(group.transfers().is_empty());
    }

    #[test]
    #[should_panic(expected = "aborted")]
    fn wrong_participant_count_aborts() {
        let group = SimGroup::new(3);
        crate::error::require_group_size(&group.participant(0), 2);
    }

    /// Full-size collective and rank-ordered scenarios at the native limit.
    ///
    /// Needs roughly 24 GiB of memory.
    #[test]
    #[ignore]
    fn full_size_scenarios() {
        let n = (1usize << 32) + 2;
        for ordered in [false, true] {
            let group = SimGroup::new(2);
            std::thread::scope(|s| {
                for file in group.participants() {
                    s.spawn(move || {
                        let rank = file.rank();
                        let data = pattern(rank, n);
                        let status = if ordered {
                            file.write_slice_ordered(&data).unwrap()
                        } else {
                            file.write_slice_at_all(rank as u64 * n as u64, &data).unwrap()
                        };
                        assert_eq!((status.elements(), status.block_length), ((1 << 32) + 2, 3));
                    });
                }
            });
            let contents = group.contents();
            assert_eq!(contents.len(), 2 * n);
            assert_eq!(contents[0], b'A');
            assert_eq!(contents[n - 1], b'a');
            assert_eq!(contents[n], b'B');
            assert_eq!(contents[2 * n - 1], b'b');
            assert_eq!(group.type_stats().live, 0);
        }
    }
}
