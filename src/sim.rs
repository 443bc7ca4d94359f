//! In-process simulated native layer.
//!
//! A [`SimGroup`] stands in for a communicator of `size` participants that
//! have opened the same file. Each participant gets a [`SimFile`] and drives
//! it from its own thread, exactly as MPI ranks would drive their file
//! handles:
//!
//! - independent transfers touch only the shared file bytes;
//! - collective transfers wait on a group barrier before returning;
//! - rank-ordered writes place data through a shared file pointer, in rank
//!   order, and advance it by the group's total.
//!
//! The simulation enforces a native count limit (configurable, so large-count
//! paths can be exercised with small buffers), counts derived datatypes,
//! records every transfer issued, and can inject native failures.
//!
//! # Example
//!
//! ```
//! use bigcount_io::sim::SimGroup;
//! use bigcount_io::{Group, LargeCountIo};
//!
//! let group = SimGroup::with_count_limit(2, 16);
//! std::thread::scope(|s| {
//!     for file in group.participants() {
//!         s.spawn(move || {
//!             let data = vec![b'A' + file.rank() as u8; 60];
//!             file.write_slice_at_all(60 * file.rank() as u64, &data).unwrap();
//!         });
//!     }
//! });
//! let contents = group.contents();
//! assert_eq!(contents.len(), 120);
//! assert!(contents[..60].iter().all(|&b| b == b'A'));
//! assert!(contents[60..].iter().all(|&b| b == b'B'));
//! assert_eq!(group.type_stats().live, 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

use crate::datatype::DatatypeTag;
use crate::native::{
    Group, NativeFile, NativeResult, Operation, RawDatatype, DERIVED_HANDLE_BASE,
    NATIVE_COUNT_LIMIT,
};
use crate::status::Status;

/// Invalid buffer (`MPI_ERR_BUFFER`).
pub const ERR_BUFFER: i32 = 1;
/// Invalid count (`MPI_ERR_COUNT`).
pub const ERR_COUNT: i32 = 2;
/// Invalid datatype (`MPI_ERR_TYPE`).
pub const ERR_TYPE: i32 = 3;
/// I/O failure (`MPI_ERR_IO`).
pub const ERR_IO: i32 = 32;
/// Out of memory (`MPI_ERR_NO_MEM`).
pub const ERR_NO_MEM: i32 = 34;

/// Derived datatype bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeStats {
    /// Types constructed so far.
    pub created: u64,
    /// Types freed so far.
    pub freed: u64,
    /// Types constructed and not yet freed.
    pub live: u64,
}

/// One native transfer call, as issued by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    /// Issuing participant.
    pub rank: i32,
    /// Primitive called.
    pub op: Operation,
    /// Explicit byte offset, `None` for rank-ordered writes.
    pub offset: Option<u64>,
    /// Native count argument.
    pub count: i32,
    /// Datatype argument.
    pub datatype: RawDatatype,
}

#[derive(Debug, Clone, Copy)]
struct TypeEntry {
    base: DatatypeTag,
    block_length: i32,
    committed: bool,
}

#[derive(Default)]
struct State {
    data: Vec<u8>,
    types: HashMap<i32, TypeEntry>,
    next_handle: i32,
    stats: TypeStats,
    log: Vec<TransferRecord>,
    shared_pointer: u64,
    ordered_lengths: Vec<u64>,
    refuse_types: Option<i32>,
    fail_commit: Option<i32>,
    fail_next: HashMap<i32, i32>,
}

struct Shared {
    size: i32,
    limit: u64,
    state: Mutex<State>,
    barrier: Barrier,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // a participant that panicked mid-test must not hide the others' results
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A simulated group of participants sharing one file.
#[derive(Clone)]
pub struct SimGroup {
    shared: Arc<Shared>,
}

impl SimGroup {
    /// Create a group of `size` participants with the native 32-bit count limit.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not positive.
    pub fn new(size: i32) -> Self {
        Self::with_count_limit(size, NATIVE_COUNT_LIMIT)
    }

    /// Create a group whose native calls accept at most `limit` per count.
    ///
    /// # Panics
    ///
    /// Panics if `size` is not positive.
    pub fn with_count_limit(size: i32, limit: u64) -> Self {
        assert!(size > 0, "a group needs at least one participant");
        let state = State {
            next_handle: DERIVED_HANDLE_BASE,
            ordered_lengths: vec![0; size as usize],
            ..State::default()
        };
        SimGroup {
            shared: Arc::new(Shared {
                size,
                limit: limit.clamp(1, NATIVE_COUNT_LIMIT),
                state: Mutex::new(state),
                barrier: Barrier::new(size as usize),
            }),
        }
    }

    /// File handle of participant `rank`.
    ///
    /// # Panics
    ///
    /// Panics if `rank` is outside the group.
    pub fn participant(&self, rank: i32) -> SimFile {
        assert!(
            (0..self.shared.size).contains(&rank),
            "rank {rank} outside group of {}",
            self.shared.size
        );
        SimFile {
            shared: Arc::clone(&self.shared),
            rank,
        }
    }

    /// File handles of every participant, in rank order.
    pub fn participants(&self) -> Vec<SimFile> {
        (0..self.shared.size).map(|r| self.participant(r)).collect()
    }

    /// Number of participants.
    pub fn size(&self) -> i32 {
        self.shared.size
    }

    /// Native count limit enforced by this group.
    pub fn count_limit(&self) -> u64 {
        self.shared.limit
    }

    /// Snapshot of the file contents.
    pub fn contents(&self) -> Vec<u8> {
        self.shared.lock().data.clone()
    }

    /// Current file length in bytes.
    pub fn len(&self) -> u64 {
        self.shared.lock().data.len() as u64
    }

    /// Returns `true` if nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Derived datatype counters.
    pub fn type_stats(&self) -> TypeStats {
        self.shared.lock().stats
    }

    /// Returns `true` if `datatype` is a live, committed derived type.
    pub fn is_committed(&self, datatype: RawDatatype) -> bool {
        self.shared
            .lock()
            .types
            .get(&datatype.0)
            .is_some_and(|t| t.committed)
    }

    /// Every native transfer issued so far, in issue order.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.shared.lock().log.clone()
    }

    /// Make type construction fail with `code` (or succeed again with `None`).
    pub fn refuse_type_construction(&self, code: Option<i32>) {
        self.shared.lock().refuse_types = code;
    }

    /// Make type commit fail with `code` (or succeed again with `None`).
    pub fn fail_type_commit(&self, code: Option<i32>) {
        self.shared.lock().fail_commit = code;
    }

    /// Make the next transfer issued by `rank` fail with `code`.
    pub fn fail_next_transfer(&self, rank: i32, code: i32) {
        self.shared.lock().fail_next.insert(rank, code);
    }
}

/// One participant's handle on a simulated file.
pub struct SimFile {
    shared: Arc<Shared>,
    rank: i32,
}

impl SimFile {
    /// Bytes covered by `count` instances of `datatype`, after native argument checks.
    fn extent(&self, state: &State, count: i32, datatype: RawDatatype) -> NativeResult<usize> {
        if count < 0 || count as u64 > self.shared.limit {
            return Err(ERR_COUNT);
        }
        let type_size = if datatype.is_derived() {
            match state.types.get(&datatype.0) {
                Some(t) if t.committed => t.block_length as u64 * t.base.size() as u64,
                _ => return Err(ERR_TYPE),
            }
        } else {
            DatatypeTag::from_raw(datatype.0).ok_or(ERR_TYPE)?.size() as u64
        };
        usize::try_from(count as u64 * type_size).map_err(|_| ERR_COUNT)
    }

    /// Size of the base element underlying `datatype`.
    fn element_size(state: &State, datatype: RawDatatype) -> usize {
        match state.types.get(&datatype.0) {
            Some(t) => t.base.size(),
            None => DatatypeTag::from_raw(datatype.0).map_or(1, DatatypeTag::size),
        }
    }

    fn record(
        &self,
        state: &mut State,
        op: Operation,
        offset: Option<u64>,
        count: i32,
        datatype: RawDatatype,
    ) {
        state.log.push(TransferRecord {
            rank: self.rank,
            op,
            offset,
            count,
            datatype,
        });
    }

    fn store(
        &self,
        op: Operation,
        offset: Option<u64>,
        position: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut state = self.shared.lock();
        if let Some(code) = state.fail_next.remove(&self.rank) {
            return Err(code);
        }
        let len = self.extent(&state, count, datatype)?;
        let src = buf.get(..len).ok_or(ERR_BUFFER)?;
        self.record(&mut state, op, offset, count, datatype);

        let start = usize::try_from(position).map_err(|_| ERR_IO)?;
        let end = start.checked_add(len).ok_or(ERR_IO)?;
        if state.data.len() < end {
            state.data.resize(end, 0);
        }
        state.data[start..end].copy_from_slice(src);
        Ok(Status {
            count: (len / Self::element_size(&state, datatype)) as i64,
            block_length: 1,
        })
    }

    fn load(
        &self,
        op: Operation,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut state = self.shared.lock();
        if let Some(code) = state.fail_next.remove(&self.rank) {
            return Err(code);
        }
        let len = self.extent(&state, count, datatype)?;
        if buf.len() < len {
            return Err(ERR_BUFFER);
        }
        self.record(&mut state, op, Some(offset), count, datatype);

        // reads past the end come back short, like a native read at EOF
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(state.data.len());
        let available = (state.data.len() - start).min(len);
        buf[..available].copy_from_slice(&state.data[start..start + available]);
        let elements = available / Self::element_size(&state, datatype);
        Ok(Status {
            count: elements as i64,
            block_length: 1,
        })
    }

    fn synchronize(&self) {
        self.shared.barrier.wait();
    }
}

impl NativeFile for SimFile {
    fn count_limit(&self) -> u64 {
        self.shared.limit
    }

    fn type_contiguous(&self, block_length: i32, base: RawDatatype) -> NativeResult<RawDatatype> {
        let mut state = self.shared.lock();
        if let Some(code) = state.refuse_types {
            return Err(code);
        }
        if block_length < 0 || base.is_derived() {
            return Err(ERR_TYPE);
        }
        let base = DatatypeTag::from_raw(base.0).ok_or(ERR_TYPE)?;
        let handle = state.next_handle;
        state.next_handle += 1;
        state.types.insert(
            handle,
            TypeEntry {
                base,
                block_length,
                committed: false,
            },
        );
        state.stats.created += 1;
        state.stats.live += 1;
        Ok(RawDatatype(handle))
    }

    fn type_commit(&self, datatype: RawDatatype) -> NativeResult<()> {
        let mut state = self.shared.lock();
        if let Some(code) = state.fail_commit {
            return Err(code);
        }
        let entry = state.types.get_mut(&datatype.0).ok_or(ERR_TYPE)?;
        entry.committed = true;
        Ok(())
    }

    fn type_free(&self, datatype: RawDatatype) -> NativeResult<()> {
        let mut state = self.shared.lock();
        state.types.remove(&datatype.0).ok_or(ERR_TYPE)?;
        state.stats.freed += 1;
        state.stats.live -= 1;
        Ok(())
    }

    fn write_at(
        &self,
        offset: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        self.store(Operation::WriteAt, Some(offset), offset, buf, count, datatype)
    }

    fn read_at(
        &self,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        self.load(Operation::ReadAt, offset, buf, count, datatype)
    }

    fn write_at_all(
        &self,
        offset: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let result = self.store(Operation::WriteAtAll, Some(offset), offset, buf, count, datatype);
        self.synchronize();
        result
    }

    fn read_at_all(
        &self,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let result = self.load(Operation::ReadAtAll, offset, buf, count, datatype);
        self.synchronize();
        result
    }

    fn write_ordered(
        &self,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let rank = self.rank as usize;

        // announce this participant's length; failures still join every barrier
        let announced = {
            let mut state = self.shared.lock();
            let len = self.extent(&state, count, datatype);
            state.ordered_lengths[rank] = len.map_or(0, |l| l as u64);
            len
        };
        self.synchronize();

        let position = {
            let state = self.shared.lock();
            state.shared_pointer + state.ordered_lengths[..rank].iter().sum::<u64>()
        };
        let result = announced
            .and_then(|_| self.store(Operation::WriteOrdered, None, position, buf, count, datatype));
        self.synchronize();

        if rank == 0 {
            let mut state = self.shared.lock();
            let total: u64 = state.ordered_lengths.iter().sum();
            state.shared_pointer += total;
            state.ordered_lengths.iter_mut().for_each(|l| *l = 0);
        }
        self.synchronize();
        result
    }
}

impl Group for SimFile {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> i32 {
        self.shared.size
    }

    fn abort(&self, code: i32) -> ! {
        panic!("participant {} aborted with code {code}", self.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const U8: RawDatatype = RawDatatype(DatatypeTag::U8 as i32);

    #[test]
    fn independent_write_then_read() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        file.write_at(4, b"hello", 5, U8).unwrap();
        assert_eq!(group.contents(), b"\0\0\0\0hello");

        let mut back = [0u8; 5];
        let status = file.read_at(4, &mut back, 5, U8).unwrap();
        assert_eq!(&back, b"hello");
        assert_eq!(status.count, 5);
    }

    #[test]
    fn read_past_end_is_short() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        file.write_at(0, b"abc", 3, U8).unwrap();
        let mut back = [0u8; 8];
        let status = file.read_at(1, &mut back, 8, U8).unwrap();
        assert_eq!(status.count, 2);
        assert_eq!(&back[..2], b"bc");
    }

    #[test]
    fn count_limit_is_enforced() {
        let group = SimGroup::with_count_limit(1, 4);
        let file = group.participant(0);
        assert_eq!(file.write_at(0, b"hello", 5, U8), Err(ERR_COUNT));
        assert_eq!(file.write_at(0, b"hello", -1, U8), Err(ERR_COUNT));
        assert!(group.transfers().is_empty());
    }

    #[test]
    fn derived_types_size_transfers() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        let block = file.type_contiguous(3, U8).unwrap();
        // uncommitted types cannot be used
        assert_eq!(file.write_at(0, b"abcdef", 2, block), Err(ERR_TYPE));
        file.type_commit(block).unwrap();
        let status = file.write_at(0, b"abcdef", 2, block).unwrap();
        assert_eq!(group.contents(), b"abcdef");
        assert_eq!(status.count, 6);

        // a short read ending inside a block still counts every element
        let mut back = [0u8; 9];
        let status = file.read_at(1, &mut back, 3, block).unwrap();
        assert_eq!(status.count, 5);
        assert_eq!(&back[..5], b"bcdef");
        file.type_free(block).unwrap();
        assert_eq!(file.type_free(block), Err(ERR_TYPE));
        assert_eq!(group.type_stats().live, 0);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        assert_eq!(file.write_at(0, b"ab", 3, U8), Err(ERR_BUFFER));
        let mut small = [0u8; 2];
        assert_eq!(file.read_at(0, &mut small, 3, U8), Err(ERR_BUFFER));
    }

    #[test]
    fn injected_failure_hits_once() {
        let group = SimGroup::new(1);
        let file = group.participant(0);
        group.fail_next_transfer(0, ERR_IO);
        assert_eq!(file.write_at(0, b"x", 1, U8), Err(ERR_IO));
        assert!(file.write_at(0, b"x", 1, U8).is_ok());
    }

    #[test]
    fn ordered_writes_follow_rank_and_advance_pointer() {
        let group = SimGroup::new(3);
        std::thread::scope(|s| {
            for file in group.participants() {
                s.spawn(move || {
                    let rank = file.rank();
                    let len = rank as usize + 1;
                    let data = vec![b'a' + rank as u8; len];
                    file.write_ordered(&data, len as i32, U8).unwrap();
                    file.write_ordered(&data, len as i32, U8).unwrap();
                });
            }
        });
        assert_eq!(group.contents(), b"abbcccabbccc");
        let ordered = group
            .transfers()
            .iter()
            .filter(|t| t.op == Operation::WriteOrdered && t.offset.is_none())
            .count();
        assert_eq!(ordered, 6);
    }

    #[test]
    #[should_panic(expected = "aborted with code 7")]
    fn abort_panics() {
        SimGroup::new(1).participant(0).abort(7);
    }

    #[test]
    #[should_panic(expected = "outside group")]
    fn participant_rank_is_checked() {
        let _ = SimGroup::new(2).participant(2);
    }
}
