//! The seam between the large-count core and a native positioned-I/O layer.
//!
//! [`NativeFile`] lists the primitives the dispatcher needs from an open file:
//! derived-type construction and release, plus the five transfer calls with
//! their native 32-bit `count` parameter. The MPI backend ([`File`](crate::File),
//! feature `mpi`) and the in-process [`sim`](crate::sim) backend implement it.
//!
//! Native failures cross the seam as raw error codes; classifying them is the
//! job of the dispatcher, not of the backend.

use crate::datatype::DatatypeTag;
use crate::status::Status;

/// Result of a native primitive: `Err` carries the native error code.
pub type NativeResult<T> = std::result::Result<T, i32>;

/// Native count limit: the largest value of a signed 32-bit count.
pub const NATIVE_COUNT_LIMIT: u64 = i32::MAX as u64;

/// First raw handle value used for derived datatypes.
///
/// Raw handles below this value are the predefined base types, numbered by
/// their [`DatatypeTag`]. Must match `BIGCOUNT_DERIVED_HANDLE_BASE` in
/// `csrc/bigcount.h`.
pub const DERIVED_HANDLE_BASE: i32 = 1024;

/// A raw datatype handle as understood by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawDatatype(pub i32);

impl RawDatatype {
    /// Returns `true` for handles of constructed (non-predefined) types.
    pub fn is_derived(self) -> bool {
        self.0 >= DERIVED_HANDLE_BASE
    }
}

impl From<DatatypeTag> for RawDatatype {
    fn from(tag: DatatypeTag) -> Self {
        RawDatatype(tag as i32)
    }
}

/// The five transfer primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `MPI_File_write_at`
    WriteAt,
    /// `MPI_File_read_at`
    ReadAt,
    /// `MPI_File_write_at_all`
    WriteAtAll,
    /// `MPI_File_read_at_all`
    ReadAtAll,
    /// `MPI_File_write_ordered`
    WriteOrdered,
}

impl Operation {
    /// Name of the wrapped MPI routine.
    pub fn mpi_name(self) -> &'static str {
        match self {
            Operation::WriteAt => "MPI_File_write_at",
            Operation::ReadAt => "MPI_File_read_at",
            Operation::WriteAtAll => "MPI_File_write_at_all",
            Operation::ReadAtAll => "MPI_File_read_at_all",
            Operation::WriteOrdered => "MPI_File_write_ordered",
        }
    }

    /// Returns `true` if every participant must make the matching call.
    pub fn is_collective(self) -> bool {
        matches!(
            self,
            Operation::WriteAtAll | Operation::ReadAtAll | Operation::WriteOrdered
        )
    }

    /// Returns `true` for writes.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::WriteAt | Operation::WriteAtAll | Operation::WriteOrdered
        )
    }
}

/// Native positioned-I/O primitives on one open file, as seen by one participant.
///
/// Every `count` is the native signed 32-bit count, expressed in instances of
/// `datatype`. Buffers are passed as bytes; the caller guarantees that
/// `buf.len()` covers `count` instances of `datatype`. Transfers report
/// [`Status::count`] in base elements, partial instances included.
pub trait NativeFile {
    /// Largest `count` a single native call accepts.
    fn count_limit(&self) -> u64 {
        NATIVE_COUNT_LIMIT
    }

    /// Construct a contiguous type of `block_length` instances of `base`.
    fn type_contiguous(&self, block_length: i32, base: RawDatatype) -> NativeResult<RawDatatype>;

    /// Commit a constructed type so it can be used in transfers.
    fn type_commit(&self, datatype: RawDatatype) -> NativeResult<()>;

    /// Release a constructed type.
    fn type_free(&self, datatype: RawDatatype) -> NativeResult<()>;

    /// Independent write at an explicit byte offset.
    fn write_at(
        &self,
        offset: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status>;

    /// Independent read at an explicit byte offset.
    fn read_at(
        &self,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status>;

    /// Collective write at an explicit byte offset.
    fn write_at_all(
        &self,
        offset: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status>;

    /// Collective read at an explicit byte offset.
    fn read_at_all(
        &self,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status>;

    /// Collective write through the shared file pointer, in rank order.
    fn write_ordered(&self, buf: &[u8], count: i32, datatype: RawDatatype)
        -> NativeResult<Status>;
}

/// A fixed-size group of participants.
pub trait Group {
    /// Rank of the calling participant.
    fn rank(&self) -> i32;

    /// Number of participants.
    fn size(&self) -> i32;

    /// Terminate every participant of the group.
    fn abort(&self, code: i32) -> !;
}
