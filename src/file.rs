//! MPI-IO file handles.
//!
//! [`File`] is the MPI backend of [`NativeFile`]: each primitive maps to one
//! MPI routine through the C shim. Large-count transfers come from the
//! [`LargeCountIo`](crate::LargeCountIo) methods every `File` has.
//!
//! # Example
//!
//! ```no_run
//! use bigcount_io::{AccessMode, File, Group, Info, LargeCountIo, Mpi};
//!
//! fn main() -> bigcount_io::Result<()> {
//!     let mpi = Mpi::init()?;
//!     let world = mpi.world();
//!     let file = File::open(&world, "io.data", AccessMode::CREATE | AccessMode::WRONLY, &Info::null())?;
//!
//!     let n = (1usize << 32) + 2;
//!     let data = vec![b'?'; n];
//!     file.write_slice_at_all(world.rank() as u64 * n as u64, &data)?;
//!     file.sync()?;
//!     file.close()
//! }
//! ```

use std::ffi::CString;
use std::marker::PhantomData;
use std::os::raw::c_void;
use std::path::Path;

use bitflags::bitflags;

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::ffi;
use crate::info::Info;
use crate::native::{NativeFile, NativeResult, RawDatatype};
use crate::status::Status;

bitflags! {
    /// File access mode; values match the `BIGCOUNT_MODE_*` defines in `csrc/bigcount.h`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMode: i32 {
        /// `MPI_MODE_RDONLY`
        const RDONLY = 0x01;
        /// `MPI_MODE_WRONLY`
        const WRONLY = 0x02;
        /// `MPI_MODE_RDWR`
        const RDWR = 0x04;
        /// `MPI_MODE_CREATE`
        const CREATE = 0x08;
        /// `MPI_MODE_EXCL`
        const EXCL = 0x10;
        /// `MPI_MODE_DELETE_ON_CLOSE`
        const DELETE_ON_CLOSE = 0x20;
        /// `MPI_MODE_UNIQUE_OPEN`
        const UNIQUE_OPEN = 0x40;
        /// `MPI_MODE_APPEND`
        const APPEND = 0x80;
    }
}

impl AccessMode {
    /// Exactly one of `RDONLY`, `WRONLY`, `RDWR` must be set, and a
    /// read-only file cannot be created.
    pub fn is_valid(self) -> bool {
        let access = self & (AccessMode::RDONLY | AccessMode::WRONLY | AccessMode::RDWR);
        access.bits().count_ones() == 1
            && !(self.contains(AccessMode::RDONLY)
                && self.intersects(AccessMode::CREATE | AccessMode::EXCL))
    }
}

fn path_to_cstring(path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| Error::Internal("file path is not valid UTF-8".into()))?;
    CString::new(s).map_err(|_| Error::Internal("file path contains null byte".into()))
}

/// A file opened collectively on a communicator.
///
/// Closed on drop if [`close()`](Self::close) was not called.
pub struct File {
    handle: i32,
    comm: Communicator,
    open: bool,
    _marker: PhantomData<*mut ()>,
}

impl File {
    /// Open `path` on every process of `comm` (collective).
    pub fn open<P: AsRef<Path>>(
        comm: &Communicator,
        path: P,
        mode: AccessMode,
        info: &Info,
    ) -> Result<Self> {
        if !mode.is_valid() {
            return Err(Error::Internal(format!("invalid access mode {mode:?}")));
        }
        let c_path = path_to_cstring(path.as_ref())?;
        let mut handle: i32 = 0;
        let ret = unsafe {
            ffi::bigcount_file_open(
                comm.raw_handle(),
                c_path.as_ptr(),
                mode.bits(),
                info.raw_handle(),
                &mut handle,
            )
        };
        Error::check(ret)?;
        tracing::debug!(path = %path.as_ref().display(), ?mode, handle, "file opened");
        Ok(File {
            handle,
            comm: comm.clone(),
            open: true,
            _marker: PhantomData,
        })
    }

    /// Delete `path` (not collective).
    pub fn delete<P: AsRef<Path>>(path: P, info: &Info) -> Result<()> {
        let c_path = path_to_cstring(path.as_ref())?;
        let ret = unsafe { ffi::bigcount_file_delete(c_path.as_ptr(), info.raw_handle()) };
        Error::check(ret)
    }

    /// The communicator the file was opened on.
    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    /// Flush written data to storage (collective).
    pub fn sync(&self) -> Result<()> {
        let ret = unsafe { ffi::bigcount_file_sync(self.handle) };
        Error::check(ret)
    }

    /// Current file size in bytes.
    pub fn size(&self) -> Result<u64> {
        let mut size: i64 = 0;
        let ret = unsafe { ffi::bigcount_file_get_size(self.handle, &mut size) };
        Error::check(ret)?;
        Ok(size.max(0) as u64)
    }

    /// Close the file (collective), reporting failures.
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        let ret = unsafe { ffi::bigcount_file_close(self.handle) };
        Error::check(ret)
    }

    fn finish(ret: i32, actual_count: i64) -> NativeResult<Status> {
        if ret == 0 {
            Ok(Status {
                count: actual_count,
                block_length: 1,
            })
        } else {
            Err(ret)
        }
    }
}

impl NativeFile for File {
    fn type_contiguous(&self, block_length: i32, base: RawDatatype) -> NativeResult<RawDatatype> {
        let mut handle: i32 = 0;
        let ret = unsafe { ffi::bigcount_type_contiguous(block_length, base.0, &mut handle) };
        if ret == 0 {
            Ok(RawDatatype(handle))
        } else {
            Err(ret)
        }
    }

    fn type_commit(&self, datatype: RawDatatype) -> NativeResult<()> {
        match unsafe { ffi::bigcount_type_commit(datatype.0) } {
            0 => Ok(()),
            code => Err(code),
        }
    }

    fn type_free(&self, datatype: RawDatatype) -> NativeResult<()> {
        match unsafe { ffi::bigcount_type_free(datatype.0) } {
            0 => Ok(()),
            code => Err(code),
        }
    }

    fn write_at(
        &self,
        offset: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut actual: i64 = 0;
        let ret = unsafe {
            ffi::bigcount_file_write_at(
                self.handle,
                offset,
                buf.as_ptr().cast::<c_void>(),
                count,
                datatype.0,
                &mut actual,
            )
        };
        Self::finish(ret, actual)
    }

    fn read_at(
        &self,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut actual: i64 = 0;
        let ret = unsafe {
            ffi::bigcount_file_read_at(
                self.handle,
                offset,
                buf.as_mut_ptr().cast::<c_void>(),
                count,
                datatype.0,
                &mut actual,
            )
        };
        Self::finish(ret, actual)
    }

    fn write_at_all(
        &self,
        offset: u64,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut actual: i64 = 0;
        let ret = unsafe {
            ffi::bigcount_file_write_at_all(
                self.handle,
                offset,
                buf.as_ptr().cast::<c_void>(),
                count,
                datatype.0,
                &mut actual,
            )
        };
        Self::finish(ret, actual)
    }

    fn read_at_all(
        &self,
        offset: u64,
        buf: &mut [u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut actual: i64 = 0;
        let ret = unsafe {
            ffi::bigcount_file_read_at_all(
                self.handle,
                offset,
                buf.as_mut_ptr().cast::<c_void>(),
                count,
                datatype.0,
                &mut actual,
            )
        };
        Self::finish(ret, actual)
    }

    fn write_ordered(
        &self,
        buf: &[u8],
        count: i32,
        datatype: RawDatatype,
    ) -> NativeResult<Status> {
        let mut actual: i64 = 0;
        let ret = unsafe {
            ffi::bigcount_file_write_ordered(
                self.handle,
                buf.as_ptr().cast::<c_void>(),
                count,
                datatype.0,
                &mut actual,
            )
        };
        Self::finish(ret, actual)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.open {
            // SAFETY: handle came from bigcount_file_open and was not closed.
            let ret = unsafe { ffi::bigcount_file_close(self.handle) };
            if ret != 0 {
                tracing::warn!(handle = self.handle, code = ret, "closing file on drop failed");
            }
        }
    }
}
