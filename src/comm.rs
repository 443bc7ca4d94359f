//! The communicator a file is opened on.

use crate::error::{Error, Result};
use crate::ffi;
use crate::native::Group;
use std::marker::PhantomData;

/// An MPI communicator.
///
/// Files are opened collectively over a communicator, and its rank order is
/// the order in which rank-ordered writes land in the file.
///
/// # Example
///
/// ```no_run
/// use bigcount_io::{Group, Mpi};
///
/// let mpi = Mpi::init().unwrap();
/// let world = mpi.world();
///
/// println!("I am rank {} of {}", world.rank(), world.size());
/// ```
#[derive(Clone)]
pub struct Communicator {
    handle: i32,
    /// Marker to prevent Send/Sync (MPI communicators are not thread-safe)
    _marker: PhantomData<*mut ()>,
}

impl Communicator {
    /// Get a handle to `MPI_COMM_WORLD`.
    pub(crate) fn world() -> Self {
        Communicator {
            handle: unsafe { ffi::bigcount_comm_world() },
            _marker: PhantomData,
        }
    }

    /// Get the raw communicator handle (for advanced use).
    pub fn raw_handle(&self) -> i32 {
        self.handle
    }

    /// Barrier synchronization.
    ///
    /// All processes in the communicator must call this function. No process
    /// will return until all processes have entered the barrier.
    pub fn barrier(&self) -> Result<()> {
        let ret = unsafe { ffi::bigcount_barrier(self.handle) };
        Error::check(ret)
    }
}

impl Group for Communicator {
    fn rank(&self) -> i32 {
        let mut rank: i32 = 0;
        unsafe { ffi::bigcount_comm_rank(self.handle, &mut rank) };
        rank
    }

    fn size(&self) -> i32 {
        let mut size: i32 = 0;
        unsafe { ffi::bigcount_comm_size(self.handle, &mut size) };
        size
    }

    fn abort(&self, code: i32) -> ! {
        unsafe { ffi::bigcount_abort(self.handle, code) };
        // MPI_Abort is not required to terminate the caller
        std::process::abort()
    }
}
