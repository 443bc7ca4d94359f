//! # bigcount-io
//!
//! Positioned MPI-IO transfers with 64-bit element counts.
//!
//! The MPI-IO routines take their element count as a C `int`, so a single
//! call moves at most `i32::MAX` elements. This crate lifts that limit
//! without changing what the call means: a count `n` is rewritten as
//! `outer_count` instances of a contiguous derived type of `block_length`
//! elements, with `outer_count * block_length == n` exactly, and the one
//! native call is issued with that pair. Offsets, ordering, collective
//! participation and the bytes on disk are those of the native routine.
//!
//! - [`decompose()`] — the count decomposition (pure, deterministic)
//! - [`DerivedBlockType`] — scoped construction and release of the block type
//! - [`LargeCountIo`] — `write_at_c`, `read_at_c`, `write_at_all_c`,
//!   `read_at_all_c`, `write_ordered_c` on any [`NativeFile`]
//! - [`Error`] / [`ConfigurationFault`] — uniform result codes, and the
//!   unrecoverable group misconfiguration
//!
//! ## Backends
//!
//! | Backend | Availability | Use |
//! |---------|--------------|-----|
//! | `File` | feature `mpi` | MPI-IO through a C shim linked against the MPI runtime |
//! | [`sim::SimFile`] | always | in-process group for tests and demos |
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "mpi")]
//! # fn main() -> Result<(), bigcount_io::Error> {
//! use bigcount_io::{AccessMode, File, Group, Info, LargeCountIo, Mpi};
//!
//! let mpi = Mpi::init()?;
//! let world = mpi.world();
//! let file = File::open(&world, "io.data", AccessMode::CREATE | AccessMode::WRONLY, &Info::null())?;
//!
//! // 2^32 + 2 bytes per rank: one MPI_File_write_at_all call per rank
//! let n = (1u64 << 32) + 2;
//! let data = vec![b'?'; n as usize];
//! file.write_at_all_c(world.rank() as u64 * n, &data, n)?;
//! file.sync()?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "mpi"))]
//! # fn main() {}
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `mpi`   | Build the C shim and link MPI (`File`, `Mpi`, `Communicator`, `Info`) | — |
//! | `debug` | Handle-table tracing from the C shim on stderr | `mpi` |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod datatype;
mod decompose;
mod derived;
mod error;
mod io;
mod native;
pub mod sim;
mod status;

#[cfg(feature = "mpi")]
mod comm;
#[cfg(feature = "mpi")]
mod ffi;
#[cfg(feature = "mpi")]
mod file;
#[cfg(feature = "mpi")]
mod info;

pub use datatype::{DatatypeTag, MpiDatatype};
pub use decompose::{decompose, decompose_with_limit, Decomposition};
pub use derived::DerivedBlockType;
pub use error::{
    require_group_size, result_code, ConfigurationFault, Error, Result,
    DECOMPOSITION_FAILURE_CODE, INTERNAL_ERROR_CODE, INVALID_BUFFER_CODE, SUCCESS,
};
pub use io::LargeCountIo;
pub use native::{
    Group, NativeFile, NativeResult, Operation, RawDatatype, DERIVED_HANDLE_BASE,
    NATIVE_COUNT_LIMIT,
};
pub use status::Status;

#[cfg(feature = "mpi")]
pub use comm::Communicator;
#[cfg(feature = "mpi")]
pub use file::{AccessMode, File};
#[cfg(feature = "mpi")]
pub use info::Info;

#[cfg(feature = "mpi")]
pub use environment::{Mpi, ThreadLevel};

#[cfg(feature = "mpi")]
mod environment {
    use std::marker::PhantomData;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::comm::Communicator;
    use crate::error::{Error, Result};
    use crate::ffi;

    /// Global flag tracking whether MPI has been initialized
    static MPI_INITIALIZED: AtomicBool = AtomicBool::new(false);

    /// MPI thread support levels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    #[repr(i32)]
    pub enum ThreadLevel {
        /// Only single-threaded execution
        Single = 0,
        /// Multi-threaded, but MPI calls only from main thread
        Funneled = 1,
        /// Multi-threaded, but MPI calls serialized by user
        Serialized = 2,
        /// Full multi-threaded support
        Multiple = 3,
    }

    /// MPI environment handle.
    ///
    /// Initializing the runtime is a precondition of every MPI-backed
    /// operation; there can only be one instance at a time, and dropping it
    /// finalizes MPI (closing any file or freeing any datatype still held by
    /// the shim).
    pub struct Mpi {
        thread_level: ThreadLevel,
        /// Marker to make Mpi !Send and !Sync
        _marker: PhantomData<*const ()>,
    }

    impl Mpi {
        /// Initialize MPI with single-threaded support.
        ///
        /// # Errors
        ///
        /// Returns an error if MPI is already initialized or if initialization fails.
        pub fn init() -> Result<Self> {
            Self::init_thread(ThreadLevel::Single)
        }

        /// Initialize MPI requesting at least `required` thread support.
        pub fn init_thread(required: ThreadLevel) -> Result<Self> {
            if MPI_INITIALIZED.swap(true, Ordering::SeqCst) {
                return Err(Error::AlreadyInitialized);
            }

            let mut provided: i32 = 0;
            let ret = unsafe { ffi::bigcount_init_thread(required as i32, &mut provided) };
            if ret != 0 {
                MPI_INITIALIZED.store(false, Ordering::SeqCst);
                return Err(Error::from_code(ret));
            }

            let thread_level = match provided {
                0 => ThreadLevel::Single,
                1 => ThreadLevel::Funneled,
                2 => ThreadLevel::Serialized,
                _ => ThreadLevel::Multiple,
            };
            tracing::debug!(?thread_level, "MPI initialized");

            Ok(Mpi {
                thread_level,
                _marker: PhantomData,
            })
        }

        /// Get the thread support level that was provided.
        pub fn thread_level(&self) -> ThreadLevel {
            self.thread_level
        }

        /// Get a handle to `MPI_COMM_WORLD`.
        pub fn world(&self) -> Communicator {
            Communicator::world()
        }

        /// Wall-clock time in seconds.
        pub fn wtime() -> f64 {
            unsafe { ffi::bigcount_wtime() }
        }

        /// MPI library version string.
        pub fn version() -> Result<String> {
            let mut buf = [0u8; 8192];
            let mut len: i32 = 0;
            let ret = unsafe { ffi::bigcount_get_version(buf.as_mut_ptr().cast(), &mut len) };
            Error::check(ret)?;

            let len = (len.max(0) as usize).min(buf.len());
            let s = std::str::from_utf8(&buf[..len])
                .map_err(|_| Error::Internal("Invalid UTF-8 in version string".into()))?;
            Ok(s.trim_end_matches(['\0', '\n']).to_string())
        }

    }

    impl Drop for Mpi {
        fn drop(&mut self) {
            if MPI_INITIALIZED.load(Ordering::SeqCst) {
                unsafe {
                    ffi::bigcount_finalize();
                }
                MPI_INITIALIZED.store(false, Ordering::SeqCst);
            }
        }
    }
}
