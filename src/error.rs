//! Error types for bigcount-io
//!
//! Every recoverable failure of a dispatched operation lands in [`Error`], and
//! [`Error::code()`] maps it into a single integer code space that is
//! compatible with the wrapped MPI layer: native codes pass through unchanged,
//! failures that originate in this crate use negative codes so they can never
//! collide with an MPI error code.
//!
//! Misconfiguration of the participant group is not an [`Error`]: it is a
//! [`ConfigurationFault`], and the only thing to do with it is
//! [`ConfigurationFault::abort()`].

use thiserror::Error;

use crate::native::Group;

/// Result type for bigcount-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Code reported for a successful operation, identical to `MPI_SUCCESS`.
pub const SUCCESS: i32 = 0;

/// Code reported when a count has no admissible two-factor decomposition.
pub const DECOMPOSITION_FAILURE_CODE: i32 = -1;

/// Code reported when the caller's buffer is shorter than the requested count.
pub const INVALID_BUFFER_CODE: i32 = -2;

/// Code reported for internal errors of the Rust layer.
pub const INTERNAL_ERROR_CODE: i32 = -3;

/// Error types for large-count I/O operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// MPI has already been initialized
    #[error("MPI has already been initialized")]
    AlreadyInitialized,

    /// No `(outer_count, block_length)` pair within the native limit exists
    #[error("count {count} cannot be expressed as two factors no larger than {limit}")]
    Decomposition {
        /// Requested element count
        count: u64,
        /// Native count limit that applied
        limit: u64,
    },

    /// The runtime refused to construct or commit the derived block type
    #[error("derived datatype construction failed (code {code})")]
    TypeConstruction {
        /// Native error code
        code: i32,
    },

    /// The wrapped native primitive failed
    #[error("MPI error (code {code})")]
    Native {
        /// Native error code, unchanged
        code: i32,
    },

    /// Buffer holds fewer elements than requested
    #[error("buffer holds {available} elements but {requested} were requested")]
    InvalidBuffer {
        /// Elements requested
        requested: u64,
        /// Elements available in the buffer
        available: u64,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an error from a native MPI return code.
    ///
    /// # Panics
    ///
    /// Panics if called with the success code.
    pub fn from_code(code: i32) -> Self {
        assert_ne!(code, SUCCESS, "from_code called with success code");
        Error::Native { code }
    }

    /// Check a native return code, returning `Ok(())` for success.
    pub fn check(code: i32) -> Result<()> {
        if code == SUCCESS {
            Ok(())
        } else {
            Err(Error::from_code(code))
        }
    }

    /// The uniform result code for this error.
    ///
    /// Native and type construction failures report the native code
    /// unchanged; errors raised by this crate report negative codes.
    pub fn code(&self) -> i32 {
        match self {
            Error::Native { code } | Error::TypeConstruction { code } => *code,
            Error::Decomposition { .. } => DECOMPOSITION_FAILURE_CODE,
            Error::InvalidBuffer { .. } => INVALID_BUFFER_CODE,
            Error::AlreadyInitialized | Error::Internal(_) => INTERNAL_ERROR_CODE,
        }
    }

    /// Returns `true` when the error came from the wrapped native layer.
    pub fn is_native(&self) -> bool {
        matches!(self, Error::Native { .. } | Error::TypeConstruction { .. })
    }
}

/// Collapse an operation result into the uniform result code.
///
/// `Ok` maps to [`SUCCESS`], so callers can keep the native success check.
pub fn result_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}

/// A caller-side invariant on the participant group was violated.
///
/// There is no conversion into [`Error`]; participants would compute
/// inconsistent file offsets after a fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationFault {
    /// The group does not have the number of participants the caller requires.
    #[error("group has {actual} participants, {expected} are required")]
    ParticipantCount {
        /// Required group size
        expected: i32,
        /// Actual group size
        actual: i32,
    },
}

impl ConfigurationFault {
    /// Code passed to the runtime abort.
    pub const ABORT_CODE: i32 = 1;

    /// Check that `group` has exactly `expected` participants.
    pub fn check_group_size<G: Group + ?Sized>(
        group: &G,
        expected: i32,
    ) -> std::result::Result<(), ConfigurationFault> {
        let actual = group.size();
        if actual == expected {
            Ok(())
        } else {
            Err(ConfigurationFault::ParticipantCount { expected, actual })
        }
    }

    /// Abort every participant of `group`. Never returns.
    pub fn abort<G: Group + ?Sized>(self, group: &G) -> ! {
        tracing::error!(rank = group.rank(), fault = %self, "unrecoverable configuration fault");
        group.abort(Self::ABORT_CODE)
    }
}

/// Abort the whole group unless it has exactly `expected` participants.
pub fn require_group_size<G: Group + ?Sized>(group: &G, expected: i32) {
    if let Err(fault) = ConfigurationFault::check_group_size(group, expected) {
        fault.abort(group);
    }
}
