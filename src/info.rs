//! MPI Info objects carrying file hints.
//!
//! [`Info`] wraps an `MPI_Info` handle. It is passed to
//! [`File::open()`](crate::File::open) and [`File::delete()`](crate::File::delete)
//! to steer the MPI-IO layer, e.g. collective buffering or striping:
//!
//! ```no_run
//! use bigcount_io::Info;
//!
//! let info = Info::with_hints([("romio_cb_write", "enable"), ("striping_factor", "4")]).unwrap();
//! assert_eq!(info.get("striping_factor").unwrap(), Some("4".to_string()));
//! ```

use crate::error::{Error, Result};
use crate::ffi;
use std::ffi::{CStr, CString};

/// Maximum buffer size for retrieving hint values from MPI.
const INFO_VALUE_MAX_LEN: i32 = 1024;

/// A set of MPI-IO hints.
///
/// The underlying MPI info object is freed when the `Info` is dropped.
/// [`Info::null()`] stands for `MPI_INFO_NULL` and owns nothing.
pub struct Info {
    handle: i32,
    is_null: bool,
}

impl Info {
    /// Create an empty info object.
    ///
    /// # Errors
    ///
    /// Returns an error if the MPI info object could not be created (e.g.,
    /// the shim's info handle table is full).
    pub fn new() -> Result<Self> {
        let mut handle: i32 = 0;
        let ret = unsafe { ffi::bigcount_info_create(&mut handle) };
        Error::check(ret)?;
        Ok(Info {
            handle,
            is_null: false,
        })
    }

    /// Create an info object holding `hints`.
    pub fn with_hints<'a, I>(hints: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let info = Info::new()?;
        for (key, value) in hints {
            info.set(key, value)?;
        }
        Ok(info)
    }

    /// `MPI_INFO_NULL`: no hints.
    pub fn null() -> Self {
        Info {
            handle: -1,
            is_null: true,
        }
    }

    /// Set a hint, replacing any previous value for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error on `MPI_INFO_NULL`, if the key or value contains a
    /// null byte, or if the MPI operation fails.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.is_null {
            return Err(Error::Internal(
                "cannot set a hint on MPI_INFO_NULL".into(),
            ));
        }
        let c_key =
            CString::new(key).map_err(|_| Error::Internal("hint key contains null byte".into()))?;
        let c_value = CString::new(value)
            .map_err(|_| Error::Internal("hint value contains null byte".into()))?;
        let ret = unsafe { ffi::bigcount_info_set(self.handle, c_key.as_ptr(), c_value.as_ptr()) };
        Error::check(ret)
    }

    /// Get the value of a hint, `None` if it is not set.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        if self.is_null {
            return Err(Error::Internal(
                "cannot read a hint from MPI_INFO_NULL".into(),
            ));
        }
        let c_key =
            CString::new(key).map_err(|_| Error::Internal("hint key contains null byte".into()))?;
        let mut buf = vec![0u8; INFO_VALUE_MAX_LEN as usize];
        let mut valuelen: i32 = INFO_VALUE_MAX_LEN;
        let mut flag: i32 = 0;
        let ret = unsafe {
            ffi::bigcount_info_get(
                self.handle,
                c_key.as_ptr(),
                buf.as_mut_ptr().cast(),
                &mut valuelen,
                &mut flag,
            )
        };
        Error::check(ret)?;
        if flag == 0 {
            return Ok(None);
        }
        // SAFETY: the shim writes a null-terminated string into buf.
        let c_str = unsafe { CStr::from_ptr(buf.as_ptr().cast()) };
        let value = c_str
            .to_str()
            .map_err(|_| Error::Internal("hint value is not valid UTF-8".into()))?;
        Ok(Some(value.to_string()))
    }

    /// Raw handle for the shim; `-1` for `MPI_INFO_NULL`.
    pub fn raw_handle(&self) -> i32 {
        self.handle
    }
}

impl Drop for Info {
    fn drop(&mut self) {
        if !self.is_null && self.handle >= 0 {
            // SAFETY: handle came from bigcount_info_create and is freed once.
            unsafe { ffi::bigcount_info_free(self.handle) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing below reaches the FFI: null objects and handle -1 short-circuit
    // before any shim call, including in Drop.

    fn detached() -> Info {
        Info {
            handle: -1,
            is_null: false,
        }
    }

    #[test]
    fn null_info_raw_handle() {
        assert_eq!(Info::null().raw_handle(), -1);
    }

    #[test]
    fn null_info_rejects_hints() {
        let info = Info::null();
        let err = info.set("striping_factor", "4").unwrap_err().to_string();
        assert!(err.contains("MPI_INFO_NULL"), "got: {err}");
        let err = info.get("striping_factor").unwrap_err().to_string();
        assert!(err.contains("MPI_INFO_NULL"), "got: {err}");
    }

    #[test]
    fn null_bytes_are_rejected() {
        let info = detached();
        for result in [
            info.set("key\0bad", "value"),
            info.set("key", "value\0bad"),
            info.get("key\0bad").map(|_| ()),
        ] {
            let err = result.unwrap_err().to_string();
            assert!(err.contains("null byte"), "got: {err}");
        }
    }
}
