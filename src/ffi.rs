//! Raw FFI bindings to the C wrapper layer.
//!
//! These are low-level unsafe functions. Use the safe wrappers in the parent module.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_double, c_int, c_void};

// Type aliases matching the C header
pub type int32_t = i32;
pub type int64_t = i64;
pub type uint64_t = u64;

extern "C" {
    // ============================================================
    // Initialization and Finalization
    // ============================================================

    pub fn bigcount_init_thread(required: c_int, provided: *mut c_int) -> c_int;
    pub fn bigcount_finalize() -> c_int;

    // ============================================================
    // Communicator Operations
    // ============================================================

    pub fn bigcount_comm_world() -> int32_t;
    pub fn bigcount_comm_rank(comm: int32_t, rank: *mut int32_t) -> c_int;
    pub fn bigcount_comm_size(comm: int32_t, size: *mut int32_t) -> c_int;
    pub fn bigcount_barrier(comm: int32_t) -> c_int;
    pub fn bigcount_abort(comm: int32_t, errorcode: int32_t) -> c_int;

    // ============================================================
    // Info Object Operations
    // ============================================================

    pub fn bigcount_info_create(info_handle: *mut int32_t) -> c_int;
    pub fn bigcount_info_free(info_handle: int32_t) -> c_int;
    pub fn bigcount_info_set(
        info_handle: int32_t,
        key: *const c_char,
        value: *const c_char,
    ) -> c_int;
    pub fn bigcount_info_get(
        info_handle: int32_t,
        key: *const c_char,
        value: *mut c_char,
        valuelen: *mut int32_t,
        flag: *mut int32_t,
    ) -> c_int;

    // ============================================================
    // Datatype Construction
    // ============================================================

    pub fn bigcount_type_contiguous(
        count: int32_t,
        oldtype: int32_t,
        newtype: *mut int32_t,
    ) -> c_int;
    pub fn bigcount_type_commit(datatype: int32_t) -> c_int;
    pub fn bigcount_type_free(datatype: int32_t) -> c_int;

    // ============================================================
    // File Management
    // ============================================================

    pub fn bigcount_file_open(
        comm: int32_t,
        filename: *const c_char,
        amode: int32_t,
        info: int32_t,
        fh: *mut int32_t,
    ) -> c_int;
    pub fn bigcount_file_close(fh: int32_t) -> c_int;
    pub fn bigcount_file_sync(fh: int32_t) -> c_int;
    pub fn bigcount_file_get_size(fh: int32_t, size: *mut int64_t) -> c_int;
    pub fn bigcount_file_delete(filename: *const c_char, info: int32_t) -> c_int;

    // ============================================================
    // Positioned Transfers (native 32-bit count)
    // ============================================================

    pub fn bigcount_file_write_at(
        fh: int32_t,
        offset: uint64_t,
        buf: *const c_void,
        count: int32_t,
        datatype: int32_t,
        actual_count: *mut int64_t,
    ) -> c_int;

    pub fn bigcount_file_read_at(
        fh: int32_t,
        offset: uint64_t,
        buf: *mut c_void,
        count: int32_t,
        datatype: int32_t,
        actual_count: *mut int64_t,
    ) -> c_int;

    pub fn bigcount_file_write_at_all(
        fh: int32_t,
        offset: uint64_t,
        buf: *const c_void,
        count: int32_t,
        datatype: int32_t,
        actual_count: *mut int64_t,
    ) -> c_int;

    pub fn bigcount_file_read_at_all(
        fh: int32_t,
        offset: uint64_t,
        buf: *mut c_void,
        count: int32_t,
        datatype: int32_t,
        actual_count: *mut int64_t,
    ) -> c_int;

    pub fn bigcount_file_write_ordered(
        fh: int32_t,
        buf: *const c_void,
        count: int32_t,
        datatype: int32_t,
        actual_count: *mut int64_t,
    ) -> c_int;

    // ============================================================
    // Utility Functions
    // ============================================================

    pub fn bigcount_get_version(version: *mut c_char, len: *mut int32_t) -> c_int;
    pub fn bigcount_wtime() -> c_double;
}
