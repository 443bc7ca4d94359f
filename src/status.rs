//! Completion status of a dispatched transfer.

/// Information about a completed file transfer.
///
/// `count` is the number of base elements the native layer reports as
/// transferred, the value `MPI_Get_elements_x` gives for the dispatched
/// datatype. It is the same whether the call went out with the base type or
/// with a derived block type, including after a short read that ends inside
/// a block.
///
/// # Example
///
/// ```
/// use bigcount_io::Status;
///
/// let status = Status { count: 58, block_length: 4 };
/// assert_eq!(status.elements(), 58);
/// assert_eq!(status.blocks(), 14);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Number of base elements transferred.
    pub count: i64,
    /// Base elements per instance of the dispatched datatype.
    pub block_length: i32,
}

impl Status {
    /// Number of base elements transferred.
    pub fn elements(&self) -> u64 {
        self.count.max(0) as u64
    }

    /// Whole instances of the dispatched datatype transferred.
    pub fn blocks(&self) -> u64 {
        self.elements() / self.block_length.max(1) as u64
    }
}
