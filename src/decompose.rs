//! Splitting a 64-bit element count into two native 32-bit factors.
//!
//! A count `n` that does not fit the native count parameter is expressed as
//! `outer_count` instances of a contiguous block of `block_length` base
//! elements, with `outer_count * block_length == n` exactly. Nothing is
//! rounded or padded: a count with no such factor pair is an error.
//!
//! ```
//! use bigcount_io::{decompose, Decomposition};
//!
//! // Fits natively: identity.
//! assert_eq!(decompose(1000).unwrap(), Decomposition { outer_count: 1000, block_length: 1 });
//!
//! // 2^32 + 2 = 3 * 1_431_655_766
//! let d = decompose((1 << 32) + 2).unwrap();
//! assert_eq!((d.outer_count, d.block_length), (1_431_655_766, 3));
//!
//! // A prime above the limit has no admissible factor pair.
//! assert!(decompose(2_147_483_659).is_err());
//! ```

use crate::error::{Error, Result};
use crate::native::NATIVE_COUNT_LIMIT;

/// A count expressed as `outer_count` blocks of `block_length` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decomposition {
    /// Number of blocks passed as the native count.
    pub outer_count: i32,
    /// Base elements per block.
    pub block_length: i32,
}

impl Decomposition {
    /// Total number of base elements.
    pub fn count(&self) -> u64 {
        self.outer_count as u64 * self.block_length as u64
    }

    /// Returns `true` when no derived type is needed.
    pub fn is_identity(&self) -> bool {
        self.block_length == 1
    }
}

/// Decompose `count` against the native signed 32-bit limit.
pub fn decompose(count: u64) -> Result<Decomposition> {
    decompose_with_limit(count, NATIVE_COUNT_LIMIT)
}

/// Decompose `count` against a native layer accepting at most `limit` per call.
///
/// `limit` is clamped to `1..=i32::MAX`. The block length is the smallest
/// `b` with `ceil(count / limit) <= b <= limit` that divides `count`.
pub fn decompose_with_limit(count: u64, limit: u64) -> Result<Decomposition> {
    let limit = limit.clamp(1, NATIVE_COUNT_LIMIT);

    if count <= limit {
        // count == 0 lands here as {0, 1}
        return Ok(Decomposition {
            outer_count: count as i32,
            block_length: 1,
        });
    }

    let block_length =
        smallest_block_length(count, limit).ok_or(Error::Decomposition { count, limit })?;
    Ok(Decomposition {
        outer_count: (count / block_length) as i32,
        block_length: block_length as i32,
    })
}

/// Smallest divisor `b` of `count` in `ceil(count / limit)..=limit`.
///
/// Divisors pair up around `isqrt(count)`, so the search walks candidates
/// upward to the square root and then co-divisors downward from it; the
/// second walk finds the smallest divisor above the root first.
fn smallest_block_length(count: u64, limit: u64) -> Option<u64> {
    let lower = count.div_ceil(limit);
    if lower > limit {
        return None;
    }
    let root = isqrt(count);

    if let Some(b) = (lower..=root.min(limit)).find(|b| count % b == 0) {
        return Some(b);
    }

    // every co-divisor d >= lower gives b = count / d <= limit
    (lower..=root)
        .rev()
        .filter(|d| count % d == 0)
        .map(|d| count / d)
        .find(|&b| b > root)
}

/// Integer square root: the largest `r` with `r * r <= n`.
///
/// `u64::isqrt` needs Rust 1.84; the crate supports 1.74.
fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut r = (n as f64).sqrt() as u64;
    while r.checked_mul(r).map_or(true, |sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).is_some_and(|sq| sq <= n) {
        r += 1;
    }
    r
}
