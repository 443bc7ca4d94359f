//! Print how counts are split into `outer_count * block_length`.
//!
//! Run with: cargo run --example decompose_table [COUNT...]

use bigcount_io::{decompose, NATIVE_COUNT_LIMIT};

fn main() {
    let args: Vec<u64> = std::env::args()
        .skip(1)
        .filter_map(|arg| match arg.parse() {
            Ok(count) => Some(count),
            Err(e) => {
                eprintln!("skipping {arg:?}: {e}");
                None
            }
        })
        .collect();

    let counts = if args.is_empty() {
        vec![
            0,
            1,
            NATIVE_COUNT_LIMIT,
            NATIVE_COUNT_LIMIT + 1,
            1 << 32,
            (1 << 32) + 2,
            (1 << 33) + 1,
            1_000_000_000_000,
            2_147_483_659,
        ]
    } else {
        args
    };

    println!("{:>22} {:>12} {:>12}", "count", "outer_count", "block_length");
    for count in counts {
        match decompose(count) {
            Ok(d) => println!("{count:>22} {:>12} {:>12}", d.outer_count, d.block_length),
            Err(e) => println!("{count:>22} {e}"),
        }
    }
}
