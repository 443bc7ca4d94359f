//! Large-count positioned I/O against a real MPI runtime.
//!
//! Each of two ranks moves 2^32 + 2 bytes per call (more than an `int` count
//! can express) through every large-count routine, then checks what landed
//! in the file by reading it back.
//!
//! Run with: mpiexec -n 2 cargo run --release --features mpi --example large_count_io
//!
//! Needs roughly 8.6 GB of free disk in the working directory and two
//! buffers of 4.3 GB per rank.

use bigcount_io::{
    require_group_size, AccessMode, Communicator, File, Group, Info, LargeCountIo, Mpi, Result,
};
use tracing_subscriber::EnvFilter;

const PATH: &str = "io.data";
const N_BYTES: u64 = (1 << 32) + 2;

#[derive(Clone, Copy, Debug)]
enum Write {
    At,
    AtAll,
    Ordered,
}

#[derive(Clone, Copy, Debug)]
enum Read {
    At,
    AtAll,
}

fn payload(rank: i32) -> Vec<u8> {
    let mut buffer = vec![b'?'; N_BYTES as usize];
    buffer[0] = b'A' + rank as u8;
    buffer
}

fn write_file(world: &Communicator, how: Write) -> Result<()> {
    let rank = world.rank();
    let offset = rank as u64 * N_BYTES;
    let info = Info::new()?;
    let file = File::open(world, PATH, AccessMode::CREATE | AccessMode::WRONLY, &info)?;

    let buffer = payload(rank);
    let status = match how {
        Write::At => file.write_at_c(offset, &buffer, N_BYTES)?,
        Write::AtAll => file.write_at_all_c(offset, &buffer, N_BYTES)?,
        // the shared pointer places rank 1 after rank 0, same layout as above
        Write::Ordered => file.write_ordered_c(&buffer, N_BYTES)?,
    };
    assert_eq!(status.elements(), N_BYTES, "rank {rank}: short {how:?}");

    file.sync()?;
    world.barrier()?;

    if rank == 0 {
        assert_eq!(file.size()?, 2 * N_BYTES, "{how:?}: unexpected file size");
        println!("io: {how:?} size OK");
    }
    file.close()
}

fn read_file(world: &Communicator, how: Read) -> Result<()> {
    let rank = world.rank();
    let offset = rank as u64 * N_BYTES;
    let info = Info::new()?;
    let file = File::open(
        world,
        PATH,
        AccessMode::DELETE_ON_CLOSE | AccessMode::RDONLY,
        &info,
    )?;

    let mut buffer = vec![0u8; N_BYTES as usize];
    let status = match how {
        Read::At => file.read_at_c(offset, &mut buffer, N_BYTES)?,
        Read::AtAll => file.read_at_all_c(offset, &mut buffer, N_BYTES)?,
    };
    assert_eq!(status.elements(), N_BYTES, "rank {rank}: short {how:?}");
    assert!(
        buffer == payload(rank),
        "rank {rank}: {how:?} read back different bytes"
    );

    world.barrier()?;
    if rank == 0 {
        println!("io: {how:?} contents OK");
    }
    file.close()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mpi = Mpi::init()?;
    let world = mpi.world();
    require_group_size(&world, 2);

    if world.rank() == 0 {
        println!("MPI: {}", Mpi::version()?.lines().next().unwrap_or_default());
    }

    let start = Mpi::wtime();
    write_file(&world, Write::At)?;
    read_file(&world, Read::At)?;
    write_file(&world, Write::AtAll)?;
    read_file(&world, Read::AtAll)?;
    write_file(&world, Write::Ordered)?;
    read_file(&world, Read::At)?;

    if world.rank() == 0 {
        println!("done in {:.1}s", Mpi::wtime() - start);
    }
    Ok(())
}
