//! Links bigcount-io against MPI when the `mpi` feature is on.
//!
//! The shim in `csrc/` is compiled with `cc` against the headers of the
//! first MPI installation found, in this order: `MPI_PKG_CONFIG`, the usual
//! pkg-config names, the `mpicc` wrapper, then installation prefixes.
//! Without the feature the crate has no native code and nothing happens here.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHIM: &str = "csrc/bigcount.c";

fn main() {
    println!("cargo:rerun-if-changed={SHIM}");
    println!("cargo:rerun-if-changed=csrc/bigcount.h");
    for var in ["MPI_PKG_CONFIG", "MPICC", "CRAY_MPICH_DIR", "MPI_HOME", "I_MPI_ROOT"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    if env::var_os("CARGO_FEATURE_MPI").is_none() {
        return;
    }

    let (origin, mpi) = locate_mpi().unwrap_or_else(|| {
        panic!(
            "the `mpi` feature needs an MPI-3.0 installation; point the build at it with\n\
             - MPI_PKG_CONFIG=<pkg-config name> (e.g. 'mpich'),\n\
             - MPICC=<compiler wrapper> or 'mpicc' on PATH, or\n\
             - CRAY_MPICH_DIR, MPI_HOME or I_MPI_ROOT=<install prefix>"
        )
    });
    eprintln!("bigcount-io: using MPI from {origin}");

    let mut shim = cc::Build::new();
    shim.file(SHIM)
        .include("csrc")
        .includes(&mpi.include_paths)
        .warnings(true)
        .extra_warnings(true);
    if env::var_os("CARGO_FEATURE_DEBUG").is_some() {
        shim.define("BIGCOUNT_DEBUG", None);
    }
    if env::var("PROFILE").as_deref() == Ok("release") {
        shim.opt_level(3);
    }
    shim.compile("bigcount");

    for dir in &mpi.link_paths {
        println!("cargo:rustc-link-search=native={}", dir.display());
        // resolve the same libmpi at run time that was linked here
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", dir.display());
    }
    for lib in &mpi.libs {
        println!("cargo:rustc-link-lib={lib}");
    }
}

#[derive(Default)]
struct MpiConfig {
    include_paths: Vec<PathBuf>,
    link_paths: Vec<PathBuf>,
    libs: Vec<String>,
}

fn locate_mpi() -> Option<(String, MpiConfig)> {
    let pkg_names = env::var("MPI_PKG_CONFIG")
        .ok()
        .into_iter()
        .chain(["mpich", "ompi", "mpi"].map(String::from));
    for name in pkg_names {
        if let Some(mpi) = from_pkg_config(&name) {
            return Some((format!("pkg-config {name}"), mpi));
        }
    }

    let mpicc = env::var("MPICC").unwrap_or_else(|_| "mpicc".into());
    // MPICH spells it `-show`, Open MPI `--showme`
    for flag in ["-show", "--showme"] {
        if let Some(mpi) = from_wrapper(&mpicc, flag) {
            return Some((format!("{mpicc} {flag}"), mpi));
        }
    }

    let prefixes = ["CRAY_MPICH_DIR", "MPI_HOME", "I_MPI_ROOT"]
        .into_iter()
        .filter_map(|var| env::var(var).ok())
        .chain(["/usr", "/usr/local", "/opt/mpich", "/opt/openmpi"].map(String::from));
    for prefix in prefixes {
        if let Some(mpi) = from_prefix(Path::new(&prefix)) {
            return Some((prefix, mpi));
        }
    }
    None
}

fn from_pkg_config(name: &str) -> Option<MpiConfig> {
    // link flags are emitted by main() together with the rpath
    let lib = pkg_config::Config::new()
        .cargo_metadata(false)
        .probe(name)
        .ok()?;
    Some(MpiConfig {
        include_paths: lib.include_paths,
        link_paths: lib.link_paths,
        libs: lib.libs,
    })
}

fn from_wrapper(mpicc: &str, flag: &str) -> Option<MpiConfig> {
    let output = Command::new(mpicc).arg(flag).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(parse_wrapper_flags(&String::from_utf8_lossy(&output.stdout)))
}

fn from_prefix(prefix: &Path) -> Option<MpiConfig> {
    let include = prefix.join("include");
    include.join("mpi.h").is_file().then(|| MpiConfig {
        include_paths: vec![include],
        link_paths: vec![prefix.join("lib")],
        libs: vec!["mpi".into()],
    })
}

/// Collect `-I`, `-L` and `-l` arguments from a compiler wrapper command line.
fn parse_wrapper_flags(command_line: &str) -> MpiConfig {
    let mut mpi = MpiConfig::default();
    for arg in command_line.split_whitespace() {
        if let Some(dir) = arg.strip_prefix("-I") {
            mpi.include_paths.push(dir.into());
        } else if let Some(dir) = arg.strip_prefix("-L") {
            mpi.link_paths.push(dir.into());
        } else if let Some(lib) = arg.strip_prefix("-l") {
            mpi.libs.push(lib.into());
        }
    }
    if mpi.libs.is_empty() {
        mpi.libs.push("mpi".into());
    }
    mpi
}
