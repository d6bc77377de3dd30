// Build script that tries to generate a C header with `cbindgen`.
// If `cbindgen` is not available, it falls back to copying the
// checked-in `include/murmur.h` to $OUT_DIR.

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/murmur.h");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let header_repo = crate_dir.join("include").join("murmur.h");
    let header_out = out_dir.join("murmur.h");

    let generated = Command::new("cbindgen")
        .args(["--crate", "murmur-ffi", "--lang", "C", "--output"])
        .arg(&header_out)
        .current_dir(&crate_dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if generated {
        println!("cargo:warning=murmur-ffi: generated header with cbindgen -> {}", header_out.display());
        return;
    }

    fs::copy(&header_repo, &header_out).expect("failed to copy include/murmur.h to OUT_DIR");
}
