//! UNIX-style on-disk file system served from a disk image.
//!
//! The on-disk format packs a super block, an inode bitmap, a data bitmap,
//! an inode table and a data region into 4096-byte blocks. [`fs::LocalFileSystem`]
//! implements the lookup/stat/read/write/create/unlink contract on top of a
//! transactional [`disk::Disk`]; [`service::DistributedFileSystemService`]
//! maps GET/PUT/DELETE request paths onto the same contract.

use std::env::ArgsOs;
use std::fmt;
use std::path::PathBuf;
use std::process::exit;
use std::env;

pub mod bitmap;
pub mod disk;
pub mod error;
pub mod fs;
pub mod layout;
pub mod mkfs;
pub mod service;

/// Returns the command's name along with an iterator over the command's arguments.
pub fn args() -> (String, ArgsOs) {
    let mut args = env::args_os();
    let bin = args
        .next()
        .map(PathBuf::from)
        .and_then(|p| {
            p.file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            error("ds3", "missing binary name");
        });
    (bin, args)
}

/// Writes an error to stderr, then exits.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
    eprintln!("{bin}: error: {msg}");
    exit(1);
}
