//! `ds3rm` removes an entry from a directory of a disk image.
//!
//! Removing a name that does not exist succeeds, so removal is idempotent.

use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;
use ufs::disk::Disk;
use ufs::error::UfsError;
use ufs::fs::LocalFileSystem;

fn fail() -> ! {
    eprintln!("Error removing entry");
    exit(1);
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), Some(parent), Some(name), None) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        eprintln!("{bin}: diskImageFile parentInode entryName");
        exit(1);
    };
    let parent = parent
        .to_str()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| fail());
    let name = name.into_string().unwrap_or_else(|_| fail());

    let disk = Disk::open(&PathBuf::from(image)).unwrap_or_else(|_| fail());
    let mut fs = LocalFileSystem::new(disk).unwrap_or_else(|_| fail());
    match fs.unlink(parent, &name) {
        Ok(()) | Err(UfsError::NotFound) => {}
        Err(_) => fail(),
    }
}
