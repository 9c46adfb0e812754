//! `ds3touch` creates a regular file inside a directory of a disk image.

use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;
use ufs::disk::Disk;
use ufs::fs::LocalFileSystem;
use ufs::layout::FileType;

fn fail() -> ! {
    eprintln!("Error creating file");
    exit(1);
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), Some(parent), Some(name), None) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        eprintln!("{bin}: diskImageFile parentInode fileName");
        exit(1);
    };
    let parent = parent
        .to_str()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| fail());
    let name = name.into_string().unwrap_or_else(|_| fail());

    let disk = Disk::open(&PathBuf::from(image)).unwrap_or_else(|_| fail());
    let mut fs = LocalFileSystem::new(disk).unwrap_or_else(|_| fail());
    if fs.create(parent, FileType::Regular, &name).is_err() {
        fail();
    }
}
