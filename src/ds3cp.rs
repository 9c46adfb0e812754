//! `ds3cp` copies a host file into an existing file on a disk image.

use std::env::ArgsOs;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::exit;
use ufs::disk::Disk;
use ufs::fs::LocalFileSystem;

fn fail(src: &Path) -> ! {
    eprintln!("Could not write to {}", src.display());
    exit(1);
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), Some(src), Some(inode), None) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        eprintln!("{bin}: diskImageFile srcFile dstInode");
        eprintln!("For example:");
        eprintln!("    $ {bin} tests/disk_images/a.img dthread.cpp 3");
        exit(1);
    };
    let src = PathBuf::from(src);
    let inode = inode
        .to_str()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| fail(&src));

    let data = fs::read(&src).unwrap_or_else(|_| {
        eprintln!("Error opening file {}", src.display());
        exit(1);
    });

    let disk = Disk::open(&PathBuf::from(image)).unwrap_or_else(|_| fail(&src));
    let mut fs = LocalFileSystem::new(disk).unwrap_or_else(|_| fail(&src));
    if fs.write(inode, &data).is_err() {
        fail(&src);
    }
}
