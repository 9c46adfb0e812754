//! `ds3cat` prints the block list and raw content of a file on a disk image.

use std::env::ArgsOs;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;
use ufs::disk::Disk;
use ufs::fs::LocalFileSystem;
use ufs::layout::FileType;

fn fail() -> ! {
    eprintln!("Error reading file");
    exit(1);
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), Some(inode), None) = (args.next(), args.next(), args.next()) else {
        eprintln!("{bin}: diskImageFile inodeNumber");
        exit(1);
    };
    let inode = inode
        .to_str()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| fail());

    let disk = Disk::open(&PathBuf::from(image)).unwrap_or_else(|_| fail());
    let fs = LocalFileSystem::new(disk).unwrap_or_else(|_| fail());
    let node = fs.stat(inode).unwrap_or_else(|_| fail());
    if node.file_type() != Some(FileType::Regular) {
        fail();
    }
    let data = fs.read(inode, node.size as usize).unwrap_or_else(|_| fail());

    println!("File blocks");
    for i in 0..node.used_blocks() {
        let block = node.direct[i];
        println!("{block}");
    }
    println!();
    println!("File data");
    if io::stdout().write_all(&data).is_err() {
        fail();
    }
}
