//! `ds3ls` lists a directory (or names a file) at an absolute path on a
//! disk image.

use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;
use ufs::disk::Disk;
use ufs::fs::LocalFileSystem;
use ufs::layout::FileType;

fn fail() -> ! {
    eprintln!("Directory not found");
    exit(1);
}

/// Splits an absolute path into its non-empty components.
fn split_path(path: &str) -> Option<Vec<&str>> {
    if !path.starts_with('/') {
        return None;
    }
    Some(path.split('/').filter(|c| !c.is_empty()).collect())
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), Some(path), None) = (args.next(), args.next(), args.next()) else {
        eprintln!("{bin}: diskImageFile directory");
        eprintln!("For example:");
        eprintln!("    $ {bin} tests/disk_images/a.img /a/b");
        exit(1);
    };
    let path = path.into_string().unwrap_or_else(|_| fail());
    let components = split_path(&path).unwrap_or_else(|| fail());

    let disk = Disk::open(&PathBuf::from(image)).unwrap_or_else(|_| fail());
    let fs = LocalFileSystem::new(disk).unwrap_or_else(|_| fail());

    let mut inum = 0;
    for &component in &components {
        inum = fs.lookup(inum, component).unwrap_or_else(|_| fail());
    }
    let node = fs.stat(inum).unwrap_or_else(|_| fail());

    if node.file_type() == Some(FileType::Directory) {
        let mut entries = fs.read_directory(inum).unwrap_or_else(|_| fail());
        entries.sort_by(|a, b| a.name_bytes().cmp(b.name_bytes()));
        for entry in entries {
            let entry_inum = entry.inum;
            let name = String::from_utf8_lossy(entry.name_bytes()).into_owned();
            println!("{entry_inum}\t{name}");
        }
    } else {
        // A file lists as its own single entry.
        let name = components.last().unwrap_or_else(|| fail());
        println!("{inum}\t{name}");
    }
}
