//! `ds3bits` prints the super block and both allocation bitmaps of a disk
//! image.

use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;
use ufs::bitmap::Bitmap;
use ufs::disk::Disk;
use ufs::fs::LocalFileSystem;

fn fail() -> ! {
    eprintln!("Error reading image");
    exit(1);
}

fn print_bitmap(header: &str, bitmap: &Bitmap) {
    println!("{header}");
    for byte in bitmap.used_bytes() {
        print!("{byte} ");
    }
    println!();
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), None) = (args.next(), args.next()) else {
        eprintln!("{bin}: diskImageFile");
        exit(1);
    };

    let disk = Disk::open(&PathBuf::from(image)).unwrap_or_else(|_| fail());
    let fs = LocalFileSystem::new(disk).unwrap_or_else(|_| fail());
    let sb = fs.super_block();

    println!("Super");
    let inode_region_addr = sb.inode_region_addr;
    let inode_region_len = sb.inode_region_len;
    let num_inodes = sb.num_inodes;
    let data_region_addr = sb.data_region_addr;
    let data_region_len = sb.data_region_len;
    let num_data = sb.num_data;
    println!("inode_region_addr {inode_region_addr}");
    println!("inode_region_len {inode_region_len}");
    println!("num_inodes {num_inodes}");
    println!("data_region_addr {data_region_addr}");
    println!("data_region_len {data_region_len}");
    println!("num_data {num_data}");
    println!();

    let inode_bitmap = fs.read_inode_bitmap().unwrap_or_else(|_| fail());
    print_bitmap("Inode bitmap", &inode_bitmap);
    println!();

    let data_bitmap = fs.read_data_bitmap().unwrap_or_else(|_| fail());
    print_bitmap("Data bitmap", &data_bitmap);
}
