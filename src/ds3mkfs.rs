//! `ds3mkfs` creates and formats a fresh disk image.

use std::env::ArgsOs;
use std::path::PathBuf;
use std::process::exit;
use ufs::mkfs;

fn fail() -> ! {
    eprintln!("Error creating image");
    exit(1);
}

pub fn main(bin: &str, mut args: ArgsOs) {
    let (Some(image), Some(num_inodes), Some(num_data), None) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        eprintln!("{bin}: diskImageFile numInodes numData");
        exit(1);
    };
    let num_inodes = num_inodes
        .to_str()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| fail());
    let num_data = num_data
        .to_str()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| fail());

    if mkfs::format_image(&PathBuf::from(image), num_inodes, num_data).is_err() {
        fail();
    }
}
