//! Formatting of fresh disk images.
//!
//! The image layout is fixed at format time: super block in block 0, then
//! the inode bitmap, the data bitmap, the inode table and finally the data
//! region. Formatting creates the root directory (inode 0) with its `.` and
//! `..` entries, both pointing at itself.

use log::info;
use std::path::Path;

use crate::disk::Disk;
use crate::error::{FsResult, UfsError};
use crate::layout::{
    DIR_ENT_SIZE, DirEntry, FileType, INODES_PER_BLOCK, Inode, SuperBlock, UFS_BLOCK_SIZE,
    reinterpret,
};

/// Bits tracked per bitmap block.
const BITS_PER_BLOCK: u32 = (UFS_BLOCK_SIZE * 8) as u32;

/// Computes the region layout for a filesystem of the given capacity.
pub fn layout(num_inodes: u32, num_data: u32) -> SuperBlock {
    let inode_bitmap_addr = 1;
    let inode_bitmap_len = num_inodes.div_ceil(BITS_PER_BLOCK);
    let data_bitmap_addr = inode_bitmap_addr + inode_bitmap_len;
    let data_bitmap_len = num_data.div_ceil(BITS_PER_BLOCK);
    let inode_region_addr = data_bitmap_addr + data_bitmap_len;
    let inode_region_len = num_inodes.div_ceil(INODES_PER_BLOCK as u32);
    let data_region_addr = inode_region_addr + inode_region_len;
    SuperBlock {
        inode_bitmap_addr,
        inode_bitmap_len,
        data_bitmap_addr,
        data_bitmap_len,
        inode_region_addr,
        inode_region_len,
        data_region_addr,
        data_region_len: num_data,
        num_inodes,
        num_data,
    }
}

/// Returns the total image size in blocks for a layout.
pub fn total_blocks(sb: &SuperBlock) -> u32 {
    sb.data_region_addr + sb.data_region_len
}

/// Writes a fresh filesystem onto the given disk.
pub fn format(disk: &mut Disk, num_inodes: u32, num_data: u32) -> FsResult<()> {
    if num_inodes == 0 || num_data == 0 {
        return Err(UfsError::BadRequest);
    }
    let sb = layout(num_inodes, num_data);
    if total_blocks(&sb) > disk.num_blocks() {
        return Err(UfsError::InvalidSize);
    }

    // Super block, padded to a full block.
    let mut block = [0u8; UFS_BLOCK_SIZE];
    block[..size_of::<SuperBlock>()].copy_from_slice(reinterpret(&sb));
    disk.write_block(0, &block)?;

    // Both bitmaps: everything free except slot 0 (the root directory and
    // its data block).
    let mut bitmap = [0u8; UFS_BLOCK_SIZE];
    bitmap[0] = 0x01;
    for region in [
        (sb.inode_bitmap_addr, sb.inode_bitmap_len),
        (sb.data_bitmap_addr, sb.data_bitmap_len),
    ] {
        disk.write_block(region.0, &bitmap)?;
        for i in 1..region.1 {
            disk.write_block(region.0 + i, &[0u8; UFS_BLOCK_SIZE])?;
        }
    }

    // Inode table: the root directory in slot 0, the rest zeroed.
    let mut root = Inode::empty(FileType::Directory);
    root.size = (2 * DIR_ENT_SIZE) as u32;
    root.direct[0] = sb.data_region_addr;
    let mut block = [0u8; UFS_BLOCK_SIZE];
    block[..size_of::<Inode>()].copy_from_slice(reinterpret(&root));
    disk.write_block(sb.inode_region_addr, &block)?;
    for i in 1..sb.inode_region_len {
        disk.write_block(sb.inode_region_addr + i, &[0u8; UFS_BLOCK_SIZE])?;
    }

    // The root directory's single data block.
    let mut block = [0u8; UFS_BLOCK_SIZE];
    block[..DIR_ENT_SIZE].copy_from_slice(reinterpret(&DirEntry::new(".", 0).unwrap()));
    block[DIR_ENT_SIZE..2 * DIR_ENT_SIZE]
        .copy_from_slice(reinterpret(&DirEntry::new("..", 0).unwrap()));
    disk.write_block(sb.data_region_addr, &block)?;
    for i in 1..sb.data_region_len {
        disk.write_block(sb.data_region_addr + i, &[0u8; UFS_BLOCK_SIZE])?;
    }

    info!("formatted image: {num_inodes} inodes, {num_data} data blocks");
    Ok(())
}

/// Creates a new image file at `path` and formats it.
pub fn format_image(path: &Path, num_inodes: u32, num_data: u32) -> FsResult<()> {
    if num_inodes == 0 || num_data == 0 {
        return Err(UfsError::BadRequest);
    }
    let sb = layout(num_inodes, num_data);
    let mut disk = Disk::create(path, total_blocks(&sb))?;
    format(&mut disk, num_inodes, num_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn layout_is_contiguous() {
        let sb = layout(32, 32);
        assert_eq!({ sb.inode_bitmap_addr }, 1);
        assert_eq!({ sb.inode_bitmap_len }, 1);
        assert_eq!({ sb.data_bitmap_addr }, 2);
        assert_eq!({ sb.inode_region_addr }, 3);
        assert_eq!({ sb.inode_region_len }, 1);
        assert_eq!({ sb.data_region_addr }, 4);
        assert_eq!(total_blocks(&sb), 36);
    }

    #[test]
    fn layout_scales_past_one_block_per_region() {
        // 100k inodes need 4 bitmap blocks and 3125 table blocks.
        let sb = layout(100_000, 40_000);
        assert_eq!({ sb.inode_bitmap_len }, 4);
        assert_eq!({ sb.data_bitmap_len }, 2);
        assert_eq!({ sb.inode_region_len }, 3125);
        assert_eq!(
            { sb.data_region_addr },
            1 + 4 + 2 + 3125
        );
    }

    #[test]
    fn formatted_image_has_root_directory() {
        let file = NamedTempFile::new().unwrap();
        format_image(file.path(), 32, 32).unwrap();

        let fs = crate::fs::LocalFileSystem::new(Disk::open(file.path()).unwrap()).unwrap();
        let root = fs.stat(0).unwrap();
        assert_eq!(root.file_type(), Some(FileType::Directory));
        let entries = fs.read_directory(0).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name_str(), Some("."));
        assert_eq!(entries[1].name_str(), Some(".."));
        assert_eq!({ entries[0].inum }, 0);
        assert_eq!({ entries[1].inum }, 0);
        assert!(fs.read_inode_bitmap().unwrap().test(0));
        assert!(fs.read_data_bitmap().unwrap().test(0));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(format_image(file.path(), 0, 32).is_err());
        assert!(format_image(file.path(), 32, 0).is_err());
    }
}
