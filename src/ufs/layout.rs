//! On-disk layout of the filesystem's metadata structures.
//!
//! Every struct in this module is packed to its exact on-disk byte count and
//! uses little-endian, naturally aligned fields. The super block lives in
//! block 0 and is read-only after format; the bitmap, inode and data regions
//! follow at the block addresses it records.

use std::mem::size_of;
use std::slice;

/// The size of a disk block in bytes.
pub const UFS_BLOCK_SIZE: usize = 4096;

/// The number of direct block pointers per inode.
pub const DIRECT_PTRS: usize = 30;

/// The maximum size of a file or directory in bytes.
pub const MAX_FILE_SIZE: usize = DIRECT_PTRS * UFS_BLOCK_SIZE;

/// The size of a directory entry name, including the NUL terminator.
pub const DIR_ENT_NAME_SIZE: usize = 28;

/// Value of an unused `direct[]` slot. Never a valid block number.
pub const UNALLOCATED_BLOCK: u32 = 0xffff_ffff;

/// The number of inodes stored in one block of the inode region.
pub const INODES_PER_BLOCK: usize = UFS_BLOCK_SIZE / size_of::<Inode>();

/// The type of the object an inode describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum FileType {
    /// A directory, holding an array of [`DirEntry`].
    Directory = 0,
    /// A regular file, holding opaque bytes.
    Regular = 1,
}

impl FileType {
    /// Decodes an on-disk type field.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Directory),
            1 => Some(Self::Regular),
            _ => None,
        }
    }
}

/// The super block, stored in block 0.
///
/// Region addresses are block indices from the start of the disk; lengths are
/// block counts. `num_inodes` and `num_data` may be smaller than the capacity
/// the region lengths imply.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct SuperBlock {
    /// Block index of the inode bitmap.
    pub inode_bitmap_addr: u32,
    /// Length of the inode bitmap in blocks.
    pub inode_bitmap_len: u32,
    /// Block index of the data bitmap.
    pub data_bitmap_addr: u32,
    /// Length of the data bitmap in blocks.
    pub data_bitmap_len: u32,
    /// Block index of the inode table.
    pub inode_region_addr: u32,
    /// Length of the inode table in blocks.
    pub inode_region_len: u32,
    /// Block index of the data region.
    pub data_region_addr: u32,
    /// Length of the data region in blocks.
    pub data_region_len: u32,
    /// Total number of inodes.
    pub num_inodes: u32,
    /// Total number of data blocks.
    pub num_data: u32,
}

/// A single inode within the inode region.
#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct Inode {
    /// The type of the file, one of [`FileType`]'s raw values.
    pub ftype: u32,
    /// The size of the file in bytes.
    pub size: u32,
    /// Direct block pointers, holding absolute block numbers.
    ///
    /// Unused slots carry [`UNALLOCATED_BLOCK`].
    pub direct: [u32; DIRECT_PTRS],
}

impl Inode {
    /// Returns a free inode of the given type, with every pointer slot unused.
    pub fn empty(ftype: FileType) -> Self {
        Self {
            ftype: ftype as u32,
            size: 0,
            direct: [UNALLOCATED_BLOCK; DIRECT_PTRS],
        }
    }

    /// Decodes the type field.
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_raw(self.ftype)
    }

    /// Returns the number of data blocks covered by the inode's size.
    pub fn used_blocks(&self) -> usize {
        (self.size as usize).div_ceil(UFS_BLOCK_SIZE)
    }
}

impl Default for Inode {
    fn default() -> Self {
        Self {
            ftype: 0,
            size: 0,
            direct: [0; DIRECT_PTRS],
        }
    }
}

/// A directory entry: a NUL-terminated name paired with an inode number.
#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct DirEntry {
    /// The entry's name. NUL-terminated, so at most 27 name bytes.
    pub name: [u8; DIR_ENT_NAME_SIZE],
    /// The inode the entry refers to.
    pub inum: u32,
}

impl DirEntry {
    /// Builds an entry from a name and an inode number.
    ///
    /// Returns `None` if the name does not fit.
    pub fn new(name: &str, inum: u32) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() >= DIR_ENT_NAME_SIZE {
            return None;
        }
        let mut entry = Self {
            name: [0; DIR_ENT_NAME_SIZE],
            inum,
        };
        entry.name[..bytes.len()].copy_from_slice(bytes);
        Some(entry)
    }

    /// Returns the name bytes up to the NUL terminator.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(DIR_ENT_NAME_SIZE);
        &self.name[..len]
    }

    /// Returns the name as a string, if it is valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name_bytes()).ok()
    }
}

/// The size of a directory entry on disk.
pub const DIR_ENT_SIZE: usize = size_of::<DirEntry>();

static_assertions::const_assert_eq!(size_of::<SuperBlock>(), 40);
static_assertions::const_assert_eq!(size_of::<Inode>(), 128);
static_assertions::const_assert_eq!(size_of::<DirEntry>(), 32);
static_assertions::const_assert_eq!(UFS_BLOCK_SIZE % size_of::<Inode>(), 0);

/// Reinterprets a packed struct as its raw bytes.
pub fn reinterpret<T>(val: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(val as *const _ as *const u8, size_of::<T>()) }
}

/// Decodes a packed struct from the beginning of a byte slice.
///
/// Panics if the slice is shorter than the struct.
pub fn decode<T: Copy>(buf: &[u8]) -> T {
    assert!(buf.len() >= size_of::<T>());
    unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const T) }
}
