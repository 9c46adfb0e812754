//! The filesystem core: lookup, stat, read, write, create and unlink over a
//! block device.
//!
//! The filesystem owns its [`Disk`] exclusively. Bitmaps and the inode region
//! are read from disk on every operation; the only caching is the super
//! block, which is read-only after format. Every mutating entry point frames
//! exactly one transaction on the device and either commits or rolls back on
//! each return path.

use log::debug;
use std::cmp::min;

use crate::bitmap::Bitmap;
use crate::disk::{Block, Disk};
use crate::error::{FsResult, UfsError};
use crate::layout::{
    DIR_ENT_NAME_SIZE, DIR_ENT_SIZE, DIRECT_PTRS, DirEntry, FileType, INODES_PER_BLOCK, Inode,
    MAX_FILE_SIZE, SuperBlock, UFS_BLOCK_SIZE, UNALLOCATED_BLOCK, decode, reinterpret,
};

/// Checks a name against the rules for directory entries: non-empty, shorter
/// than [`DIR_ENT_NAME_SIZE`] and free of `/`.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name.len() >= DIR_ENT_NAME_SIZE || name.contains('/') {
        return Err(UfsError::InvalidName);
    }
    Ok(())
}

/// A filesystem served from a single disk image.
pub struct LocalFileSystem {
    disk: Disk,
    super_block: SuperBlock,
}

impl LocalFileSystem {
    /// Mounts the filesystem on the given disk by reading its super block.
    ///
    /// Mismatched images are not detected; the super block has no magic.
    pub fn new(disk: Disk) -> FsResult<Self> {
        let mut block = [0u8; UFS_BLOCK_SIZE];
        disk.read_block(0, &mut block)?;
        let super_block: SuperBlock = decode(&block);
        Ok(Self { disk, super_block })
    }

    /// Returns a copy of the super block.
    pub fn super_block(&self) -> SuperBlock {
        self.super_block
    }

    // Region I/O. The canonical copy of each region lives on disk; these
    // helpers move whole regions through a transaction's scratch.

    fn read_bitmap(&self, addr: u32, len: u32, count: usize) -> FsResult<Bitmap> {
        let mut bytes = Vec::with_capacity(len as usize * UFS_BLOCK_SIZE);
        let mut block = [0u8; UFS_BLOCK_SIZE];
        for i in 0..len {
            self.disk.read_block(addr + i, &mut block)?;
            bytes.extend_from_slice(&block);
        }
        Ok(Bitmap::from_bytes(bytes, count))
    }

    fn write_bitmap(&mut self, addr: u32, bitmap: &Bitmap) -> FsResult<()> {
        for (i, chunk) in bitmap.as_bytes().chunks(UFS_BLOCK_SIZE).enumerate() {
            let mut block = [0u8; UFS_BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            self.disk.write_block(addr + i as u32, &block)?;
        }
        Ok(())
    }

    /// Reads the inode allocation bitmap.
    pub fn read_inode_bitmap(&self) -> FsResult<Bitmap> {
        let sb = &self.super_block;
        self.read_bitmap(
            sb.inode_bitmap_addr,
            sb.inode_bitmap_len,
            sb.num_inodes as usize,
        )
    }

    /// Reads the data allocation bitmap. Bit `i` tracks the data-region block
    /// at absolute address `data_region_addr + i`.
    pub fn read_data_bitmap(&self) -> FsResult<Bitmap> {
        let sb = &self.super_block;
        self.read_bitmap(
            sb.data_bitmap_addr,
            sb.data_bitmap_len,
            sb.num_data as usize,
        )
    }

    fn write_inode_bitmap(&mut self, bitmap: &Bitmap) -> FsResult<()> {
        self.write_bitmap(self.super_block.inode_bitmap_addr, bitmap)
    }

    fn write_data_bitmap(&mut self, bitmap: &Bitmap) -> FsResult<()> {
        self.write_bitmap(self.super_block.data_bitmap_addr, bitmap)
    }

    fn read_inode_region(&self) -> FsResult<Vec<Inode>> {
        let sb = &self.super_block;
        let mut inodes = Vec::with_capacity(sb.num_inodes as usize);
        let mut block = [0u8; UFS_BLOCK_SIZE];
        for i in 0..sb.inode_region_len {
            self.disk.read_block(sb.inode_region_addr + i, &mut block)?;
            for j in 0..INODES_PER_BLOCK {
                if inodes.len() == sb.num_inodes as usize {
                    break;
                }
                inodes.push(decode(&block[j * size_of::<Inode>()..]));
            }
        }
        Ok(inodes)
    }

    fn write_inode_region(&mut self, inodes: &[Inode]) -> FsResult<()> {
        let sb = &self.super_block;
        let addr = sb.inode_region_addr;
        for i in 0..sb.inode_region_len {
            let mut block = [0u8; UFS_BLOCK_SIZE];
            for j in 0..INODES_PER_BLOCK {
                let n = i as usize * INODES_PER_BLOCK + j;
                if n >= inodes.len() {
                    break;
                }
                let offset = j * size_of::<Inode>();
                block[offset..offset + size_of::<Inode>()]
                    .copy_from_slice(reinterpret(&inodes[n]));
            }
            self.disk.write_block(addr + i, &block)?;
        }
        Ok(())
    }

    // Allocation. First-fit: the lowest free index always wins.

    /// Allocates a free inode slot and persists the inode bitmap.
    pub fn allocate_inode(&mut self) -> FsResult<u32> {
        let mut bitmap = self.read_inode_bitmap()?;
        let i = bitmap.first_free().ok_or(UfsError::OutOfSpace)?;
        bitmap.set(i);
        self.write_inode_bitmap(&bitmap)?;
        Ok(i as u32)
    }

    /// Frees an inode slot and persists the inode bitmap.
    pub fn free_inode(&mut self, inode_number: u32) -> FsResult<()> {
        if inode_number >= self.super_block.num_inodes {
            return Err(UfsError::InvalidInode);
        }
        let mut bitmap = self.read_inode_bitmap()?;
        bitmap.clear(inode_number as usize);
        self.write_inode_bitmap(&bitmap)
    }

    /// Allocates a free data block, zeroes it, and returns its absolute block
    /// number.
    pub fn allocate_data_block(&mut self) -> FsResult<u32> {
        let mut bitmap = self.read_data_bitmap()?;
        let i = bitmap.first_free().ok_or(UfsError::OutOfSpace)?;
        bitmap.set(i);
        self.write_data_bitmap(&bitmap)?;
        let block = self.super_block.data_region_addr + i as u32;
        self.disk.write_block(block, &[0u8; UFS_BLOCK_SIZE])?;
        Ok(block)
    }

    /// Frees the data block at the given absolute block number and zeroes it.
    pub fn free_data_block(&mut self, block: u32) -> FsResult<()> {
        let sb = &self.super_block;
        if block < sb.data_region_addr || block >= sb.data_region_addr + sb.num_data {
            return Err(UfsError::BadRequest);
        }
        let i = (block - sb.data_region_addr) as usize;
        let mut bitmap = self.read_data_bitmap()?;
        bitmap.clear(i);
        self.write_data_bitmap(&bitmap)?;
        self.disk.write_block(block, &[0u8; UFS_BLOCK_SIZE])?;
        Ok(())
    }

    // Read-only operations. These never open a transaction.

    /// Returns the inode with the given number.
    ///
    /// Does not consult the inode bitmap: callers use this on probable-live
    /// inodes and rely on it being cheap.
    pub fn stat(&self, inode_number: u32) -> FsResult<Inode> {
        if inode_number >= self.super_block.num_inodes {
            return Err(UfsError::InvalidInode);
        }
        let block_index =
            self.super_block.inode_region_addr + inode_number / INODES_PER_BLOCK as u32;
        let offset = (inode_number as usize % INODES_PER_BLOCK) * size_of::<Inode>();
        let mut block = [0u8; UFS_BLOCK_SIZE];
        self.disk.read_block(block_index, &mut block)?;
        Ok(decode(&block[offset..]))
    }

    /// Reads up to `size` bytes of the object, starting at offset 0.
    ///
    /// Returns `min(size, inode.size)` bytes; a read never partially fails.
    pub fn read(&self, inode_number: u32, size: usize) -> FsResult<Vec<u8>> {
        let inode = self.stat(inode_number)?;
        let n = min(size, inode.size as usize);
        let mut out = Vec::with_capacity(n);
        let mut block = [0u8; UFS_BLOCK_SIZE];
        for i in 0..n.div_ceil(UFS_BLOCK_SIZE) {
            let ptr = inode.direct[i];
            if ptr == UNALLOCATED_BLOCK {
                return Err(UfsError::InvalidInode);
            }
            self.disk.read_block(ptr, &mut block)?;
            let len = min(UFS_BLOCK_SIZE, n - i * UFS_BLOCK_SIZE);
            out.extend_from_slice(&block[..len]);
        }
        Ok(out)
    }

    /// Finds `name` in the given directory and returns its inode number.
    pub fn lookup(&self, parent_inode_number: u32, name: &str) -> FsResult<u32> {
        let parent = self.stat(parent_inode_number)?;
        if parent.file_type() != Some(FileType::Directory)
            || (parent.size as usize) < 2 * DIR_ENT_SIZE
        {
            return Err(UfsError::InvalidInode);
        }
        let data = self.read(parent_inode_number, parent.size as usize)?;
        if data.len() < parent.size as usize {
            return Err(UfsError::InvalidInode);
        }
        for chunk in data.chunks_exact(DIR_ENT_SIZE) {
            let entry: DirEntry = decode(chunk);
            if entry.name_bytes() == name.as_bytes() {
                return Ok(entry.inum);
            }
        }
        Err(UfsError::NotFound)
    }

    /// Reads a directory as entry records.
    pub fn read_directory(&self, inode_number: u32) -> FsResult<Vec<DirEntry>> {
        let inode = self.stat(inode_number)?;
        if inode.file_type() != Some(FileType::Directory) {
            return Err(UfsError::InvalidType);
        }
        let data = self.read(inode_number, inode.size as usize)?;
        Ok(data.chunks_exact(DIR_ENT_SIZE).map(decode).collect())
    }

    // Mutating operations.

    fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> FsResult<T>,
    ) -> FsResult<T> {
        self.disk.begin_transaction();
        match f(self) {
            Ok(val) => {
                self.disk.commit()?;
                Ok(val)
            }
            Err(err) => {
                self.disk.rollback();
                Err(err)
            }
        }
    }

    /// Replaces the entire content of a regular file.
    ///
    /// Under capacity pressure the write degrades to a partial one: as many
    /// whole blocks as could be allocated are written and their byte count is
    /// returned as success.
    pub fn write(&mut self, inode_number: u32, data: &[u8]) -> FsResult<usize> {
        if data.len() >= MAX_FILE_SIZE {
            return Err(UfsError::InvalidSize);
        }
        let inode = self.stat(inode_number)?;
        if inode.file_type() != Some(FileType::Regular) {
            return Err(UfsError::InvalidType);
        }
        self.with_transaction(|fs| {
            let mut inodes = fs.read_inode_region()?;
            let mut node = inodes[inode_number as usize];
            let old_size = node.size as usize;
            let written = fs.write_data(&mut node, data, old_size)?;
            inodes[inode_number as usize] = node;
            fs.write_inode_region(&inodes)?;
            debug!("write inode {inode_number}: {written}/{} bytes", data.len());
            Ok(written)
        })
    }

    /// Creates `name` under the given parent directory.
    ///
    /// Creation is idempotent: if the name already exists with the same type,
    /// the existing inode number is returned with no side effects. An
    /// existing name of the other type is an error.
    pub fn create(&mut self, parent: u32, ftype: FileType, name: &str) -> FsResult<u32> {
        validate_name(name)?;
        match self.lookup(parent, name) {
            Ok(existing) => {
                let node = self.stat(existing)?;
                return if node.file_type() == Some(ftype) {
                    Ok(existing)
                } else {
                    Err(UfsError::InvalidType)
                };
            }
            Err(UfsError::NotFound) => {}
            Err(err) => return Err(err),
        }
        if self.stat(parent)?.size as usize + DIR_ENT_SIZE > MAX_FILE_SIZE {
            return Err(UfsError::OutOfSpace);
        }
        self.with_transaction(|fs| {
            let inum = fs.allocate_inode()?;
            let mut inodes = fs.read_inode_region()?;

            let mut node = Inode::empty(ftype);
            if ftype == FileType::Directory {
                let mut entries = Vec::with_capacity(2 * DIR_ENT_SIZE);
                entries.extend_from_slice(reinterpret(&DirEntry::new(".", inum).unwrap()));
                entries.extend_from_slice(reinterpret(&DirEntry::new("..", parent).unwrap()));
                if fs.write_data(&mut node, &entries, 0)? < entries.len() {
                    return Err(UfsError::OutOfSpace);
                }
            }
            inodes[inum as usize] = node;

            // Append the new entry at the parent's tail.
            let mut pnode = inodes[parent as usize];
            let old_size = pnode.size as usize;
            let mut dir = fs.read(parent, old_size)?;
            let entry = DirEntry::new(name, inum).ok_or(UfsError::InvalidName)?;
            dir.extend_from_slice(reinterpret(&entry));
            if fs.write_data(&mut pnode, &dir, old_size)? < dir.len() {
                return Err(UfsError::OutOfSpace);
            }
            inodes[parent as usize] = pnode;

            fs.write_inode_region(&inodes)?;
            debug!("create {name:?} -> inode {inum} under {parent}");
            Ok(inum)
        })
    }

    /// Removes `name` from the given parent directory and frees the inode and
    /// data blocks behind it.
    ///
    /// A directory must be empty (only `.` and `..`) to be unlinked. A
    /// missing name commits the empty transaction and reports `NotFound`, so
    /// unlinking is idempotent from the caller's viewpoint.
    pub fn unlink(&mut self, parent: u32, name: &str) -> FsResult<()> {
        if name == "." || name == ".." {
            return Err(UfsError::InvalidName);
        }
        self.disk.begin_transaction();
        match self.unlink_inner(parent, name) {
            Ok(()) => {
                self.disk.commit()?;
                Ok(())
            }
            Err(UfsError::NotFound) => {
                self.disk.commit()?;
                Err(UfsError::NotFound)
            }
            Err(err) => {
                self.disk.rollback();
                Err(err)
            }
        }
    }

    fn unlink_inner(&mut self, parent: u32, name: &str) -> FsResult<()> {
        let target = self.lookup(parent, name)?;
        let mut inodes = self.read_inode_region()?;

        let mut tnode = inodes[target as usize];
        if tnode.file_type() == Some(FileType::Directory) {
            if tnode.size as usize > 2 * DIR_ENT_SIZE {
                return Err(UfsError::DirNotEmpty);
            }
            // Drop `.` and `..`, freeing the directory's only data block.
            let old = tnode.size as usize;
            self.write_data(&mut tnode, &[], old)?;
        }

        // Remove the entry from the parent, shifting the tail left.
        let mut pnode = inodes[parent as usize];
        let old_size = pnode.size as usize;
        let dir = self.read(parent, old_size)?;
        let mut kept = Vec::with_capacity(old_size - DIR_ENT_SIZE);
        for chunk in dir.chunks_exact(DIR_ENT_SIZE) {
            let entry: DirEntry = decode(chunk);
            if entry.name_bytes() != name.as_bytes() {
                kept.extend_from_slice(chunk);
            }
        }
        self.write_data(&mut pnode, &kept, old_size)?;
        inodes[parent as usize] = pnode;

        // Release whatever the target still points at, then the inode itself.
        for i in 0..DIRECT_PTRS {
            if tnode.direct[i] != UNALLOCATED_BLOCK {
                self.free_data_block(tnode.direct[i])?;
                tnode.direct[i] = UNALLOCATED_BLOCK;
            }
        }
        tnode.size = 0;
        inodes[target as usize] = tnode;
        self.free_inode(target)?;

        self.write_inode_region(&inodes)?;
        debug!("unlink {name:?} (inode {target}) from {parent}");
        Ok(())
    }

    /// The allocation engine shared by file writes and directory maintenance.
    ///
    /// Adjusts the inode's block set from `old_size` to `data.len()` bytes,
    /// writes the payload with the last block zero-padded, and updates the
    /// inode's size to the bytes actually written. When allocation fails
    /// mid-growth the write is truncated to the blocks already obtained.
    fn write_data(&mut self, node: &mut Inode, data: &[u8], old_size: usize) -> FsResult<usize> {
        let old_blocks = old_size.div_ceil(UFS_BLOCK_SIZE);
        let mut new_blocks = data.len().div_ceil(UFS_BLOCK_SIZE);
        if old_blocks == 0 {
            // A fresh inode may carry zeros or sentinels; normalize.
            node.direct = [UNALLOCATED_BLOCK; DIRECT_PTRS];
        }
        for i in new_blocks..old_blocks {
            if node.direct[i] != UNALLOCATED_BLOCK {
                self.free_data_block(node.direct[i])?;
                node.direct[i] = UNALLOCATED_BLOCK;
            }
        }
        for i in old_blocks..new_blocks {
            match self.allocate_data_block() {
                Ok(block) => node.direct[i] = block,
                Err(UfsError::OutOfSpace) => {
                    new_blocks = i;
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        let written = min(data.len(), new_blocks * UFS_BLOCK_SIZE);
        for i in 0..new_blocks {
            let start = i * UFS_BLOCK_SIZE;
            let chunk = &data[start..min(written, start + UFS_BLOCK_SIZE)];
            let mut block: Block = [0; UFS_BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            self.disk.write_block(node.direct[i], &block)?;
        }
        node.size = written as u32;
        Ok(written)
    }

    #[cfg(test)]
    pub(crate) fn disk_mut(&mut self) -> &mut Disk {
        &mut self.disk
    }
}
