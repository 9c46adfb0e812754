//! File-backed block device with transactional writes.
//!
//! A [`Disk`] exposes fixed-size block reads and writes over a disk image
//! (a regular file or a block device). Writes issued between
//! [`Disk::begin_transaction`] and [`Disk::commit`] are buffered in memory
//! and only reach the image on commit; [`Disk::rollback`] discards them.
//! Reads always observe buffered blocks first, so a transaction sees its own
//! writes.

use log::debug;
use std::collections::BTreeMap;
use std::ffi::c_long;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Error;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileExt;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use crate::layout::UFS_BLOCK_SIZE;

/// A raw disk block.
pub type Block = [u8; UFS_BLOCK_SIZE];

/// ioctl command: get the size of a block device in bytes.
const BLKGETSIZE64: c_long = (2 << 30) | (0x12 << 8) | 114 | ((size_of::<u64>() as c_long) << 16);

/// Returns the size in bytes of the file or block device at the given path.
pub fn device_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(path)?;
    let file_type = metadata.file_type();
    if file_type.is_block_device() || file_type.is_char_device() {
        let dev = File::open(path)?;
        let mut size = 0u64;
        let ret = unsafe { libc::ioctl(dev.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
        if ret < 0 {
            return Err(Error::last_os_error());
        }
        Ok(size)
    } else {
        Ok(metadata.len())
    }
}

/// A block device over a disk image.
pub struct Disk {
    file: File,
    num_blocks: u32,
    /// Writes buffered by the open transaction, keyed by block number.
    pending: Option<BTreeMap<u32, Box<Block>>>,
    /// When set, the next write fails after this many successes.
    #[cfg(test)]
    pub(crate) fail_after: Option<u32>,
}

impl Disk {
    /// Opens an existing disk image for reading and writing.
    pub fn open(path: &Path) -> io::Result<Self> {
        let size = device_size(path)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("opened disk image {} ({size} bytes)", path.display());
        Ok(Self {
            file,
            num_blocks: (size / UFS_BLOCK_SIZE as u64) as u32,
            pending: None,
            #[cfg(test)]
            fail_after: None,
        })
    }

    /// Creates (or truncates) a disk image of `num_blocks` blocks.
    pub fn create(path: &Path, num_blocks: u32) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(num_blocks as u64 * UFS_BLOCK_SIZE as u64)?;
        Ok(Self {
            file,
            num_blocks,
            pending: None,
            #[cfg(test)]
            fail_after: None,
        })
    }

    /// Returns the number of blocks on the disk.
    pub fn num_blocks(&self) -> u32 {
        self.num_blocks
    }

    fn check_block(&self, n: u32) -> io::Result<()> {
        if n >= self.num_blocks {
            return Err(Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {n} out of range"),
            ));
        }
        Ok(())
    }

    /// Reads block `n` into `buf`.
    pub fn read_block(&self, n: u32, buf: &mut Block) -> io::Result<()> {
        self.check_block(n)?;
        if let Some(pending) = &self.pending
            && let Some(block) = pending.get(&n)
        {
            buf.copy_from_slice(&block[..]);
            return Ok(());
        }
        self.file
            .read_exact_at(buf, n as u64 * UFS_BLOCK_SIZE as u64)
    }

    /// Writes `buf` to block `n`.
    ///
    /// Inside a transaction the write is buffered until [`Disk::commit`].
    pub fn write_block(&mut self, n: u32, buf: &Block) -> io::Result<()> {
        self.check_block(n)?;
        #[cfg(test)]
        if let Some(left) = &mut self.fail_after {
            if *left == 0 {
                return Err(Error::other("injected write failure"));
            }
            *left -= 1;
        }
        match &mut self.pending {
            Some(pending) => {
                pending.insert(n, Box::new(*buf));
                Ok(())
            }
            None => self
                .file
                .write_all_at(buf, n as u64 * UFS_BLOCK_SIZE as u64),
        }
    }

    /// Starts buffering writes. Nested transactions are not supported.
    pub fn begin_transaction(&mut self) {
        assert!(self.pending.is_none(), "nested transaction");
        self.pending = Some(BTreeMap::new());
    }

    /// Flushes every buffered write to the image and closes the transaction.
    pub fn commit(&mut self) -> io::Result<()> {
        let pending = self.pending.take().expect("commit outside transaction");
        debug!("committing {} block(s)", pending.len());
        for (n, block) in pending {
            self.file
                .write_all_at(&block[..], n as u64 * UFS_BLOCK_SIZE as u64)?;
        }
        Ok(())
    }

    /// Discards every buffered write and closes the transaction.
    pub fn rollback(&mut self) {
        let pending = self.pending.take().expect("rollback outside transaction");
        debug!("rolled back {} block(s)", pending.len());
    }
}
