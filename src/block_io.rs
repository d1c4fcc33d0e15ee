//! Raw positioned block I/O against the backing disk image.
//!
//! Every call opens the image file, performs one positioned read or write,
//! and closes it again — there is no cached file handle and no in-process
//! locking, matching the single-threaded, open-per-callback model the core
//! is built around.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::FsError;
use crate::layout::BLOCK_SIZE;

#[derive(Debug, Clone)]
pub struct BlockDevice {
    path: PathBuf,
}

impl BlockDevice {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_block(&self, index: u32) -> Result<[u8; BLOCK_SIZE], FsError> {
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        file.seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        let mut buf = [0u8; BLOCK_SIZE];
        file.read_exact(&mut buf)?;
        log::debug!("read block {index} ({BLOCK_SIZE} bytes)");
        Ok(buf)
    }

    pub fn write_block(&self, index: u32, data: &[u8; BLOCK_SIZE]) -> Result<(), FsError> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        file.write_all(data)?;
        file.sync_data()?;
        log::debug!("wrote block {index} ({BLOCK_SIZE} bytes)");
        Ok(())
    }
}
