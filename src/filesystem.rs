//! `BlockFs` ties block I/O, on-disk layout and the chain-table allocator
//! together into the operations the FUSE adapter drives.

use bytemuck::{bytes_of, from_bytes, Zeroable};

use crate::block_io::BlockDevice;
use crate::error::FsError;
use crate::layout::{decode_field, DirEntryBlock, RawDirSlot, RawFileSlot, RootBlock, BLOCK_SIZE};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// The kind and size a `getattr`-style lookup resolves to; mode and link
/// count are fixed per spec rather than tracked on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
}

#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u16,
    pub nlink: u32,
}

pub(crate) const DIR_MODE: u16 = 0o755;
pub(crate) const FILE_MODE: u16 = 0o666;

pub struct BlockFs {
    pub(crate) device: BlockDevice,
}

impl BlockFs {
    /// Opens an existing, already-initialised image.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FsError> {
        Ok(Self {
            device: BlockDevice::new(path),
        })
    }

    /// Creates a new image file sized for [`crate::layout::MAX_BLOCKS`]
    /// blocks, with a zeroed root block and chain table, if one does not
    /// already exist at `path`.
    pub fn create_if_missing(path: impl AsRef<Path>) -> Result<Self, FsError> {
        let path = path.as_ref();
        if !path.exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            let zero = [0u8; BLOCK_SIZE];
            for _ in 0..crate::layout::MAX_BLOCKS {
                file.write_all(&zero)?;
            }
            file.sync_all()?;
            log::info!("initialised new image at {}", path.display());
        }
        Ok(Self {
            device: BlockDevice::new(path),
        })
    }

    pub(crate) fn load_root(&self) -> Result<RootBlock, FsError> {
        let raw = self.device.read_block(0)?;
        Ok(*from_bytes::<RootBlock>(&raw))
    }

    pub(crate) fn save_root(&self, root: &RootBlock) -> Result<(), FsError> {
        let raw: [u8; BLOCK_SIZE] = bytes_of(root).try_into().expect("block-sized");
        self.device.write_block(0, &raw)
    }

    pub(crate) fn load_dir(&self, block: u32) -> Result<DirEntryBlock, FsError> {
        let raw = self.device.read_block(block)?;
        Ok(*from_bytes::<DirEntryBlock>(&raw))
    }

    pub(crate) fn save_dir(&self, block: u32, dir: &DirEntryBlock) -> Result<(), FsError> {
        let raw: [u8; BLOCK_SIZE] = bytes_of(dir).try_into().expect("block-sized");
        self.device.write_block(block, &raw)
    }

    pub(crate) fn zero_block(&self, block: u32) -> Result<(), FsError> {
        self.device.write_block(block, &[0u8; BLOCK_SIZE])
    }
}

pub(crate) fn find_dir_slot(root: &RootBlock, name: &str) -> Option<(usize, RawDirSlot)> {
    (0..root.n_directories as usize)
        .map(|i| (i, root.directories[i]))
        .find(|(_, slot)| decode_field(&slot.name) == name)
}

pub(crate) fn find_file_slot(
    dir: &DirEntryBlock,
    name: &str,
    ext: &str,
) -> Option<(usize, RawFileSlot)> {
    (0..dir.n_files as usize)
        .map(|i| (i, dir.files[i]))
        .find(|(_, slot)| decode_field(&slot.name) == name && decode_field(&slot.ext) == ext)
}

pub(crate) fn empty_dir_slot(root: &RootBlock) -> Option<usize> {
    (0..crate::layout::ROOT_CAPACITY).find(|&i| {
        i >= root.n_directories as usize || decode_field(&root.directories[i].name).is_empty()
    })
}

pub(crate) fn empty_file_slot(dir: &DirEntryBlock) -> Option<usize> {
    (0..crate::layout::DIR_CAPACITY)
        .find(|&i| i >= dir.n_files as usize || decode_field(&dir.files[i].name).is_empty())
}

pub(crate) fn zeroed_dir() -> DirEntryBlock {
    DirEntryBlock::zeroed()
}
