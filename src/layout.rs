//! On-disk block layout: the root block, directory-entry blocks and the
//! free/chain table, each exactly one [`BLOCK_SIZE`] in size so a block can
//! be read or written with a single positioned I/O call and reinterpreted
//! in place via `bytemuck`.

use bytemuck::{Pod, Zeroable};

pub const BLOCK_SIZE: usize = 512;
pub const MAX_NAME_LEN: usize = 8;
pub const MAX_EXT_LEN: usize = 3;

/// Block 0 and block 1 are reserved for the root block and the chain table;
/// data blocks (directory-entry blocks and file data blocks) start here.
pub const FIRST_DATA_BLOCK: u32 = 2;

/// One `i16` table slot per block in the image, table slots pack exactly
/// into a single block, which bounds the image at this many blocks.
pub const MAX_BLOCKS: usize = BLOCK_SIZE / 2;

/// `table[b] == EOF_SENTINEL` marks `b` as the last block in its chain.
pub const EOF_SENTINEL: i16 = -1;

/// A directory name stored in the root block plus the block where that
/// directory's entries live.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RawDirSlot {
    pub start_block: i32,
    pub name: [u8; MAX_NAME_LEN + 1],
    pub _pad: [u8; 3],
}

const _: () = assert!(std::mem::size_of::<RawDirSlot>() == 16);

/// A file name/extension pair stored in a directory-entry block, plus its
/// size and the first block of its data chain.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RawFileSlot {
    pub start_block: i32,
    pub size: u32,
    pub name: [u8; MAX_NAME_LEN + 1],
    pub ext: [u8; MAX_EXT_LEN + 1],
    pub _pad: [u8; 3],
}

const _: () = assert!(std::mem::size_of::<RawFileSlot>() == 24);

pub const ROOT_CAPACITY: usize = (BLOCK_SIZE - 4) / std::mem::size_of::<RawDirSlot>();
pub const ROOT_PAD: usize =
    BLOCK_SIZE - 4 - ROOT_CAPACITY * std::mem::size_of::<RawDirSlot>();

pub const DIR_CAPACITY: usize = (BLOCK_SIZE - 4) / std::mem::size_of::<RawFileSlot>();
pub const DIR_PAD: usize =
    BLOCK_SIZE - 4 - DIR_CAPACITY * std::mem::size_of::<RawFileSlot>();

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RootBlock {
    pub n_directories: i32,
    pub directories: [RawDirSlot; ROOT_CAPACITY],
    pub _padding: [u8; ROOT_PAD],
}

const _: () = assert!(std::mem::size_of::<RootBlock>() == BLOCK_SIZE);

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DirEntryBlock {
    pub n_files: i32,
    pub files: [RawFileSlot; DIR_CAPACITY],
    pub _padding: [u8; DIR_PAD],
}

const _: () = assert!(std::mem::size_of::<DirEntryBlock>() == BLOCK_SIZE);

pub const TABLE_CAPACITY: usize = MAX_BLOCKS;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ChainTableBlock {
    pub slots: [i16; TABLE_CAPACITY],
}

const _: () = assert!(std::mem::size_of::<ChainTableBlock>() == BLOCK_SIZE);

/// Encodes `s` into a fixed-width, NUL-terminated field. Returns `None` if
/// `s` does not fit (including the terminating NUL).
pub fn encode_field<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() >= N {
        return None;
    }
    let mut buf = [0u8; N];
    buf[..s.len()].copy_from_slice(s.as_bytes());
    Some(buf)
}

/// Decodes a fixed-width field back to a `String`, stopping at the first
/// NUL byte (or the end of the field if there is none).
pub fn decode_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
