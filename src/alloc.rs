//! The free/chain table: a flat array of one slot per block in the image.
//! A slot of `0` means the block is free, [`EOF_SENTINEL`] means the block
//! is the last in its chain, any other value is the index of the next
//! block in the chain.

use bytemuck::{bytes_of, from_bytes};

use crate::block_io::BlockDevice;
use crate::error::FsError;
use crate::layout::{ChainTableBlock, BLOCK_SIZE, EOF_SENTINEL, FIRST_DATA_BLOCK, TABLE_CAPACITY};

pub const TABLE_BLOCK_INDEX: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLink {
    Next(u32),
    Eof,
}

pub struct ChainTable {
    block: ChainTableBlock,
}

impl ChainTable {
    pub fn load(device: &BlockDevice) -> Result<Self, FsError> {
        let raw = device.read_block(TABLE_BLOCK_INDEX)?;
        let block = *from_bytes::<ChainTableBlock>(&raw);
        Ok(Self { block })
    }

    pub fn save(&self, device: &BlockDevice) -> Result<(), FsError> {
        let raw: [u8; BLOCK_SIZE] = bytes_of(&self.block).try_into().expect("block-sized");
        device.write_block(TABLE_BLOCK_INDEX, &raw)
    }

    pub fn chain_successor(&self, block: u32) -> ChainLink {
        match self.block.slots[block as usize] {
            EOF_SENTINEL => ChainLink::Eof,
            n => ChainLink::Next(n as u32),
        }
    }

    pub fn set_successor(&mut self, block: u32, link: ChainLink) {
        self.block.slots[block as usize] = match link {
            ChainLink::Eof => EOF_SENTINEL,
            ChainLink::Next(n) => n as i16,
        };
    }

    /// Scans for the first free block (slot value `0`) at or past
    /// [`FIRST_DATA_BLOCK`], marks it [`EOF_SENTINEL`] and returns it.
    /// Callers that thread the new block into an existing chain must update
    /// the predecessor's slot themselves.
    pub fn allocate_block(&mut self) -> Option<u32> {
        for b in (FIRST_DATA_BLOCK as usize)..TABLE_CAPACITY {
            if self.block.slots[b] == 0 {
                self.block.slots[b] = EOF_SENTINEL;
                log::info!("allocated block {b}");
                return Some(b as u32);
            }
        }
        None
    }

    /// Follows successors from `start` up to `steps` times, stopping early
    /// (and returning the last block reached) if the chain ends first.
    pub fn walk(&self, start: u32, steps: u32) -> u32 {
        let mut cur = start;
        for _ in 0..steps {
            match self.chain_successor(cur) {
                ChainLink::Next(n) => cur = n,
                ChainLink::Eof => break,
            }
        }
        cur
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RootBlock;
    use bytemuck::Zeroable;
    use std::io::Write;

    fn scratch_image() -> (tempfile::NamedTempFile, BlockDevice) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let zero = [0u8; BLOCK_SIZE];
        for _ in 0..TABLE_CAPACITY {
            file.write_all(&zero).unwrap();
        }
        file.flush().unwrap();
        let root = RootBlock::zeroed();
        let device = BlockDevice::new(file.path());
        let raw: [u8; BLOCK_SIZE] = bytemuck::bytes_of(&root).try_into().unwrap();
        device.write_block(0, &raw).unwrap();
        (file, device)
    }

    #[test]
    fn allocate_skips_reserved_blocks() {
        let (_file, device) = scratch_image();
        let mut table = ChainTable::load(&device).unwrap();
        let first = table.allocate_block().unwrap();
        assert_eq!(first, FIRST_DATA_BLOCK);
    }

    #[test]
    fn allocate_marks_block_eof_and_advances() {
        let (_file, device) = scratch_image();
        let mut table = ChainTable::load(&device).unwrap();
        let a = table.allocate_block().unwrap();
        assert_eq!(table.chain_successor(a), ChainLink::Eof);
        let b = table.allocate_block().unwrap();
        assert_ne!(a, b);
        table.set_successor(a, ChainLink::Next(b));
        assert_eq!(table.chain_successor(a), ChainLink::Next(b));
        assert_eq!(table.walk(a, 1), b);
        assert_eq!(table.walk(a, 5), b);
    }

    #[test]
    fn allocate_exhaustion_returns_none() {
        let (_file, device) = scratch_image();
        let mut table = ChainTable::load(&device).unwrap();
        let mut count = 0;
        while table.allocate_block().is_some() {
            count += 1;
        }
        assert_eq!(count, TABLE_CAPACITY - FIRST_DATA_BLOCK as usize);
        assert!(table.allocate_block().is_none());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let (_file, device) = scratch_image();
        let mut table = ChainTable::load(&device).unwrap();
        let a = table.allocate_block().unwrap();
        table.save(&device).unwrap();
        let reloaded = ChainTable::load(&device).unwrap();
        assert_eq!(reloaded.chain_successor(a), ChainLink::Eof);
    }
}
