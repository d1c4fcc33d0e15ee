//! Read and write paths: walking (and, for writes, extending) a file's
//! block chain.

use crate::alloc::{ChainLink, ChainTable};
use crate::error::FsError;
use crate::filesystem::{find_dir_slot, find_file_slot, BlockFs};
use crate::layout::BLOCK_SIZE;
use crate::path::{parse_path, PathRef};

impl BlockFs {
    /// Reads up to `size` bytes starting at `offset`. A missing parent
    /// directory or file entry reads as zero bytes rather than an error,
    /// matching the read path's "does not fail open" contract.
    pub fn read(&self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>, FsError> {
        let PathRef::File { dir, name, ext } = parse_path(path)? else {
            log::warn!("read {path}: is a directory");
            return Err(FsError::IsADirectory);
        };
        let root = self.load_root()?;
        let Some((_, dir_slot)) = find_dir_slot(&root, dir) else {
            return Ok(Vec::new());
        };
        let dir_block = self.load_dir(dir_slot.start_block as u32)?;
        let Some((_, file_slot)) = find_file_slot(&dir_block, name, ext) else {
            return Ok(Vec::new());
        };

        let file_size = file_slot.size as u64;
        if file_size == 0 || offset >= file_size {
            return Ok(Vec::new());
        }

        let table = ChainTable::load(&self.device)?;
        let block_size = BLOCK_SIZE as u64;
        let block_ordinal = (offset / block_size) as u32;
        let mut within = (offset % block_size) as usize;
        let mut block = table.walk(file_slot.start_block as u32, block_ordinal);

        let mut remaining = size.min((file_size - offset) as u32) as usize;
        let mut out = Vec::with_capacity(remaining);
        loop {
            if remaining == 0 {
                break;
            }
            let buf = self.device.read_block(block)?;
            let take = (BLOCK_SIZE - within).min(remaining);
            out.extend_from_slice(&buf[within..within + take]);
            remaining -= take;
            within = 0;
            if remaining == 0 {
                break;
            }
            match table.chain_successor(block) {
                ChainLink::Next(n) => block = n,
                ChainLink::Eof => break,
            }
        }
        log::debug!("read {} bytes from {path} at offset {offset}", out.len());
        Ok(out)
    }

    /// Writes `data` starting at `offset`, extending the file's block chain
    /// as needed. Writing beyond the current size is allowed only up to the
    /// end of the last allocated block; further extension happens through
    /// the normal high-water-mark growth below. Returns the number of bytes
    /// written, which is always `data.len()` on success.
    pub fn write(&self, path: &str, offset: u64, data: &[u8]) -> Result<u32, FsError> {
        let PathRef::File { dir, name, ext } = parse_path(path)? else {
            log::warn!("write {path}: is a directory");
            return Err(FsError::IsADirectory);
        };
        if data.is_empty() {
            return Ok(0);
        }
        let root = self.load_root()?;
        let Some((_, dir_slot)) = find_dir_slot(&root, dir) else {
            return Ok(0);
        };
        let mut dir_block = self.load_dir(dir_slot.start_block as u32)?;
        let Some((file_idx, file_slot)) = find_file_slot(&dir_block, name, ext) else {
            return Ok(0);
        };

        if offset > file_slot.size as u64 {
            log::warn!(
                "write {path}: offset {offset} beyond current size {}",
                file_slot.size
            );
            return Err(FsError::FileTooBig);
        }

        let mut table = ChainTable::load(&self.device)?;
        let block_size = BLOCK_SIZE as u64;
        let block_ordinal = offset / block_size;
        let mut within = (offset % block_size) as usize;

        let mut block = file_slot.start_block as u32;
        for _ in 0..block_ordinal {
            match table.chain_successor(block) {
                ChainLink::Next(n) => block = n,
                ChainLink::Eof => {
                    let new_block = table.allocate_block().ok_or_else(|| {
                        log::warn!("write {path}: no free blocks while seeking to offset");
                        FsError::NoSpace
                    })?;
                    table.set_successor(block, ChainLink::Next(new_block));
                    self.zero_block(new_block)?;
                    log::info!("extended chain: {block} -> {new_block}");
                    block = new_block;
                }
            }
        }

        let mut written = 0usize;
        loop {
            let mut buf = self.device.read_block(block)?;
            let space = BLOCK_SIZE - within;
            let chunk = space.min(data.len() - written);
            buf[within..within + chunk].copy_from_slice(&data[written..written + chunk]);
            self.device.write_block(block, &buf)?;
            written += chunk;
            within = 0;

            if written == data.len() {
                break;
            }
            match table.chain_successor(block) {
                ChainLink::Next(n) => block = n,
                ChainLink::Eof => {
                    let new_block = table.allocate_block().ok_or_else(|| {
                        log::warn!("write {path}: no free blocks while extending chain");
                        FsError::NoSpace
                    })?;
                    table.set_successor(block, ChainLink::Next(new_block));
                    self.zero_block(new_block)?;
                    log::info!("extended chain: {block} -> {new_block}");
                    block = new_block;
                }
            }
        }

        let new_size = (file_slot.size).max((offset + data.len() as u64) as u32);
        dir_block.files[file_idx].size = new_size;

        self.save_dir(dir_slot.start_block as u32, &dir_block)?;
        table.save(&self.device)?;
        self.save_root(&root)?;
        log::debug!("wrote {} bytes to {path} at offset {offset}", data.len());
        Ok(data.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::BlockFs;
    use tempfile::NamedTempFile;

    fn scratch() -> (NamedTempFile, BlockFs) {
        let file = NamedTempFile::new().unwrap();
        let fs = BlockFs::create_if_missing(file.path()).unwrap();
        fs.mkdir("/photos").unwrap();
        fs.mknod("/photos/cat.jpg").unwrap();
        (file, fs)
    }

    #[test]
    fn write_then_read_round_trips_within_one_block() {
        let (_f, fs) = scratch();
        let n = fs.write("/photos/cat.jpg", 0, b"hello").unwrap();
        assert_eq!(n, 5);
        let attr = fs.getattr("/photos/cat.jpg").unwrap();
        assert_eq!(attr.size, 5);
        let data = fs.read("/photos/cat.jpg", 0, 5).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn write_spanning_multiple_blocks_extends_the_chain() {
        let (_f, fs) = scratch();
        let payload = vec![7u8; BLOCK_SIZE * 2 + 10];
        let n = fs.write("/photos/cat.jpg", 0, &payload).unwrap();
        assert_eq!(n as usize, payload.len());
        let attr = fs.getattr("/photos/cat.jpg").unwrap();
        assert_eq!(attr.size as usize, payload.len());
        let data = fs.read("/photos/cat.jpg", 0, payload.len() as u32).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn partial_read_respects_offset_and_size() {
        let (_f, fs) = scratch();
        fs.write("/photos/cat.jpg", 0, b"0123456789").unwrap();
        let data = fs.read("/photos/cat.jpg", 3, 4).unwrap();
        assert_eq!(data, b"3456");
    }

    #[test]
    fn read_past_end_of_file_returns_empty() {
        let (_f, fs) = scratch();
        fs.write("/photos/cat.jpg", 0, b"hi").unwrap();
        let data = fs.read("/photos/cat.jpg", 100, 10).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn read_on_missing_parent_returns_empty() {
        let (_f, fs) = scratch();
        let data = fs.read("/missing/cat.jpg", 0, 10).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn write_offset_beyond_size_is_rejected() {
        let (_f, fs) = scratch();
        assert!(matches!(
            fs.write("/photos/cat.jpg", 100, b"x"),
            Err(FsError::FileTooBig)
        ));
    }

    #[test]
    fn overwrite_in_place_preserves_surrounding_bytes() {
        let (_f, fs) = scratch();
        fs.write("/photos/cat.jpg", 0, b"0123456789").unwrap();
        fs.write("/photos/cat.jpg", 2, b"XY").unwrap();
        let data = fs.read("/photos/cat.jpg", 0, 10).unwrap();
        assert_eq!(data, b"01XY456789");
    }
}
