//! `getattr`, `readdir`, `mkdir` and `mknod` against the two-level
//! namespace.

use crate::alloc::ChainTable;
use crate::error::FsError;
use crate::filesystem::{
    empty_dir_slot, empty_file_slot, find_dir_slot, find_file_slot, zeroed_dir, Attr, BlockFs,
    EntryKind, DIR_MODE, FILE_MODE,
};
use crate::layout::{decode_field, encode_field, RawDirSlot, RawFileSlot};
use crate::path::{parse_path, PathRef};

impl BlockFs {
    pub fn getattr(&self, path: &str) -> Result<Attr, FsError> {
        match parse_path(path)? {
            PathRef::Root => Ok(Attr {
                kind: EntryKind::Directory,
                size: 0,
                mode: DIR_MODE,
                nlink: 2,
            }),
            PathRef::Directory { name } => {
                let root = self.load_root()?;
                find_dir_slot(&root, name)
                    .map(|_| Attr {
                        kind: EntryKind::Directory,
                        size: 0,
                        mode: DIR_MODE,
                        nlink: 2,
                    })
                    .ok_or(FsError::NotFound)
            }
            PathRef::File { dir, name, ext } => {
                let root = self.load_root()?;
                let (_, dir_slot) = find_dir_slot(&root, dir).ok_or(FsError::NotFound)?;
                let dir_block = self.load_dir(dir_slot.start_block as u32)?;
                let (_, file_slot) =
                    find_file_slot(&dir_block, name, ext).ok_or(FsError::NotFound)?;
                Ok(Attr {
                    kind: EntryKind::RegularFile,
                    size: file_slot.size as u64,
                    mode: FILE_MODE,
                    nlink: 1,
                })
            }
        }
    }

    /// Returns the full listing (including `.` and `..`) for the root or a
    /// directory. Any other path shape is not a directory, so it is
    /// reported as not found.
    pub fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        match parse_path(path)? {
            PathRef::Root => {
                let root = self.load_root()?;
                let mut entries = vec![".".to_string(), "..".to_string()];
                for i in 0..root.n_directories as usize {
                    entries.push(decode_field(&root.directories[i].name));
                }
                Ok(entries)
            }
            PathRef::Directory { name } => {
                let root = self.load_root()?;
                let (_, dir_slot) = find_dir_slot(&root, name).ok_or(FsError::NotFound)?;
                let dir_block = self.load_dir(dir_slot.start_block as u32)?;
                let mut entries = vec![".".to_string(), "..".to_string()];
                for i in 0..dir_block.n_files as usize {
                    let slot = dir_block.files[i];
                    let name = decode_field(&slot.name);
                    let ext = decode_field(&slot.ext);
                    entries.push(if ext.is_empty() {
                        name
                    } else {
                        format!("{name}.{ext}")
                    });
                }
                Ok(entries)
            }
            PathRef::File { .. } => Err(FsError::NotFound),
        }
    }

    /// Creates a new, empty directory directly under the root. Rejects any
    /// path that is not a single-component directory reference.
    pub fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let PathRef::Directory { name } = parse_path(path)? else {
            log::warn!("mkdir {path}: not a single-component directory path");
            return Err(FsError::NotPermitted);
        };
        let mut root = self.load_root()?;
        if find_dir_slot(&root, name).is_some() {
            log::warn!("mkdir {path}: already exists");
            return Err(FsError::AlreadyExists);
        }
        let slot_idx = empty_dir_slot(&root).ok_or_else(|| {
            log::warn!("mkdir {path}: root directory is full");
            FsError::NoSpace
        })?;

        let mut table = ChainTable::load(&self.device)?;
        let block = table.allocate_block().ok_or_else(|| {
            log::warn!("mkdir {path}: no free blocks");
            FsError::NoSpace
        })?;

        self.save_dir(block, &zeroed_dir())?;
        table.save(&self.device)?;

        root.directories[slot_idx] = RawDirSlot {
            start_block: block as i32,
            name: encode_field::<9>(name).ok_or_else(|| {
                log::warn!("mkdir {path}: name too long");
                FsError::NameTooLong
            })?,
            _pad: [0; 3],
        };
        if slot_idx as i32 >= root.n_directories {
            root.n_directories = slot_idx as i32 + 1;
        }
        self.save_root(&root)?;
        log::info!("created directory {name}");
        Ok(())
    }

    /// Creates a new, empty file inside an existing directory. Rejects any
    /// path that is not a two-component file reference.
    pub fn mknod(&self, path: &str) -> Result<(), FsError> {
        let PathRef::File { dir, name, ext } = parse_path(path)? else {
            log::warn!("mknod {path}: not a two-component file path");
            return Err(FsError::NotPermitted);
        };
        let root = self.load_root()?;
        let (_, dir_slot) = find_dir_slot(&root, dir).ok_or(FsError::NotFound)?;
        let mut dir_block = self.load_dir(dir_slot.start_block as u32)?;

        if find_file_slot(&dir_block, name, ext).is_some() {
            log::warn!("mknod {path}: already exists");
            return Err(FsError::AlreadyExists);
        }
        let slot_idx = empty_file_slot(&dir_block).ok_or_else(|| {
            log::warn!("mknod {path}: directory {dir} is full");
            FsError::NoSpace
        })?;

        let mut table = ChainTable::load(&self.device)?;
        let block = table.allocate_block().ok_or_else(|| {
            log::warn!("mknod {path}: no free blocks");
            FsError::NoSpace
        })?;
        self.zero_block(block)?;

        dir_block.files[slot_idx] = RawFileSlot {
            start_block: block as i32,
            size: 0,
            name: encode_field::<9>(name).ok_or_else(|| {
                log::warn!("mknod {path}: name too long");
                FsError::NameTooLong
            })?,
            ext: encode_field::<4>(ext).ok_or_else(|| {
                log::warn!("mknod {path}: extension too long");
                FsError::NameTooLong
            })?,
            _pad: [0; 3],
        };
        if slot_idx as i32 >= dir_block.n_files {
            dir_block.n_files = slot_idx as i32 + 1;
        }

        self.save_dir(dir_slot.start_block as u32, &dir_block)?;
        table.save(&self.device)?;
        // Rewritten even though unchanged, matching the source's observable
        // persistence order for this operation.
        self.save_root(&root)?;
        log::info!("created file {dir}/{name}.{ext}");
        Ok(())
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
        (file, fs)
    }

    #[test]
    fn mkdir_then_getattr_and_readdir() {
        let (_f, fs) = scratch();
        fs.mkdir("/photos").unwrap();
        let attr = fs.getattr("/photos").unwrap();
        assert_eq!(attr.kind, EntryKind::Directory);
        assert_eq!(fs.readdir("/").unwrap(), vec![".", "..", "photos"]);
    }

    #[test]
    fn mkdir_duplicate_is_rejected() {
        let (_f, fs) = scratch();
        fs.mkdir("/photos").unwrap();
        assert!(matches!(fs.mkdir("/photos"), Err(FsError::AlreadyExists)));
    }

    #[test]
    fn mkdir_multi_component_is_not_permitted() {
        let (_f, fs) = scratch();
        assert!(matches!(fs.mkdir("/a/b"), Err(FsError::NotPermitted)));
    }

    #[test]
    fn mknod_duplicate_is_rejected() {
        let (_f, fs) = scratch();
        fs.mkdir("/photos").unwrap();
        fs.mknod("/photos/cat.jpg").unwrap();
        assert!(matches!(
            fs.mknod("/photos/cat.jpg"),
            Err(FsError::AlreadyExists)
        ));
    }

    #[test]
    fn mknod_against_missing_parent_is_not_found() {
        let (_f, fs) = scratch();
        assert!(matches!(
            fs.mknod("/missing/cat.jpg"),
            Err(FsError::NotFound)
        ));
    }

    #[test]
    fn mknod_then_readdir_and_getattr() {
        let (_f, fs) = scratch();
        fs.mkdir("/photos").unwrap();
        fs.mknod("/photos/cat.jpg").unwrap();
        assert_eq!(
            fs.readdir("/photos").unwrap(),
            vec![".", "..", "cat.jpg"]
        );
        let attr = fs.getattr("/photos/cat.jpg").unwrap();
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn readdir_on_file_path_is_not_found() {
        let (_f, fs) = scratch();
        fs.mkdir("/photos").unwrap();
        fs.mknod("/photos/cat.jpg").unwrap();
        assert!(matches!(
            fs.readdir("/photos/cat.jpg"),
            Err(FsError::NotFound)
        ));
    }
}
