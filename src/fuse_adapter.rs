//! Binds [`BlockFs`]'s path-based operations to `fuser`'s inode-based
//! `Filesystem` trait.
//!
//! FUSE addresses everything by a flat `u64` inode; the core addresses
//! everything by path. Inode numbers here are synthetic and recomputed from
//! on-disk state on every call rather than persisted: root is always `1`,
//! a directory's inode is derived from its slot index in the root block,
//! and a file's inode packs its parent's directory index together with its
//! own slot index in that directory's entry block.

use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};

use crate::error::FsError;
use crate::filesystem::{find_dir_slot, find_file_slot, Attr, BlockFs, EntryKind, DIR_MODE, FILE_MODE};

const TTL: Duration = Duration::from_secs(1);
const ROOT_INODE: u64 = 1;
const FILE_INODE_BASE: u64 = 1_000_000;

fn dir_inode(index: usize) -> u64 {
    2 + index as u64
}

fn file_inode(dir_index: usize, file_index: usize) -> u64 {
    FILE_INODE_BASE + ((dir_index as u64) << 16) + file_index as u64
}

fn dir_index_of(ino: u64) -> usize {
    (ino - 2) as usize
}

fn split_name(name: &str) -> (&str, &str) {
    match name.split_once('.') {
        Some((n, e)) => (n, e),
        None => (name, ""),
    }
}

/// Rebuilds the absolute path a core operation expects from a synthetic
/// inode number.
fn path_for_inode(fs: &BlockFs, ino: u64) -> Result<String, FsError> {
    if ino == ROOT_INODE {
        return Ok("/".to_string());
    }
    let root = fs.load_root()?;
    if ino < FILE_INODE_BASE {
        let idx = dir_index_of(ino);
        let slot = root.directories.get(idx).ok_or(FsError::NotFound)?;
        if idx >= root.n_directories as usize {
            return Err(FsError::NotFound);
        }
        Ok(format!("/{}", crate::layout::decode_field(&slot.name)))
    } else {
        let rest = ino - FILE_INODE_BASE;
        let dir_idx = (rest >> 16) as usize;
        let file_idx = (rest & 0xFFFF) as usize;
        let dir_slot = root.directories.get(dir_idx).ok_or(FsError::NotFound)?;
        let dir_block = fs.load_dir(dir_slot.start_block as u32)?;
        let slot = dir_block.files.get(file_idx).ok_or(FsError::NotFound)?;
        if file_idx >= dir_block.n_files as usize {
            return Err(FsError::NotFound);
        }
        let name = crate::layout::decode_field(&slot.name);
        let ext = crate::layout::decode_field(&slot.ext);
        Ok(if ext.is_empty() {
            format!("/{}/{name}", crate::layout::decode_field(&dir_slot.name))
        } else {
            format!("/{}/{name}.{ext}", crate::layout::decode_field(&dir_slot.name))
        })
    }
}

/// Resolves a (parent inode, entry name) pair to the child's synthetic
/// inode and attributes, without going through path parsing again.
fn child_entry(fs: &BlockFs, parent: u64, name: &str) -> Result<(u64, Attr), FsError> {
    let root = fs.load_root()?;
    if parent == ROOT_INODE {
        let (idx, _) = find_dir_slot(&root, name).ok_or(FsError::NotFound)?;
        Ok((
            dir_inode(idx),
            Attr {
                kind: EntryKind::Directory,
                size: 0,
                mode: DIR_MODE,
                nlink: 2,
            },
        ))
    } else {
        let dir_idx = dir_index_of(parent);
        let dir_slot = root.directories.get(dir_idx).ok_or(FsError::NotFound)?;
        let dir_block = fs.load_dir(dir_slot.start_block as u32)?;
        let (base, ext) = split_name(name);
        let (file_idx, slot) = find_file_slot(&dir_block, base, ext).ok_or(FsError::NotFound)?;
        Ok((
            file_inode(dir_idx, file_idx),
            Attr {
                kind: EntryKind::RegularFile,
                size: slot.size as u64,
                mode: FILE_MODE,
                nlink: 1,
            },
        ))
    }
}

fn attr_to_fuse(ino: u64, attr: &Attr) -> FileAttr {
    let now = SystemTime::now();
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(crate::layout::BLOCK_SIZE as u64),
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: match attr.kind {
            EntryKind::Directory => FileType::Directory,
            EntryKind::RegularFile => FileType::RegularFile,
        },
        perm: attr.mode,
        nlink: attr.nlink,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: crate::layout::BLOCK_SIZE as u32,
        flags: 0,
    }
}

fn child_path(fs: &BlockFs, parent: u64, name: &OsStr) -> Result<(String, String), FsError> {
    let name = name.to_str().ok_or(FsError::NotPermitted)?.to_string();
    let parent_path = path_for_inode(fs, parent)?;
    let full = if parent_path == "/" {
        format!("/{name}")
    } else {
        format!("{parent_path}/{name}")
    };
    Ok((full, name))
}

pub struct DvidaFs {
    fs: BlockFs,
    read_only: bool,
}

impl DvidaFs {
    pub fn new(fs: BlockFs, read_only: bool) -> Self {
        Self { fs, read_only }
    }
}

impl Filesystem for DvidaFs {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match child_entry(&self.fs, parent, name) {
            Ok((ino, attr)) => reply.entry(&TTL, &attr_to_fuse(ino, &attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match path_for_inode(&self.fs, ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.to_errno()),
        };
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &attr_to_fuse(ino, &attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match path_for_inode(&self.fs, ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.to_errno()),
        };
        let entries = match self.fs.readdir(&path) {
            Ok(e) => e,
            Err(e) => return reply.error(e.to_errno()),
        };
        let is_root = ino == ROOT_INODE;
        for (i, name) in entries.iter().enumerate().skip(offset as usize) {
            let (child_ino, kind) = match name.as_str() {
                "." => (ino, FileType::Directory),
                ".." => (ROOT_INODE, FileType::Directory),
                _ if is_root => (dir_inode(i - 2), FileType::Directory),
                _ => (file_inode(dir_index_of(ino), i - 2), FileType::RegularFile),
            };
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        if self.read_only {
            return reply.error(libc::EROFS);
        }
        let (path, name) = match child_path(&self.fs, parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(e.to_errno()),
        };
        if let Err(e) = self.fs.mkdir(&path) {
            return reply.error(e.to_errno());
        }
        match child_entry(&self.fs, parent, &name) {
            Ok((ino, attr)) => reply.entry(&TTL, &attr_to_fuse(ino, &attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if self.read_only {
            return reply.error(libc::EROFS);
        }
        let (path, name) = match child_path(&self.fs, parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(e.to_errno()),
        };
        if let Err(e) = self.fs.mknod(&path) {
            return reply.error(e.to_errno());
        }
        match child_entry(&self.fs, parent, &name) {
            Ok((ino, attr)) => reply.entry(&TTL, &attr_to_fuse(ino, &attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        if self.read_only {
            return reply.error(libc::EROFS);
        }
        let (path, name) = match child_path(&self.fs, parent, name) {
            Ok(v) => v,
            Err(e) => return reply.error(e.to_errno()),
        };
        match self.fs.mknod(&path) {
            Ok(()) => {}
            Err(FsError::AlreadyExists) => {}
            Err(e) => return reply.error(e.to_errno()),
        }
        match child_entry(&self.fs, parent, &name) {
            Ok((ino, attr)) => reply.created(&TTL, &attr_to_fuse(ino, &attr), 0, 0, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match path_for_inode(&self.fs, ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.to_errno()),
        };
        match self.fs.read(&path, offset as u64, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if self.read_only {
            return reply.error(libc::EROFS);
        }
        let path = match path_for_inode(&self.fs, ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.to_errno()),
        };
        match self.fs.write(&path, offset as u64, data) {
            Ok(n) => reply.written(n),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn flush(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    /// Deletion reclaiming blocks is out of scope; accept the call without
    /// touching on-disk state so shells that `rm`/`rmdir` speculatively
    /// don't error out.
    fn rmdir(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.ok();
    }

    fn unlink(&mut self, _req: &Request, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.ok();
    }

    /// Truncation and permission changes are out of scope; report the
    /// entry's real current attributes without applying the request.
    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<fuser::TimeOrNow>,
        _mtime: Option<fuser::TimeOrNow>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let path = match path_for_inode(&self.fs, ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e.to_errno()),
        };
        match self.fs.getattr(&path) {
            Ok(attr) => reply.attr(&TTL, &attr_to_fuse(ino, &attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}
