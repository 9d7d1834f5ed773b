//! File sessions: open modes, handles and byte-cursor reads and writes.

use core::str::FromStr;

use log::debug;

use crate::block_dev::{Block, BlockDevice};
use crate::config::*;
use crate::directory::OpenDir;
use crate::error::{FsError, Result};
use crate::inode::{get_inode, truncate, write_inode};
use crate::master::{read_master, write_master};
use crate::path::{Resolved, resolve};
use crate::structs::{Inode, InodeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Creates the file if needed and discards its previous content.
    Write,
    /// Creates the file if needed and starts writing at its end.
    Append,
}

impl TryFrom<char> for OpenMode {
    type Error = FsError;

    fn try_from(mode: char) -> Result<Self> {
        match mode {
            'r' => Ok(OpenMode::Read),
            'w' => Ok(OpenMode::Write),
            'a' => Ok(OpenMode::Append),
            _ => Err(FsError::InvalidMode),
        }
    }
}

impl FromStr for OpenMode {
    type Err = FsError;

    fn from_str(mode: &str) -> Result<Self> {
        let mut chars = mode.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => OpenMode::try_from(c),
            _ => Err(FsError::InvalidMode),
        }
    }
}

/// An open file. Holds no lock and nothing is flushed on drop.
#[derive(Debug, PartialEq, Eq)]
pub struct FileHandle {
    inode_ref: InodeRef,
    mode: OpenMode,
    cursor: usize,
}

impl FileHandle {
    pub fn inode_ref(&self) -> InodeRef {
        self.inode_ref
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

pub fn fopen(device: &impl BlockDevice, cwd: &str, path: &str, mode: OpenMode) -> Result<FileHandle> {
    let resolved = resolve(device, cwd, path)?;
    if mode != OpenMode::Read {
        resolved.entry_name()?;
    }
    let inode_ref = match (resolved.child, mode) {
        (None, OpenMode::Read) => return Err(FsError::NotFound),
        (None, OpenMode::Write | OpenMode::Append) => {
            return Ok(FileHandle {
                inode_ref: create_file(device, &resolved)?,
                mode,
                cursor: 0,
            });
        }
        (Some(inode_ref), _) => inode_ref,
    };

    let mut inode = get_inode(device, inode_ref)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile);
    }
    let cursor = match mode {
        OpenMode::Read => 0,
        OpenMode::Append => inode.size as usize,
        OpenMode::Write => {
            if inode.size > 0 || inode.blocks[0].is_some() {
                let mut master = read_master(device)?;
                truncate(&mut master, &mut inode)?;
                write_inode(device, inode_ref, &inode)?;
                write_master(device, &master)?;
                debug!("truncated inode {}", inode_ref);
            }
            0
        }
    };
    Ok(FileHandle {
        inode_ref,
        mode,
        cursor,
    })
}

/// Allocates a fresh file inode and names it in the parent directory.
fn create_file(device: &impl BlockDevice, resolved: &Resolved) -> Result<InodeRef> {
    let name = resolved.entry_name()?;
    let mut parent = OpenDir::load(device, resolved.parent)?;
    let mut master = read_master(device)?;
    let inode_ref = master.alloc_inode()?;
    parent.add(name, inode_ref)?;

    write_inode(device, inode_ref, &Inode::file())?;
    parent.store(device)?;
    write_master(device, &master)?;

    debug!("created file {:?} as inode {} in directory {}", name, inode_ref, resolved.parent);
    Ok(inode_ref)
}

/// Reads from the cursor into `buffer`, stopping at the end of the file.
/// Returns the number of bytes read, 0 at end of file.
pub fn fread(device: &impl BlockDevice, handle: &mut FileHandle, buffer: &mut [u8]) -> Result<usize> {
    if handle.mode != OpenMode::Read {
        return Err(FsError::WrongModeForOperation);
    }
    let inode = get_inode(device, handle.inode_ref)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile);
    }

    let size = inode.size as usize;
    let mut bytes_read = 0;
    let mut block_buf: Block = [0; BLOCK_SIZE];

    while bytes_read < buffer.len() && handle.cursor < size {
        let (block_index, offset) = (handle.cursor / BLOCK_SIZE, handle.cursor % BLOCK_SIZE);
        let block_id = inode
            .blocks
            .get(block_index)
            .copied()
            .flatten()
            .ok_or(FsError::Corrupted("file size exceeds its blocks"))?;
        device.read_block(block_id, &mut block_buf)?;

        let bytes_to_read = (BLOCK_SIZE - offset)
            .min(size - handle.cursor)
            .min(buffer.len() - bytes_read);
        buffer[bytes_read..bytes_read + bytes_to_read]
            .copy_from_slice(&block_buf[offset..offset + bytes_to_read]);
        bytes_read += bytes_to_read;
        handle.cursor += bytes_to_read;
    }

    Ok(bytes_read)
}

/// Writes `data` at the cursor, allocating blocks as the file grows.
/// Size and space are checked up front, so a failed write changes nothing.
pub fn fwrite(device: &impl BlockDevice, handle: &mut FileHandle, data: &[u8]) -> Result<usize> {
    if handle.mode == OpenMode::Read {
        return Err(FsError::WrongModeForOperation);
    }
    if data.is_empty() {
        return Ok(0);
    }
    let mut inode = get_inode(device, handle.inode_ref)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile);
    }
    // Another handle may have truncated the file since this one was opened.
    handle.cursor = handle.cursor.min(inode.size as usize);

    let end = handle.cursor + data.len();
    if end > MAX_FILE_SIZE {
        return Err(FsError::FileTooLarge);
    }
    let mut master = read_master(device)?;
    let blocks_needed = end
        .div_ceil(BLOCK_SIZE)
        .saturating_sub(inode.allocated_blocks().count());
    if blocks_needed > master.free_blocks() {
        return Err(FsError::OutOfBlocks);
    }

    let mut bytes_written = 0;
    let mut block_buf: Block = [0; BLOCK_SIZE];
    while bytes_written < data.len() {
        let (block_index, offset) = (handle.cursor / BLOCK_SIZE, handle.cursor % BLOCK_SIZE);
        let block_id = match inode.blocks[block_index] {
            Some(block_id) => {
                device.read_block(block_id, &mut block_buf)?;
                block_id
            }
            None => {
                let block_id = master.alloc_block()?;
                inode.blocks[block_index] = Some(block_id);
                block_buf = [0; BLOCK_SIZE];
                block_id
            }
        };

        let bytes_to_write = (BLOCK_SIZE - offset).min(data.len() - bytes_written);
        block_buf[offset..offset + bytes_to_write]
            .copy_from_slice(&data[bytes_written..bytes_written + bytes_to_write]);
        device.write_block(block_id, &block_buf)?;
        bytes_written += bytes_to_write;
        handle.cursor += bytes_to_write;
        inode.size = inode.size.max(handle.cursor as u32);
    }

    if blocks_needed > 0 {
        write_master(device, &master)?;
    }
    write_inode(device, handle.inode_ref, &inode)?;
    Ok(bytes_written)
}
