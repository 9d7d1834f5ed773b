use std::sync::Arc;

use log::info;

use crate::block_dev::{Block, BlockDevice, BlockRole};
use crate::config::*;
use crate::directory::{self, DirectoryBlock, read_dir_block, write_dir_block};
use crate::error::{FsError, Result};
use crate::file::{FileHandle, OpenMode, fopen, fread, fwrite};
use crate::inode::{encode_inode_block, get_inode};
use crate::link::{link, unlink};
use crate::master::{read_master, write_master};
use crate::path::resolve;
use crate::structs::*;

#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Lays down an empty volume: zeroed blocks, an empty inode table,
    /// the root directory and the master block.
    pub fn format(device: Arc<D>) -> Result<Self> {
        check_capacity(&*device)?;

        let zero_block: Block = [0; BLOCK_SIZE];
        for block_id in 0..N_BLOCKS_IN_DISK {
            device.write_block(block_id as BlockRef, &zero_block)?;
        }

        let mut inodes = [Inode::EMPTY; INODES_PER_BLOCK];
        let empty_table_block = encode_inode_block(&inodes);
        for i in 0..N_INODE_BLOCKS {
            device.write_block(FIRST_INODE_BLOCK + i as BlockRef, &empty_table_block)?;
        }
        inodes[ROOT_INODE as usize] = Inode::directory(ROOT_DIRECTORY_BLOCK);
        device.write_block(FIRST_INODE_BLOCK, &encode_inode_block(&inodes))?;

        // The root is its own parent.
        let root_dir = DirectoryBlock::init_empty(ROOT_INODE, ROOT_INODE);
        write_dir_block(&*device, ROOT_DIRECTORY_BLOCK, &root_dir)?;
        write_master(&*device, &MasterBlock::formatted())?;
        device.flush()?;

        info!("formatted volume: {} blocks, {} inodes", N_BLOCKS_IN_DISK, N_INODES);
        Ok(Self { device })
    }

    /// Opens an already formatted volume.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        check_capacity(&*device)?;
        let master = read_master(&*device)?;
        let root = match get_inode(&*device, ROOT_INODE) {
            Ok(root) => root,
            Err(FsError::Corrupted(_)) => return Err(FsError::NotFormatted),
            Err(e) => return Err(e),
        };
        if !master.inode_allocated(ROOT_INODE)
            || !master.block_allocated(ROOT_DIRECTORY_BLOCK)
            || root.dir_block().ok() != Some(ROOT_DIRECTORY_BLOCK)
        {
            return Err(FsError::NotFormatted);
        }

        info!(
            "mounted volume: {} free inodes, {} free blocks",
            master.free_inodes(),
            master.free_blocks()
        );
        Ok(Self { device })
    }

    // Following methods directly operate on the device, there is no in-memory state to sync.

    pub fn mkdir(&mut self, cwd: &str, path: &str) -> Result<InodeRef> {
        directory::mkdir(&*self.device, cwd, path)
    }

    pub fn list(&self, cwd: &str, path: &str) -> Result<Vec<String>> {
        directory::list(&*self.device, cwd, path)
    }

    pub fn rmdir(&mut self, cwd: &str, path: &str) -> Result<()> {
        directory::rmdir(&*self.device, cwd, path)
    }

    pub fn open(&mut self, cwd: &str, path: &str, mode: OpenMode) -> Result<FileHandle> {
        fopen(&*self.device, cwd, path, mode)
    }

    pub fn read(&self, handle: &mut FileHandle, buf: &mut [u8]) -> Result<usize> {
        fread(&*self.device, handle, buf)
    }

    /// Reads from the cursor to the end of the file.
    pub fn read_to_end(&self, handle: &mut FileHandle) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut chunk: Block = [0; BLOCK_SIZE];
        loop {
            let n = fread(&*self.device, handle, &mut chunk)?;
            if n == 0 {
                return Ok(content);
            }
            content.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn write(&mut self, handle: &mut FileHandle, data: &[u8]) -> Result<usize> {
        fwrite(&*self.device, handle, data)
    }

    /// Ends a session. Every write is already on the device, this only flushes it.
    pub fn close(&mut self, handle: FileHandle) -> Result<()> {
        drop(handle);
        self.device.flush()
    }

    /// Removes one name of a file.
    pub fn remove(&mut self, cwd: &str, path: &str) -> Result<()> {
        unlink(&*self.device, cwd, path)
    }

    /// Create a hard link to an existing file.
    pub fn link(&mut self, cwd: &str, existing_path: &str, new_path: &str) -> Result<()> {
        link(&*self.device, cwd, existing_path, new_path)
    }

    /// Inode reference and record named by `path`.
    pub fn stat(&self, cwd: &str, path: &str) -> Result<(InodeRef, Inode)> {
        let inode_ref = resolve(&*self.device, cwd, path)?
            .child
            .ok_or(FsError::NotFound)?;
        Ok((inode_ref, get_inode(&*self.device, inode_ref)?))
    }

    pub fn master(&self) -> Result<MasterBlock> {
        read_master(&*self.device)
    }

    pub fn inode(&self, inode_ref: InodeRef) -> Result<Inode> {
        get_inode(&*self.device, inode_ref)
    }

    /// Decodes any block as a directory.
    pub fn directory(&self, block_id: BlockRef) -> Result<DirectoryBlock> {
        check_block(block_id)?;
        read_dir_block(&*self.device, block_id)
    }

    pub fn raw_block(&self, block_id: BlockRef) -> Result<Block> {
        check_block(block_id)?;
        let mut buf: Block = [0; BLOCK_SIZE];
        self.device.read_block(block_id, &mut buf)?;
        Ok(buf)
    }

    pub fn root_inode_ref(&self) -> InodeRef {
        ROOT_INODE
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }
}

fn check_capacity(device: &impl BlockDevice) -> Result<()> {
    if device.num_blocks() != N_BLOCKS_IN_DISK || device.block_size() != BLOCK_SIZE {
        return Err(FsError::DeviceSize(device.num_blocks()));
    }
    Ok(())
}

fn check_block(block_id: BlockRef) -> Result<()> {
    BlockRole::of(block_id)
        .map(|_| ())
        .ok_or(FsError::InvalidBlock(block_id as usize))
}
