//! Management of reading and writing to inodes.

use zerocopy::{FromBytes, IntoBytes};

use crate::block_dev::{Block, BlockDevice};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::{BlockRef, Inode, InodeRef, MasterBlock, RawInode};

/// Inode table block holding the inode, and the byte offset of the record inside it.
fn locate(inode_ref: InodeRef) -> Result<(BlockRef, usize)> {
    let index = inode_ref as usize;
    if index >= N_INODES {
        return Err(FsError::OutOfBounds(index));
    }
    let block_id = FIRST_INODE_BLOCK + (index / INODES_PER_BLOCK) as BlockRef;
    let block_inner_offset = (index % INODES_PER_BLOCK) * INODE_SIZE;
    Ok((block_id, block_inner_offset))
}

pub fn get_inode(device: &impl BlockDevice, inode_ref: InodeRef) -> Result<Inode> {
    let (block_id, offset) = locate(inode_ref)?;
    let mut buf: Block = [0; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    let raw = RawInode::read_from_bytes(&buf[offset..offset + INODE_SIZE])
        .map_err(|_| FsError::Corrupted("short inode record"))?;
    raw.decode()
}

/// Replaces one record in its inode table block, leaving its neighbours untouched.
pub fn write_inode(device: &impl BlockDevice, inode_ref: InodeRef, inode: &Inode) -> Result<()> {
    let (block_id, offset) = locate(inode_ref)?;
    let mut buf: Block = [0; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    buf[offset..offset + INODE_SIZE].copy_from_slice(RawInode::from(inode).as_bytes());
    device.write_block(block_id, &buf)?;
    Ok(())
}

/// Encodes a whole inode table block from `INODES_PER_BLOCK` records.
/// The bytes past the last record stay zero.
pub(crate) fn encode_inode_block(inodes: &[Inode; INODES_PER_BLOCK]) -> Block {
    let mut buf: Block = [0; BLOCK_SIZE];
    for (i, inode) in inodes.iter().enumerate() {
        let offset = i * INODE_SIZE;
        buf[offset..offset + INODE_SIZE].copy_from_slice(RawInode::from(inode).as_bytes());
    }
    buf
}

/// Releases every data block of the inode and empties its block list.
/// Kind and reference count are left alone.
pub(crate) fn truncate(master: &mut MasterBlock, inode: &mut Inode) -> Result<()> {
    for block in inode.allocated_blocks() {
        master.free_block(block)?;
    }
    inode.blocks = [None; BLOCKS_PER_INODE];
    inode.size = 0;
    Ok(())
}

/// Releases the inode slot and all of its blocks, resetting the record to the empty state.
pub(crate) fn free_inode(master: &mut MasterBlock, inode_ref: InodeRef, inode: &mut Inode) -> Result<()> {
    truncate(master, inode)?;
    master.free_inode(inode_ref)?;
    *inode = Inode::EMPTY;
    Ok(())
}
