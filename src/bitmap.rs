//! Management of the inode bitmap and the block bitmap kept in the master block.
//! All changes happen in memory; persisting the master block is the caller's job.

use bitvec::prelude::*;
use log::trace;

use crate::block_dev::BlockRole;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::{BlockRef, InodeRef, MasterBlock};

/// Returns the first unset bit below `capacity`, scanning in ascending order.
pub fn find_free(bitmap: &[u8], capacity: usize) -> Option<usize> {
    let bits = bitmap.view_bits::<Lsb0>();
    bits[..capacity.min(bits.len())].first_zero()
}

pub fn is_set(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .view_bits::<Lsb0>()
        .get(index)
        .is_some_and(|bit| *bit)
}

/// Sets a bit. Setting a bit that is already set means two owners for one item.
pub fn mark(bitmap: &mut [u8], index: usize) -> Result<()> {
    if set_bit_at(bitmap, index, true)? {
        return Err(FsError::Corrupted("item allocated twice"));
    }
    Ok(())
}

/// Clears a bit. Clearing a bit that is already clear is a double free.
pub fn clear(bitmap: &mut [u8], index: usize) -> Result<()> {
    if !set_bit_at(bitmap, index, false)? {
        return Err(FsError::Corrupted("item freed twice"));
    }
    Ok(())
}

/// Returns previously set value of the bit.
fn set_bit_at(bitmap: &mut [u8], index: usize, value: bool) -> Result<bool> {
    let bits = bitmap.view_bits_mut::<Lsb0>();
    if index >= bits.len() {
        return Err(FsError::OutOfBounds(index));
    }
    let previous = bits[index];
    bits.set(index, value);
    Ok(previous)
}

impl MasterBlock {
    /// Master block of a freshly formatted volume: the root inode, the master block,
    /// the inode table and the root directory block are in use.
    pub fn formatted() -> Self {
        let mut master = Self {
            inode_allocated: [0; INODE_BITMAP_BYTES],
            block_allocated: [0; BLOCK_BITMAP_BYTES],
        };
        let bits = master.inode_allocated.view_bits_mut::<Lsb0>();
        bits.set(ROOT_INODE as usize, true);
        let bits = master.block_allocated.view_bits_mut::<Lsb0>();
        bits[..=ROOT_DIRECTORY_BLOCK as usize].fill(true);
        master
    }

    pub fn inode_bitmap(&self) -> &[u8] {
        &self.inode_allocated
    }

    pub fn block_bitmap(&self) -> &[u8] {
        &self.block_allocated
    }

    pub fn inode_allocated(&self, inode: InodeRef) -> bool {
        is_set(&self.inode_allocated, inode as usize)
    }

    pub fn block_allocated(&self, block: BlockRef) -> bool {
        is_set(&self.block_allocated, block as usize)
    }

    pub fn free_inodes(&self) -> usize {
        self.inode_allocated.view_bits::<Lsb0>()[..N_INODES].count_zeros()
    }

    pub fn free_blocks(&self) -> usize {
        self.block_allocated.view_bits::<Lsb0>()[..N_BLOCKS_IN_DISK].count_zeros()
    }

    /// Claims the lowest free inode slot.
    pub fn alloc_inode(&mut self) -> Result<InodeRef> {
        let index = find_free(&self.inode_allocated, N_INODES).ok_or(FsError::OutOfInodes)?;
        mark(&mut self.inode_allocated, index)?;
        trace!("allocated inode {}", index);
        Ok(index as InodeRef)
    }

    /// Claims the lowest free block.
    pub fn alloc_block(&mut self) -> Result<BlockRef> {
        let index = find_free(&self.block_allocated, N_BLOCKS_IN_DISK).ok_or(FsError::OutOfBlocks)?;
        mark(&mut self.block_allocated, index)?;
        trace!("allocated block {}", index);
        Ok(index as BlockRef)
    }

    pub fn free_inode(&mut self, inode: InodeRef) -> Result<()> {
        if inode == ROOT_INODE {
            return Err(FsError::Corrupted("attempt to free the root inode"));
        }
        clear(&mut self.inode_allocated, inode as usize)?;
        trace!("freed inode {}", inode);
        Ok(())
    }

    pub fn free_block(&mut self, block: BlockRef) -> Result<()> {
        match BlockRole::of(block) {
            Some(BlockRole::Data) => {}
            Some(_) => return Err(FsError::Corrupted("attempt to free a reserved block")),
            None => return Err(FsError::InvalidBlock(block as usize)),
        }
        clear(&mut self.block_allocated, block as usize)?;
        trace!("freed block {}", block);
        Ok(())
    }
}
