use crate::config::*;
use crate::error::Result;
use crate::structs::BlockRef;

/// One raw block as it travels to and from the device.
pub type Block = [u8; BLOCK_SIZE];

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a block of data from the block device.
    fn read_block(&self, block_id: BlockRef, buf: &mut Block) -> Result<()>;

    /// Writes a block of data to the block device.
    fn write_block(&self, block_id: BlockRef, buf: &Block) -> Result<()>;

    /// Flushes any buffered data to the backing storage.
    fn flush(&self) -> Result<()>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}

/// What a block holds. Blocks carry no type tag, the role follows from the index alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Master,
    InodeTable,
    RootDirectory,
    /// Free pool: file data or a non-root directory, depending on the owning inode.
    Data,
}

impl BlockRole {
    pub fn of(block: BlockRef) -> Option<Self> {
        let inode_blocks = FIRST_INODE_BLOCK..FIRST_INODE_BLOCK + N_INODE_BLOCKS as BlockRef;
        match block {
            MASTER_BLOCK_REF => Some(BlockRole::Master),
            b if inode_blocks.contains(&b) => Some(BlockRole::InodeTable),
            ROOT_DIRECTORY_BLOCK => Some(BlockRole::RootDirectory),
            b if (b as usize) < N_BLOCKS_IN_DISK => Some(BlockRole::Data),
            _ => None,
        }
    }

    /// Reserved blocks are allocated by format and never released.
    pub fn is_reserved(self) -> bool {
        self != BlockRole::Data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_block_roles() {
        assert_eq!(BlockRole::of(0), Some(BlockRole::Master));
        assert_eq!(BlockRole::of(1), Some(BlockRole::InodeTable));
        assert_eq!(BlockRole::of(8), Some(BlockRole::InodeTable));
        assert_eq!(BlockRole::of(9), Some(BlockRole::RootDirectory));
        assert_eq!(BlockRole::of(10), Some(BlockRole::Data));
        assert_eq!(BlockRole::of(127), Some(BlockRole::Data));
        assert_eq!(BlockRole::of(128), None);
        assert!(BlockRole::RootDirectory.is_reserved());
        assert!(!BlockRole::Data.is_reserved());
    }
}
