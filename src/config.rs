use std::path::PathBuf;

use crate::structs::{BlockRef, InodeRef};

pub const BLOCK_SIZE: usize = 256;
pub const N_BLOCKS_IN_DISK: usize = 128;

pub const MASTER_BLOCK_REF: BlockRef = 0;
pub const N_INODE_BLOCKS: usize = 8;
pub const FIRST_INODE_BLOCK: BlockRef = 1;
pub const ROOT_DIRECTORY_BLOCK: BlockRef = N_INODE_BLOCKS as BlockRef + 1;
pub const ROOT_INODE: InodeRef = 0;

pub const BLOCKS_PER_INODE: usize = 15; // Direct block slots, no indirection
pub const INODE_SIZE: usize = 2 + 2 * BLOCKS_PER_INODE + 4; // kind + refs + blocks + size
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;
pub const N_INODES: usize = INODES_PER_BLOCK * N_INODE_BLOCKS;
pub const MAX_FILE_SIZE: usize = BLOCKS_PER_INODE * BLOCK_SIZE;

pub const INODE_BITMAP_BYTES: usize = N_INODES / 8;
pub const BLOCK_BITMAP_BYTES: usize = N_BLOCKS_IN_DISK / 8;

pub const FILE_NAME_SIZE: usize = 16 - 2; // DirEntry size minus inode reference
pub const MAX_FILE_NAME_LEN: usize = FILE_NAME_SIZE - 1; // Last byte is always NUL
pub const DIR_ENTRY_SIZE: usize = FILE_NAME_SIZE + 2;
pub const DIR_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const DOT_NAME: &str = ".";
pub const DOTDOT_NAME: &str = "..";

// On-disk encodings of "no reference".
pub const UNALLOCATED_INODE: u16 = u16::MAX - 1;
pub const UNALLOCATED_BLOCK: u16 = u16::MAX;

pub const PATH_SEPARATOR: char = '/';

pub const CWD_ENV: &str = "ZPWD";
pub const DISK_ENV: &str = "ZDISK";
pub const DEFAULT_CWD: &str = "/";
pub const DEFAULT_DISK: &str = "vdisk1";

/// The two strings a front end needs: the working directory inside the
/// volume and the host path of the disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub cwd: String,
    pub disk_path: PathBuf,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the environment from an arbitrary variable lookup.
    /// Unset or empty variables fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            cwd: non_empty(CWD_ENV).unwrap_or_else(|| DEFAULT_CWD.to_string()),
            disk_path: non_empty(DISK_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DISK)),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
