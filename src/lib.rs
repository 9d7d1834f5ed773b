//! OUFS is a tiny single-volume file system living on a 128 block disk image.
//! For simplicity, no support for permissions, timestamps, journaling or indirect blocks.
//!
//! OUFS's fixed layout:
//! - Block 0: Master block (inode bitmap, block bitmap)
//! - Blocks 1-8: Inode table
//! - Block 9: Root directory
//! - Blocks 10-127: Data blocks for files and directories
//!
//! OUFS's layers (from bottom to top):
//! 1. Block Device: Raw 256 byte block access.                  | User implemented or `FileDisk`
//! 2. Bitmap: Inode and block allocation in the master block.   | Fs implemented
//! 3. Inode: Fixed-size records packed in the inode table.      | Fs implemented
//! 4. Directory/Path: Single-block directories, path walking.   | Fs implemented
//! 5. File/Link: Byte-cursor sessions and hard links.           | Fs implemented
//! 6. FileSystem: The main interface for users.                 | Fs implemented

mod config;
mod block_dev;
mod disk;
mod structs;
mod bitmap;
mod master;
mod inode;
mod directory;
mod path;
mod file;
mod link;
mod fs;
mod error;

pub use block_dev::{Block, BlockDevice, BlockRole};
pub use config::*;
pub use disk::FileDisk;
pub use structs::*;
pub use bitmap::{clear, find_free, is_set, mark};
pub use master::{read_master, write_master};
pub use inode::{get_inode, write_inode};
pub use directory::{DirectoryBlock, list, mkdir, read_dir_block, rmdir, write_dir_block};
pub use path::{Resolved, resolve, tokenize};
pub use file::{FileHandle, OpenMode, fopen, fread, fwrite};
pub use link::{link, unlink};
pub use fs::*;
pub use error::FsError as Error;
pub use error::Result;
