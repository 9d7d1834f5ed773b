//! Common utilities for tests
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use oufs::*;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr) => {
        println!("{}[test] {}{}", crate::common::ORANGE, $msg, crate::common::RESET)
    };
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

pub struct RamDisk {
    inner: Mutex<Vec<u8>>,
    num_blocks: usize,
    fail_writes: AtomicBool,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        RamDisk {
            inner: Mutex::new(vec![0u8; num_blocks * BLOCK_SIZE]),
            num_blocks,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every following write fail, as a dying disk would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: BlockRef, buf: &mut Block) -> Result<()> {
        let block_id = block_id as usize;
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlock(block_id));
        }
        let start = block_id * BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: BlockRef, buf: &Block) -> Result<()> {
        let block_id = block_id as usize;
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlock(block_id));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::DeviceIo(std::io::ErrorKind::Other));
        }
        let start = block_id * BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // In a RAM disk, flushing is a no-op since data is already in memory.
        Ok(())
    }
}

/// A freshly formatted file system on a RAM disk.
pub fn fresh_fs() -> (Arc<RamDisk>, FileSystem<RamDisk>) {
    let rd = Arc::new(RamDisk::new(N_BLOCKS_IN_DISK));
    let fs = FileSystem::format(Arc::clone(&rd)).unwrap();
    (rd, fs)
}

pub fn write_file<D: BlockDevice>(fs: &mut FileSystem<D>, cwd: &str, path: &str, mode: OpenMode, data: &[u8]) {
    let mut handle = fs.open(cwd, path, mode).unwrap();
    assert_eq!(fs.write(&mut handle, data).unwrap(), data.len());
    fs.close(handle).unwrap();
}

pub fn read_file<D: BlockDevice>(fs: &mut FileSystem<D>, cwd: &str, path: &str) -> Vec<u8> {
    let mut handle = fs.open(cwd, path, OpenMode::Read).unwrap();
    let content = fs.read_to_end(&mut handle).unwrap();
    fs.close(handle).unwrap();
    content
}

/// Walks the whole tree from the root and compares what is reachable with the
/// bitmaps and the inode table. Returns every violation found.
pub fn check_invariants<D: BlockDevice>(fs: &FileSystem<D>) -> Vec<String> {
    let mut problems = Vec::new();
    let master = fs.master().unwrap();

    let mut block_owners: BTreeMap<BlockRef, usize> = BTreeMap::new();
    let mut file_refs: BTreeMap<InodeRef, usize> = BTreeMap::new();
    let mut seen_dirs = BTreeSet::new();
    let mut pending = vec![(ROOT_INODE, ROOT_INODE)];

    while let Some((dir_ref, parent_ref)) = pending.pop() {
        if !seen_dirs.insert(dir_ref) {
            problems.push(format!("directory {} reachable twice", dir_ref));
            continue;
        }
        let dir = fs.inode(dir_ref).unwrap();
        if dir.n_references != 1 {
            problems.push(format!("directory {} has {} references", dir_ref, dir.n_references));
        }
        let Some(block_id) = dir.blocks[0] else {
            problems.push(format!("directory {} has no block", dir_ref));
            continue;
        };
        if dir.blocks[1..].iter().any(Option::is_some) {
            problems.push(format!("directory {} has more than one block", dir_ref));
        }
        *block_owners.entry(block_id).or_default() += 1;

        let entries = fs.directory(block_id).unwrap();
        let all = entries.entries();
        if all[0].name != DirName::new(".") || all[0].inode != Some(dir_ref) {
            problems.push(format!("directory {} has a bad '.' entry", dir_ref));
        }
        if all[1].name != DirName::new("..") || all[1].inode != Some(parent_ref) {
            problems.push(format!("directory {} has a bad '..' entry", dir_ref));
        }
        if entries.live_count() != dir.size as usize {
            problems.push(format!(
                "directory {} has size {} but {} entries",
                dir_ref,
                dir.size,
                entries.live_count()
            ));
        }

        for (_, entry) in entries.live_entries().skip(2) {
            let child_ref = entry.inode.unwrap();
            let child = fs.inode(child_ref).unwrap();
            match child.kind {
                InodeKind::Directory => pending.push((child_ref, dir_ref)),
                InodeKind::File => *file_refs.entry(child_ref).or_default() += 1,
                InodeKind::None => problems.push(format!("entry {} names a free inode", entry.name)),
            }
        }
    }

    for (&file_ref, &count) in &file_refs {
        let file = fs.inode(file_ref).unwrap();
        if file.n_references as usize != count {
            problems.push(format!(
                "file {} has {} references but {} entries",
                file_ref, file.n_references, count
            ));
        }
        let blocks: Vec<BlockRef> = file.allocated_blocks().collect();
        if blocks.len() != (file.size as usize).div_ceil(BLOCK_SIZE) {
            problems.push(format!("file {} has size {} but {} blocks", file_ref, file.size, blocks.len()));
        }
        if file.blocks[blocks.len()..].iter().any(Option::is_some) {
            problems.push(format!("file {} has a hole in its block list", file_ref));
        }
        for block_id in blocks {
            *block_owners.entry(block_id).or_default() += 1;
        }
    }

    for inode_ref in 0..N_INODES as InodeRef {
        let live = seen_dirs.contains(&inode_ref) || file_refs.contains_key(&inode_ref);
        let kind = fs.inode(inode_ref).unwrap().kind;
        if master.inode_allocated(inode_ref) != (kind != InodeKind::None) {
            problems.push(format!("inode {} bit disagrees with kind {:?}", inode_ref, kind));
        }
        if live != (kind != InodeKind::None) {
            problems.push(format!("inode {} is {:?} but reachable: {}", inode_ref, kind, live));
        }
    }

    for block_id in 0..N_BLOCKS_IN_DISK as BlockRef {
        let reserved = BlockRole::of(block_id).is_some_and(|role| role != BlockRole::Data);
        let owners = block_owners.get(&block_id).copied().unwrap_or(0);
        let expected_owners = if reserved && block_id != ROOT_DIRECTORY_BLOCK { 0 } else { owners.min(1) };
        if owners > 1 || owners != expected_owners {
            problems.push(format!("block {} has {} owners", block_id, owners));
        }
        let in_use = (reserved && block_id != ROOT_DIRECTORY_BLOCK) || owners > 0;
        if master.block_allocated(block_id) != in_use {
            problems.push(format!("block {} bit disagrees with use {}", block_id, in_use));
        }
    }

    problems
}

pub fn assert_consistent<D: BlockDevice>(fs: &FileSystem<D>) {
    let problems = check_invariants(fs);
    assert!(problems.is_empty(), "inconsistent file system: {:#?}", problems);
}
