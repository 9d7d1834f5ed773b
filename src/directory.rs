use log::debug;
use zerocopy::{FromBytes, IntoBytes};

use crate::block_dev::{Block, BlockDevice};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::inode::{free_inode, get_inode, write_inode};
use crate::master::{read_master, write_master};
use crate::path::resolve;
use crate::structs::*;

/// A directory's single data block, decoded into its fixed array of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryBlock {
    entries: [DirEntry; DIR_ENTRIES_PER_BLOCK],
}

impl DirectoryBlock {
    /// An empty directory: every slot unallocated except "." and "..".
    pub fn init_empty(self_ref: InodeRef, parent_ref: InodeRef) -> Self {
        let mut entries = [DirEntry::EMPTY; DIR_ENTRIES_PER_BLOCK];
        entries[0] = DirEntry::new(DirName::new(DOT_NAME), self_ref);
        entries[1] = DirEntry::new(DirName::new(DOTDOT_NAME), parent_ref);
        Self { entries }
    }

    pub fn decode(buf: &Block) -> Result<Self> {
        let raw = <[RawDirEntry; DIR_ENTRIES_PER_BLOCK]>::read_from_bytes(buf)
            .map_err(|_| FsError::Corrupted("short directory block"))?;
        let mut entries = [DirEntry::EMPTY; DIR_ENTRIES_PER_BLOCK];
        for (entry, raw) in entries.iter_mut().zip(raw.iter()) {
            *entry = raw.decode()?;
        }
        Ok(Self { entries })
    }

    pub fn encode(&self) -> Block {
        let raw: [RawDirEntry; DIR_ENTRIES_PER_BLOCK] =
            core::array::from_fn(|i| RawDirEntry::from(&self.entries[i]));
        let mut buf: Block = [0; BLOCK_SIZE];
        buf.copy_from_slice(raw.as_bytes());
        buf
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&DirEntry> {
        self.entries.get(index)
    }

    /// Allocated entries with their slot index.
    pub fn live_entries(&self) -> impl Iterator<Item = (usize, &DirEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_empty())
    }

    pub fn live_count(&self) -> usize {
        self.live_entries().count()
    }

    pub fn find_entry(&self, name: &DirName) -> Option<usize> {
        self.live_entries()
            .find(|(_, entry)| entry.name == *name)
            .map(|(index, _)| index)
    }

    /// Inode named by `name`, if present.
    pub fn lookup(&self, name: &DirName) -> Option<InodeRef> {
        self.find_entry(name).and_then(|index| self.entries[index].inode)
    }

    /// Places the entry in the first unallocated slot.
    /// Updating the owning inode's size is the caller's responsibility.
    pub fn insert_entry(&mut self, name: DirName, inode_ref: InodeRef) -> Result<usize> {
        let index = self
            .entries
            .iter()
            .position(DirEntry::is_empty)
            .ok_or(FsError::ParentFull)?;
        self.entries[index] = DirEntry::new(name, inode_ref);
        Ok(index)
    }

    pub fn clear_entry(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            *entry = DirEntry::EMPTY;
        }
    }
}

pub fn read_dir_block(device: &impl BlockDevice, block_id: BlockRef) -> Result<DirectoryBlock> {
    let mut buf: Block = [0; BLOCK_SIZE];
    device.read_block(block_id, &mut buf)?;
    DirectoryBlock::decode(&buf)
}

pub fn write_dir_block(device: &impl BlockDevice, block_id: BlockRef, dir: &DirectoryBlock) -> Result<()> {
    device.write_block(block_id, &dir.encode())
}

/// Loaded state of one directory: its inode, the block it lives in and the decoded entries.
pub(crate) struct OpenDir {
    pub inode_ref: InodeRef,
    pub inode: Inode,
    pub block_id: BlockRef,
    pub block: DirectoryBlock,
}

impl OpenDir {
    pub fn load(device: &impl BlockDevice, inode_ref: InodeRef) -> Result<Self> {
        let inode = get_inode(device, inode_ref)?;
        let block_id = inode.dir_block()?;
        let block = read_dir_block(device, block_id)?;
        Ok(Self {
            inode_ref,
            inode,
            block_id,
            block,
        })
    }

    /// Adds an entry and bumps the entry count.
    pub fn add(&mut self, name: DirName, inode_ref: InodeRef) -> Result<()> {
        self.block.insert_entry(name, inode_ref)?;
        self.inode.size += 1;
        Ok(())
    }

    /// Clears the entry called `name` and returns the inode it named.
    pub fn remove(&mut self, name: &DirName) -> Result<InodeRef> {
        let index = self.block.find_entry(name).ok_or(FsError::NotFound)?;
        let inode_ref = self.block.entries[index].inode.ok_or(FsError::NotFound)?;
        self.block.clear_entry(index);
        self.inode.size = self
            .inode
            .size
            .checked_sub(1)
            .ok_or(FsError::Corrupted("directory entry count underflow"))?;
        Ok(inode_ref)
    }

    /// Persists both the entries and the inode.
    pub fn store(&self, device: &impl BlockDevice) -> Result<()> {
        write_dir_block(device, self.block_id, &self.block)?;
        write_inode(device, self.inode_ref, &self.inode)
    }
}

/// Create a new, empty directory at `path`.
/// Returns the inode reference of the new directory.
pub fn mkdir(device: &impl BlockDevice, cwd: &str, path: &str) -> Result<InodeRef> {
    let resolved = resolve(device, cwd, path)?;
    let name = resolved.entry_name()?;
    if resolved.child.is_some() {
        return Err(FsError::AlreadyExists);
    }

    let mut parent = OpenDir::load(device, resolved.parent)?;
    let mut master = read_master(device)?;
    let dir_inode_ref = master.alloc_inode()?;
    let dir_block_id = master.alloc_block()?;
    parent.add(name, dir_inode_ref)?;

    let dir_block = DirectoryBlock::init_empty(dir_inode_ref, resolved.parent);
    write_dir_block(device, dir_block_id, &dir_block)?;
    write_inode(device, dir_inode_ref, &Inode::directory(dir_block_id))?;
    parent.store(device)?;
    write_master(device, &master)?;

    debug!(
        "mkdir {:?}: inode {} block {} in directory {}",
        name, dir_inode_ref, dir_block_id, resolved.parent
    );
    Ok(dir_inode_ref)
}

/// Remove the empty directory at `path`, releasing its inode and block.
pub fn rmdir(device: &impl BlockDevice, cwd: &str, path: &str) -> Result<()> {
    let resolved = resolve(device, cwd, path)?;
    let name = resolved.entry_name()?;
    let dir_inode_ref = resolved.child.ok_or(FsError::NotFound)?;
    let mut dir_inode = get_inode(device, dir_inode_ref)?;
    if !dir_inode.is_directory() {
        return Err(FsError::NotADirectory);
    }
    if dir_inode.size != 2 {
        return Err(FsError::DirectoryNotEmpty);
    }
    let dir_block_id = dir_inode.dir_block()?;

    let mut parent = OpenDir::load(device, resolved.parent)?;
    parent.remove(&name)?;
    let mut master = read_master(device)?;
    free_inode(&mut master, dir_inode_ref, &mut dir_inode)?;

    parent.store(device)?;
    write_inode(device, dir_inode_ref, &dir_inode)?;
    device.write_block(dir_block_id, &[0; BLOCK_SIZE])?;
    write_master(device, &master)?;

    debug!("rmdir {:?}: released inode {} block {}", name, dir_inode_ref, dir_block_id);
    Ok(())
}

/// Names at `path`, sorted bytewise. Directories carry a trailing '/'.
/// A path naming a file lists just that file.
pub fn list(device: &impl BlockDevice, cwd: &str, path: &str) -> Result<Vec<String>> {
    let resolved = resolve(device, cwd, path)?;
    let target = resolved.child.ok_or(FsError::NotFound)?;
    let inode = get_inode(device, target)?;
    if inode.is_file() {
        return Ok(vec![DirName::new(&resolved.name).to_string()]);
    }

    let dir = read_dir_block(device, inode.dir_block()?)?;
    let mut names = Vec::with_capacity(dir.live_count());
    for (_, entry) in dir.live_entries() {
        let Some(inode_ref) = entry.inode else { continue };
        names.push((entry.name, get_inode(device, inode_ref)?.is_directory()));
    }
    names.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(names
        .into_iter()
        .map(|(name, is_dir)| if is_dir { format!("{}/", name) } else { name.to_string() })
        .collect())
}
