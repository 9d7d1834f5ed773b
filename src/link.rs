//! Hard links: naming an existing file inode from more directory entries,
//! and dropping names until the last one frees the file.

use log::debug;

use crate::block_dev::BlockDevice;
use crate::directory::OpenDir;
use crate::error::{FsError, Result};
use crate::inode::{free_inode, get_inode, write_inode};
use crate::master::{read_master, write_master};
use crate::path::resolve;

/// Adds `new_path` as another name for the file at `existing_path`.
pub fn link(device: &impl BlockDevice, cwd: &str, existing_path: &str, new_path: &str) -> Result<()> {
    let source = resolve(device, cwd, existing_path)?;
    let source_ref = source.child.ok_or(FsError::NotFound)?;
    let mut source_inode = get_inode(device, source_ref)?;
    if !source_inode.is_file() {
        return Err(FsError::NotAFile);
    }

    let dest = resolve(device, cwd, new_path)?;
    let name = dest.entry_name()?;
    if dest.child.is_some() {
        return Err(FsError::AlreadyExists);
    }
    source_inode.n_references = source_inode
        .n_references
        .checked_add(1)
        .ok_or(FsError::TooManyLinks)?;

    let mut parent = OpenDir::load(device, dest.parent)?;
    parent.add(name, source_ref)?;
    parent.store(device)?;
    write_inode(device, source_ref, &source_inode)?;

    debug!(
        "linked {:?} to inode {} ({} references)",
        name, source_ref, source_inode.n_references
    );
    Ok(())
}

/// Removes the name at `path`. The file's blocks and inode are released
/// once no name refers to it any more.
pub fn unlink(device: &impl BlockDevice, cwd: &str, path: &str) -> Result<()> {
    let resolved = resolve(device, cwd, path)?;
    let name = resolved.entry_name()?;
    let target_ref = resolved.child.ok_or(FsError::NotFound)?;
    let mut target = get_inode(device, target_ref)?;
    if !target.is_file() {
        return Err(FsError::NotAFile);
    }
    target.n_references = target
        .n_references
        .checked_sub(1)
        .ok_or(FsError::Corrupted("file reference count underflow"))?;

    let mut parent = OpenDir::load(device, resolved.parent)?;
    parent.remove(&name)?;
    let released = if target.n_references == 0 {
        let mut master = read_master(device)?;
        free_inode(&mut master, target_ref, &mut target)?;
        Some(master)
    } else {
        None
    };

    parent.store(device)?;
    write_inode(device, target_ref, &target)?;
    match released {
        Some(master) => {
            write_master(device, &master)?;
            debug!("unlinked {:?}: inode {} released", name, target_ref);
        }
        None => debug!(
            "unlinked {:?}: inode {} has {} references left",
            name, target_ref, target.n_references
        ),
    }
    Ok(())
}
