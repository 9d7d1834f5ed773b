//! Path resolution and manipulation utilities.

use log::trace;

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::directory::OpenDir;
use crate::error::{FsError, Result};
use crate::inode::get_inode;
use crate::structs::{DirName, InodeRef};

/// Splits a path into owned components. Empty components (leading, trailing
/// or doubled separators) are dropped.
pub fn tokenize(path: &str) -> Vec<String> {
    path.split(PATH_SEPARATOR)
        .filter(|component| !component.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Outcome of walking a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Directory in which the final component was looked up.
    pub parent: InodeRef,
    /// Inode named by the final component, `None` if it does not exist yet.
    pub child: Option<InodeRef>,
    /// The final component, verbatim.
    pub name: String,
}

impl Resolved {
    /// The final component as a name that can be created or removed.
    pub fn entry_name(&self) -> Result<DirName> {
        let name = DirName::new(&self.name);
        if name.is_blank() || name.is_dot_or_dotdot() || self.name.contains('\0') {
            return Err(FsError::InvalidName);
        }
        Ok(name)
    }
}

/// Resolves `path` against the directory tree.
/// Relative paths start from `cwd`, which is itself walked from the root.
/// Only a missing or non-directory intermediate component is an error; a missing
/// final component yields `child: None`.
pub fn resolve(device: &impl BlockDevice, cwd: &str, path: &str) -> Result<Resolved> {
    let mut current = ROOT_INODE;
    if !path.starts_with(PATH_SEPARATOR) {
        for component in tokenize(cwd) {
            current = descend(device, current, &component)?;
        }
    }

    let components = tokenize(path);
    let Some((last, intermediate)) = components.split_last() else {
        // "/" or "": the starting directory names itself.
        return Ok(Resolved {
            parent: current,
            child: Some(current),
            name: DOT_NAME.to_string(),
        });
    };
    for component in intermediate {
        current = descend(device, current, component)?;
    }

    let dir = OpenDir::load(device, current)?;
    let child = dir.block.lookup(&DirName::new(last));
    trace!("resolved {:?} (cwd {:?}): parent {} child {:?}", path, cwd, current, child);
    Ok(Resolved {
        parent: current,
        child,
        name: last.clone(),
    })
}

/// Steps from directory `dir` into its subdirectory `component`.
fn descend(device: &impl BlockDevice, dir: InodeRef, component: &str) -> Result<InodeRef> {
    let dir = OpenDir::load(device, dir)?;
    let next = dir
        .block
        .lookup(&DirName::new(component))
        .ok_or(FsError::PathNotFound)?;
    if !get_inode(device, next)?.is_directory() {
        return Err(FsError::NotADirectory);
    }
    Ok(next)
}
