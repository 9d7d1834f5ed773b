//! A block device backed by a single host file.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::block_dev::{Block, BlockDevice};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::BlockRef;

/// Canonical paths of the images currently held open by this process.
static OPEN_IMAGES: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

fn open_images() -> MutexGuard<'static, BTreeSet<PathBuf>> {
    OPEN_IMAGES.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FileDisk {
    path: PathBuf,
    inner: Mutex<Option<File>>,
}

impl FileDisk {
    /// Opens the image at `path`, creating it if needed and growing it to the
    /// full disk size.
    ///
    /// The single-open rule is per image: a second `open` of the same canonical
    /// path fails with `DeviceBusy` until the first is closed or dropped, while
    /// different images may be open side by side.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let wanted = (N_BLOCKS_IN_DISK * BLOCK_SIZE) as u64;
        if file.metadata()?.len() < wanted {
            file.set_len(wanted)?;
        }
        let path = path.as_ref().canonicalize()?;

        if !open_images().insert(path.clone()) {
            warn!("disk image {} is already open", path.display());
            return Err(FsError::DeviceBusy);
        }
        let disk = FileDisk {
            path,
            inner: Mutex::new(Some(file)),
        };
        debug!("opened disk image {}", disk.path.display());
        Ok(disk)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Syncs and releases the image. Later block accesses fail with `DeviceNotOpen`.
    pub fn close(&self) -> Result<()> {
        let file = self.lock().take().ok_or(FsError::DeviceNotOpen)?;
        open_images().remove(&self.path);
        file.sync_all()?;
        debug!("closed disk image {}", self.path.display());
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seek_to(file: &mut File, block_id: BlockRef) -> Result<()> {
        if block_id as usize >= N_BLOCKS_IN_DISK {
            return Err(FsError::InvalidBlock(block_id as usize));
        }
        file.seek(SeekFrom::Start(block_id as u64 * BLOCK_SIZE as u64))?;
        Ok(())
    }
}

impl BlockDevice for FileDisk {
    fn num_blocks(&self) -> usize {
        N_BLOCKS_IN_DISK
    }

    fn read_block(&self, block_id: BlockRef, buf: &mut Block) -> Result<()> {
        let mut inner = self.lock();
        let file = inner.as_mut().ok_or(FsError::DeviceNotOpen)?;
        Self::seek_to(file, block_id)?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: BlockRef, buf: &Block) -> Result<()> {
        let mut inner = self.lock();
        let file = inner.as_mut().ok_or(FsError::DeviceNotOpen)?;
        Self::seek_to(file, block_id)?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.lock();
        let file = inner.as_mut().ok_or(FsError::DeviceNotOpen)?;
        file.flush()?;
        Ok(())
    }
}

impl Drop for FileDisk {
    fn drop(&mut self) {
        if self.lock().take().is_some() {
            open_images().remove(&self.path);
        }
    }
}
