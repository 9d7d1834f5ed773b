use log::trace;
use zerocopy::{FromBytes, IntoBytes};

use crate::block_dev::{Block, BlockDevice};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::MasterBlock;

pub fn read_master(device: &impl BlockDevice) -> Result<MasterBlock> {
    let mut buf: Block = [0; BLOCK_SIZE];
    device.read_block(MASTER_BLOCK_REF, &mut buf)?;
    let (master, _) = MasterBlock::read_from_prefix(&buf)
        .map_err(|_| FsError::Corrupted("short master block"))?;
    Ok(master)
}

pub fn write_master(device: &impl BlockDevice, master: &MasterBlock) -> Result<()> {
    let mut buf: Block = [0; BLOCK_SIZE];
    let bytes = master.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    device.write_block(MASTER_BLOCK_REF, &buf)?;
    trace!(
        "master block written: {} free inodes, {} free blocks",
        master.free_inodes(),
        master.free_blocks()
    );
    Ok(())
}
