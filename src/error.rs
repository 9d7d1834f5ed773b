use crate::config::{MAX_FILE_SIZE, N_BLOCKS_IN_DISK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("no such directory along the path")]
    PathNotFound,
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a file")]
    NotAFile,
    #[error("file or directory already exists")]
    AlreadyExists,
    #[error("parent directory is full")]
    ParentFull,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("no free inodes")]
    OutOfInodes,
    #[error("no free blocks")]
    OutOfBlocks,
    #[error("file would exceed the maximum size of {} bytes", MAX_FILE_SIZE)]
    FileTooLarge,
    #[error("too many links to one file")]
    TooManyLinks,
    #[error("invalid open mode")]
    InvalidMode,
    #[error("operation not permitted by the open mode")]
    WrongModeForOperation,
    #[error("invalid file name")]
    InvalidName,
    #[error("index {0} out of bounds")]
    OutOfBounds(usize),
    #[error("block {0} is out of range for the device")]
    InvalidBlock(usize),
    #[error("device holds {0} blocks, expected {expected}", expected = N_BLOCKS_IN_DISK)]
    DeviceSize(usize),
    #[error("device I/O error: {0}")]
    DeviceIo(std::io::ErrorKind),
    #[error("device is not open")]
    DeviceNotOpen,
    #[error("device is already open")]
    DeviceBusy,
    #[error("device does not hold a formatted volume")]
    NotFormatted,
    #[error("corrupted file system: {0}")]
    Corrupted(&'static str),
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::DeviceIo(err.kind())
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
