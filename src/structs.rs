//! In-memory records and their fixed on-disk encodings.
//! Sentinel values only exist in the `Raw*` types, everything above them uses `Option`.

use core::fmt;

use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::*;
use crate::error::{FsError, Result};

pub type InodeRef = u16;
pub type BlockRef = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    None,
    Directory,
    File,
}

impl InodeKind {
    fn tag(self) -> u8 {
        match self {
            InodeKind::None => b'N',
            InodeKind::Directory => b'D',
            InodeKind::File => b'F',
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'N' => Some(InodeKind::None),
            b'D' => Some(InodeKind::Directory),
            b'F' => Some(InodeKind::File),
            _ => None,
        }
    }

    /// Single letter used by the inspection tools.
    pub fn as_char(self) -> char {
        self.tag() as char
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub kind: InodeKind,
    /// Number of directory entries naming this inode. Always 1 for directories.
    pub n_references: u8,
    /// Direct blocks, populated from the front without holes.
    pub blocks: [Option<BlockRef>; BLOCKS_PER_INODE],
    /// File: length in bytes. Directory: number of live entries, "." and ".." included.
    pub size: u32,
}

impl Inode {
    pub const EMPTY: Self = Self {
        kind: InodeKind::None,
        n_references: 0,
        blocks: [None; BLOCKS_PER_INODE],
        size: 0,
    };

    pub fn directory(block: BlockRef) -> Self {
        let mut blocks = [None; BLOCKS_PER_INODE];
        blocks[0] = Some(block);
        Self {
            kind: InodeKind::Directory,
            n_references: 1,
            blocks,
            size: 2,
        }
    }

    pub fn file() -> Self {
        Self {
            kind: InodeKind::File,
            n_references: 1,
            ..Self::EMPTY
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == InodeKind::File
    }

    pub fn is_free(&self) -> bool {
        self.kind == InodeKind::None
    }

    /// Blocks in use, in file order.
    pub fn allocated_blocks(&self) -> impl Iterator<Item = BlockRef> + '_ {
        self.blocks.iter().map_while(|block| *block)
    }

    /// The single data block of a directory.
    pub fn dir_block(&self) -> Result<BlockRef> {
        if !self.is_directory() {
            return Err(FsError::NotADirectory);
        }
        self.blocks[0].ok_or(FsError::Corrupted("directory without a data block"))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct RawInode {
    kind: u8,
    n_references: u8,
    blocks: [U16<LittleEndian>; BLOCKS_PER_INODE],
    size: U32<LittleEndian>,
}

const _: () = assert!(core::mem::size_of::<RawInode>() == INODE_SIZE);

impl From<&Inode> for RawInode {
    fn from(inode: &Inode) -> Self {
        Self {
            kind: inode.kind.tag(),
            n_references: inode.n_references,
            blocks: inode
                .blocks
                .map(|block| U16::new(block.unwrap_or(UNALLOCATED_BLOCK))),
            size: U32::new(inode.size),
        }
    }
}

impl RawInode {
    pub(crate) fn decode(&self) -> Result<Inode> {
        let kind = InodeKind::from_tag(self.kind).ok_or(FsError::Corrupted("unknown inode kind"))?;
        let mut blocks = [None; BLOCKS_PER_INODE];
        for (slot, raw) in blocks.iter_mut().zip(self.blocks.iter()) {
            *slot = match raw.get() {
                UNALLOCATED_BLOCK => None,
                b if (b as usize) < N_BLOCKS_IN_DISK => Some(b),
                _ => return Err(FsError::Corrupted("inode block reference out of range")),
            };
        }
        Ok(Inode {
            kind,
            n_references: self.n_references,
            blocks,
            size: self.size.get(),
        })
    }
}

/// Fixed-width, NUL padded entry name. Longer names are cut to `MAX_FILE_NAME_LEN`
/// bytes, the same way whether the name is being stored or looked up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirName([u8; FILE_NAME_SIZE]);

impl DirName {
    pub const BLANK: Self = Self([0; FILE_NAME_SIZE]);

    /// Stops at the first NUL, as a stored name would, and never splits a character.
    pub fn new(name: &str) -> Self {
        let name = name.split('\0').next().unwrap_or_default();
        let mut len = name.len().min(MAX_FILE_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        let mut arr = [0; FILE_NAME_SIZE];
        arr[..len].copy_from_slice(&name.as_bytes()[..len]);
        Self(arr)
    }

    fn from_raw(raw: &[u8; FILE_NAME_SIZE]) -> Self {
        let mut arr = [0; FILE_NAME_SIZE];
        let len = raw.iter().position(|&c| c == 0).unwrap_or(FILE_NAME_SIZE);
        let len = len.min(MAX_FILE_NAME_LEN);
        arr[..len].copy_from_slice(&raw[..len]);
        Self(arr)
    }

    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&c| c == 0).unwrap_or(FILE_NAME_SIZE);
        &self.0[..end]
    }

    pub fn is_blank(&self) -> bool {
        self.0[0] == 0
    }

    pub fn is_dot_or_dotdot(&self) -> bool {
        self.as_bytes() == DOT_NAME.as_bytes() || self.as_bytes() == DOTDOT_NAME.as_bytes()
    }
}

impl fmt::Display for DirName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for DirName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: DirName,
    /// `None` marks an empty slot.
    pub inode: Option<InodeRef>,
}

impl DirEntry {
    pub const EMPTY: Self = Self {
        name: DirName::BLANK,
        inode: None,
    };

    pub fn new(name: DirName, inode: InodeRef) -> Self {
        Self {
            name,
            inode: Some(inode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inode.is_none()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub(crate) struct RawDirEntry {
    name: [u8; FILE_NAME_SIZE],
    inode: U16<LittleEndian>,
}

const _: () = assert!(core::mem::size_of::<RawDirEntry>() == DIR_ENTRY_SIZE);

impl From<&DirEntry> for RawDirEntry {
    fn from(entry: &DirEntry) -> Self {
        match entry.inode {
            Some(inode) => Self {
                name: entry.name.0,
                inode: U16::new(inode),
            },
            None => Self {
                name: [0; FILE_NAME_SIZE],
                inode: U16::new(UNALLOCATED_INODE),
            },
        }
    }
}

impl RawDirEntry {
    pub(crate) fn decode(&self) -> Result<DirEntry> {
        match self.inode.get() {
            UNALLOCATED_INODE => Ok(DirEntry::EMPTY),
            i if (i as usize) < N_INODES => Ok(DirEntry::new(DirName::from_raw(&self.name), i)),
            _ => Err(FsError::Corrupted("directory entry inode out of range")),
        }
    }
}

/// Block 0: allocation flags, one bit per inode and one bit per block,
/// least significant bit first.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct MasterBlock {
    pub(crate) inode_allocated: [u8; INODE_BITMAP_BYTES],
    pub(crate) block_allocated: [u8; BLOCK_BITMAP_BYTES],
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inode_encoding() {
        let mut inode = Inode::file();
        inode.blocks[0] = Some(10);
        inode.blocks[1] = Some(42);
        inode.size = 300;
        let raw = RawInode::from(&inode);
        let bytes = raw.as_bytes();
        assert_eq!(bytes[0], b'F');
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..4], &[10, 0]);
        assert_eq!(&bytes[4..6], &[42, 0]);
        assert_eq!(&bytes[6..8], &[0xff, 0xff]);
        assert_eq!(&bytes[32..36], &300u32.to_le_bytes());
        assert_eq!(raw.decode().unwrap(), inode);
    }

    #[test]
    fn test_inode_bad_tag() {
        let raw = RawInode::read_from_bytes(&[0u8; INODE_SIZE]).unwrap();
        assert!(matches!(raw.decode(), Err(FsError::Corrupted(_))));
    }

    #[test]
    fn test_name_truncation() {
        let name = DirName::new("a_rather_long_file_name");
        assert_eq!(name.as_bytes(), b"a_rather_long");
        assert_eq!(name, DirName::new("a_rather_longer_name"));
        assert_ne!(DirName::new("test"), DirName::new("test1"));
        assert_eq!(DirName::new("").is_blank(), true);
        assert!(DirName::new("..").is_dot_or_dotdot());
        assert!(!DirName::new("...").is_dot_or_dotdot());
    }

    #[test]
    fn test_name_stops_at_nul() {
        assert_eq!(DirName::new("a\0b"), DirName::new("a"));
        assert_eq!(DirName::new("\0hidden").is_blank(), true);
        let raw = RawDirEntry::from(&DirEntry::new(DirName::new("a\0b"), 3));
        assert_eq!(raw.decode().unwrap().name, DirName::new("a"));
    }

    #[test]
    fn test_name_keeps_whole_chars() {
        // 12 ASCII bytes, then a 2-byte character straddling the 13 byte limit.
        let name = DirName::new("abcdefghijkl\u{e9}");
        assert_eq!(name.as_bytes(), b"abcdefghijkl");
        assert_eq!(name.to_string(), "abcdefghijkl");
        let name = DirName::new(&"\u{e9}".repeat(7));
        assert_eq!(name.to_string(), "\u{e9}".repeat(6));
        assert_eq!(name, DirName::new(&"\u{e9}".repeat(8)));
    }

    #[test]
    fn test_name_ordering() {
        assert!(DirName::new("a") < DirName::new("ab"));
        assert!(DirName::new("B") < DirName::new("a"));
        assert!(DirName::new(".") < DirName::new(".."));
    }

    #[test]
    fn test_empty_entry_encoding() {
        let raw = RawDirEntry::from(&DirEntry::EMPTY);
        let bytes = raw.as_bytes();
        assert!(bytes[..FILE_NAME_SIZE].iter().all(|&c| c == 0));
        assert_eq!(&bytes[FILE_NAME_SIZE..], &[0xfe, 0xff]);
        assert_eq!(raw.decode().unwrap(), DirEntry::EMPTY);
    }
}
