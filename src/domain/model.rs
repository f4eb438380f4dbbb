use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

pub const YAZ0_MAGIC: u32 = 0x5961_7A30; // "Yaz0"
pub const U8_MAGIC: u32 = 0x55AA_382D;
pub const SARC_MAGIC: u32 = 0x5341_5243; // "SARC"

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    Yaz0,
    U8,
    Sarc,
}

impl Format {
    pub fn magic(self) -> u32 {
        match self {
            Format::Yaz0 => YAZ0_MAGIC,
            Format::U8 => U8_MAGIC,
            Format::Sarc => SARC_MAGIC,
        }
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            YAZ0_MAGIC => Some(Format::Yaz0),
            U8_MAGIC => Some(Format::U8),
            SARC_MAGIC => Some(Format::Sarc),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Yaz0 => "Yaz0",
            Format::U8 => "U8",
            Format::Sarc => "SARC",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
        })
    }
}

/// Basic attributes of an archive entry. Archives carry no timestamps, so
/// every time reads as the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    kind: NodeKind,
    len: u64,
}

impl Metadata {
    pub fn new(kind: NodeKind, len: u64) -> Self {
        Self { kind, len }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        false
    }

    /// Size in bytes; always zero for directories.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn modified(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    pub fn accessed(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }

    pub fn created(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    isRegularFile   : {}", self.is_file())?;
        writeln!(f, "    isDirectory     : {}", self.is_dir())?;
        writeln!(f, "    isSymbolicLink  : {}", self.is_symlink())?;
        writeln!(f, "    size            : {}", self.len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    Continue,
    Terminate,
    SkipSubtree,
    SkipSiblings,
}

/// Kinds of access checked by `SzsFileSystem::check_access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Execute => "execute",
        })
    }
}

/// One row of an archive listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub path: String,
    pub kind: NodeKind,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}
