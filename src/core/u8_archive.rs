//! U8 archive reader.
//!
//! Layout (all big-endian): a 16 byte header (magic, offset of the node
//! table, length of node table plus string pool, offset of file data), then
//! 12 byte nodes in pre-order followed by the string pool. A node is a type
//! byte (0 file, 1 directory), a 24-bit name offset into the pool and two
//! words: data offset and size for files, parent index and the index just
//! past the directory's last descendant for directories.
//!
//! The archive can be shared between threads. Each [`U8FileReader`] keeps its
//! own position and re-seeks the shared source only when another reader
//! touched it in between. A single reader is not meant to be shared.

use crate::domain::model::{Format, U8_MAGIC};
use crate::domain::ports::{Archive, ReadSeek, Visitor};
use crate::domain::model::VisitResult;
use crate::domain::tree::{Node, Tree};
use crate::utils::error::{Result, SzsError};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const HEADER_LEN: usize = 16;
pub const NODE_LEN: usize = 12;

struct Shared<R> {
    source: Option<R>,
    /// Reader whose position the source currently reflects, 0 for none.
    owner: u64,
    next_id: u64,
}

pub struct U8Archive<R> {
    tree: Tree,
    data_offset: u32,
    shared: Arc<Mutex<Shared<R>>>,
}

#[derive(Clone, Copy)]
struct RawNode {
    is_dir: bool,
    name_offset: usize,
    first: u32,
    second: u32,
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_name(pool: &[u8], offset: usize) -> Result<String> {
    let tail = pool
        .get(offset..)
        .ok_or_else(|| SzsError::corrupt(Format::U8, format!("name offset {} outside string pool", offset)))?;
    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| SzsError::corrupt(Format::U8, format!("unterminated name at {}", offset)))?;
    let bytes = &tail[..end];
    if let Some(&bad) = bytes.iter().find(|b| !b.is_ascii()) {
        return Err(SzsError::corrupt(
            Format::U8,
            format!("cannot decode 0x{:02x} with ASCII", bad),
        ));
    }
    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// Builds the directory tree from the node table plus string pool block.
pub fn parse_tree(block: &[u8]) -> Result<Tree> {
    if block.len() < NODE_LEN {
        return Err(SzsError::corrupt(Format::U8, "node table too short for the root node"));
    }
    if block[0] == 0 {
        return Err(SzsError::corrupt(Format::U8, "root node not a directory"));
    }
    let count = be_u32(block, 8) as usize;
    let pool_start = count
        .checked_mul(NODE_LEN)
        .filter(|&len| count > 0 && len <= block.len())
        .ok_or_else(|| SzsError::corrupt(Format::U8, format!("node count {} exceeds the node table", count)))?;
    let pool = &block[pool_start..];

    let raw: Vec<RawNode> = (0..count)
        .map(|i| {
            let at = i * NODE_LEN;
            RawNode {
                is_dir: block[at] != 0,
                name_offset: (be_u32(block, at) & 0x00FF_FFFF) as usize,
                first: be_u32(block, at + 4),
                second: be_u32(block, at + 8),
            }
        })
        .collect();

    let mut tree = Tree::new(read_name(pool, raw[0].name_offset)?);
    // Open directories as (index, end) pairs, innermost last
    let mut open: Vec<(usize, usize)> = vec![(Tree::ROOT, count)];

    for (index, node) in raw.iter().enumerate().skip(1) {
        while open.last().is_some_and(|&(_, end)| end <= index) {
            open.pop();
        }
        let &(parent, parent_end) = open
            .last()
            .ok_or_else(|| SzsError::corrupt(Format::U8, format!("node {} outside the root", index)))?;
        let name = read_name(pool, node.name_offset)?;

        if node.is_dir {
            let declared_parent = node.first as usize;
            if declared_parent >= count {
                return Err(SzsError::corrupt(
                    Format::U8,
                    format!("invalid parent index (out of bounds): {}", declared_parent),
                ));
            }
            if !raw[declared_parent].is_dir {
                return Err(SzsError::corrupt(
                    Format::U8,
                    "invalid parent index: parent node isn't a directory",
                ));
            }
            let end = node.second as usize;
            if end <= index || end > parent_end {
                return Err(SzsError::corrupt(
                    Format::U8,
                    format!("invalid next index for node {}: {}", index, end),
                ));
            }
            tree.add_directory(parent, name);
            open.push((index, end));
        } else {
            tree.add_file(parent, name, node.first as u64, node.second as u64);
        }
    }

    Ok(tree)
}

impl<R: Read + Seek> U8Archive<R> {
    pub fn from_reader(mut source: R) -> Result<Self> {
        let stream_len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let mut header = [0u8; HEADER_LEN];
        source.read_exact(&mut header)?;
        let magic = be_u32(&header, 0);
        if magic != U8_MAGIC {
            return Err(SzsError::InvalidMagic {
                format: Format::U8,
                found: magic,
            });
        }
        let first_node_offset = be_u32(&header, 4) as u64;
        let tree_len = be_u32(&header, 8) as u64;
        let data_offset = be_u32(&header, 12);
        if first_node_offset + tree_len > stream_len {
            return Err(SzsError::Truncated {
                format: Format::U8,
                expected: first_node_offset + tree_len,
                actual: stream_len,
            });
        }

        let mut block = vec![0u8; tree_len as usize];
        source.seek(SeekFrom::Start(first_node_offset))?;
        source.read_exact(&mut block)?;
        let tree = parse_tree(&block)?;
        tracing::debug!("Opened U8 archive with {} nodes", tree.len());

        Ok(Self {
            tree,
            data_offset,
            shared: Arc::new(Mutex::new(Shared {
                source: Some(source),
                owner: 0,
                next_id: 1,
            })),
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root()
    }

    /// Offset of the file data region as recorded in the header.
    pub fn data_offset(&self) -> u32 {
        self.data_offset
    }

    pub fn node(&self, path: &str) -> Result<Option<Node<'_>>> {
        let path = path.strip_prefix('/').unwrap_or(path);
        self.root().resolve(path)
    }

    pub fn walk<'a, V: Visitor<Node<'a>> + ?Sized>(&'a self, visitor: &mut V) -> Result<VisitResult> {
        self.tree.root().walk(visitor)
    }

    pub fn open_file(&self, node: Node<'_>) -> Result<U8FileReader<R>> {
        if !node.belongs_to(&self.tree) {
            return Err(SzsError::not_found(node.full_path()));
        }
        let (offset, size) = node.data_location().ok_or_else(|| SzsError::IsADirectory {
            path: node.full_path(),
        })?;
        let mut shared = self.shared.lock().map_err(|_| lock_poisoned())?;
        if shared.source.is_none() {
            return Err(SzsError::Closed);
        }
        let id = shared.next_id;
        shared.next_id += 1;

        Ok(U8FileReader {
            shared: Arc::clone(&self.shared),
            id,
            offset,
            size,
            position: 0,
            needs_seek: true,
        })
    }

    /// Releases the source. Readers opened earlier fail from now on.
    pub fn close(&self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.source = None;
            shared.owner = 0;
        }
    }

    pub fn is_open(&self) -> bool {
        self.shared
            .lock()
            .map(|shared| shared.source.is_some())
            .unwrap_or(false)
    }
}

impl U8Archive<Cursor<Vec<u8>>> {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }
}

impl U8Archive<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek + Send + 'static> Archive for U8Archive<R> {
    fn format(&self) -> Format {
        Format::U8
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn open(&self, node: Node<'_>) -> Result<Box<dyn ReadSeek>> {
        Ok(Box::new(self.open_file(node)?))
    }

    fn is_open(&self) -> bool {
        U8Archive::is_open(self)
    }

    fn close(&self) {
        U8Archive::close(self)
    }
}

fn lock_poisoned() -> io::Error {
    io::Error::other("U8 archive lock poisoned")
}

/// Carries [`SzsError::Closed`] so `SzsError::from_io` can recover it.
fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, SzsError::Closed)
}

/// Read-only view of one file inside a [`U8Archive`].
pub struct U8FileReader<R> {
    shared: Arc<Mutex<Shared<R>>>,
    id: u64,
    offset: u64,
    size: u64,
    position: u64,
    needs_seek: bool,
}

impl<R> U8FileReader<R> {
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read + Seek> Read for U8FileReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = self.shared.lock().map_err(|_| lock_poisoned())?;
        let Shared { source, owner, .. } = &mut *shared;
        let source = source.as_mut().ok_or_else(closed)?;
        if self.position >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let want = usize::try_from(self.size - self.position)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if *owner != self.id || self.needs_seek {
            source.seek(SeekFrom::Start(self.offset + self.position))?;
            *owner = self.id;
            self.needs_seek = false;
        }
        match source.read(&mut buf[..want]) {
            Ok(read) => {
                self.position += read as u64;
                Ok(read)
            }
            Err(e) => {
                *owner = 0;
                Err(e)
            }
        }
    }
}

impl<R: Read + Seek> Seek for U8FileReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        if target != self.position {
            self.position = target;
            self.needs_seek = true;
        }
        Ok(self.position)
    }
}
