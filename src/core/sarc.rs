//! SARC archive reader.
//!
//! A SARC file has a 20 byte header, an SFAT table of 16 byte entries, an
//! SFNT name table and a data region. Multi-byte fields follow the byte
//! order given by the BOM; the section magics are always big-endian.

use crate::domain::model::{Format, SARC_MAGIC};
use crate::domain::ports::{Archive, ReadSeek};
use crate::domain::tree::{Node, Tree};
use crate::utils::error::{Result, SzsError};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SFAT_MAGIC: u32 = 0x5346_4154; // "SFAT"
const SFNT_MAGIC: u32 = 0x5346_4E54; // "SFNT"
const SARC_VERSION: u16 = 0x0100;
const HEADERS_LEN: u64 = 40;
const SFAT_NODE_LEN: u64 = 16;
const NAMED_FLAG: u32 = 0x0100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

struct SarcInput<R> {
    inner: R,
    order: ByteOrder,
}

impl<R: Read> SarcInput<R> {
    fn bytes<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn magic(&mut self) -> io::Result<u32> {
        Ok(u32::from_be_bytes(self.bytes()?))
    }

    fn u16(&mut self) -> io::Result<u16> {
        let bytes = self.bytes()?;
        Ok(match self.order {
            ByteOrder::Big => u16::from_be_bytes(bytes),
            ByteOrder::Little => u16::from_le_bytes(bytes),
        })
    }

    fn u32(&mut self) -> io::Result<u32> {
        let bytes = self.bytes()?;
        Ok(match self.order {
            ByteOrder::Big => u32::from_be_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
        })
    }

    fn skip(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(count), &mut io::sink())?;
        if skipped < count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} more bytes", count - skipped),
            ));
        }
        Ok(())
    }

    fn read_vec(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut data)?;
        Ok(data)
    }
}

struct PartialNode {
    hash: u32,
    name_offset: usize,
    begin: u32,
    end: u32,
}

/// Shared file data that can back a `Cursor`.
#[derive(Clone)]
struct DataSlice {
    data: Arc<[u8]>,
    range: Range<usize>,
}

impl AsRef<[u8]> for DataSlice {
    fn as_ref(&self) -> &[u8] {
        &self.data[self.range.clone()]
    }
}

/// Filename hash stored in SFAT entries.
pub fn hash_name(name: &[u8], key: u32) -> u32 {
    name.iter()
        .fold(0u32, |hash, &b| hash.wrapping_mul(key).wrapping_add(b as u32))
}

pub struct SarcArchive {
    files: Vec<(String, Range<usize>)>,
    by_name: HashMap<String, usize>,
    data: Arc<[u8]>,
    tree: Tree,
    open: AtomicBool,
}

impl SarcArchive {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut input = SarcInput {
            inner: reader,
            order: ByteOrder::Big,
        };

        let magic = input.magic()?;
        if magic != SARC_MAGIC {
            return Err(SzsError::InvalidMagic {
                format: Format::Sarc,
                found: magic,
            });
        }
        input.skip(2)?;
        input.order = match input.u16()? {
            0xFEFF => ByteOrder::Big,
            0xFFFE => ByteOrder::Little,
            bom => {
                return Err(SzsError::corrupt(Format::Sarc, format!("invalid BOM: 0x{:x}", bom)));
            }
        };
        let file_size = input.u32()? as u64;
        let data_start = input.u32()? as u64;
        let version = input.u16()?;
        if version != SARC_VERSION {
            return Err(SzsError::corrupt(Format::Sarc, format!("unknown version: 0x{:x}", version)));
        }
        input.skip(2)?;

        if input.magic()? != SFAT_MAGIC {
            return Err(SzsError::corrupt(Format::Sarc, "invalid SFAT magic"));
        }
        input.skip(2)?;
        let node_count = input.u16()? as u64;
        let hash_key = input.u32()?;

        let mut partial = Vec::with_capacity(node_count as usize);
        let mut data_len = 0u32;
        for _ in 0..node_count {
            let hash = input.u32()?;
            let attrs = input.u32()?;
            if attrs & NAMED_FLAG == 0 {
                tracing::warn!("Skipping SARC entry {:08x} without a file name", hash);
                input.skip(8)?;
                continue;
            }
            let begin = input.u32()?;
            let end = input.u32()?;
            if end < begin {
                return Err(SzsError::corrupt(
                    Format::Sarc,
                    format!("entry {:08x} ends before it begins", hash),
                ));
            }
            data_len = data_len.max(end);
            partial.push(PartialNode {
                hash,
                name_offset: ((attrs & 0xFFFF) << 2) as usize,
                begin,
                end,
            });
        }

        if input.magic()? != SFNT_MAGIC {
            return Err(SzsError::corrupt(Format::Sarc, "invalid SFNT magic"));
        }
        input.skip(4)?;

        let table_len = data_start
            .checked_sub(HEADERS_LEN + SFAT_NODE_LEN * node_count)
            .ok_or_else(|| SzsError::corrupt(Format::Sarc, "data offset inside the headers"))?;
        let name_table = input.read_vec(table_len)?;
        if (name_table.len() as u64) < table_len {
            return Err(SzsError::Truncated {
                format: Format::Sarc,
                expected: table_len,
                actual: name_table.len() as u64,
            });
        }

        let mut files: Vec<(String, Range<usize>)> = Vec::with_capacity(partial.len());
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(partial.len());
        for node in &partial {
            let tail = name_table.get(node.name_offset..).unwrap_or(&[]);
            let name_bytes = &tail[..tail.iter().position(|&b| b == 0).unwrap_or(tail.len())];
            // Latin-1 maps each byte to the code point of the same value
            let name: String = name_bytes.iter().map(|&b| b as char).collect();
            let hash = hash_name(name_bytes, hash_key);
            if hash != node.hash {
                return Err(SzsError::corrupt(
                    Format::Sarc,
                    format!(
                        "hash of filename {} does not match header: {} != {}",
                        name, hash, node.hash
                    ),
                ));
            }
            let range = node.begin as usize..node.end as usize;
            // A repeated name keeps its first position and takes the later data
            match positions.get(&name) {
                Some(&slot) => files[slot].1 = range,
                None => {
                    positions.insert(name.clone(), files.len());
                    files.push((name, range));
                }
            }
        }

        let data = input.read_vec(data_len as u64)?;
        if data.len() < data_len as usize {
            return Err(SzsError::Truncated {
                format: Format::Sarc,
                expected: data_len as u64,
                actual: data.len() as u64,
            });
        }
        let trailing = file_size.saturating_sub(data_start + data_len as u64);
        // Trailing padding is optional at the end of the stream
        let _ = input.skip(trailing);

        Ok(Self::assemble(files, data))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_reader(bytes)
    }

    fn assemble(files: Vec<(String, Range<usize>)>, data: Vec<u8>) -> Self {
        let mut tree = Tree::new("");
        let mut by_name = HashMap::with_capacity(files.len());
        for (index, (name, range)) in files.iter().enumerate() {
            by_name.insert(name.clone(), index);
            let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
            if let Some((file_name, dirs)) = parts.split_last() {
                let parent = tree.ensure_directory(Tree::ROOT, dirs.iter().copied());
                tree.add_file(
                    parent,
                    *file_name,
                    range.start as u64,
                    (range.end - range.start) as u64,
                );
            }
        }
        tracing::debug!("Opened SARC archive with {} files", files.len());

        Self {
            files,
            by_name,
            data: data.into(),
            tree,
            open: AtomicBool::new(true),
        }
    }

    /// File names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        let index = *self.by_name.get(name)?;
        self.data.get(self.files[index].1.clone())
    }

    pub fn reader(&self, name: &str) -> Option<Cursor<&[u8]>> {
        self.get(name).map(Cursor::new)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Archive for SarcArchive {
    fn format(&self) -> Format {
        Format::Sarc
    }

    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn open(&self, node: Node<'_>) -> Result<Box<dyn ReadSeek>> {
        if !self.open.load(Ordering::Acquire) {
            return Err(SzsError::Closed);
        }
        if !node.belongs_to(&self.tree) {
            return Err(SzsError::not_found(node.full_path()));
        }
        let (offset, size) = node.data_location().ok_or_else(|| SzsError::IsADirectory {
            path: node.full_path(),
        })?;
        let start = offset as usize;
        let end = start + size as usize;
        if end > self.data.len() {
            return Err(SzsError::corrupt(Format::Sarc, format!("{} lies outside the data", node)));
        }
        Ok(Box::new(Cursor::new(DataSlice {
            data: Arc::clone(&self.data),
            range: start..end,
        })))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}
