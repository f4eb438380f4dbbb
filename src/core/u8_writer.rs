use crate::domain::model::{Format, U8_MAGIC};
use crate::utils::error::{Result, SzsError};

const FIRST_NODE_OFFSET: usize = 0x20;
const DATA_ALIGNMENT: usize = 0x20;
const MAX_NAME_OFFSET: usize = 0x00FF_FFFF;

#[derive(Debug, Default)]
struct DirEntry {
    children: Vec<(String, Entry)>,
}

#[derive(Debug)]
enum Entry {
    Directory(DirEntry),
    File(Vec<u8>),
}

impl DirEntry {
    fn directory(&mut self, name: &str) -> &mut DirEntry {
        let slot = match self.children.iter().position(|(n, _)| n == name) {
            Some(slot) => {
                if matches!(self.children[slot].1, Entry::File(_)) {
                    self.children[slot].1 = Entry::Directory(DirEntry::default());
                }
                slot
            }
            None => {
                self.children
                    .push((name.to_string(), Entry::Directory(DirEntry::default())));
                self.children.len() - 1
            }
        };
        match &mut self.children[slot].1 {
            Entry::Directory(dir) => dir,
            Entry::File(_) => unreachable!("replaced above"),
        }
    }

    fn put_file(&mut self, name: &str, data: Vec<u8>) {
        match self.children.iter().position(|(n, _)| n == name) {
            Some(slot) => self.children[slot].1 = Entry::File(data),
            None => self.children.push((name.to_string(), Entry::File(data))),
        }
    }
}

struct FlatNode<'a> {
    name: &'a str,
    parent: usize,
    next: usize,
    data: Option<&'a [u8]>,
}

/// Writes U8 archives. Entries keep insertion order; path components are
/// taken literally, so `"./a.bin"` creates a directory named `.`.
#[derive(Debug, Default)]
pub struct U8Builder {
    root: DirEntry,
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

fn align(value: usize) -> usize {
    value.div_ceil(DATA_ALIGNMENT) * DATA_ALIGNMENT
}

impl U8Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directory(&mut self, path: &str) -> &mut Self {
        let mut dir = &mut self.root;
        for part in components(path) {
            dir = dir.directory(part);
        }
        self
    }

    pub fn add_file(&mut self, path: &str, data: Vec<u8>) -> &mut Self {
        let parts: Vec<&str> = components(path).collect();
        if let Some((name, parents)) = parts.split_last() {
            let mut dir = &mut self.root;
            for part in parents {
                dir = dir.directory(part);
            }
            dir.put_file(name, data);
        }
        self
    }

    fn flatten<'a>(dir: &'a DirEntry, parent: usize, out: &mut Vec<FlatNode<'a>>) {
        for (name, entry) in &dir.children {
            let index = out.len();
            match entry {
                Entry::File(data) => out.push(FlatNode {
                    name,
                    parent,
                    next: 0,
                    data: Some(data),
                }),
                Entry::Directory(sub) => {
                    out.push(FlatNode {
                        name,
                        parent,
                        next: 0,
                        data: None,
                    });
                    Self::flatten(sub, index, out);
                    out[index].next = out.len();
                }
            }
        }
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        let mut nodes = vec![FlatNode {
            name: "",
            parent: 0,
            next: 0,
            data: None,
        }];
        Self::flatten(&self.root, 0, &mut nodes);
        nodes[0].next = nodes.len();

        let mut pool = Vec::new();
        let mut name_offsets = Vec::with_capacity(nodes.len());
        for node in &nodes {
            if !node.name.is_ascii() {
                return Err(SzsError::corrupt(
                    Format::U8,
                    format!("entry name {:?} is not ASCII", node.name),
                ));
            }
            if pool.len() > MAX_NAME_OFFSET {
                return Err(SzsError::corrupt(Format::U8, "string pool too large"));
            }
            name_offsets.push(pool.len());
            pool.extend_from_slice(node.name.as_bytes());
            pool.push(0);
        }

        let tree_len = nodes.len() * super::u8_archive::NODE_LEN + pool.len();
        let data_offset = align(FIRST_NODE_OFFSET + tree_len);
        let too_large = || SzsError::corrupt(Format::U8, "archive larger than 4 GiB");

        let mut file_offsets = Vec::with_capacity(nodes.len());
        let mut cursor = data_offset;
        for node in &nodes {
            match node.data {
                Some(data) => {
                    file_offsets.push(cursor);
                    cursor = align(cursor + data.len());
                }
                None => file_offsets.push(0),
            }
        }
        u32::try_from(cursor).map_err(|_| too_large())?;

        let mut out = Vec::with_capacity(cursor);
        out.extend_from_slice(&U8_MAGIC.to_be_bytes());
        out.extend_from_slice(&(FIRST_NODE_OFFSET as u32).to_be_bytes());
        out.extend_from_slice(&(tree_len as u32).to_be_bytes());
        out.extend_from_slice(&(data_offset as u32).to_be_bytes());
        out.resize(FIRST_NODE_OFFSET, 0xCC);

        for (index, node) in nodes.iter().enumerate() {
            let (kind, first, second) = match node.data {
                Some(data) => (0u32, file_offsets[index], data.len()),
                None => (1u32, node.parent, node.next),
            };
            out.extend_from_slice(&((kind << 24) | name_offsets[index] as u32).to_be_bytes());
            out.extend_from_slice(&(first as u32).to_be_bytes());
            out.extend_from_slice(&(second as u32).to_be_bytes());
        }
        out.extend_from_slice(&pool);

        for (index, node) in nodes.iter().enumerate() {
            if let Some(data) = node.data {
                out.resize(file_offsets[index], 0);
                out.extend_from_slice(data);
            }
        }
        out.resize(cursor.max(data_offset), 0);

        tracing::debug!("Built U8 archive with {} nodes, {} bytes", nodes.len(), out.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::u8_archive::U8Archive;
    use std::io::Read;

    #[test]
    fn test_header_layout() {
        let mut builder = U8Builder::new();
        builder.add_file("./a.bin", vec![1, 2, 3]);
        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[..4], &[0x55, 0xAA, 0x38, 0x2D]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0x20]);
        let data_offset = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        assert_eq!(data_offset % DATA_ALIGNMENT, 0);
        assert_eq!(&bytes[data_offset..data_offset + 3], &[1, 2, 3]);
    }

    #[test]
    fn test_later_file_replaces_earlier() {
        let mut builder = U8Builder::new();
        builder.add_file("x/y", b"old".to_vec());
        builder.add_file("x/y", b"new".to_vec());
        let archive = U8Archive::from_bytes(builder.build().unwrap()).unwrap();
        let node = archive.node("x/y").unwrap().unwrap();
        let mut content = String::new();
        archive.open_file(node).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "new");
        assert_eq!(archive.tree().len(), 3);
    }

    #[test]
    fn test_nested_directories_round_trip_structure() {
        let mut builder = U8Builder::new();
        builder
            .add_file("./a/b/c.txt", b"c".to_vec())
            .add_file("./a/d.txt", b"d".to_vec())
            .add_file("./e.txt", b"e".to_vec());
        let archive = U8Archive::from_bytes(builder.build().unwrap()).unwrap();
        assert_eq!(
            archive.node("./a/d.txt").unwrap().unwrap().parent().name(),
            "a"
        );
        assert_eq!(archive.node("./e.txt").unwrap().unwrap().parent().name(), ".");
        assert_eq!(
            archive.node("./a/b/c.txt").unwrap().unwrap().full_path(),
            "/./a/b/c.txt"
        );
    }

    #[test]
    fn test_non_ascii_names_are_rejected() {
        let mut builder = U8Builder::new();
        builder.add_file("caf\u{e9}", vec![]);
        assert!(builder.build().is_err());
    }
}
