//! Read-only filesystem view over an SZS archive.

use crate::core::detect::detect_bytes;
use crate::core::glob::PathMatcher;
use crate::core::path::{self, SzsPath};
use crate::core::sarc::SarcArchive;
use crate::core::u8_archive::U8Archive;
use crate::core::yaz0;
use crate::domain::model::{AccessMode, Format, Metadata, VisitResult};
use crate::domain::ports::{Archive, ReadSeek, Visitor};
use crate::domain::tree::Node;
use crate::utils::error::{Result, SzsError};
use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const STORE_TYPE: &str = "szs";

/// One store per archive entry, as reported by [`SzsFileSystem::stores`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStore {
    name: String,
    total_space: u64,
}

impl FileStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        STORE_TYPE
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn total_space(&self) -> u64 {
        self.total_space
    }

    pub fn usable_space(&self) -> u64 {
        0
    }

    pub fn unallocated_space(&self) -> u64 {
        0
    }
}

pub struct SzsFileSystem {
    source: Option<PathBuf>,
    archive: Box<dyn Archive>,
    root: usize,
    root_depth: usize,
}

/// Decodes `bytes` into an archive, unwrapping any number of Yaz0 layers.
pub fn open_archive(mut bytes: Vec<u8>) -> Result<Box<dyn Archive>> {
    loop {
        match detect_bytes(&bytes)? {
            Some(Format::Yaz0) => {
                tracing::debug!("Unwrapping Yaz0 layer of {} bytes", bytes.len());
                bytes = yaz0::decompress(&bytes)?;
            }
            Some(Format::U8) => return Ok(Box::new(U8Archive::from_bytes(bytes)?)),
            Some(Format::Sarc) => return Ok(Box::new(SarcArchive::from_bytes(&bytes)?)),
            None => {
                return Err(SzsError::UnknownFormat {
                    magic: bytes[..4].iter().map(|&b| b as char).collect(),
                });
            }
        }
    }
}

impl SzsFileSystem {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Mounting {}", path.display());
        let bytes = std::fs::read(path)?;
        let mut fs = Self::from_bytes(bytes)?;
        fs.source = Some(path.to_path_buf());
        Ok(fs)
    }

    /// Mounts the archive named by `szs:file://<archive>`; any `!/<path>`
    /// suffix is ignored.
    pub fn open_uri(uri: &str) -> Result<Self> {
        let (archive, _) = path::parse_uri(uri)?;
        Self::open(archive)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Ok(Self::from_archive(open_archive(bytes)?))
    }

    /// Mounts `archive`, descending through directories named `.` below its root.
    pub fn from_archive(archive: Box<dyn Archive>) -> Self {
        let (root, root_depth) = {
            let mut root = archive.root();
            while let Some(dot) = root.child(".").filter(|child| child.is_dir()) {
                root = dot;
            }
            (root.index(), root.ancestors().len())
        };
        Self {
            source: None,
            archive,
            root,
            root_depth,
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn format(&self) -> Format {
        self.archive.format()
    }

    pub fn archive(&self) -> &dyn Archive {
        self.archive.as_ref()
    }

    pub fn root_path(&self) -> SzsPath {
        SzsPath::root()
    }

    /// Joins names with `/`; a later name starting with `/` discards what came before.
    pub fn path(&self, first: &str, more: &[&str]) -> SzsPath {
        let mut joined = first.to_string();
        for sub in more {
            if sub.starts_with('/') {
                joined = sub.to_string();
            } else {
                joined.push('/');
                joined.push_str(sub);
            }
        }
        SzsPath::new(&joined)
    }

    /// Resolves `szs:file://<archive>!/<path>` against this filesystem. The
    /// archive must be the one this filesystem was opened from.
    pub fn path_from_uri(&self, uri: &str) -> Result<SzsPath> {
        let (archive, entry) = path::parse_uri(uri)?;
        let entry = entry.ok_or_else(|| SzsError::InvalidUri {
            uri: uri.to_string(),
            message: "does not contain path info, e.g. szs:file:///Common.szs!/course.kcl".to_string(),
        })?;
        let mounted = self.source.as_deref().map(std::path::absolute).transpose()?;
        if mounted.as_deref() != Some(archive.as_path()) {
            return Err(SzsError::InvalidUri {
                uri: uri.to_string(),
                message: format!("{} is not mounted here", archive.display()),
            });
        }
        Ok(entry)
    }

    /// URI of `path`, available when the filesystem was opened from disk.
    pub fn uri(&self, path: &SzsPath) -> Option<String> {
        let source = std::path::absolute(self.source.as_deref()?).ok()?;
        Some(path.to_uri(&source))
    }

    pub fn separator(&self) -> &'static str {
        "/"
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    pub fn is_open(&self) -> bool {
        self.archive.is_open()
    }

    pub fn close(&self) {
        self.archive.close();
    }

    fn root_node(&self) -> Node<'_> {
        self.archive
            .tree()
            .node(self.root)
            .unwrap_or_else(|| self.archive.root())
    }

    /// Resolves a path from the mounted root. `..` never climbs above it.
    pub fn node(&self, path: &SzsPath) -> Option<Node<'_>> {
        let mut current = self.root_node();
        for name in path.normalize().names() {
            if name == ".." {
                if current.index() != self.root {
                    current = current.parent();
                }
                continue;
            }
            if !current.is_dir() {
                return None;
            }
            current = current.child(name)?;
        }
        Some(current)
    }

    fn require(&self, path: &SzsPath) -> Result<Node<'_>> {
        self.node(path).ok_or_else(|| SzsError::not_found(path))
    }

    pub fn exists(&self, path: &SzsPath) -> bool {
        self.node(path).is_some()
    }

    pub fn metadata(&self, path: &SzsPath) -> Result<Metadata> {
        Ok(self.require(path)?.metadata())
    }

    /// Succeeds when `path` exists and every mode is [`AccessMode::Read`].
    pub fn check_access(&self, path: &SzsPath, modes: &[AccessMode]) -> Result<()> {
        if let Some(&mode) = modes.iter().find(|&&mode| mode != AccessMode::Read) {
            return Err(SzsError::AccessDenied {
                path: path.to_string(),
                mode,
            });
        }
        self.require(path).map(|_| ())
    }

    pub fn is_hidden(&self, _path: &SzsPath) -> bool {
        false
    }

    /// Equal paths, or paths that name the same entry once made absolute
    /// and normalized.
    pub fn is_same_file(&self, first: &SzsPath, second: &SzsPath) -> bool {
        first == second || first.to_absolute().normalize() == second.to_absolute().normalize()
    }

    pub fn read_dir(&self, path: &SzsPath) -> Result<Vec<SzsPath>> {
        let node = self.require(path)?;
        if !node.is_dir() {
            return Err(SzsError::NotADirectory {
                path: path.to_string(),
            });
        }
        Ok(node.children().map(|child| self.path_of(child)).collect())
    }

    pub fn open_file(&self, path: &SzsPath) -> Result<Box<dyn ReadSeek>> {
        let node = self.require(path)?;
        if node.is_dir() {
            return Err(SzsError::IsADirectory {
                path: path.to_string(),
            });
        }
        self.archive.open(node)
    }

    pub fn read(&self, path: &SzsPath) -> Result<Vec<u8>> {
        read_all(self.open_file(path)?)
    }

    /// Opens a node found by [`SzsFileSystem::walk_nodes`] or [`SzsFileSystem::node`]
    /// without resolving its path again, so entries named `.` or `..` stay reachable.
    pub fn open_node(&self, node: Node<'_>) -> Result<Box<dyn ReadSeek>> {
        if node.is_dir() {
            return Err(SzsError::IsADirectory {
                path: self.path_of(node).to_string(),
            });
        }
        self.archive.open(node)
    }

    pub fn read_node(&self, node: Node<'_>) -> Result<Vec<u8>> {
        read_all(self.open_node(node)?)
    }

    /// Absolute path of `node` relative to the mounted root.
    pub fn path_of(&self, node: Node<'_>) -> SzsPath {
        if node.index() == self.root {
            return SzsPath::root();
        }
        let ancestors = node.ancestors();
        let names = ancestors
            .iter()
            .skip(self.root_depth + 1)
            .map(|parent| parent.name())
            .chain(std::iter::once(node.name()));
        SzsPath::from_names(names, true)
    }

    /// Walks the tree below `start` reporting entries by path.
    pub fn walk<V: Visitor<SzsPath> + ?Sized>(&self, start: &SzsPath, visitor: &mut V) -> Result<VisitResult> {
        let node = self.require(start)?;
        let mut adapter = PathVisitor { fs: self, inner: visitor };
        node.walk(&mut adapter)
    }

    /// Walks the tree below `start` reporting the archive nodes themselves.
    pub fn walk_nodes<'s, V: Visitor<Node<'s>> + ?Sized>(
        &'s self,
        start: &SzsPath,
        visitor: &mut V,
    ) -> Result<VisitResult> {
        self.require(start)?.walk(visitor)
    }

    pub fn matcher(&self, syntax_and_pattern: &str) -> Result<PathMatcher> {
        PathMatcher::new(syntax_and_pattern)
    }

    /// The store of the entry at `path`.
    pub fn file_store(&self, path: &SzsPath) -> Result<FileStore> {
        Ok(self.store_of(self.require(path)?))
    }

    /// Every entry below the mounted root, breadth first.
    pub fn stores(&self) -> Vec<FileStore> {
        let mut result = Vec::new();
        let mut queue = VecDeque::from([self.root_node()]);
        while let Some(node) = queue.pop_front() {
            result.push(self.store_of(node));
            queue.extend(node.children());
        }
        result
    }

    fn store_of(&self, node: Node<'_>) -> FileStore {
        FileStore {
            name: self.path_of(node).to_string(),
            total_space: node.len(),
        }
    }
}

fn read_all(mut reader: Box<dyn ReadSeek>) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data).map_err(SzsError::from_io)?;
    Ok(data)
}

struct PathVisitor<'f, V: ?Sized> {
    fs: &'f SzsFileSystem,
    inner: &'f mut V,
}

impl<'a, V: Visitor<SzsPath> + ?Sized> Visitor<Node<'a>> for PathVisitor<'_, V> {
    fn pre_visit_directory(&mut self, dir: &Node<'a>, metadata: &Metadata) -> Result<VisitResult> {
        self.inner.pre_visit_directory(&self.fs.path_of(*dir), metadata)
    }

    fn visit_file(&mut self, file: &Node<'a>, metadata: &Metadata) -> Result<VisitResult> {
        self.inner.visit_file(&self.fs.path_of(*file), metadata)
    }

    fn post_visit_directory(&mut self, dir: &Node<'a>) -> Result<VisitResult> {
        self.inner.post_visit_directory(&self.fs.path_of(*dir))
    }
}
