use crate::domain::model::{Format, Metadata, VisitResult};
use crate::domain::tree::{Node, Tree};
use crate::utils::error::Result;
use std::io::{Read, Seek};

/// A readable, seekable stream over one archived file.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A decoded archive whose directory tree is held in memory.
pub trait Archive: Send + Sync {
    fn format(&self) -> Format;

    fn tree(&self) -> &Tree;

    fn root(&self) -> Node<'_> {
        self.tree().root()
    }

    /// Looks up `path` from the archive root; a leading `/` is ignored.
    fn node(&self, path: &str) -> Result<Option<Node<'_>>> {
        let path = path.strip_prefix('/').unwrap_or(path);
        self.root().resolve(path)
    }

    fn open(&self, node: Node<'_>) -> Result<Box<dyn ReadSeek>>;

    fn is_open(&self) -> bool;

    fn close(&self);
}

/// Callbacks for a depth-first walk over archive entries.
pub trait Visitor<T: ?Sized> {
    fn pre_visit_directory(&mut self, _dir: &T, _metadata: &Metadata) -> Result<VisitResult> {
        Ok(VisitResult::Continue)
    }

    fn visit_file(&mut self, _file: &T, _metadata: &Metadata) -> Result<VisitResult> {
        Ok(VisitResult::Continue)
    }

    fn post_visit_directory(&mut self, _dir: &T) -> Result<VisitResult> {
        Ok(VisitResult::Continue)
    }
}

/// Destination for extracted files.
pub trait Storage: Send + Sync {
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
    fn create_dir(&self, path: &str) -> Result<()>;
}
