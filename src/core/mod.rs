pub mod detect;
pub mod filesystem;
pub mod glob;
pub mod ops;
pub mod path;
pub mod sarc;
pub mod u8_archive;
pub mod u8_writer;
pub mod yaz0;

pub use crate::domain::model::{Format, ListingEntry, Metadata, NodeKind, VisitResult};
pub use crate::domain::ports::{Archive, ReadSeek, Storage, Visitor};
pub use crate::utils::error::Result;
pub use filesystem::{FileStore, SzsFileSystem};
pub use glob::PathMatcher;
pub use path::SzsPath;
