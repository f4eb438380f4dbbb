use crate::core::detect::detect_stream;
use crate::core::filesystem::SzsFileSystem;
use crate::core::glob::PathMatcher;
use crate::core::path::SzsPath;
use crate::core::u8_writer::U8Builder;
use crate::core::yaz0;
use crate::domain::model::{ExtractSummary, Format, ListingEntry, Metadata, NodeKind, VisitResult};
use crate::domain::ports::{Storage, Visitor};
use crate::domain::tree::Node;
use crate::utils::error::{Result, SzsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::str::FromStr;
use zip::write::{FileOptions, ZipWriter};

/// Output formats for [`render_listing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingFormat {
    #[default]
    Text,
    Csv,
    Tsv,
    Json,
}

pub const LISTING_FORMATS: &[&str] = &["text", "csv", "tsv", "json"];

impl FromStr for ListingFormat {
    type Err = SzsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ListingFormat::Text),
            "csv" => Ok(ListingFormat::Csv),
            "tsv" => Ok(ListingFormat::Tsv),
            "json" => Ok(ListingFormat::Json),
            _ => Err(SzsError::InvalidConfigValueError {
                field: "format".to_string(),
                value: s.to_string(),
                reason: format!("expected one of {}", LISTING_FORMATS.join(", ")),
            }),
        }
    }
}

impl fmt::Display for ListingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListingFormat::Text => "text",
            ListingFormat::Csv => "csv",
            ListingFormat::Tsv => "tsv",
            ListingFormat::Json => "json",
        })
    }
}

/// An entry found by [`collect`]. The node is kept so file data is read
/// without resolving the path again.
struct Collected<'f> {
    path: SzsPath,
    metadata: Metadata,
    node: Node<'f>,
}

/// Collects every entry below the root in walk order.
struct EntryCollector<'f, 'm> {
    fs: &'f SzsFileSystem,
    matcher: Option<&'m PathMatcher>,
    entries: Vec<Collected<'f>>,
}

impl<'f> EntryCollector<'f, '_> {
    fn record(&mut self, node: Node<'f>, metadata: &Metadata) {
        let path = self.fs.path_of(node);
        if path.is_root() {
            return;
        }
        if self.matcher.is_none_or(|m| m.matches(&path)) {
            self.entries.push(Collected {
                path,
                metadata: *metadata,
                node,
            });
        }
    }
}

impl<'f> Visitor<Node<'f>> for EntryCollector<'f, '_> {
    fn pre_visit_directory(&mut self, dir: &Node<'f>, metadata: &Metadata) -> Result<VisitResult> {
        self.record(*dir, metadata);
        Ok(VisitResult::Continue)
    }

    fn visit_file(&mut self, file: &Node<'f>, metadata: &Metadata) -> Result<VisitResult> {
        self.record(*file, metadata);
        Ok(VisitResult::Continue)
    }
}

fn collect<'f>(fs: &'f SzsFileSystem, matcher: Option<&PathMatcher>) -> Result<Vec<Collected<'f>>> {
    let mut collector = EntryCollector {
        fs,
        matcher,
        entries: Vec::new(),
    };
    fs.walk_nodes(&fs.root_path(), &mut collector)?;
    Ok(collector.entries)
}

pub fn list(fs: &SzsFileSystem, matcher: Option<&PathMatcher>) -> Result<Vec<ListingEntry>> {
    let entries = collect(fs, matcher)?
        .into_iter()
        .map(|entry| ListingEntry {
            path: entry.path.to_string(),
            kind: entry.metadata.kind(),
            size: entry.metadata.len(),
        })
        .collect::<Vec<_>>();
    tracing::debug!("Listed {} entries", entries.len());
    Ok(entries)
}

fn render_delimited(entries: &[ListingEntry], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for entry in entries {
        writer.serialize(entry)?;
    }
    if entries.is_empty() {
        writer.write_record(["path", "kind", "size"])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| SzsError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| SzsError::IoError(std::io::Error::other(e)))
}

pub fn render_listing(entries: &[ListingEntry], format: ListingFormat) -> Result<String> {
    match format {
        ListingFormat::Text => Ok(entries
            .iter()
            .map(|entry| format!("{:<9} {:>10}  {}\n", entry.kind.to_string(), entry.size, entry.path))
            .collect()),
        ListingFormat::Csv => render_delimited(entries, b','),
        ListingFormat::Tsv => render_delimited(entries, b'\t'),
        ListingFormat::Json => Ok(serde_json::to_string_pretty(entries)? + "\n"),
    }
}

/// Writes matching files (and, without a pattern, every directory) to `storage`.
pub fn extract<S: Storage + ?Sized>(
    fs: &SzsFileSystem,
    storage: &S,
    matcher: Option<&PathMatcher>,
) -> Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();
    for entry in collect(fs, matcher)? {
        let target = entry.path.names().join("/");
        match entry.metadata.kind() {
            NodeKind::Directory => {
                storage.create_dir(&target)?;
                summary.directories += 1;
            }
            NodeKind::File => {
                let data = fs.read_node(entry.node)?;
                tracing::debug!("Extracting {} ({} bytes)", entry.path, data.len());
                storage.write_file(&target, &data)?;
                summary.files += 1;
                summary.bytes += data.len() as u64;
            }
        }
    }
    tracing::info!(
        "✅ Extracted {} files and {} directories ({} bytes)",
        summary.files,
        summary.directories,
        summary.bytes
    );
    Ok(summary)
}

/// Copies every entry into a ZIP written to `writer`.
pub fn export_zip<W: Write + Seek>(fs: &SzsFileSystem, writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let mut count = 0usize;
    for entry in collect(fs, None)? {
        let name = entry.path.names().join("/");
        if entry.metadata.is_dir() {
            zip.add_directory::<_, ()>(format!("{}/", name), FileOptions::default())?;
        } else {
            zip.start_file::<_, ()>(name, FileOptions::default())?;
            zip.write_all(&fs.read_node(entry.node)?)?;
        }
        count += 1;
    }
    tracing::debug!("Wrote {} ZIP entries", count);
    Ok(zip.finish()?)
}

/// Removes one Yaz0 layer from `reader`. Input without one is returned as is.
pub fn unwrap_yaz0<R: Read>(reader: R) -> Result<Vec<u8>> {
    let (format, mut stream) = detect_stream(reader)?;
    if format == Some(Format::Yaz0) {
        return yaz0::decompress_reader(stream);
    }
    tracing::info!("Input is not Yaz0-compressed, copying it unchanged");
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    Ok(data)
}

fn add_tree(builder: &mut U8Builder, dir: &Path, prefix: &str) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_str().ok_or_else(|| SzsError::UnsafePath {
            path: entry.path().display().to_string(),
        })?;
        let archive_path = format!("{}/{}", prefix, name);
        if entry.file_type()?.is_dir() {
            builder.add_directory(&archive_path);
            add_tree(builder, &entry.path(), &archive_path)?;
        } else {
            builder.add_file(&archive_path, std::fs::read(entry.path())?);
        }
    }
    Ok(())
}

/// Packs a host directory into a U8 archive rooted at `.`, Yaz0-compressed
/// with the given window when one is set.
pub fn pack_dir<P: AsRef<Path>>(dir: P, window: Option<usize>) -> Result<Vec<u8>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(SzsError::NotADirectory {
            path: dir.display().to_string(),
        });
    }
    let mut builder = U8Builder::new();
    builder.add_directory(".");
    add_tree(&mut builder, dir, ".")?;
    let archive = builder.build()?;
    match window {
        Some(window) => yaz0::compress_with(&archive, window),
        None => Ok(archive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
        dirs: Mutex<Vec<String>>,
    }

    impl Storage for MockStorage {
        fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().unwrap().insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn create_dir(&self, path: &str) -> Result<()> {
            self.dirs.lock().unwrap().push(path.to_string());
            Ok(())
        }
    }

    fn sample_fs() -> SzsFileSystem {
        let mut builder = U8Builder::new();
        builder
            .add_file("./lightset/default.blight", b"light".to_vec())
            .add_file("./course.kcl", b"collision".to_vec());
        SzsFileSystem::from_bytes(builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_list_in_walk_order() {
        let entries = list(&sample_fs(), None).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/lightset", "/lightset/default.blight", "/course.kcl"]);
        assert_eq!(entries[0].kind, NodeKind::Directory);
        assert_eq!(entries[2].size, 9);
    }

    #[test]
    fn test_list_with_pattern() {
        let matcher = PathMatcher::glob("/**.blight").unwrap();
        let entries = list(&sample_fs(), Some(&matcher)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/lightset/default.blight");
    }

    #[test]
    fn test_render_formats() {
        let entries = list(&sample_fs(), None).unwrap();

        let csv = render_listing(&entries, ListingFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "path,kind,size");
        assert_eq!(lines[1], "/lightset,directory,0");
        assert_eq!(lines[3], "/course.kcl,file,9");

        let tsv = render_listing(&entries, ListingFormat::Tsv).unwrap();
        assert_eq!(tsv.lines().next(), Some("path\tkind\tsize"));

        let json = render_listing(&entries, ListingFormat::Json).unwrap();
        let parsed: Vec<ListingEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entries);

        let text = render_listing(&entries, ListingFormat::Text).unwrap();
        assert!(text.contains("/lightset/default.blight"));
    }

    #[test]
    fn test_render_empty_csv_keeps_header() {
        let csv = render_listing(&[], ListingFormat::Csv).unwrap();
        assert_eq!(csv.trim_end(), "path,kind,size");
    }

    #[test]
    fn test_listing_format_parse() {
        assert_eq!("JSON".parse::<ListingFormat>().unwrap(), ListingFormat::Json);
        assert!("xml".parse::<ListingFormat>().is_err());
    }

    #[test]
    fn test_extract_to_storage() {
        let storage = MockStorage::default();
        let summary = extract(&sample_fs(), &storage, None).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.bytes, 14);
        assert_eq!(storage.files.lock().unwrap()["lightset/default.blight"], b"light");
        assert_eq!(*storage.dirs.lock().unwrap(), vec!["lightset"]);
    }

    #[test]
    fn test_export_zip() {
        let cursor = export_zip(&sample_fs(), Cursor::new(Vec::new())).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.len(), 3);

        let mut content = String::new();
        archive
            .by_name("lightset/default.blight")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "light");
        assert!(archive.by_name("lightset/").unwrap().is_dir());
    }

    fn dotted_u8_fs() -> SzsFileSystem {
        let mut builder = U8Builder::new();
        builder
            .add_file("./a/./b.txt", b"bee".to_vec())
            .add_file("./c/../d.txt", b"dee".to_vec());
        SzsFileSystem::from_bytes(builder.build().unwrap()).unwrap()
    }

    fn dotted_sarc_fs() -> SzsFileSystem {
        let bytes = crate::core::sarc::tests::build_sarc(
            &[("a/./b.txt", b"bee"), ("c/../d.txt", b"dee")],
            false,
            0x65,
        );
        SzsFileSystem::from_bytes(bytes).unwrap()
    }

    #[test]
    fn test_extract_entries_with_dot_names() {
        for fs in [dotted_u8_fs(), dotted_sarc_fs()] {
            let entries = list(&fs, None).unwrap();
            let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
            assert_eq!(
                paths,
                vec!["/a", "/a/.", "/a/./b.txt", "/c", "/c/..", "/c/../d.txt"]
            );

            let storage = MockStorage::default();
            let summary = extract(&fs, &storage, None).unwrap();
            assert_eq!(summary.files, 2);
            assert_eq!(summary.bytes, 6);
            let files = storage.files.lock().unwrap();
            assert_eq!(files["a/./b.txt"], b"bee");
            assert_eq!(files["c/../d.txt"], b"dee");
        }
    }

    #[test]
    fn test_export_entries_with_dot_names() {
        for fs in [dotted_u8_fs(), dotted_sarc_fs()] {
            let cursor = export_zip(&fs, Cursor::new(Vec::new())).unwrap();
            let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
            assert_eq!(archive.len(), 6);

            let mut content = String::new();
            archive
                .by_name("c/../d.txt")
                .unwrap()
                .read_to_string(&mut content)
                .unwrap();
            assert_eq!(content, "dee");
        }
    }

    #[test]
    fn test_pack_dir_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"bee").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"ay").unwrap();

        let packed = pack_dir(dir.path(), Some(yaz0::MAX_DISTANCE)).unwrap();
        assert_eq!(&packed[..4], b"Yaz0");

        let fs = SzsFileSystem::from_bytes(packed).unwrap();
        let entries = list(&fs, None).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/a.txt", "/sub", "/sub/b.txt"]);
        assert_eq!(fs.read(&SzsPath::new("/sub/b.txt")).unwrap(), b"bee");
    }

    #[test]
    fn test_unwrap_yaz0() {
        let data = b"course data course data course data".to_vec();
        let packed = yaz0::compress(&data).unwrap();
        assert_eq!(unwrap_yaz0(Cursor::new(packed)).unwrap(), data);
        assert_eq!(unwrap_yaz0(Cursor::new(data.clone())).unwrap(), data);
        assert!(unwrap_yaz0(Cursor::new(b"Ya".to_vec())).is_err());
    }

    #[test]
    fn test_pack_dir_requires_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            pack_dir(file.path(), None),
            Err(SzsError::NotADirectory { .. })
        ));
    }
}
