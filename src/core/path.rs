use crate::utils::error::{Result, SzsError};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use url::Url;

pub const SEPARATOR: char = '/';
pub const URI_SCHEME: &str = "szs";

/// A path inside a mounted archive.
///
/// Repeated separators collapse and a trailing separator is ignored. `"/"` is
/// the root (absolute, no names) and `""` the empty relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SzsPath {
    names: Vec<String>,
    absolute: bool,
}

impl SzsPath {
    pub fn new(path: &str) -> Self {
        Self {
            names: path
                .split(SEPARATOR)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
            absolute: path.starts_with(SEPARATOR),
        }
    }

    pub fn root() -> Self {
        Self {
            names: Vec::new(),
            absolute: true,
        }
    }

    pub fn from_names<I, S>(names: I, absolute: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            absolute,
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_root(&self) -> bool {
        self.absolute && self.names.is_empty()
    }

    /// True for the empty relative path `""`.
    pub fn is_empty(&self) -> bool {
        !self.absolute && self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn file_name(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<SzsPath> {
        match self.names.len() {
            0 => None,
            1 if !self.absolute => None,
            len => Some(Self {
                names: self.names[..len - 1].to_vec(),
                absolute: self.absolute,
            }),
        }
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Relative path made of the names in `range`.
    pub fn subpath(&self, range: Range<usize>) -> Option<SzsPath> {
        if range.start >= self.names.len() || range.end > self.names.len() || range.start > range.end {
            return None;
        }
        Some(Self {
            names: self.names[range].to_vec(),
            absolute: false,
        })
    }

    pub fn starts_with(&self, other: &SzsPath) -> bool {
        other.absolute == self.absolute
            && other.names.len() <= self.names.len()
            && self.names.iter().zip(&other.names).all(|(a, b)| a == b)
    }

    pub fn ends_with(&self, other: &SzsPath) -> bool {
        if other.absolute && (!self.absolute || other.names.len() != self.names.len()) {
            return false;
        }
        other.names.len() <= self.names.len()
            && self
                .names
                .iter()
                .rev()
                .zip(other.names.iter().rev())
                .all(|(a, b)| a == b)
    }

    /// Removes `.` names and folds `..` into the preceding name. Leading `..`
    /// survive on relative paths and are dropped on absolute ones.
    pub fn normalize(&self) -> SzsPath {
        if !self.names.iter().any(|n| n == "." || n == "..") {
            return self.clone();
        }
        let mut result: Vec<String> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            match name.as_str() {
                "." => {}
                ".." => match result.last() {
                    Some(last) if last != ".." => {
                        result.pop();
                    }
                    _ if !self.absolute => result.push(name.clone()),
                    _ => {}
                },
                _ => result.push(name.clone()),
            }
        }
        Self {
            names: result,
            absolute: self.absolute,
        }
    }

    /// Resolves `other` against this path.
    pub fn join(&self, other: &SzsPath) -> SzsPath {
        if self.is_empty() || other.absolute {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        Self {
            names,
            absolute: self.absolute,
        }
    }

    /// Relative path that leads from this path to `other`.
    pub fn relativize(&self, other: &SzsPath) -> SzsPath {
        let common = self
            .names
            .iter()
            .zip(&other.names)
            .take_while(|(a, b)| a == b)
            .count();
        let mut names: Vec<String> = vec!["..".to_string(); self.names.len() - common];
        names.extend(other.names[common..].iter().cloned());
        Self {
            names,
            absolute: false,
        }
    }

    pub fn to_absolute(&self) -> SzsPath {
        Self {
            names: self.names.clone(),
            absolute: true,
        }
    }

    /// `szs:file://<archive>!<absolute path>`
    pub fn to_uri(&self, archive: &Path) -> String {
        format!(
            "{}:file://{}!{}",
            URI_SCHEME,
            archive.display(),
            self.to_absolute()
        )
    }
}

/// Splits `szs:file://<archive>!/<path>` into the archive location and, when
/// the URI has one, the path inside it. The scheme is matched case-insensitively.
pub fn parse_uri(uri: &str) -> Result<(PathBuf, Option<SzsPath>)> {
    let invalid = |message: String| SzsError::InvalidUri {
        uri: uri.to_string(),
        message,
    };
    let (scheme, rest) = uri
        .split_once(':')
        .ok_or_else(|| invalid("missing URI scheme".to_string()))?;
    if !scheme.eq_ignore_ascii_case(URI_SCHEME) {
        return Err(invalid(format!("URI scheme is not '{}'", URI_SCHEME)));
    }
    let (archive, entry) = match rest.find("!/") {
        Some(sep) => (&rest[..sep], Some(SzsPath::new(&rest[sep + 1..]))),
        None => (rest, None),
    };
    let archive = Url::parse(archive).map_err(|e| invalid(e.to_string()))?;
    let archive = archive
        .to_file_path()
        .map_err(|_| invalid(format!("{} is not a file URI", archive)))?;
    Ok((archive, entry))
}

impl FromStr for SzsPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for SzsPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl fmt::Display for SzsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        f.write_str(&self.names.join("/"))
    }
}

impl Ord for SzsPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.names
            .cmp(&other.names)
            .then(self.absolute.cmp(&other.absolute))
    }
}

impl PartialOrd for SzsPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert!(SzsPath::new("/").is_root());
        assert!(SzsPath::new("").is_empty());
        let path = SzsPath::new("/a//b/");
        assert!(path.is_absolute());
        assert_eq!(path.names(), &["a", "b"]);
        assert_eq!(path.to_string(), "/a/b");
        assert_eq!(SzsPath::new("a/b").to_string(), "a/b");
    }

    #[test]
    fn test_parent_and_file_name() {
        let path = SzsPath::new("/a/b");
        assert_eq!(path.file_name(), Some("b"));
        assert_eq!(path.parent().unwrap().to_string(), "/a");
        assert_eq!(SzsPath::new("/a").parent().unwrap(), SzsPath::root());
        assert_eq!(SzsPath::new("a").parent(), None);
        assert_eq!(SzsPath::root().parent(), None);
        assert_eq!(SzsPath::root().file_name(), None);
    }

    #[test]
    fn test_normalize() {
        let path = SzsPath::new("./lightset/.//../lightset//default.blight/");
        assert_eq!(path.normalize().to_string(), "lightset/default.blight");
        assert_eq!(SzsPath::new("../../a").normalize().to_string(), "../../a");
        assert_eq!(SzsPath::new("a/../../b").normalize().to_string(), "../b");
        assert_eq!(SzsPath::new("/../a").normalize().to_string(), "/a");
        assert_eq!(SzsPath::new("./..").normalize().to_string(), "..");
    }

    #[test]
    fn test_join() {
        let base = SzsPath::new("/a");
        assert_eq!(base.join(&SzsPath::new("b/c")).to_string(), "/a/b/c");
        assert_eq!(base.join(&SzsPath::new("/x")).to_string(), "/x");
        assert_eq!(base.join(&SzsPath::new("")), base);
        assert_eq!(SzsPath::new("").join(&SzsPath::new("b")).to_string(), "b");
    }

    #[test]
    fn test_relativize() {
        let from = SzsPath::new("/a/b/c");
        let to = SzsPath::new("/a/d");
        assert_eq!(from.relativize(&to).to_string(), "../../d");
        assert_eq!(from.relativize(&from).to_string(), "");
    }

    #[test]
    fn test_starts_and_ends_with() {
        let path = SzsPath::new("/a/b/c");
        assert!(path.starts_with(&SzsPath::new("/a/b")));
        assert!(!path.starts_with(&SzsPath::new("a/b")));
        assert!(path.ends_with(&SzsPath::new("b/c")));
        assert!(path.ends_with(&SzsPath::new("/a/b/c")));
        assert!(!path.ends_with(&SzsPath::new("/b/c")));
    }

    #[test]
    fn test_subpath_and_names() {
        let path = SzsPath::new("/a/b/c");
        assert_eq!(path.name_count(), 3);
        assert_eq!(path.name(1), Some("b"));
        assert_eq!(path.subpath(1..3).unwrap().to_string(), "b/c");
        assert!(path.subpath(3..3).is_none());
        assert!(path.subpath(0..4).is_none());
    }

    #[test]
    fn test_uri_and_ordering() {
        let path = SzsPath::new("a/b");
        assert_eq!(
            path.to_uri(Path::new("/games/Common.szs")),
            "szs:file:///games/Common.szs!/a/b"
        );
        let mut paths = vec![SzsPath::new("/b"), SzsPath::new("/a/z"), SzsPath::new("/a")];
        paths.sort();
        let sorted: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(sorted, vec!["/a", "/a/z", "/b"]);
    }

    #[test]
    fn test_parse_uri() {
        let (archive, entry) = parse_uri("szs:file:///games/Common.szs!/lightset/default.blight").unwrap();
        assert_eq!(archive, PathBuf::from("/games/Common.szs"));
        assert_eq!(entry.unwrap().to_string(), "/lightset/default.blight");

        let (archive, entry) = parse_uri("SZS:file:///games/my%20course.szs").unwrap();
        assert_eq!(archive, PathBuf::from("/games/my course.szs"));
        assert!(entry.is_none());

        let path = SzsPath::new("/a/b");
        let (archive, entry) = parse_uri(&path.to_uri(Path::new("/games/Common.szs"))).unwrap();
        assert_eq!(archive, PathBuf::from("/games/Common.szs"));
        assert_eq!(entry, Some(path));
    }

    #[test]
    fn test_parse_uri_rejects_other_schemes() {
        assert!(matches!(
            parse_uri("jar:file:///games/a.zip!/x"),
            Err(SzsError::InvalidUri { .. })
        ));
        assert!(matches!(parse_uri("no-scheme"), Err(SzsError::InvalidUri { .. })));
        assert!(matches!(
            parse_uri("szs:http://example.com/a.szs!/x"),
            Err(SzsError::InvalidUri { .. })
        ));
    }
}
