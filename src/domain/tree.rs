//! In-memory directory tree shared by every archive format.
//!
//! Entries live in an arena indexed by position; index 0 is always the root
//! directory, which is its own parent.

use crate::domain::model::{Metadata, NodeKind, VisitResult};
use crate::domain::ports::Visitor;
use crate::utils::error::{Result, SzsError};
use std::fmt;

#[derive(Debug, Clone)]
enum EntryKind {
    Directory { children: Vec<usize> },
    File { offset: u64, size: u64 },
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    parent: usize,
    kind: EntryKind,
}

#[derive(Debug, Clone)]
pub struct Tree {
    entries: Vec<Entry>,
}

impl Tree {
    pub const ROOT: usize = 0;

    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            entries: vec![Entry {
                name: root_name.into(),
                parent: Self::ROOT,
                kind: EntryKind::Directory {
                    children: Vec::new(),
                },
            }],
        }
    }

    /// Adds a directory below `parent`, which must itself be a directory.
    pub fn add_directory(&mut self, parent: usize, name: impl Into<String>) -> usize {
        self.push(
            parent,
            name.into(),
            EntryKind::Directory {
                children: Vec::new(),
            },
        )
    }

    /// Adds a file below `parent`; `offset` is format specific.
    pub fn add_file(&mut self, parent: usize, name: impl Into<String>, offset: u64, size: u64) -> usize {
        self.push(parent, name.into(), EntryKind::File { offset, size })
    }

    /// Returns the directory at `components` below `parent`, creating any
    /// missing ones. A file in the way is replaced by a directory of the same name.
    pub fn ensure_directory<'s>(
        &mut self,
        parent: usize,
        components: impl IntoIterator<Item = &'s str>,
    ) -> usize {
        let mut current = parent;
        for component in components {
            let existing = self
                .node(current)
                .and_then(|n| n.child(component))
                .filter(|child| child.is_dir())
                .map(|child| child.index());
            current = match existing {
                Some(index) => index,
                None => self.add_directory(current, component),
            };
        }
        current
    }

    fn push(&mut self, parent: usize, name: String, kind: EntryKind) -> usize {
        let index = self.entries.len();
        let parent = if parent < index { parent } else { Self::ROOT };
        let previous = self.child_index(parent, &name);
        self.entries.push(Entry { name, parent, kind });
        if let EntryKind::Directory { children } = &mut self.entries[parent].kind {
            // A later entry with the same name takes the earlier one's slot
            match previous {
                Some(slot) => children[slot] = index,
                None => children.push(index),
            }
        }
        index
    }

    fn child_index(&self, parent: usize, name: &str) -> Option<usize> {
        match &self.entries.get(parent)?.kind {
            EntryKind::Directory { children } => children
                .iter()
                .position(|&child| self.entries[child].name == name),
            EntryKind::File { .. } => None,
        }
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            tree: self,
            index: Self::ROOT,
        }
    }

    pub fn node(&self, index: usize) -> Option<Node<'_>> {
        (index < self.entries.len()).then_some(Node { tree: self, index })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }
}

/// A borrowed handle to one entry of a [`Tree`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    tree: &'a Tree,
    index: usize,
}

impl<'a> Node<'a> {
    fn entry(&self) -> &'a Entry {
        &self.tree.entries[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn belongs_to(&self, tree: &Tree) -> bool {
        std::ptr::eq(self.tree, tree)
    }

    pub fn name(&self) -> &'a str {
        &self.entry().name
    }

    /// The containing directory; the root returns itself.
    pub fn parent(&self) -> Node<'a> {
        Node {
            tree: self.tree,
            index: self.entry().parent,
        }
    }

    pub fn is_root(&self) -> bool {
        self.entry().parent == self.index
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.entry().kind, EntryKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.entry().kind, EntryKind::File { .. })
    }

    pub fn kind(&self) -> NodeKind {
        match self.entry().kind {
            EntryKind::Directory { .. } => NodeKind::Directory,
            EntryKind::File { .. } => NodeKind::File,
        }
    }

    pub fn len(&self) -> u64 {
        match self.entry().kind {
            EntryKind::File { size, .. } => size,
            EntryKind::Directory { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(offset, size)` of a file's data, `None` for directories.
    pub fn data_location(&self) -> Option<(u64, u64)> {
        match self.entry().kind {
            EntryKind::File { offset, size } => Some((offset, size)),
            EntryKind::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let tree = self.tree;
        let children: &'a [usize] = match &self.entry().kind {
            EntryKind::Directory { children } => children,
            EntryKind::File { .. } => &[],
        };
        children.iter().map(move |&index| Node { tree, index })
    }

    pub fn child(&self, name: &str) -> Option<Node<'a>> {
        self.tree
            .child_index(self.index, name)
            .and_then(|slot| self.children().nth(slot))
    }

    /// Resolves a `/`-separated path literally, component by component.
    ///
    /// Returns `Ok(None)` when a component is missing and an error when a
    /// file is used as a directory.
    pub fn resolve(&self, path: &str) -> Result<Option<Node<'a>>> {
        let mut parts: Vec<&str> = path.split('/').collect();
        while parts.len() > 1 && parts.last() == Some(&"") {
            parts.pop();
        }

        let mut current = *self;
        for part in parts {
            if !current.is_dir() {
                return Err(SzsError::NotADirectory {
                    path: current.full_path(),
                });
            }
            match current.child(part) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Every enclosing directory, root first. Empty for the root itself.
    pub fn ancestors(&self) -> Vec<Node<'a>> {
        if self.is_root() {
            return Vec::new();
        }
        let mut result = Vec::new();
        let mut last = self.parent();
        while !last.is_root() {
            result.push(last);
            last = last.parent();
        }
        result.push(last);
        result.reverse();
        result
    }

    pub fn full_path(&self) -> String {
        if self.is_root() {
            return self.name().to_string();
        }
        let mut result = String::new();
        for parent in self.ancestors() {
            result.push_str(parent.name());
            result.push('/');
        }
        result.push_str(self.name());
        result
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::new(self.kind(), self.len())
    }

    /// Depth-first walk rooted at this node.
    pub fn walk<V: Visitor<Node<'a>> + ?Sized>(&self, visitor: &mut V) -> Result<VisitResult> {
        if self.is_file() {
            let result = visitor.visit_file(self, &self.metadata())?;
            return Ok(match result {
                VisitResult::SkipSubtree => VisitResult::Continue,
                other => other,
            });
        }

        match visitor.pre_visit_directory(self, &self.metadata())? {
            VisitResult::Continue => {}
            VisitResult::SkipSubtree => return Ok(VisitResult::Continue),
            stop => return Ok(stop),
        }

        for child in self.children() {
            match child.walk(visitor)? {
                VisitResult::Terminate => return Ok(VisitResult::Terminate),
                VisitResult::SkipSiblings => break,
                _ => {}
            }
        }

        Ok(match visitor.post_visit_directory(self)? {
            VisitResult::SkipSiblings => VisitResult::Continue,
            other => other,
        })
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.index == other.index
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir() { "Directory" } else { "File" };
        write!(f, "{}[{}]", kind, self.full_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree {
        let mut tree = Tree::new("");
        let dot = tree.add_directory(Tree::ROOT, ".");
        let lightset = tree.add_directory(dot, "lightset");
        tree.add_file(lightset, "default.blight", 0x40, 12);
        tree.add_file(dot, "readme.txt", 0x60, 5);
        tree.add_file(dot, "course.kcl", 0x80, 9);
        tree
    }

    /// Records walk events and answers with a scripted result for
    /// matching events, `Continue` otherwise.
    struct Recorder {
        events: Vec<String>,
        responses: Vec<(&'static str, VisitResult)>,
    }

    impl Recorder {
        fn new(responses: &[(&'static str, VisitResult)]) -> Self {
            Self {
                events: Vec::new(),
                responses: responses.to_vec(),
            }
        }

        fn respond(&mut self, event: String) -> Result<VisitResult> {
            let result = self
                .responses
                .iter()
                .find(|(expected, _)| *expected == event)
                .map_or(VisitResult::Continue, |(_, result)| *result);
            self.events.push(event);
            Ok(result)
        }
    }

    impl<'a> Visitor<Node<'a>> for Recorder {
        fn pre_visit_directory(&mut self, dir: &Node<'a>, _: &Metadata) -> Result<VisitResult> {
            self.respond(format!("PRE: {}", dir))
        }

        fn visit_file(&mut self, file: &Node<'a>, _: &Metadata) -> Result<VisitResult> {
            self.respond(file.to_string())
        }

        fn post_visit_directory(&mut self, dir: &Node<'a>) -> Result<VisitResult> {
            self.respond(format!("POST: {}", dir))
        }
    }

    #[test]
    fn test_root_is_its_own_parent() {
        let tree = sample_tree();
        let root = tree.root();
        assert!(root.is_root());
        assert_eq!(root.parent(), root);
        assert!(root.ancestors().is_empty());
    }

    #[test]
    fn test_resolve_and_full_path() {
        let tree = sample_tree();
        let node = tree.root().resolve("./lightset/default.blight").unwrap().unwrap();
        assert!(node.is_file());
        assert_eq!(node.len(), 12);
        assert_eq!(node.full_path(), "/./lightset/default.blight");
        assert_eq!(node.to_string(), "File[/./lightset/default.blight]");
        assert_eq!(node.ancestors().len(), 3);
    }

    #[test]
    fn test_resolve_missing_and_through_file() {
        let tree = sample_tree();
        let root = tree.root();
        assert!(root.resolve("./nothing/here").unwrap().is_none());
        let err = root.resolve("./readme.txt/inner").unwrap_err();
        assert!(matches!(err, SzsError::NotADirectory { .. }));
    }

    #[test]
    fn test_duplicate_names_replace_in_place() {
        let mut tree = Tree::new("");
        tree.add_file(Tree::ROOT, "a", 0, 1);
        tree.add_file(Tree::ROOT, "b", 0, 2);
        tree.add_file(Tree::ROOT, "a", 0, 3);
        let names: Vec<_> = tree.root().children().map(|c| (c.name(), c.len())).collect();
        assert_eq!(names, vec![("a", 3), ("b", 2)]);
    }

    #[test]
    fn test_ensure_directory_reuses_existing() {
        let mut tree = Tree::new("");
        let first = tree.ensure_directory(Tree::ROOT, ["a", "b"]);
        let second = tree.ensure_directory(Tree::ROOT, ["a", "b"]);
        assert_eq!(first, second);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_walk_order() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Continue);
        assert_eq!(
            recorder.events,
            vec![
                "PRE: Directory[]",
                "PRE: Directory[/.]",
                "PRE: Directory[/./lightset]",
                "File[/./lightset/default.blight]",
                "POST: Directory[/./lightset]",
                "File[/./readme.txt]",
                "File[/./course.kcl]",
                "POST: Directory[/.]",
                "POST: Directory[]",
            ]
        );
    }

    #[test]
    fn test_walk_skip_subtree() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("PRE: Directory[/./lightset]", VisitResult::SkipSubtree)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Continue);
        assert!(!recorder
            .events
            .iter()
            .any(|e| e.contains("default.blight") || e == "POST: Directory[/./lightset]"));
        assert!(recorder.events.contains(&"File[/./readme.txt]".to_string()));
    }

    #[test]
    fn test_walk_terminate_in_pre_visit() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("PRE: Directory[/./lightset]", VisitResult::Terminate)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Terminate);
        assert_eq!(
            recorder.events,
            vec!["PRE: Directory[]", "PRE: Directory[/.]", "PRE: Directory[/./lightset]"]
        );
    }

    #[test]
    fn test_walk_terminate_in_child() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("File[/./lightset/default.blight]", VisitResult::Terminate)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Terminate);
        assert_eq!(
            recorder.events.last().map(String::as_str),
            Some("File[/./lightset/default.blight]")
        );
        assert!(!recorder.events.iter().any(|e| e.starts_with("POST")));
    }

    #[test]
    fn test_walk_skip_siblings_from_file_still_post_visits() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("File[/./readme.txt]", VisitResult::SkipSiblings)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Continue);
        assert_eq!(
            recorder.events[5..],
            ["File[/./readme.txt]", "POST: Directory[/.]", "POST: Directory[]"]
        );
    }

    #[test]
    fn test_walk_skip_siblings_from_pre_visit() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("PRE: Directory[/./lightset]", VisitResult::SkipSiblings)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Continue);
        assert_eq!(
            recorder.events,
            vec![
                "PRE: Directory[]",
                "PRE: Directory[/.]",
                "PRE: Directory[/./lightset]",
                "POST: Directory[/.]",
                "POST: Directory[]",
            ]
        );
    }

    #[test]
    fn test_walk_skip_siblings_from_post_visit_continues() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("POST: Directory[/./lightset]", VisitResult::SkipSiblings)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Continue);
        assert!(recorder.events.contains(&"File[/./readme.txt]".to_string()));
        assert!(recorder.events.contains(&"File[/./course.kcl]".to_string()));
    }

    #[test]
    fn test_walk_skip_subtree_from_file_continues() {
        let tree = sample_tree();
        let mut recorder = Recorder::new(&[("File[/./readme.txt]", VisitResult::SkipSubtree)]);
        let result = tree.root().walk(&mut recorder).unwrap();
        assert_eq!(result, VisitResult::Continue);
        assert_eq!(recorder.events.len(), 9);
        assert!(recorder.events.contains(&"File[/./course.kcl]".to_string()));
    }
}
