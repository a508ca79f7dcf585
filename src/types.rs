/*!
 * Core types and data structures for dirdoc
 *
 * Everything in here is produced once by the walker and handed to the
 * formatter as a single immutable [`WalkResult`].
 */

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use strum::{AsRefStr, Display, EnumIter};

use crate::stats::Statistics;

/// Serialize a path as a string, replacing invalid UTF-8 sequences
pub(crate) fn serialize_path_lossy<S: Serializer>(
    path: &Path,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

/// Kind of filesystem entry in the output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Regular file (or a symlink resolving to one)
    File,
    /// Directory (or a symlink resolving to one)
    Directory,
}

/// Why an entry did not make it into the document
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExclusionReason {
    /// Matched an exclude pattern, missed every include pattern, or is a
    /// symlink leaving the tree
    Pattern,
    /// Larger than the configured size cap
    Size,
    /// Deeper than the configured depth limit
    Depth,
    /// Content classified as binary
    Binary,
    /// Permission denied, vanished, or otherwise unreadable
    Access,
}

/// Final decision for a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Inclusion {
    Included,
    Excluded(ExclusionReason),
}

impl Inclusion {
    pub fn is_included(self) -> bool {
        matches!(self, Inclusion::Included)
    }

    /// Reason for the exclusion, if any
    pub fn reason(self) -> Option<ExclusionReason> {
        match self {
            Inclusion::Included => None,
            Inclusion::Excluded(reason) => Some(reason),
        }
    }
}

/// Text encoding detected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// Valid UTF-8 without a byte-order mark
    Utf8,
    /// UTF-8 with a leading byte-order mark (stripped from the text)
    Utf8Bom,
    /// UTF-16 little endian, detected by byte-order mark
    Utf16Le,
    /// UTF-16 big endian, detected by byte-order mark
    Utf16Be,
    /// Not valid UTF-8; decoded with replacement characters
    Utf8Lossy,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Bom => "utf-8-bom",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Utf8Lossy => "utf-8-lossy",
        };
        f.write_str(label)
    }
}

/// One filesystem entry in the output tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    /// Entry name (the root uses its directory name)
    pub name: String,
    /// Path relative to the walk root; empty for the root itself
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub kind: NodeKind,
    pub status: Inclusion,
    /// Children in lexicographic order (directories only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    /// File size, or the summed size of visited files for directories
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TextEncoding>,
}

impl TreeNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_included(&self) -> bool {
        self.status.is_included()
    }

    /// Look up a descendant by its path relative to the walk root
    pub fn find(&self, rel_path: impl AsRef<Path>) -> Option<&TreeNode> {
        let rel_path = rel_path.as_ref();
        if self.path == rel_path {
            return Some(self);
        }
        self.children
            .iter()
            .filter(|child| rel_path.starts_with(&child.path))
            .find_map(|child| child.find(rel_path))
    }

    /// All nodes below this one in depth-first pre-order
    pub fn descendants(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&TreeNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Extracted content, or the reason it was not extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ContentBody {
    /// Decoded text
    Text(String),
    /// Binary content, not extracted
    Binary,
    /// Over the size cap, not read
    TooLarge,
    /// Reading failed; carries the failure kind and cause
    Unreadable { kind: WarningKind, cause: String },
}

impl ContentBody {
    /// Marker shown in place of content for non-text bodies
    pub fn marker(&self) -> Option<String> {
        match self {
            ContentBody::Text(_) => None,
            ContentBody::Binary => Some("binary — not extracted".to_string()),
            ContentBody::TooLarge => Some("too large — not extracted".to_string()),
            ContentBody::Unreadable { cause, .. } => Some(format!("unreadable — {}", cause)),
        }
    }

    /// Inclusion decision implied by this body
    pub fn inclusion(&self) -> Inclusion {
        match self {
            ContentBody::Text(_) => Inclusion::Included,
            ContentBody::Binary => Inclusion::Excluded(ExclusionReason::Binary),
            ContentBody::TooLarge => Inclusion::Excluded(ExclusionReason::Size),
            ContentBody::Unreadable { .. } => Inclusion::Excluded(ExclusionReason::Access),
        }
    }
}

/// Classification result for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    /// Path relative to the walk root
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub body: ContentBody,
    /// Size in bytes as reported by the filesystem
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TextEncoding>,
}

impl FileContent {
    /// Decoded text, if the file was classified as text
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ContentBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Kind of per-entry failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Permission was denied
    PermissionDenied,
    /// Entry disappeared between listing and reading
    Vanished,
    /// Any other read or metadata error
    ReadError,
}

impl WarningKind {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => WarningKind::PermissionDenied,
            io::ErrorKind::NotFound => WarningKind::Vanished,
            _ => WarningKind::ReadError,
        }
    }
}

/// Non-fatal failure recorded during a walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkWarning {
    /// Path relative to the walk root
    #[serde(serialize_with = "serialize_path_lossy")]
    pub path: PathBuf,
    pub kind: WarningKind,
    /// Human-readable cause
    pub message: String,
}

impl WalkWarning {
    pub fn from_io(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        Self {
            path: path.into(),
            kind: WarningKind::from_io(err),
            message: err.to_string(),
        }
    }
}

/// Everything the formatter needs, detached from the filesystem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkResult {
    /// Root directory node
    pub root: TreeNode,
    /// One entry per classified file, in traversal order
    pub contents: Vec<FileContent>,
    pub statistics: Statistics,
    pub warnings: Vec<WalkWarning>,
}

impl WalkResult {
    /// False when the walk was cancelled before visiting every entry
    pub fn is_complete(&self) -> bool {
        self.statistics.complete
    }

    /// Files whose content was extracted as text
    pub fn text_files(&self) -> impl Iterator<Item = &FileContent> {
        self.contents.iter().filter(|c| c.text().is_some())
    }

    /// Content entry for a root-relative path
    pub fn content(&self, rel_path: impl AsRef<Path>) -> Option<&FileContent> {
        let rel_path = rel_path.as_ref();
        self.contents.iter().find(|c| c.path == rel_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, status: Inclusion) -> TreeNode {
        TreeNode {
            name: Path::new(path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string(),
            path: PathBuf::from(path),
            kind: NodeKind::File,
            status,
            children: vec![],
            size: 1,
            encoding: None,
        }
    }

    #[test]
    fn test_find_and_descendants() {
        let sub = TreeNode {
            name: "sub".to_string(),
            path: PathBuf::from("sub"),
            kind: NodeKind::Directory,
            status: Inclusion::Included,
            children: vec![file("sub/c.md", Inclusion::Included)],
            size: 1,
            encoding: None,
        };
        let root = TreeNode {
            name: "root".to_string(),
            path: PathBuf::new(),
            kind: NodeKind::Directory,
            status: Inclusion::Included,
            children: vec![
                file("a.md", Inclusion::Included),
                file("b.bin", Inclusion::Excluded(ExclusionReason::Pattern)),
                sub,
            ],
            size: 3,
            encoding: None,
        };

        assert_eq!(root.find("sub/c.md").map(|n| n.name.as_str()), Some("c.md"));
        assert!(root.find("missing.txt").is_none());

        let order: Vec<_> = root
            .descendants()
            .iter()
            .map(|n| n.path.to_string_lossy().to_string())
            .collect();
        assert_eq!(order, vec!["a.md", "b.bin", "sub", "sub/c.md"]);
    }

    #[test]
    fn test_content_markers() {
        assert_eq!(
            ContentBody::Binary.marker().as_deref(),
            Some("binary — not extracted")
        );
        assert_eq!(
            ContentBody::TooLarge.marker().as_deref(),
            Some("too large — not extracted")
        );
        assert!(ContentBody::Text("x".into()).marker().is_none());
        assert_eq!(
            ContentBody::Unreadable {
                kind: WarningKind::PermissionDenied,
                cause: "denied".into()
            }
            .inclusion(),
            Inclusion::Excluded(ExclusionReason::Access)
        );
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ExclusionReason::Pattern.to_string(), "pattern");
        assert_eq!(ExclusionReason::Binary.as_ref(), "binary");
        assert_eq!(TextEncoding::Utf8Lossy.to_string(), "utf-8-lossy");
    }
}
