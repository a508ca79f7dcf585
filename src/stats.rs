/*!
 * Statistics aggregation over walk decisions
 *
 * One aggregator per traversal worker; subtree aggregators are merged into
 * their parent so no locking is needed.
 */

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use crate::types::{ExclusionReason, Inclusion, NodeKind, TreeNode};

/// Key used for files without an extension
pub const NO_EXTENSION: &str = "(none)";

/// Number of entries kept in [`Statistics::largest_files`]
pub const LARGEST_FILES_LIMIT: usize = 10;

/// Count and byte total for a group of entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub count: usize,
    pub bytes: u64,
}

impl Tally {
    fn add(&mut self, bytes: u64) {
        self.count += 1;
        self.bytes += bytes;
    }

    fn merge(&mut self, other: Tally) {
        self.count += other.count;
        self.bytes += other.bytes;
    }
}

/// Finalized, read-only walk statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Included files
    pub total_files: usize,
    /// Included directories
    pub total_dirs: usize,
    /// Bytes of included files
    pub total_bytes: u64,
    /// Every entry that received a decision, root excluded
    pub entries_visited: usize,
    /// Included files keyed by lowercase `.ext` or [`NO_EXTENSION`]
    pub by_extension: BTreeMap<String, Tally>,
    /// Excluded entries keyed by reason
    pub excluded: BTreeMap<ExclusionReason, Tally>,
    /// Largest included files, biggest first
    #[serde(serialize_with = "serialize_largest")]
    pub largest_files: Vec<(PathBuf, u64)>,
    /// False when the walk was cancelled part way
    pub complete: bool,
}

impl Statistics {
    /// Number of excluded entries for a reason
    pub fn excluded_count(&self, reason: ExclusionReason) -> usize {
        self.excluded.get(&reason).map_or(0, |t| t.count)
    }

    /// Sum of excluded entries over all reasons
    pub fn total_excluded(&self) -> usize {
        self.excluded.values().map(|t| t.count).sum()
    }

    pub fn included_entries(&self) -> usize {
        self.total_files + self.total_dirs
    }
}

fn serialize_largest<S: Serializer>(
    files: &[(PathBuf, u64)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        files
            .iter()
            .map(|(path, size)| (path.to_string_lossy(), *size)),
    )
}

/// Extension key for a file name
pub fn extension_key(path: &std::path::Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

/// Additive accumulator fed once per terminal decision
#[derive(Debug, Default)]
pub struct StatsAggregator {
    total_files: usize,
    total_dirs: usize,
    total_bytes: u64,
    entries_visited: usize,
    by_extension: BTreeMap<String, Tally>,
    excluded: BTreeMap<ExclusionReason, Tally>,
    included_files: Vec<(PathBuf, u64)>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the final decision for one node.
    ///
    /// Directory sizes are not added to byte totals; their files are
    /// recorded individually.
    pub fn record(&mut self, node: &TreeNode) {
        self.entries_visited += 1;

        match (node.status, node.kind) {
            (Inclusion::Included, NodeKind::File) => {
                self.total_files += 1;
                self.total_bytes += node.size;
                self.by_extension
                    .entry(extension_key(&node.path))
                    .or_default()
                    .add(node.size);
                self.included_files.push((node.path.clone(), node.size));
            }
            (Inclusion::Included, NodeKind::Directory) => {
                self.total_dirs += 1;
            }
            (Inclusion::Excluded(reason), kind) => {
                let bytes = if kind == NodeKind::File { node.size } else { 0 };
                self.excluded.entry(reason).or_default().add(bytes);
            }
        }
    }

    /// Fold a worker's aggregator into this one
    pub fn merge(&mut self, other: StatsAggregator) {
        self.total_files += other.total_files;
        self.total_dirs += other.total_dirs;
        self.total_bytes += other.total_bytes;
        self.entries_visited += other.entries_visited;
        for (ext, tally) in other.by_extension {
            self.by_extension.entry(ext).or_default().merge(tally);
        }
        for (reason, tally) in other.excluded {
            self.excluded.entry(reason).or_default().merge(tally);
        }
        self.included_files.extend(other.included_files);
    }

    /// Freeze the counters
    pub fn finalize(self, complete: bool) -> Statistics {
        let mut largest = self.included_files;
        largest.sort_by(|(pa, a), (pb, b)| b.cmp(a).then_with(|| pa.cmp(pb)));
        largest.truncate(LARGEST_FILES_LIMIT);

        Statistics {
            total_files: self.total_files,
            total_dirs: self.total_dirs,
            total_bytes: self.total_bytes,
            entries_visited: self.entries_visited,
            by_extension: self.by_extension,
            excluded: self.excluded,
            largest_files: largest,
            complete,
        }
    }
}
