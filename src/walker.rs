/*!
 * Directory traversal and per-entry decisions
 *
 * The walker descends depth-first from the root, deciding for every entry
 * whether it belongs in the document. Sibling entries are processed in
 * parallel; each subtree carries its own statistics and contents back to its
 * parent, which reassembles them in sorted order.
 */

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classifier::classify;
use crate::error::{Error, Result};
use crate::matcher::{PatternMatcher, PatternSet};
use crate::stats::StatsAggregator;
use crate::types::{
    ContentBody, ExclusionReason, FileContent, Inclusion, NodeKind, TreeNode, WalkResult,
    WalkWarning,
};

/// Default depth limit
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default size cap (1 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Limits applied during one walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    max_depth: usize,
    max_file_size: u64,
    collapse_empty_dirs: bool,
}

impl WalkLimits {
    /// Build validated limits. `max_depth` 0 keeps only the root's direct
    /// children; `max_file_size` must be positive.
    pub fn new(max_depth: usize, max_file_size: u64, collapse_empty_dirs: bool) -> Result<Self> {
        crate::ensure!(
            max_file_size > 0,
            Config,
            "max_file_size must be greater than 0"
        );
        Ok(Self {
            max_depth,
            max_file_size,
            collapse_empty_dirs,
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn collapse_empty_dirs(&self) -> bool {
        self.collapse_empty_dirs
    }
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            collapse_empty_dirs: true,
        }
    }
}

/// Receives walk decisions as they happen.
///
/// Called from worker threads, in no particular order across siblings.
pub trait WalkObserver: Send + Sync {
    /// A node received its final decision
    fn on_decision(&self, _node: &TreeNode) {}

    /// A per-entry failure was recorded
    fn on_warning(&self, _warning: &WalkWarning) {}
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl WalkObserver for NoopObserver {}

/// Configured traversal engine
pub struct Walker {
    patterns: PatternSet,
    limits: WalkLimits,
    observer: Arc<dyn WalkObserver>,
    cancel: Arc<AtomicBool>,
}

impl Walker {
    /// Create a walker with no observer and a fresh cancellation flag
    pub fn new(patterns: PatternSet, limits: WalkLimits) -> Self {
        Self {
            patterns,
            limits,
            observer: Arc::new(NoopObserver),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach a decision observer
    pub fn with_observer(mut self, observer: Arc<dyn WalkObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the walk between entries once set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn limits(&self) -> &WalkLimits {
        &self.limits
    }

    /// Walk `root` and assemble the result.
    ///
    /// Fails only if the root is missing, unreadable, not a directory, or the
    /// patterns do not compile.
    pub fn walk(&self, root: &Path) -> Result<WalkResult> {
        let root_abs = fs::canonicalize(root).map_err(|e| Error::access(root, e))?;
        let metadata = fs::metadata(&root_abs).map_err(|e| Error::access(&root_abs, e))?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(root_abs));
        }

        let matcher = PatternMatcher::build(&self.patterns, &root_abs)?;
        let (entries, listing_warnings) =
            list_dir(&root_abs, Path::new("")).map_err(|e| Error::access(&root_abs, e))?;

        info!(
            root = %root_abs.display(),
            max_depth = self.limits.max_depth,
            max_file_size = self.limits.max_file_size,
            "starting walk"
        );

        let ctx = WalkContext {
            root: &root_abs,
            matcher: &matcher,
            limits: &self.limits,
            observer: self.observer.as_ref(),
            cancel: self.cancel.as_ref(),
            interrupted: AtomicBool::new(false),
        };

        let mut collected = Collected::default();
        collected.add_warnings(listing_warnings, ctx.observer);
        let chain = vec![root_abs.clone()];
        for subtree in ctx.process_entries(&entries, Path::new(""), 0, &chain) {
            collected.absorb(subtree, self.limits.collapse_empty_dirs);
        }

        let complete = !ctx.interrupted.load(Ordering::SeqCst);
        let name = root_abs
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root_abs.display().to_string());

        let root_node = TreeNode {
            name,
            path: PathBuf::new(),
            kind: NodeKind::Directory,
            status: Inclusion::Included,
            children: collected.children,
            size: collected.size,
            encoding: None,
        };
        let statistics = collected.stats.finalize(complete);

        if complete {
            info!(
                files = statistics.total_files,
                dirs = statistics.total_dirs,
                excluded = statistics.total_excluded(),
                "walk finished"
            );
        } else {
            warn!(
                visited = statistics.entries_visited,
                "walk cancelled, result is incomplete"
            );
        }

        Ok(WalkResult {
            root: root_node,
            contents: collected.contents,
            statistics,
            warnings: collected.warnings,
        })
    }
}

/// Walk a directory with default observer and no cancellation
pub fn walk(root: &Path, patterns: &PatternSet, limits: &WalkLimits) -> Result<WalkResult> {
    Walker::new(patterns.clone(), *limits).walk(root)
}

/// Everything produced beneath (and including) one entry
struct Subtree {
    node: TreeNode,
    contents: Vec<FileContent>,
    stats: StatsAggregator,
    warnings: Vec<WalkWarning>,
    /// Included files in this subtree
    included: usize,
}

impl Subtree {
    fn leaf(node: TreeNode) -> Self {
        Self {
            node,
            contents: Vec::new(),
            stats: StatsAggregator::new(),
            warnings: Vec::new(),
            included: 0,
        }
    }
}

/// Children of one directory, merged in sorted order
#[derive(Default)]
struct Collected {
    children: Vec<TreeNode>,
    contents: Vec<FileContent>,
    stats: StatsAggregator,
    warnings: Vec<WalkWarning>,
    included: usize,
    size: u64,
}

impl Collected {
    fn absorb(&mut self, subtree: Subtree, collapse_empty_dirs: bool) {
        self.stats.merge(subtree.stats);
        self.warnings.extend(subtree.warnings);
        self.included += subtree.included;
        self.size += subtree.node.size;

        if collapse_empty_dirs && subtree.node.is_dir() && subtree.included == 0 {
            debug!(path = %subtree.node.path.display(), "collapsing empty directory");
            return;
        }
        self.contents.extend(subtree.contents);
        self.children.push(subtree.node);
    }

    fn add_warnings(&mut self, warnings: Vec<WalkWarning>, observer: &dyn WalkObserver) {
        for warning in &warnings {
            observer.on_warning(warning);
        }
        self.warnings.extend(warnings);
    }
}

/// One child of a listed directory
enum Listed {
    Entry(DirEntry),
    /// Entry the listing could not describe
    Failed { name: OsString, error: io::Error },
}

/// How an entry resolved after following symlinks
enum Resolved {
    File { size: u64 },
    Directory { canonical: PathBuf },
    /// Symlink that dangles, escapes the root, or loops
    OutOfTree,
    /// FIFO, socket, device or similar
    Special,
    Failed(io::Error),
}

/// Shared, read-only state for one walk
struct WalkContext<'a> {
    root: &'a Path,
    matcher: &'a PatternMatcher,
    limits: &'a WalkLimits,
    observer: &'a dyn WalkObserver,
    cancel: &'a AtomicBool,
    interrupted: AtomicBool,
}

impl WalkContext<'_> {
    /// Process the sorted entries of one directory.
    ///
    /// `chain` holds the canonical paths of every directory from the root
    /// down to the one being listed.
    fn process_entries(
        &self,
        entries: &[Listed],
        parent_rel: &Path,
        depth: usize,
        chain: &[PathBuf],
    ) -> Vec<Subtree> {
        entries
            .par_iter()
            .filter_map(|entry| {
                if self.cancel.load(Ordering::Relaxed) {
                    self.interrupted.store(true, Ordering::SeqCst);
                    return None;
                }
                Some(match entry {
                    Listed::Entry(entry) => {
                        let rel = parent_rel.join(entry.file_name());
                        self.process_entry(entry, rel, depth, chain)
                    }
                    Listed::Failed { name, error } => self.fail_leaf(
                        NodeKind::File,
                        parent_rel.join(name),
                        error,
                        "cannot list entry",
                    ),
                })
            })
            .collect()
    }

    fn process_entry(
        &self,
        entry: &DirEntry,
        rel: PathBuf,
        depth: usize,
        chain: &[PathBuf],
    ) -> Subtree {
        let abs = entry.path();
        match self.resolve(entry, chain) {
            Resolved::File { size } => self.process_file(abs, rel, size, depth),
            Resolved::Directory { canonical } => {
                self.process_dir(abs, rel, canonical, depth, chain)
            }
            Resolved::OutOfTree => {
                debug!(path = %rel.display(), "symlink leaves the tree, skipping");
                self.finish_leaf(entry_kind(entry), rel, 0, ExclusionReason::Pattern)
            }
            Resolved::Special => {
                debug!(path = %rel.display(), "not a regular file, skipping");
                self.finish_leaf(NodeKind::File, rel, 0, ExclusionReason::Access)
            }
            Resolved::Failed(err) => {
                self.fail_leaf(entry_kind(entry), rel, &err, "cannot stat entry")
            }
        }
    }

    fn resolve(&self, entry: &DirEntry, chain: &[PathBuf]) -> Resolved {
        let file_type = entry.file_type();

        if entry.path_is_symlink() {
            let target = match fs::canonicalize(entry.path()) {
                Ok(target) => target,
                Err(_) => return Resolved::OutOfTree,
            };
            if !target.starts_with(self.root) {
                return Resolved::OutOfTree;
            }
            return match fs::metadata(&target) {
                Ok(meta) if meta.is_dir() => {
                    if chain.contains(&target) {
                        Resolved::OutOfTree
                    } else {
                        Resolved::Directory { canonical: target }
                    }
                }
                Ok(meta) if meta.is_file() => Resolved::File { size: meta.len() },
                Ok(_) => Resolved::Special,
                Err(e) => Resolved::Failed(e),
            };
        }

        if file_type.is_dir() {
            let parent = chain.last().map(PathBuf::as_path).unwrap_or(self.root);
            return Resolved::Directory {
                canonical: parent.join(entry.file_name()),
            };
        }
        if file_type.is_file() {
            return match entry.metadata() {
                Ok(meta) => Resolved::File { size: meta.len() },
                Err(e) => Resolved::Failed(io::Error::from(e)),
            };
        }
        Resolved::Special
    }

    fn process_file(&self, abs: &Path, rel: PathBuf, size: u64, depth: usize) -> Subtree {
        let pattern_status = self.matcher.file_inclusion(&rel);
        if let Inclusion::Excluded(reason) = pattern_status {
            return self.finish_leaf(NodeKind::File, rel, size, reason);
        }
        if depth > self.limits.max_depth {
            return self.finish_leaf(NodeKind::File, rel, size, ExclusionReason::Depth);
        }

        let content = classify(abs, &rel, size, self.limits.max_file_size);
        let node = TreeNode {
            name: file_name(&rel),
            status: content.body.inclusion(),
            path: rel,
            kind: NodeKind::File,
            children: Vec::new(),
            size,
            encoding: content.encoding,
        };

        let mut subtree = Subtree::leaf(node);
        if let ContentBody::Unreadable { kind, cause } = &content.body {
            let warning = WalkWarning {
                path: subtree.node.path.clone(),
                kind: *kind,
                message: cause.clone(),
            };
            self.observer.on_warning(&warning);
            subtree.warnings.push(warning);
        }
        if subtree.node.is_included() {
            subtree.included = 1;
        }
        subtree.contents.push(content);
        self.record(&mut subtree);
        subtree
    }

    fn process_dir(
        &self,
        abs: &Path,
        rel: PathBuf,
        canonical: PathBuf,
        depth: usize,
        chain: &[PathBuf],
    ) -> Subtree {
        if self.matcher.is_excluded_dir(&rel) {
            return self.finish_leaf(NodeKind::Directory, rel, 0, ExclusionReason::Pattern);
        }
        if depth > self.limits.max_depth {
            return self.finish_leaf(NodeKind::Directory, rel, 0, ExclusionReason::Depth);
        }

        let (entries, listing_warnings) = match list_dir(abs, &rel) {
            Ok(listing) => listing,
            Err(err) => {
                return self.fail_leaf(NodeKind::Directory, rel, &err, "cannot read directory");
            }
        };

        let mut child_chain = chain.to_vec();
        child_chain.push(canonical);

        let mut collected = Collected::default();
        collected.add_warnings(listing_warnings, self.observer);
        for child in self.process_entries(&entries, &rel, depth + 1, &child_chain) {
            collected.absorb(child, self.limits.collapse_empty_dirs);
        }

        let status = if self.matcher.has_includes() && collected.included == 0 {
            Inclusion::Excluded(ExclusionReason::Pattern)
        } else {
            Inclusion::Included
        };

        let node = TreeNode {
            name: file_name(&rel),
            path: rel,
            kind: NodeKind::Directory,
            status,
            children: collected.children,
            size: collected.size,
            encoding: None,
        };
        let mut subtree = Subtree {
            node,
            contents: collected.contents,
            stats: collected.stats,
            warnings: collected.warnings,
            included: collected.included,
        };
        self.record(&mut subtree);
        subtree
    }

    /// Build and record a node that is not descended or read
    fn finish_leaf(
        &self,
        kind: NodeKind,
        rel: PathBuf,
        size: u64,
        reason: ExclusionReason,
    ) -> Subtree {
        let node = TreeNode {
            name: file_name(&rel),
            path: rel,
            kind,
            status: Inclusion::Excluded(reason),
            children: Vec::new(),
            size,
            encoding: None,
        };
        let mut subtree = Subtree::leaf(node);
        self.record(&mut subtree);
        subtree
    }

    /// Excluded-by-access leaf carrying a warning
    fn fail_leaf(&self, kind: NodeKind, rel: PathBuf, err: &io::Error, what: &str) -> Subtree {
        warn!(path = %rel.display(), "{}: {}", what, err);
        let warning = WalkWarning::from_io(&rel, err);
        let mut subtree = self.finish_leaf(kind, rel, 0, ExclusionReason::Access);
        self.observer.on_warning(&warning);
        subtree.warnings.push(warning);
        subtree
    }

    fn record(&self, subtree: &mut Subtree) {
        debug!(
            path = %subtree.node.path.display(),
            status = ?subtree.node.status,
            "decision"
        );
        subtree.stats.record(&subtree.node);
        self.observer.on_decision(&subtree.node);
    }
}

/// List one directory in file-name order.
///
/// Failing to open the directory is an error. Entries that fail on their own
/// come back as [`Listed::Failed`]; failures with no entry path are returned
/// as plain warnings.
fn list_dir(dir: &Path, rel: &Path) -> io::Result<(Vec<Listed>, Vec<WalkWarning>)> {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        match result {
            Ok(entry) => entries.push(Listed::Entry(entry)),
            Err(err) if err.depth() == 0 || err.path() == Some(dir) => {
                return Err(io::Error::from(err))
            }
            Err(err) => {
                let name = err.path().and_then(|p| p.file_name()).map(OsString::from);
                let error = io::Error::from(err);
                match name {
                    Some(name) => entries.push(Listed::Failed { name, error }),
                    None => {
                        warn!(path = %rel.display(), "cannot list entry: {}", error);
                        warnings.push(WalkWarning::from_io(rel, &error));
                    }
                }
            }
        }
    }
    Ok((entries, warnings))
}

fn entry_kind(entry: &DirEntry) -> NodeKind {
    if entry.file_type().is_dir() {
        NodeKind::Directory
    } else {
        NodeKind::File
    }
}

fn file_name(rel: &Path) -> String {
    rel.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
