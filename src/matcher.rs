/*!
 * Include/exclude pattern matching
 *
 * Patterns are compiled once per run into globsets and shared read-only by
 * every traversal worker. Exclusion always wins over inclusion.
 */

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{ExclusionReason, Inclusion};

/// Raw pattern configuration, as read from the CLI or config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    /// Globs a file must match (path or bare name) to be included
    pub include_files: Vec<String>,
    /// Globs selecting directories whose files are included
    pub include_dirs: Vec<String>,
    /// Globs excluding individual files
    pub exclude_files: Vec<String>,
    /// Globs excluding (and pruning) whole directories
    pub exclude_dirs: Vec<String>,
    /// Apply the root `.gitignore` as an extra exclusion layer
    pub respect_gitignore: bool,
    /// Additional ignore file in gitignore syntax
    pub gitignore_path: Option<PathBuf>,
}

impl PatternSet {
    /// True when at least one include pattern is configured
    pub fn has_includes(&self) -> bool {
        !self.include_files.is_empty() || !self.include_dirs.is_empty()
    }
}

/// Compiled, immutable matching engine
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    include_files: Option<GlobSet>,
    include_dirs: Option<GlobSet>,
    exclude_files: Option<GlobSet>,
    exclude_dirs: Option<GlobSet>,
    gitignore: Option<Gitignore>,
}

impl PatternMatcher {
    /// Compile a pattern set. `root` anchors the gitignore layer.
    pub fn build(patterns: &PatternSet, root: &Path) -> Result<Self> {
        let gitignore = if patterns.respect_gitignore || patterns.gitignore_path.is_some() {
            load_gitignore(patterns, root)?
        } else {
            None
        };

        Ok(Self {
            include_files: compile(&patterns.include_files, PatternTarget::File)?,
            include_dirs: compile(&patterns.include_dirs, PatternTarget::Directory)?,
            exclude_files: compile(&patterns.exclude_files, PatternTarget::File)?,
            exclude_dirs: compile(&patterns.exclude_dirs, PatternTarget::Directory)?,
            gitignore,
        })
    }

    /// True when any include pattern is active
    pub fn has_includes(&self) -> bool {
        self.include_files.is_some() || self.include_dirs.is_some()
    }

    /// Whether a directory (relative to the root) is excluded and must be pruned
    pub fn is_excluded_dir(&self, rel_dir: &Path) -> bool {
        if let Some(set) = &self.exclude_dirs {
            if matches_dir(rel_dir, set) {
                return true;
            }
        }
        self.is_gitignored(rel_dir, true)
    }

    /// Pattern decision for a file relative to the root.
    ///
    /// Only pattern rules apply here; depth, size and content checks are
    /// left to the walker.
    pub fn file_inclusion(&self, rel_file: &Path) -> Inclusion {
        let excluded = Inclusion::Excluded(ExclusionReason::Pattern);

        if let (Some(parent), Some(set)) = (non_empty_parent(rel_file), &self.exclude_dirs) {
            if matches_dir(parent, set) {
                return excluded;
            }
        }
        if let Some(set) = &self.exclude_files {
            if matches_file(rel_file, set) {
                return excluded;
            }
        }
        if self.is_gitignored(rel_file, false) {
            return excluded;
        }
        if self.has_includes() && !self.is_included_file(rel_file) {
            return excluded;
        }
        Inclusion::Included
    }

    /// Whether a file hits an include-file pattern or sits under an
    /// include-dir match. Always true when no includes are configured.
    pub fn is_included_file(&self, rel_file: &Path) -> bool {
        if !self.has_includes() {
            return true;
        }
        let by_file = self
            .include_files
            .as_ref()
            .is_some_and(|set| matches_file(rel_file, set));
        let by_dir = match (non_empty_parent(rel_file), &self.include_dirs) {
            (Some(parent), Some(set)) => matches_dir(parent, set),
            _ => false,
        };
        by_file || by_dir
    }

    fn is_gitignored(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.gitignore.as_ref().is_some_and(|gi| {
            gi.matched_path_or_any_parents(rel_path, is_dir)
                .is_ignore()
        })
    }
}

/// Match a file against a set: full relative path or bare file name
pub fn matches_file(rel_file: &Path, set: &GlobSet) -> bool {
    if set.is_match(rel_file) {
        return true;
    }
    rel_file
        .file_name()
        .is_some_and(|name| set.is_match(Path::new(name)))
}

/// Match a directory against a set: any prefix of its path, or any single
/// directory name along it
pub fn matches_dir(rel_dir: &Path, set: &GlobSet) -> bool {
    rel_dir
        .ancestors()
        .filter(|prefix| !prefix.as_os_str().is_empty())
        .any(|prefix| {
            set.is_match(prefix)
                || prefix
                    .file_name()
                    .is_some_and(|name| set.is_match(Path::new(name)))
        })
}

#[derive(Clone, Copy)]
enum PatternTarget {
    File,
    Directory,
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Strip the anchoring and trailing forms users commonly write
fn normalize(pattern: &str, target: PatternTarget) -> String {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p = p.trim_start_matches('/');
    if let PatternTarget::Directory = target {
        // `dir/**` selects the same subtree as `dir`
        p = p.strip_suffix("/**").unwrap_or(p);
    }
    p.trim_end_matches('/').to_string()
}

fn compile(patterns: &[String], target: PatternTarget) -> Result<Option<GlobSet>> {
    let mut builder = GlobSetBuilder::new();
    let mut count = 0;

    for pattern in patterns {
        let normalized = normalize(pattern, target);
        if normalized.is_empty() {
            warn!(pattern = %pattern, "ignoring empty pattern");
            continue;
        }
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|source| Error::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
        count += 1;
    }

    if count == 0 {
        return Ok(None);
    }
    let set = builder.build().map_err(|source| Error::Pattern {
        pattern: patterns.join(","),
        source,
    })?;
    Ok(Some(set))
}

fn load_gitignore(patterns: &PatternSet, root: &Path) -> Result<Option<Gitignore>> {
    let mut builder = GitignoreBuilder::new(root);
    let mut sources = 0;

    if patterns.respect_gitignore {
        let root_ignore = root.join(".gitignore");
        if root_ignore.is_file() {
            if let Some(err) = builder.add(&root_ignore) {
                warn!(path = %root_ignore.display(), "partially invalid ignore file: {}", err);
            }
            sources += 1;
        }
    }
    if let Some(custom) = &patterns.gitignore_path {
        if let Some(err) = builder.add(custom) {
            return Err(Error::Ignore(err));
        }
        sources += 1;
    }

    if sources == 0 {
        return Ok(None);
    }
    debug!(sources, "loaded ignore files");
    Ok(Some(builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn matcher(patterns: PatternSet) -> PatternMatcher {
        PatternMatcher::build(&patterns, Path::new("/nonexistent")).unwrap()
    }

    #[test]
    fn test_empty_patterns_include_everything() {
        let m = matcher(PatternSet::default());
        assert!(!m.has_includes());
        assert_eq!(m.file_inclusion(Path::new("a/b/c.rs")), Inclusion::Included);
        assert!(!m.is_excluded_dir(Path::new("a/b")));
    }

    #[test]
    fn test_file_pattern_matches_bare_name() {
        let m = matcher(PatternSet {
            include_files: vec!["*.md".into()],
            ..Default::default()
        });
        assert!(m.is_included_file(Path::new("docs/readme.md")));
        assert!(m.is_included_file(Path::new("a.md")));
        assert!(!m.is_included_file(Path::new("src/main.rs")));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let m = matcher(PatternSet {
            include_files: vec!["src/*.rs".into()],
            ..Default::default()
        });
        assert!(m.is_included_file(Path::new("src/lib.rs")));
        assert!(!m.is_included_file(Path::new("src/nested/lib.rs")));

        let m = matcher(PatternSet {
            include_files: vec!["src/**/*.rs".into()],
            ..Default::default()
        });
        assert!(m.is_included_file(Path::new("src/nested/deep/lib.rs")));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let m = matcher(PatternSet {
            include_files: vec!["*.py".into()],
            exclude_files: vec!["test_*".into()],
            ..Default::default()
        });
        assert_eq!(m.file_inclusion(Path::new("src/main.py")), Inclusion::Included);
        assert_eq!(
            m.file_inclusion(Path::new("src/test_main.py")),
            Inclusion::Excluded(ExclusionReason::Pattern)
        );
    }

    #[test]
    fn test_dir_patterns_match_any_prefix_or_name() {
        let m = matcher(PatternSet {
            exclude_dirs: vec!["node_modules/".into(), "build/**".into(), "/docs/generated".into()],
            ..Default::default()
        });
        assert!(m.is_excluded_dir(Path::new("node_modules")));
        assert!(m.is_excluded_dir(Path::new("web/node_modules")));
        assert!(m.is_excluded_dir(Path::new("build")));
        assert!(m.is_excluded_dir(Path::new("docs/generated")));
        assert!(!m.is_excluded_dir(Path::new("docs")));
        assert_eq!(
            m.file_inclusion(Path::new("web/node_modules/x.js")),
            Inclusion::Excluded(ExclusionReason::Pattern)
        );
    }

    #[test]
    fn test_include_dirs_union_with_include_files() {
        let m = matcher(PatternSet {
            include_files: vec!["*.md".into()],
            include_dirs: vec!["src".into()],
            ..Default::default()
        });
        assert!(m.is_included_file(Path::new("README.md")));
        assert!(m.is_included_file(Path::new("src/main.py")));
        assert!(m.is_included_file(Path::new("src/deep/util.py")));
        assert!(!m.is_included_file(Path::new("tests/test_main.py")));
        // A root-level file is never "under" an include dir
        assert!(!m.is_included_file(Path::new("src")));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let result = PatternMatcher::build(
            &PatternSet {
                exclude_files: vec!["[unclosed".into()],
                ..Default::default()
            },
            Path::new("."),
        );
        assert!(matches!(result, Err(Error::Pattern { .. })));
    }

    #[test]
    fn test_gitignore_layer() {
        let root = tempdir().unwrap();
        fs::write(root.path().join(".gitignore"), "*.log\ncache/\n").unwrap();

        let m = PatternMatcher::build(
            &PatternSet {
                respect_gitignore: true,
                ..Default::default()
            },
            root.path(),
        )
        .unwrap();
        assert_eq!(
            m.file_inclusion(Path::new("logs/app.log")),
            Inclusion::Excluded(ExclusionReason::Pattern)
        );
        assert!(m.is_excluded_dir(Path::new("cache")));
        assert_eq!(m.file_inclusion(Path::new("src/app.rs")), Inclusion::Included);
    }
}
