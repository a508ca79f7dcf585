/*!
 * Document writer for dirdoc
 *
 * Renders a finished [`WalkResult`] as Markdown or JSON. No traversal logic
 * lives here; everything comes from the result.
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Local;
use serde_json::json;

use crate::config::{Config, OutputFormat};
use crate::error::Result;
use crate::types::{TreeNode, WalkResult};
use crate::utils::{format_file_size, language_tag};

const GENERATOR: &str = "dirdoc";

/// Writes the consolidated document
pub struct DocumentWriter {
    output_file: PathBuf,
    format: OutputFormat,
    include_stats: bool,
}

impl DocumentWriter {
    /// Create a new writer
    pub fn new(config: &Config) -> Self {
        Self {
            output_file: config.output_file.clone(),
            format: config.format,
            include_stats: config.stats_in_output,
        }
    }

    /// Render and write the document to the configured output file
    pub fn write(&self, result: &WalkResult) -> Result<()> {
        let rendered = self.render(result)?;
        let file = File::create(&self.output_file)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(rendered.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Render the document in the configured format
    pub fn render(&self, result: &WalkResult) -> Result<String> {
        let generated_at = Local::now();
        match self.format {
            OutputFormat::Markdown => Ok(render_markdown(
                result,
                self.include_stats,
                &generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            )),
            OutputFormat::Json => render_json(result, self.include_stats, &generated_at.to_rfc3339()),
        }
    }
}

/// First included README (case-insensitive `readme.md`), preferring the root
fn find_readme(result: &WalkResult) -> Option<(&str, &std::path::Path)> {
    let mut readmes: Vec<_> = result
        .text_files()
        .filter(|c| {
            c.path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case("readme.md"))
        })
        .collect();
    readmes.sort_by_key(|c| c.path.components().count());
    readmes
        .first()
        .and_then(|c| c.text().map(|text| (text, c.path.as_path())))
}

/// Render the tree with box-drawing connectors.
///
/// Excluded files are left out; excluded directories that are still part of
/// the tree are shown with their reason.
pub fn render_tree(root: &TreeNode) -> String {
    let mut lines = vec![root.name.clone()];
    render_children(root, "", &mut lines);
    lines.join("\n")
}

fn render_children(node: &TreeNode, prefix: &str, lines: &mut Vec<String>) {
    let visible: Vec<&TreeNode> = node
        .children
        .iter()
        .filter(|child| child.is_dir() || child.is_included())
        .collect();

    for (i, child) in visible.iter().enumerate() {
        let last = i + 1 == visible.len();
        let connector = if last { "└── " } else { "├── " };
        let mut line = format!("{}{}{}", prefix, connector, child.name);
        if child.is_dir() {
            line.push('/');
        }
        if let Some(reason) = child.status.reason() {
            line.push_str(&format!(" [excluded: {}]", reason));
        }
        lines.push(line);

        if child.is_dir() {
            let extension = if last { "    " } else { "│   " };
            render_children(child, &format!("{}{}", prefix, extension), lines);
        }
    }
}

/// Smallest backtick fence that cannot be closed by the content itself
fn fence_for(content: &str, minimum: usize) -> String {
    let mut longest = 0;
    let mut run = 0;
    for ch in content.chars() {
        if ch == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(minimum.max(longest + 1))
}

fn render_statistics(result: &WalkResult) -> String {
    let stats = &result.statistics;
    let mut out = String::from("## Project Statistics\n\n");
    out.push_str(&format!("- Included Files: {}\n", stats.total_files));
    let shown_dirs = result
        .root
        .descendants()
        .into_iter()
        .filter(|node| node.is_dir() && node.is_included())
        .count();
    if shown_dirs < stats.total_dirs {
        out.push_str(&format!(
            "- Included Directories: {} ({} without included files, omitted from the structure)\n",
            stats.total_dirs,
            stats.total_dirs - shown_dirs
        ));
    } else {
        out.push_str(&format!("- Included Directories: {}\n", stats.total_dirs));
    }
    out.push_str(&format!("- Total Size: {}\n", format_file_size(stats.total_bytes)));
    out.push_str(&format!("- Entries Visited: {}\n", stats.entries_visited));

    if !stats.excluded.is_empty() {
        out.push_str("- Excluded:\n");
        for (reason, tally) in &stats.excluded {
            out.push_str(&format!("  - {}: {}\n", reason, tally.count));
        }
    }

    if !stats.by_extension.is_empty() {
        let mut types: Vec<_> = stats.by_extension.iter().collect();
        types.sort_by(|(ea, a), (eb, b)| b.count.cmp(&a.count).then_with(|| ea.cmp(eb)));
        out.push_str("- File Types:\n");
        for (ext, tally) in types {
            out.push_str(&format!(
                "  - {}: {} ({})\n",
                ext,
                tally.count,
                format_file_size(tally.bytes)
            ));
        }
    }

    if !stats.largest_files.is_empty() {
        out.push_str("- Largest Files:\n");
        for (path, size) in &stats.largest_files {
            out.push_str(&format!("  - {}: {}\n", path.display(), format_file_size(*size)));
        }
    }
    out
}

/// Render the Markdown document
pub fn render_markdown(result: &WalkResult, include_stats: bool, generated_at: &str) -> String {
    let mut sections = vec!["# Project Overview\n".to_string()];

    if !result.is_complete() {
        sections.push(
            "> **Note:** the walk was cancelled before completion; this document is partial.\n"
                .to_string(),
        );
    }

    let readme = find_readme(result);
    if let Some((content, path)) = readme {
        let fence = fence_for(content, 4);
        sections.push(format!(
            "## {} Content\n\n{}markdown\n{}\n{}\n",
            path.display(),
            fence,
            content,
            fence
        ));
    }

    sections.push(format!(
        "## Project Structure\n\n```tree\n{}\n```\n",
        render_tree(&result.root)
    ));

    if include_stats {
        sections.push(render_statistics(result));
    }

    sections.push("## File Contents\n".to_string());
    for file in result.text_files() {
        if readme.is_some_and(|(_, path)| path == file.path.as_path()) {
            continue;
        }
        let content = file.text().unwrap_or_default();
        let tag = language_tag(&file.path);
        let minimum = if tag == "markdown" { 4 } else { 3 };
        let fence = fence_for(content, minimum);
        sections.push(format!(
            "### filepath {}\n\n{}{}\n{}\n{}\n",
            file.path.display(),
            fence,
            tag,
            content,
            fence
        ));
    }

    sections.push(format!("---\nGenerated by {} on {}\n", GENERATOR, generated_at));
    sections.join("\n")
}

/// Render the JSON document
pub fn render_json(result: &WalkResult, include_stats: bool, generated_at: &str) -> Result<String> {
    let files: Vec<_> = result
        .text_files()
        .map(|c| {
            json!({
                "path": c.path.to_string_lossy(),
                "content": c.text(),
                "size": c.size,
                "encoding": c.encoding.map(|e| e.to_string()),
            })
        })
        .collect();

    let skipped: Vec<_> = result
        .contents
        .iter()
        .filter_map(|c| {
            c.body.marker().map(|marker| {
                json!({
                    "path": c.path.to_string_lossy(),
                    "size": c.size,
                    "reason": marker,
                })
            })
        })
        .collect();

    let mut output = json!({
        "project_overview": {
            "readme": find_readme(result).map(|(text, _)| text),
            "tree": render_tree(&result.root),
        },
        "structure": serde_json::to_value(&result.root)?,
        "files": files,
        "skipped_files": skipped,
        "warnings": serde_json::to_value(&result.warnings)?,
        "metadata": {
            "generated_at": generated_at,
            "generator": GENERATOR,
            "complete": result.is_complete(),
        },
    });
    if include_stats {
        output["statistics"] = serde_json::to_value(&result.statistics)?;
    }

    Ok(serde_json::to_string_pretty(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsAggregator;
    use crate::types::{ContentBody, ExclusionReason, FileContent, Inclusion, NodeKind};

    fn node(path: &str, kind: NodeKind, status: Inclusion, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: PathBuf::from(path),
            kind,
            status,
            children,
            size: 3,
            encoding: None,
        }
    }

    fn sample_result() -> WalkResult {
        let files = vec![
            node("README.md", NodeKind::File, Inclusion::Included, vec![]),
            node(
                "b.bin",
                NodeKind::File,
                Inclusion::Excluded(ExclusionReason::Binary),
                vec![],
            ),
            node(
                "deep",
                NodeKind::Directory,
                Inclusion::Excluded(ExclusionReason::Depth),
                vec![],
            ),
            node(
                "src",
                NodeKind::Directory,
                Inclusion::Included,
                vec![node("src/main.rs", NodeKind::File, Inclusion::Included, vec![])],
            ),
        ];
        let mut agg = StatsAggregator::new();
        for n in &files {
            agg.record(n);
        }
        agg.record(&files[3].children[0]);

        WalkResult {
            root: node("project", NodeKind::Directory, Inclusion::Included, files),
            contents: vec![
                FileContent {
                    path: PathBuf::from("README.md"),
                    body: ContentBody::Text("# Hello".into()),
                    size: 7,
                    encoding: None,
                },
                FileContent {
                    path: PathBuf::from("b.bin"),
                    body: ContentBody::Binary,
                    size: 3,
                    encoding: None,
                },
                FileContent {
                    path: PathBuf::from("src/main.rs"),
                    body: ContentBody::Text("fn main() {}".into()),
                    size: 12,
                    encoding: None,
                },
            ],
            statistics: agg.finalize(true),
            warnings: vec![],
        }
    }

    #[test]
    fn test_render_tree() {
        let result = sample_result();
        let tree = render_tree(&result.root);
        let expected = "project\n├── README.md\n├── deep/ [excluded: depth]\n└── src/\n    └── main.rs";
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_render_markdown_sections() {
        let result = sample_result();
        let md = render_markdown(&result, true, "2024-01-01 00:00:00");

        assert!(md.starts_with("# Project Overview"));
        assert!(md.contains("## README.md Content\n\n````markdown\n# Hello\n````"));
        assert!(md.contains("## Project Statistics"));
        assert!(md.contains("- binary: 1"));
        assert!(md.contains("### filepath src/main.rs\n\n```rust\nfn main() {}\n```"));
        assert!(!md.contains("### filepath README.md"));
        assert!(!md.contains("### filepath b.bin"));
        assert!(md.contains("Generated by dirdoc on 2024-01-01 00:00:00"));
    }

    #[test]
    fn test_collapsed_directories_are_noted() {
        let mut result = sample_result();
        let md = render_markdown(&result, true, "now");
        assert!(md.contains("- Included Directories: 1\n"));

        // A descended directory that was collapsed out of the tree
        result.statistics.total_dirs += 1;
        let md = render_markdown(&result, true, "now");
        assert!(md.contains(
            "- Included Directories: 2 (1 without included files, omitted from the structure)"
        ));
    }

    #[test]
    fn test_markdown_without_stats() {
        let md = render_markdown(&sample_result(), false, "now");
        assert!(!md.contains("## Project Statistics"));
    }

    #[test]
    fn test_fence_grows_past_content_backticks() {
        assert_eq!(fence_for("plain", 3), "```");
        assert_eq!(fence_for("has ``` inside", 3), "````");
        assert_eq!(fence_for("has ````` inside", 4), "``````");
    }

    #[test]
    fn test_render_json() {
        let result = sample_result();
        let rendered = render_json(&result, true, "2024-01-01T00:00:00Z").unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["project_overview"]["readme"], "# Hello");
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
        assert_eq!(value["skipped_files"][0]["reason"], "binary — not extracted");
        assert_eq!(value["statistics"]["total_files"], 2);
        assert_eq!(value["statistics"]["excluded"]["depth"]["count"], 1);
        assert_eq!(value["metadata"]["complete"], true);
    }
}
