/*!
 * Utility functions for dirdoc
 */

use std::path::Path;

use once_cell::sync::Lazy;

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Fenced code block language tag for a file
pub fn language_tag(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" | "cxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "sql" => "sql",
        "sh" | "bash" => "bash",
        "md" | "markdown" => "markdown",
        "json" => "json",
        "xml" => "xml",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => "",
    }
}

/// Directories excluded unless `--no-default-excludes` is given
pub static DEFAULT_EXCLUDE_DIRS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        // Version Control
        ".git",
        ".svn",
        ".hg",
        ".bzr",
        // Dependencies
        "node_modules",
        "bower_components",
        ".npm",
        ".yarn",
        ".pnpm-store",
        // Python
        "__pycache__",
        ".pytest_cache",
        ".mypy_cache",
        ".venv",
        "venv",
        "*.egg-info",
        // Rust
        "target",
        // IDEs & Editors
        ".idea",
        ".vscode",
        ".vs",
        // Caches & Build
        ".cache",
        ".gradle",
        ".next",
        ".nuxt",
        ".terraform",
        "coverage",
        ".nyc_output",
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 bytes");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(1_572_864), "1.50 MB");
        assert_eq!(format_file_size(1_073_741_824), "1.00 GB");
    }

    #[test]
    fn test_language_tag() {
        assert_eq!(language_tag(Path::new("src/main.rs")), "rust");
        assert_eq!(language_tag(Path::new("README.MD")), "markdown");
        assert_eq!(language_tag(Path::new("Makefile")), "");
    }
}
