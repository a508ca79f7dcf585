/*!
 * Configuration handling for dirdoc
 *
 * Values come from three layers: built-in defaults, an optional TOML file,
 * and command-line arguments. Scalar CLI values override the file; CLI
 * patterns extend it.
 */

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use clap_complete::Shell;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::matcher::PatternSet;
use crate::utils::DEFAULT_EXCLUDE_DIRS;
use crate::walker::{WalkLimits, DEFAULT_MAX_DEPTH};

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown document (default)
    #[default]
    Markdown,
    /// Pretty-printed JSON
    Json,
}

/// Command-line arguments for dirdoc
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    name = "dirdoc",
    version = env!("CARGO_PKG_VERSION"),
    about = "Consolidate a directory tree into a single Markdown or JSON document",
    long_about = "Walks a directory (for example a cloned repository), filters it with include/exclude patterns, depth and size limits, and writes its structure, statistics and text file contents into one document suitable as LLM context."
)]
pub struct Args {
    /// Target directory to process
    #[clap(default_value = ".")]
    pub directory_path: String,

    /// Output file name
    #[clap(default_value = "project_summary.md")]
    pub output_file: String,

    /// TOML configuration file
    #[clap(long, value_name = "FILE")]
    pub config: Option<String>,

    /// Comma-separated file patterns to include (if specified, only matching files are included)
    #[clap(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Comma-separated file patterns to exclude
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Comma-separated directory patterns to include
    #[clap(long, value_delimiter = ',')]
    pub include_dirs: Vec<String>,

    /// Comma-separated directory patterns to exclude (pruned entirely)
    #[clap(long, value_delimiter = ',')]
    pub exclude_dirs: Vec<String>,

    /// Maximum traversal depth (0 = only the root's direct children)
    #[clap(long)]
    pub max_depth: Option<usize>,

    /// Maximum file size to extract, e.g. 512KB or 1MB
    #[clap(long)]
    pub max_file_size: Option<String>,

    /// Keep directories that end up with no included files
    #[clap(long)]
    pub no_collapse: bool,

    /// Output format
    #[clap(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Leave the statistics section out of the document
    #[clap(long)]
    pub no_stats: bool,

    /// Do not apply the root .gitignore
    #[clap(long)]
    pub no_gitignore: bool,

    /// Additional ignore file in gitignore syntax
    #[clap(long)]
    pub gitignore_path: Option<String>,

    /// Do not exclude common dependency and build directories
    #[clap(long)]
    pub no_default_excludes: bool,

    /// Number of threads to use for processing
    #[clap(long, default_value = "4")]
    pub threads: usize,

    /// Enable debug logging on stderr
    #[clap(long, short)]
    pub verbose: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// `[general]` table of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralSection {
    pub max_depth: Option<usize>,
    pub max_file_size: Option<String>,
    pub collapse_empty_dirs: Option<bool>,
    pub stats_in_output: Option<bool>,
}

/// `[output]` table of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub format: Option<OutputFormat>,
}

/// `[include]` / `[exclude]` tables of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathPatterns {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

/// Parsed TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub general: GeneralSection,
    pub output: OutputSection,
    pub include: PathPatterns,
    pub exclude: PathPatterns,
}

impl FileConfig {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::access(path, e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Target directory to process
    pub target_dir: PathBuf,

    /// Output file path
    pub output_file: PathBuf,

    pub format: OutputFormat,

    /// File patterns to include (if empty, include all)
    pub include_files: Vec<String>,

    /// Directory patterns to include
    pub include_dirs: Vec<String>,

    /// File patterns to exclude
    pub exclude_files: Vec<String>,

    /// Directory patterns to exclude
    pub exclude_dirs: Vec<String>,

    pub max_depth: usize,

    /// Size cap in bytes
    pub max_file_size: u64,

    pub collapse_empty_dirs: bool,

    /// Whether to include the statistics section in the document
    pub stats_in_output: bool,

    /// Whether to respect the root .gitignore
    pub respect_gitignore: bool,

    /// Path to custom ignore file
    pub gitignore_path: Option<PathBuf>,

    /// Number of threads to use for processing
    pub num_threads: usize,

    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            output_file: PathBuf::from("project_summary.md"),
            format: OutputFormat::Markdown,
            include_files: Vec::new(),
            include_dirs: Vec::new(),
            exclude_files: Vec::new(),
            exclude_dirs: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_file_size: crate::walker::DEFAULT_MAX_FILE_SIZE,
            collapse_empty_dirs: true,
            stats_in_output: true,
            respect_gitignore: true,
            gitignore_path: None,
            num_threads: 4,
            verbose: false,
        }
    }
}

impl Config {
    /// Create configuration from command-line arguments, reading the config
    /// file they point to
    pub fn from_args(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => Some(FileConfig::load(Path::new(path))?),
            None => None,
        };
        Self::from_parts(args, file)
    }

    /// Merge defaults, an optional parsed config file, and CLI arguments
    pub fn from_parts(args: Args, file: Option<FileConfig>) -> Result<Self> {
        let mut config = Config::default();

        if !args.no_default_excludes {
            config.exclude_dirs = DEFAULT_EXCLUDE_DIRS
                .iter()
                .map(|p| p.to_string())
                .collect();
        }

        if let Some(file) = file {
            config.apply_file(file)?;
        }

        config.target_dir = PathBuf::from(&args.directory_path);
        config.output_file = PathBuf::from(&args.output_file);
        config.include_files.extend(args.include);
        config.exclude_files.extend(args.exclude);
        config.include_dirs.extend(args.include_dirs);
        config.exclude_dirs.extend(args.exclude_dirs);

        if let Some(depth) = args.max_depth {
            config.max_depth = depth;
        }
        if let Some(size) = &args.max_file_size {
            config.max_file_size = parse_size(size)?;
        }
        if args.no_collapse {
            config.collapse_empty_dirs = false;
        }
        if let Some(format) = args.format {
            config.format = format;
        }
        if args.no_stats {
            config.stats_in_output = false;
        }
        if args.no_gitignore {
            config.respect_gitignore = false;
        }
        config.gitignore_path = args.gitignore_path.map(PathBuf::from);
        config.num_threads = args.threads;
        config.verbose = args.verbose;

        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<()> {
        let general = file.general;
        if let Some(depth) = general.max_depth {
            self.max_depth = depth;
        }
        if let Some(size) = &general.max_file_size {
            self.max_file_size = parse_size(size)?;
        }
        if let Some(collapse) = general.collapse_empty_dirs {
            self.collapse_empty_dirs = collapse;
        }
        if let Some(stats) = general.stats_in_output {
            self.stats_in_output = stats;
        }
        if let Some(format) = file.output.format {
            self.format = format;
        }
        self.include_files.extend(file.include.files);
        self.include_dirs.extend(file.include.dirs);
        self.exclude_files.extend(file.exclude.files);
        self.exclude_dirs.extend(file.exclude.dirs);
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        crate::ensure!(
            self.max_file_size > 0,
            Config,
            "max_file_size must be greater than 0"
        );
        crate::ensure!(self.num_threads > 0, Config, "threads must be greater than 0");

        if !self.target_dir.exists() || !self.target_dir.is_dir() {
            crate::bail!(
                Config,
                "Target directory not found: {}",
                self.target_dir.display()
            );
        }

        // Check if output file directory exists
        if let Some(parent) = self.output_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                crate::bail!(Config, "Output directory not found: {}", parent.display());
            }
        }

        if let Some(path) = &self.gitignore_path {
            if !path.exists() {
                crate::bail!(
                    Config,
                    "Custom ignore file not found: {}",
                    path.display()
                );
            }
        }

        Ok(())
    }

    /// Output file path relative to the target directory, if it lands inside it
    fn output_within_target(&self) -> Option<PathBuf> {
        let target = fs::canonicalize(&self.target_dir).ok()?;
        let name = self.output_file.file_name()?;
        let parent = match self.output_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent).ok()?,
            _ => std::env::current_dir().ok()?,
        };
        parent
            .join(name)
            .strip_prefix(&target)
            .ok()
            .map(Path::to_path_buf)
    }

    /// Pattern configuration for the walker.
    ///
    /// The output document is always excluded so reruns do not ingest it.
    pub fn pattern_set(&self) -> PatternSet {
        let mut exclude_files = self.exclude_files.clone();
        if let Some(output) = self.output_within_target() {
            exclude_files.push(globset::escape(&output.to_string_lossy()));
        }

        PatternSet {
            include_files: self.include_files.clone(),
            include_dirs: self.include_dirs.clone(),
            exclude_files,
            exclude_dirs: self.exclude_dirs.clone(),
            respect_gitignore: self.respect_gitignore,
            gitignore_path: self.gitignore_path.clone(),
        }
    }

    /// Validated walk limits
    pub fn walk_limits(&self) -> Result<WalkLimits> {
        WalkLimits::new(self.max_depth, self.max_file_size, self.collapse_empty_dirs)
    }
}

static SIZE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)\s*(\d+)\s*([kmg]?b)?\s*$").expect("size pattern is valid")
});

/// Parse a size such as `1MB`, `512 kb` or `2048` into bytes (1024-based)
pub fn parse_size(input: &str) -> Result<u64> {
    let caps = SIZE_RE
        .captures(input)
        .ok_or_else(|| crate::error!(Config, "Invalid size format: {}", input))?;

    let number: u64 = caps[1]
        .parse()
        .map_err(|_| crate::error!(Config, "Invalid size number: {}", input))?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        None => 1,
        Some(unit) => match unit.as_str() {
            "B" => 1,
            "KB" => 1024,
            "MB" => 1024 * 1024,
            "GB" => 1024 * 1024 * 1024,
            other => crate::bail!(Config, "Invalid size unit: {}", other),
        },
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| crate::error!(Config, "Size out of range: {}", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1MB").unwrap(), 1_048_576);
        assert_eq!(parse_size("512 kb").unwrap(), 524_288);
        assert_eq!(parse_size("10B").unwrap(), 10);
        assert_eq!(parse_size("2048").unwrap(), 2048);
        assert_eq!(parse_size("1GB").unwrap(), 1_073_741_824);
        assert!(parse_size("1TB").is_err());
        assert!(parse_size("big").is_err());
        assert!(parse_size("-1MB").is_err());
    }

    #[test]
    fn test_file_config_parse() {
        let file = FileConfig::parse(
            r#"
[general]
max_depth = 3
max_file_size = "256KB"
collapse_empty_dirs = false

[output]
format = "json"

[include]
files = ["*.rs", "*.md"]

[exclude]
dirs = ["tests"]
"#,
        )
        .unwrap();
        assert_eq!(file.general.max_depth, Some(3));
        assert_eq!(file.output.format, Some(OutputFormat::Json));
        assert_eq!(file.include.files, vec!["*.rs", "*.md"]);
        assert_eq!(file.exclude.dirs, vec!["tests"]);
        assert!(file.exclude.files.is_empty());
    }

    #[test]
    fn test_file_config_rejects_negative_depth() {
        let result = FileConfig::parse("[general]\nmax_depth = -1\n");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig::parse(
            "[general]\nmax_depth = 3\nmax_file_size = \"2KB\"\n[include]\nfiles = [\"*.rs\"]\n",
        )
        .unwrap();
        let args = Args {
            directory_path: ".".into(),
            output_file: "out.md".into(),
            include: vec!["*.md".into()],
            max_depth: Some(7),
            no_default_excludes: true,
            threads: 2,
            ..Default::default()
        };

        let config = Config::from_parts(args, Some(file)).unwrap();
        assert_eq!(config.max_depth, 7);
        assert_eq!(config.max_file_size, 2048);
        assert_eq!(config.include_files, vec!["*.rs", "*.md"]);
        assert!(config.exclude_dirs.is_empty());
        assert_eq!(config.num_threads, 2);
    }

    #[test]
    fn test_default_excludes_applied() {
        let args = Args {
            directory_path: ".".into(),
            output_file: "out.md".into(),
            threads: 1,
            ..Default::default()
        };
        let config = Config::from_parts(args, None).unwrap();
        assert!(config.exclude_dirs.iter().any(|d| d == ".git"));
        assert!(config.pattern_set().respect_gitignore);
    }

    #[test]
    fn test_output_file_is_excluded() {
        let dir = tempdir().unwrap();
        let config = Config {
            target_dir: dir.path().to_path_buf(),
            output_file: dir.path().join("docs").join("summary.md"),
            ..Default::default()
        };
        fs::create_dir(dir.path().join("docs")).unwrap();
        assert!(config
            .pattern_set()
            .exclude_files
            .contains(&"docs/summary.md".to_string()));

        let outside = tempdir().unwrap();
        let config = Config {
            target_dir: dir.path().to_path_buf(),
            output_file: outside.path().join("summary.md"),
            ..Default::default()
        };
        assert!(config.pattern_set().exclude_files.is_empty());
    }

    #[test]
    fn test_validate() {
        let dir = tempdir().unwrap();
        let mut config = Config {
            target_dir: dir.path().to_path_buf(),
            output_file: dir.path().join("out.md"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.max_file_size = 0;
        assert!(config.validate().is_err());
        assert!(config.walk_limits().is_err());

        config.max_file_size = 10;
        config.target_dir = dir.path().join("missing");
        assert!(config.validate().is_err());
    }
}
