/*!
 * dirdoc - Consolidate a directory tree into a single document for LLM context
 *
 * This library walks a directory, decides per entry whether it belongs in the
 * output (patterns, depth, size, binary detection), gathers statistics, and
 * renders the result as Markdown or JSON.
 */

pub mod classifier;
pub mod config;
pub mod error;
pub mod matcher;
pub mod report;
pub mod stats;
pub mod types;
pub mod utils;
pub mod walker;
pub mod writer;


// Re-export main components for easier access
pub use config::{Config, OutputFormat};
pub use error::{Error, Result};
pub use matcher::{PatternMatcher, PatternSet};
pub use report::{ReportFormat, Reporter, ScanReport};
pub use stats::{Statistics, StatsAggregator, Tally};
pub use types::{
    ContentBody, ExclusionReason, FileContent, Inclusion, NodeKind, TextEncoding, TreeNode,
    WalkResult, WalkWarning, WarningKind,
};
pub use utils::format_file_size;
pub use walker::{walk, NoopObserver, WalkLimits, WalkObserver, Walker};
pub use writer::DocumentWriter;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
