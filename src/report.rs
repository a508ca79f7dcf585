/*!
 * Reporting functionality for dirdoc
 *
 * Prints a console summary of a finished walk using the tabled library.
 */

use std::time::Duration;

use strum::IntoEnumIterator;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::stats::Statistics;
use crate::types::{ExclusionReason, WalkResult};
use crate::utils::format_file_size;

/// Extension rows shown before the table is cut down
const MAX_EXTENSION_ROWS: usize = 15;

/// Summary of one run
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Output file path
    pub output_file: String,
    /// Time taken to walk and write
    pub duration: Duration,
    pub statistics: Statistics,
    /// Number of per-entry failures
    pub warnings: usize,
}

impl ScanReport {
    pub fn new(output_file: impl Into<String>, duration: Duration, result: &WalkResult) -> Self {
        Self {
            output_file: output_file.into(),
            duration,
            statistics: result.statistics.clone(),
            warnings: result.warnings.len(),
        }
    }
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator for scan results
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Generate a report string
    pub fn generate_report(&self, report: &ScanReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.generate_console_report(report),
        }
    }

    /// Print the report to stdout
    pub fn print_report(&self, report: &ScanReport) {
        println!("\n{}", self.generate_report(report));
    }

    fn create_summary_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let stats = &report.statistics;
        let mut rows = vec![
            SummaryRow {
                key: "📂 Output File".to_string(),
                value: report.output_file.clone(),
            },
            SummaryRow {
                key: "⏱️ Process Time".to_string(),
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "📄 Files Included".to_string(),
                value: self.format_number(stats.total_files),
            },
            SummaryRow {
                key: "📁 Directories Included".to_string(),
                value: self.format_number(stats.total_dirs),
            },
            SummaryRow {
                key: "📦 Total Size".to_string(),
                value: format_file_size(stats.total_bytes),
            },
        ];

        for reason in ExclusionReason::iter() {
            let count = stats.excluded_count(reason);
            if count > 0 {
                rows.push(SummaryRow {
                    key: format!("🚫 Excluded ({})", reason),
                    value: self.format_number(count),
                });
            }
        }

        if report.warnings > 0 {
            rows.push(SummaryRow {
                key: "⚠️ Warnings".to_string(),
                value: self.format_number(report.warnings),
            });
        }
        if !stats.complete {
            rows.push(SummaryRow {
                key: "⛔ Status".to_string(),
                value: "cancelled (partial result)".to_string(),
            });
        }

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    fn create_extension_table(&self, report: &ScanReport) -> String {
        #[derive(Tabled)]
        struct ExtensionRow {
            #[tabled(rename = "Extension")]
            extension: String,

            #[tabled(rename = "Files")]
            files: String,

            #[tabled(rename = "Size")]
            size: String,
        }

        // Largest extensions first
        let mut extensions: Vec<_> = report.statistics.by_extension.iter().collect();
        extensions.sort_by(|(ea, a), (eb, b)| b.bytes.cmp(&a.bytes).then_with(|| ea.cmp(eb)));

        let shown = if extensions.len() > MAX_EXTENSION_ROWS {
            &extensions[..10]
        } else {
            &extensions[..]
        };

        let rows: Vec<ExtensionRow> = shown
            .iter()
            .map(|(ext, tally)| ExtensionRow {
                extension: ext.to_string(),
                files: self.format_number(tally.count),
                size: format_file_size(tally.bytes),
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    fn generate_console_report(&self, report: &ScanReport) -> String {
        let extension_title = if report.statistics.by_extension.len() > MAX_EXTENSION_ROWS {
            "📋  TOP 10 FILE TYPES BY SIZE"
        } else {
            "📋  FILE TYPES"
        };
        let summary_title = if report.statistics.complete {
            "✅  EXTRACTION COMPLETE"
        } else {
            "⚠️  EXTRACTION INCOMPLETE"
        };

        format!(
            "{}\n{}\n\n{}\n{}",
            extension_title,
            self.create_extension_table(report),
            summary_title,
            self.create_summary_table(report)
        )
    }
}
