/*!
 * Command-line interface for dirdoc
 */

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use tracing::{warn, Level};

use dirdoc::config::{Args, Config};
use dirdoc::error::Result;
use dirdoc::report::{ReportFormat, Reporter, ScanReport};
use dirdoc::types::{TreeNode, WalkWarning};
use dirdoc::walker::{WalkObserver, Walker};
use dirdoc::writer::DocumentWriter;

/// Drives the spinner from walk decisions
struct ProgressObserver {
    progress: ProgressBar,
    included: AtomicU64,
    warnings: AtomicU64,
}

impl ProgressObserver {
    fn new(progress: ProgressBar) -> Self {
        Self {
            progress,
            included: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
        }
    }
}

impl WalkObserver for ProgressObserver {
    fn on_decision(&self, node: &TreeNode) {
        self.progress.inc(1);
        if !node.is_dir() && node.is_included() {
            self.included.fetch_add(1, Ordering::Relaxed);
        }
        self.progress.set_message(format!(
            "{} included, {} warnings · {}",
            self.included.load(Ordering::Relaxed),
            self.warnings.load(Ordering::Relaxed),
            node.path.display()
        ));
    }

    fn on_warning(&self, _warning: &WalkWarning) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if let Some(shell) = args.generate {
        let mut command = Args::command();
        clap_complete::generate(shell, &mut command, "dirdoc", &mut io::stdout());
        return Ok(());
    }

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    // Create and validate configuration
    let config = Config::from_args(args)?;
    config.validate()?;

    // Configure thread pool
    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()
    {
        warn!("Failed to set thread pool size: {}", e);
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template(
        "{spinner:.green} {prefix:.bold.cyan} {pos} entries {wide_msg:.dim.white} ⏱️  {elapsed_precise}",
    ) {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress.set_prefix("📂 Walking");
    progress.set_message(config.target_dir.display().to_string());

    let observer = Arc::new(ProgressObserver::new(progress.clone()));
    let walker = Walker::new(config.pattern_set(), config.walk_limits()?).with_observer(observer);
    let writer = DocumentWriter::new(&config);

    // Time both walk and write
    let start_time = Instant::now();

    let result = walker.walk(&config.target_dir)?;

    progress.set_prefix("📝 Writing");
    writer.write(&result)?;

    let total_duration = start_time.elapsed();
    progress.finish_and_clear();

    let scan_report = ScanReport::new(
        config.output_file.display().to_string(),
        total_duration,
        &result,
    );
    let reporter = Reporter::new(ReportFormat::ConsoleTable);
    reporter.print_report(&scan_report);

    Ok(())
}
