use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::HumanCount;
use log::{debug, info, warn};

use find_file_dups::logging::{ERROR_LOG, init_logging};
use find_file_dups::recycle::{Prompter, RECYCLE_LOG, TrashBin, recycle};
use find_file_dups::{
    Cli, Config, PipelineOptions, ScanContext, SpinnerProgress, find_duplicates,
    format_human_elapsed,
};

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    init_logging(cli.verbose, Path::new(ERROR_LOG)).context("Failed to initialize logging")?;
    info!("Starting find-file-dups v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command line arguments: {:?}", cli);

    let config = Config::load(&cli).context("Failed to load configuration")?;

    let ctx = ScanContext::new()
        .with_progress(Arc::new(SpinnerProgress::new()))
        .with_auto_yes(cli.yes);

    let defaults = PipelineOptions::default();
    let options = PipelineOptions {
        threads: cli.threads.unwrap_or(defaults.threads),
        verify_below: cli.verify_below,
        min_size: cli.min_size,
    };
    let (report, summary) = find_duplicates(&config, options, &ctx)?;
    debug!("Scan summary: {:?}", summary);

    report
        .write_log(&cli.log_file)
        .context("Failed to write the duplicate list")?;
    report.print_results(&config.root, &cli.log_file);

    if summary.problems > 0 {
        warn!(
            "{} entries could not be read, see {}",
            HumanCount(summary.problems as u64),
            ERROR_LOG
        );
    }
    println!(
        "Elapsed: {}",
        format_human_elapsed(start_time.elapsed()).as_str().bold()
    );

    if report.is_empty() {
        return Ok(());
    }

    // Ctrl-C kills the scan outright, but only stops the recycle step between files.
    let interrupted = ctx.interrupt_flag();
    ctrlc::set_handler(move || interrupted.store(true, Ordering::Relaxed))
        .context("Failed to install Ctrl-C handler")?;

    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout(), ctx.auto_yes());
    recycle(&report, &ctx, &mut prompter, &TrashBin, Path::new(RECYCLE_LOG))
        .context("Recycling failed")?;

    info!(
        "Program completed in {}",
        format_human_elapsed(start_time.elapsed())
    );
    Ok(())
}
