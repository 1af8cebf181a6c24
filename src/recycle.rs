//! Confirmation prompts and moving removal candidates to the trash.

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::Path;

use colored::Colorize;
use indicatif::HumanBytes;
use log::{info, warn};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::context::ScanContext;
use crate::duplicates::DuplicateReport;
use crate::error::{DedupeError, Result};

pub const RECYCLE_LOG: &str = "recycled.log";

/// Yes/no questions on a line-based terminal.
///
/// Strict questions repeat until the answer starts with `y` or `n`; lenient
/// ones take anything else as no. End of input always answers no.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    auto_yes: bool,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W, auto_yes: bool) -> Self {
        Self {
            input,
            output,
            auto_yes,
        }
    }

    pub fn ask_strict(&mut self, question: &str) -> io::Result<bool> {
        self.ask(question, true)
    }

    pub fn ask(&mut self, question: &str, strict: bool) -> io::Result<bool> {
        if self.auto_yes {
            return Ok(true);
        }
        loop {
            write!(
                self.output,
                "{} [{}/{}] ",
                question,
                "y".cyan(),
                "n".cyan()
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(false);
            }
            match line.trim_start().chars().next() {
                Some('y' | 'Y') => return Ok(true),
                Some('n' | 'N') => return Ok(false),
                _ if strict => continue,
                _ => return Ok(false),
            }
        }
    }

    pub fn say(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }
}

/// Where removed copies go.
pub trait Disposer {
    fn dispose(&self, path: &Path) -> Result<()>;
}

/// Moves files to the platform trash or recycle bin.
pub struct TrashBin;

impl Disposer for TrashBin {
    fn dispose(&self, path: &Path) -> Result<()> {
        trash::delete(path).map_err(|e| DedupeError::Recycle {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecycleSummary {
    pub recycled: usize,
    pub failed: usize,
    pub skipped_sets: usize,
    pub bytes: u64,
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]/[month]/[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Asks once for the whole run, then once per set, and disposes of every
/// removal candidate the user accepts. Each disposed path is appended to
/// `recycle_log`. Per-file failures are reported to `ctx` and skipped.
pub fn recycle<R: BufRead, W: Write>(
    report: &DuplicateReport,
    ctx: &ScanContext,
    prompter: &mut Prompter<R, W>,
    disposer: &dyn Disposer,
    recycle_log: &Path,
) -> Result<RecycleSummary> {
    let mut summary = RecycleSummary::default();
    if report.is_empty() || !prompter.ask_strict("Should I recycle the duplicates?")? {
        return Ok(summary);
    }

    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(recycle_log)
        .map_err(|source| DedupeError::ReportWrite {
            path: recycle_log.to_path_buf(),
            source,
        })?;

    'sets: for set in report.iter() {
        if ctx.is_interrupted() {
            warn!("Interrupted, leaving the remaining sets untouched");
            break;
        }

        let listing: Vec<String> = set
            .removal_candidates()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        prompter.say(format!("\n{}", listing.join("\n\t")))?;
        if !prompter.ask("Going to recycle this files, are you sure?", false)? {
            prompter.say("File set skipped!".red())?;
            summary.skipped_sets += 1;
            continue;
        }

        for path in set.removal_candidates() {
            if ctx.is_interrupted() {
                warn!("Interrupted, leaving the remaining files untouched");
                break 'sets;
            }
            prompter.say(format!("Recycling '{}'", path.display()))?;
            match disposer.dispose(path) {
                Ok(()) => {
                    summary.recycled += 1;
                    summary.bytes += set.fingerprint.size;
                    if let Err(e) = writeln!(log, "{} {}", timestamp(), path.display()) {
                        ctx.problem(format_args!("{}: {}", recycle_log.display(), e));
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    ctx.problem(format_args!("{e}"));
                }
            }
        }
    }

    info!(
        "Recycled {} files ({}), {} failed, {} sets skipped",
        summary.recycled,
        HumanBytes(summary.bytes),
        summary.failed,
        summary.skipped_sets
    );
    Ok(summary)
}
