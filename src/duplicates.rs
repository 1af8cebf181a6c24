use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use log::info;

use crate::context::ScanContext;
use crate::error::{DedupeError, Result};

/// Full-content fingerprint. The size is part of the key so that a hash
/// collision across sizes can never merge two sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub size: u64,
    pub hash: u64,
}

/// Files confirmed identical by full fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    pub fingerprint: Fingerprint,
    /// Oldest first once the set is part of a [`DuplicateReport`].
    pub files: Vec<PathBuf>,
}

impl DuplicateSet {
    /// The copy that is kept.
    pub fn original(&self) -> &Path {
        &self.files[0]
    }

    /// Every copy after the original.
    pub fn removal_candidates(&self) -> &[PathBuf] {
        &self.files[1..]
    }

    /// Bytes freed by removing every candidate.
    pub fn reclaimable(&self) -> u64 {
        self.fingerprint.size * self.files.len().saturating_sub(1) as u64
    }
}

/// Orders `files` by modification time, oldest first, keeping the relative
/// order of ties.
///
/// A file whose modification time cannot be read is reported to `ctx` and
/// sorted before every dated file, which makes it the kept original and
/// never a removal candidate.
pub fn order_by_mtime(files: &mut Vec<PathBuf>, ctx: &ScanContext) {
    let mut keyed: Vec<(Option<SystemTime>, PathBuf)> = files
        .drain(..)
        .map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified());
            match modified {
                Ok(time) => (Some(time), path),
                Err(e) => {
                    ctx.problem(format_args!("stat '{}': {}", path.display(), e));
                    (None, path)
                }
            }
        })
        .collect();
    keyed.sort_by_key(|(modified, _)| *modified);
    files.extend(keyed.into_iter().map(|(_, path)| path));
}

/// The confirmed duplicate sets of a scan, ready for reporting and removal.
#[derive(Debug, Clone, Default)]
pub struct DuplicateReport {
    sets: Vec<DuplicateSet>,
}

impl DuplicateReport {
    /// Drops sets with fewer than two members, orders each set oldest first
    /// and lists the sets by reclaimable space, largest first.
    pub fn new(sets: Vec<DuplicateSet>, ctx: &ScanContext) -> Self {
        let mut sets: Vec<DuplicateSet> = sets
            .into_iter()
            .filter(|set| set.files.len() > 1)
            .map(|mut set| {
                order_by_mtime(&mut set.files, ctx);
                set
            })
            .collect();
        sets.sort_by(|a, b| {
            b.reclaimable()
                .cmp(&a.reclaimable())
                .then_with(|| a.original().cmp(b.original()))
        });
        Self { sets }
    }

    pub fn sets(&self) -> &[DuplicateSet] {
        &self.sets
    }

    pub fn iter(&self) -> impl Iterator<Item = &DuplicateSet> {
        self.sets.iter()
    }

    /// Number of duplicate sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, fingerprint: Fingerprint) -> Option<&DuplicateSet> {
        self.sets.iter().find(|set| set.fingerprint == fingerprint)
    }

    pub fn removal_count(&self) -> usize {
        self.sets.iter().map(|set| set.removal_candidates().len()).sum()
    }

    pub fn reclaimable(&self) -> u64 {
        self.sets.iter().map(DuplicateSet::reclaimable).sum()
    }

    /// Writes every member of every set, one path per line, grouped by set.
    /// The file is created (or truncated) even when there are no sets.
    pub fn write_log(&self, log_path: &Path) -> Result<()> {
        let report_err = |source: std::io::Error| DedupeError::ReportWrite {
            path: log_path.to_path_buf(),
            source,
        };

        let file = File::create(log_path).map_err(report_err)?;
        let mut writer = BufWriter::new(file);
        for set in &self.sets {
            for path in &set.files {
                writeln!(writer, "{}", path.display()).map_err(report_err)?;
            }
        }
        writer.flush().map_err(report_err)?;

        info!(
            "Wrote {} paths to {}",
            HumanCount(self.sets.iter().map(|s| s.files.len() as u64).sum()),
            log_path.display()
        );
        Ok(())
    }

    /// Console summary. Paths are shown relative to `base_path` when possible.
    pub fn print_results(&self, base_path: &Path, log_path: &Path) {
        if self.sets.is_empty() {
            println!("\n{}", "No duplicates found.".green());
            return;
        }

        for set in &self.sets {
            info!(
                "Duplicate set ({}, {} files):",
                HumanBytes(set.fingerprint.size),
                set.files.len()
            );
            for (i, path) in set.files.iter().enumerate() {
                let shown = path.strip_prefix(base_path).unwrap_or(path);
                let marker = if i == 0 { "keep" } else { "dupe" };
                info!("  [{}] {}", marker, shown.display());
            }
        }

        println!(
            "\n{} {} duplicate files in {} sets wasting {}. See {} for a complete list.",
            "Duplicates found.".red().bold(),
            HumanCount(self.removal_count() as u64),
            HumanCount(self.sets.len() as u64),
            HumanBytes(self.reclaimable()),
            log_path.display().to_string().as_str().cyan()
        );
    }
}
