//! The hashing funnel run over the size groups produced by the walk.
//!
//! Size groups are processed one after another. Inside a group every file is
//! sample-hashed in parallel; once all samples have landed, every file whose
//! sample collided is fully hashed in parallel. All work runs on one rayon
//! pool whose width caps the number of files open at any moment.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use indicatif::HumanCount;
use log::{debug, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::Config;
use crate::context::ScanContext;
use crate::duplicates::{DuplicateReport, DuplicateSet, Fingerprint};
use crate::error::{DedupeError, Result};
use crate::filter::PathFilter;
use crate::hasher::{files_equal, full_hash, sample_hash};
use crate::scanner::{SizeGroups, group_by_size};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Concurrency limit shared by every stage.
    pub threads: usize,
    /// Sets whose files are smaller than this are also compared byte for
    /// byte. Zero disables the check.
    pub verify_below: u64,
    /// Files smaller than this are not recorded by the walk.
    pub min_size: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            verify_below: 0,
            min_size: 0,
        }
    }
}

/// Work counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub size_groups: usize,
    pub sample_hashed: usize,
    pub full_hashed: usize,
    pub byte_compared: usize,
}

/// Totals for a complete scan, for the closing summary and exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub visited: usize,
    pub files: usize,
    pub size_candidates: usize,
    pub pipeline: PipelineStats,
    pub problems: usize,
    pub duplicate_sets: usize,
    pub reclaimable: u64,
}

/// Walks `config.root`, runs the hashing funnel and builds the report.
pub fn find_duplicates(
    config: &Config,
    options: PipelineOptions,
    ctx: &ScanContext,
) -> Result<(DuplicateReport, ScanSummary)> {
    let filter = PathFilter::new(config.ignore.clone());
    let pipeline = ScanPipeline::new(ctx, options)?;

    let groups = group_by_size(&config.root, &filter, pipeline.options.min_size, ctx);
    let (sets, stats) = pipeline.run(&groups);
    if let Some(progress) = ctx.progress() {
        progress.finish();
    }
    let report = DuplicateReport::new(sets, ctx);

    let summary = ScanSummary {
        visited: groups.visited(),
        files: groups.file_count(),
        size_candidates: groups.candidate_files(),
        pipeline: stats,
        problems: ctx.problem_count(),
        duplicate_sets: report.len(),
        reclaimable: report.reclaimable(),
    };
    Ok((report, summary))
}

type SampleGroup = HashMap<u64, Vec<PathBuf>>;

pub struct ScanPipeline<'a> {
    ctx: &'a ScanContext,
    pool: ThreadPool,
    options: PipelineOptions,
    sample_hashed: AtomicUsize,
    full_hashed: AtomicUsize,
    byte_compared: AtomicUsize,
}

impl<'a> ScanPipeline<'a> {
    pub fn new(ctx: &'a ScanContext, options: PipelineOptions) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.threads.max(1))
            .thread_name(|i| format!("hasher-{i}"))
            .build()?;
        Ok(Self {
            ctx,
            pool,
            options,
            sample_hashed: AtomicUsize::new(0),
            full_hashed: AtomicUsize::new(0),
            byte_compared: AtomicUsize::new(0),
        })
    }

    /// Runs stages B and C over every candidate size group and returns the
    /// confirmed sets, each with at least two members. Member order is
    /// completion order and carries no meaning.
    pub fn run(&self, groups: &SizeGroups) -> (Vec<DuplicateSet>, PipelineStats) {
        let duplicates: Mutex<HashMap<Fingerprint, Vec<PathBuf>>> = Mutex::new(HashMap::new());

        let mut candidates: Vec<_> = groups.candidates().collect();
        candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        let total = candidates.len();
        info!(
            "Hashing {} size groups on {} threads",
            HumanCount(total as u64),
            self.pool.current_num_threads()
        );

        for (done, (size, paths)) in candidates.into_iter().enumerate() {
            let samples = self.sample_stage(paths);

            let collided: Vec<&PathBuf> = samples
                .values()
                .filter(|group| group.len() > 1)
                .flatten()
                .collect();
            if !collided.is_empty() {
                self.full_stage(size, &collided, &duplicates);
            }

            if let Some(progress) = self.ctx.progress() {
                progress.on_group_done(done + 1, total);
            }
        }

        let mut sets: Vec<DuplicateSet> = duplicates
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .filter(|(_, files)| files.len() > 1)
            .map(|(fingerprint, files)| DuplicateSet { fingerprint, files })
            .collect();

        if self.options.verify_below > 0 {
            sets = self.verify_stage(sets);
        }

        let stats = PipelineStats {
            size_groups: total,
            sample_hashed: self.sample_hashed.load(Ordering::Relaxed),
            full_hashed: self.full_hashed.load(Ordering::Relaxed),
            byte_compared: self.byte_compared.load(Ordering::Relaxed),
        };
        info!(
            "Sample-hashed {} files, fully hashed {}, {} duplicate sets",
            HumanCount(stats.sample_hashed as u64),
            HumanCount(stats.full_hashed as u64),
            HumanCount(sets.len() as u64)
        );
        (sets, stats)
    }

    /// Stage B: one unit of work per file; returns once every unit is done.
    fn sample_stage(&self, paths: &[PathBuf]) -> SampleGroup {
        let samples: Mutex<SampleGroup> = Mutex::new(HashMap::new());

        self.pool.install(|| {
            paths.par_iter().for_each(|path| match sample_hash(path) {
                Ok(hash) => {
                    self.sample_hashed.fetch_add(1, Ordering::Relaxed);
                    samples
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(hash)
                        .or_default()
                        .push(path.clone());
                }
                Err(e) => self.ctx.problem(format_args!("sample hash: {e}")),
            });
        });

        samples.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage C: full hashes for every file whose sample collided.
    fn full_stage(
        &self,
        size: u64,
        paths: &[&PathBuf],
        duplicates: &Mutex<HashMap<Fingerprint, Vec<PathBuf>>>,
    ) {
        debug!("Fully hashing {} files of {} bytes", paths.len(), size);

        self.pool.install(|| {
            paths.par_iter().for_each(|path| match full_hash(path) {
                Ok(hash) => {
                    self.full_hashed.fetch_add(1, Ordering::Relaxed);
                    duplicates
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(Fingerprint { size, hash })
                        .or_default()
                        .push((*path).clone());
                }
                Err(e) => self.ctx.problem(format_args!("full hash: {e}")),
            });
        });
    }

    /// Splits sets of small files into byte-identical subsets.
    fn verify_stage(&self, sets: Vec<DuplicateSet>) -> Vec<DuplicateSet> {
        let limit = self.options.verify_below;
        self.pool.install(|| {
            sets.into_par_iter()
                .flat_map_iter(|set| {
                    if set.fingerprint.size >= limit {
                        return vec![set];
                    }
                    let fingerprint = set.fingerprint;
                    self.split_identical(set.files)
                        .into_iter()
                        .filter(|files| files.len() > 1)
                        .map(|files| DuplicateSet { fingerprint, files })
                        .collect()
                })
                .collect()
        })
    }

    fn split_identical(&self, files: Vec<PathBuf>) -> Vec<Vec<PathBuf>> {
        let mut buckets: Vec<Vec<PathBuf>> = Vec::new();

        'files: for path in files {
            let mut i = 0;
            while i < buckets.len() {
                self.byte_compared.fetch_add(1, Ordering::Relaxed);
                match files_equal(&buckets[i][0], &path) {
                    Ok(true) => {
                        buckets[i].push(path);
                        continue 'files;
                    }
                    Ok(false) => i += 1,
                    Err(e) => {
                        self.ctx.problem(format_args!("byte compare: {e}"));
                        match &e {
                            // Members matched the head, so the next one stands in for it.
                            DedupeError::Read { path: failed, .. } if *failed == buckets[i][0] => {
                                buckets[i].remove(0);
                                if buckets[i].is_empty() {
                                    buckets.remove(i);
                                }
                            }
                            _ => continue 'files,
                        }
                    }
                }
            }
            buckets.push(vec![path]);
        }

        if buckets.len() > 1 {
            info!(
                "Byte comparison split a {}-member fingerprint collision into {} sets",
                buckets.iter().map(Vec::len).sum::<usize>(),
                buckets.len()
            );
        }
        buckets
    }
}
