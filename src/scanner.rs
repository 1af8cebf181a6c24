use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, HumanCount};
use log::{debug, info};
use walkdir::WalkDir;

use crate::context::ScanContext;
use crate::error::DedupeError;
use crate::filter::{Decision, PathFilter};
use crate::utils::FileRecord;

const PROGRESS_PERIOD: Duration = Duration::from_millis(500);

/// Files recorded by the walk, keyed by exact byte count. Built once and
/// never mutated after the walk completes.
#[derive(Debug, Default)]
pub struct SizeGroups {
    groups: HashMap<u64, Vec<PathBuf>>,
    visited: usize,
    files: usize,
}

impl SizeGroups {
    fn record(&mut self, file: FileRecord) {
        self.files += 1;
        self.groups.entry(file.size).or_default().push(file.path);
    }

    /// Entries seen by the walk, including skipped ones.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Files recorded into a group.
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn get(&self, size: u64) -> Option<&[PathBuf]> {
        self.groups.get(&size).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[PathBuf])> {
        self.groups.iter().map(|(size, paths)| (*size, paths.as_slice()))
    }

    /// Groups with at least two members, the only ones that can hold duplicates.
    pub fn candidates(&self) -> impl Iterator<Item = (u64, &[PathBuf])> {
        self.iter().filter(|(_, paths)| paths.len() > 1)
    }

    pub fn candidate_files(&self) -> usize {
        self.candidates().map(|(_, paths)| paths.len()).sum()
    }
}

/// Walks `root` once and groups every recorded regular file by size.
///
/// Entries the walker cannot read are reported to `ctx` and skipped.
/// Symlinks and other non-regular files are never recorded.
pub fn group_by_size(
    root: &Path,
    filter: &PathFilter,
    min_size: u64,
    ctx: &ScanContext,
) -> SizeGroups {
    info!("Scanning \"{}\" …", root.display());

    let mut groups = SizeGroups::default();
    let mut total_size = 0u64;
    let mut last_update = Instant::now();
    let mut walker = WalkDir::new(root).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                ctx.problem(format_args!(
                    "{}",
                    DedupeError::Traversal {
                        path,
                        message: e.to_string(),
                    }
                ));
                continue;
            }
        };

        groups.visited += 1;
        if last_update.elapsed() > PROGRESS_PERIOD {
            if let Some(progress) = ctx.progress() {
                progress.on_walk(groups.visited, entry.path());
            }
            last_update = Instant::now();
        }

        let file_type = entry.file_type();
        match filter.decide(entry.path(), file_type.is_dir()) {
            Decision::SkipSubtree => {
                debug!("Skipping directory: '{}'", entry.path().display());
                if file_type.is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }
            Decision::SkipEntry => {
                debug!("Skipping file: '{}'", entry.path().display());
                continue;
            }
            Decision::Descend => {}
        }

        if !file_type.is_file() {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                ctx.problem(format_args!(
                    "{}",
                    DedupeError::Traversal {
                        path: entry.path().to_path_buf(),
                        message: e.to_string(),
                    }
                ));
                continue;
            }
        };
        if size < min_size {
            continue;
        }

        total_size += size;
        groups.record(FileRecord::new(entry.into_path(), size));
    }

    info!(
        "Found {} files in {} entries ({}), {} share a size with another file",
        HumanCount(groups.files as u64),
        HumanCount(groups.visited as u64),
        HumanBytes(total_size),
        HumanCount(groups.candidate_files() as u64)
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::IgnoreConfig;
    use std::fs;
    use tempfile::TempDir;

    fn ignore(dirs: &[&str], exts: &[&str]) -> PathFilter {
        PathFilter::new(IgnoreConfig::from_raw(
            dirs.iter().map(|s| s.to_string()),
            exts.iter().map(|s| s.to_string()),
            Vec::new(),
            Path::new("/"),
        ))
    }

    #[test]
    fn test_distinct_sizes_never_share_a_group() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), vec![b'x'; 20]).unwrap();
        fs::write(dir.path().join("b.txt"), vec![b'x'; 21]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), vec![b'y'; 20]).unwrap();

        let groups = group_by_size(dir.path(), &PathFilter::default(), 0, &ScanContext::new());
        assert_eq!(groups.file_count(), 3);
        assert_eq!(groups.get(20).map(<[PathBuf]>::len), Some(2));
        assert_eq!(groups.get(21).map(<[PathBuf]>::len), Some(1));
        assert_eq!(groups.candidates().count(), 1);
        assert_eq!(groups.candidate_files(), 2);
    }

    #[test]
    fn test_ignored_extension_not_recorded() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.tmp"), b"same").unwrap();
        fs::write(dir.path().join("y.TMP"), b"same").unwrap();
        fs::write(dir.path().join("z.txt"), b"same").unwrap();

        let groups = group_by_size(dir.path(), &ignore(&[], &["tmp"]), 0, &ScanContext::new());
        assert_eq!(groups.file_count(), 1);
        assert_eq!(groups.candidates().count(), 0);
    }

    #[test]
    fn test_ignored_directory_not_descended() {
        let dir = TempDir::new().unwrap();
        let nm = dir.path().join("node_modules/pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("index.js"), b"module").unwrap();
        fs::write(dir.path().join("index.js"), b"module").unwrap();

        let groups = group_by_size(
            dir.path(),
            &ignore(&["node_modules"], &[]),
            0,
            &ScanContext::new(),
        );
        assert_eq!(groups.file_count(), 1);
        // root, node_modules and index.js; the subtree is never entered
        assert_eq!(groups.visited(), 3);
    }

    #[test]
    fn test_min_size_skips_small_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("small"), b"ab").unwrap();
        fs::write(dir.path().join("large"), vec![0u8; 100]).unwrap();

        let groups = group_by_size(dir.path(), &PathFilter::default(), 10, &ScanContext::new());
        assert_eq!(groups.file_count(), 1);
        assert!(groups.get(2).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"pair").unwrap();
        fs::write(dir.path().join("b.txt"), b"pair").unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("c.txt"), b"pair").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores permission bits, so only assert when the lock holds
        let lock_holds = fs::read_dir(&locked).is_err();
        let ctx = ScanContext::new();
        let groups = group_by_size(dir.path(), &PathFilter::default(), 0, &ctx);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if !lock_holds {
            return;
        }

        assert_eq!(ctx.problem_count(), 1);
        assert_eq!(groups.file_count(), 2);
        assert_eq!(groups.get(4).map(<[PathBuf]>::len), Some(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_recorded() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target.txt");
        fs::write(&target, b"content").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let groups = group_by_size(dir.path(), &PathFilter::default(), 0, &ScanContext::new());
        assert_eq!(groups.file_count(), 1);
    }
}
