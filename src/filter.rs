//! Entry filtering for the directory walk.
//!
//! Ignore paths are compared as case-folded, lexically cleaned absolute
//! strings. Case folding is applied on every host, so on case-sensitive
//! filesystems an ignore entry also matches siblings that differ only in case.

use std::collections::HashSet;
use std::env;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, info};
use regex::{Captures, Regex};

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)|%([^%]+)%")
        .expect("env reference pattern is valid")
});

/// What the walker should do with one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Record the file, or walk into the directory.
    Descend,
    /// Do not record this file.
    SkipEntry,
    /// Do not record this directory and do not walk into it.
    SkipSubtree,
}

/// Expands `$VAR`, `${VAR}` and `%VAR%` references. Unset variables expand
/// to the empty string.
pub fn expand_env(raw: &str) -> String {
    ENV_REFERENCE
        .replace_all(raw, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Resolves `path` against `base` when relative and collapses `.`, `..` and
/// repeated separators without touching the filesystem.
pub fn normalize_path(path: &Path, base: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !matches!(
                    cleaned.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    cleaned.pop();
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Comparison key for a normalized path: host separators, lowercase.
pub fn fold_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    #[cfg(windows)]
    let text = text.replace('/', "\\");
    text.to_lowercase()
}

/// The read-only ignore sets consulted during a walk.
#[derive(Debug, Clone, Default)]
pub struct IgnoreConfig {
    pub dirs: HashSet<String>,
    /// Lowercase, with leading dot.
    pub exts: HashSet<String>,
    /// Folded absolute paths, see [`fold_path`].
    pub paths: HashSet<String>,
}

impl IgnoreConfig {
    /// Builds the ignore sets from raw user entries. Path entries are
    /// env-expanded and resolved against `root` when relative.
    pub fn from_raw<D, E, P>(dirs: D, exts: E, paths: P, root: &Path) -> Self
    where
        D: IntoIterator<Item = String>,
        E: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        let dirs = dirs
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        let exts = exts
            .into_iter()
            .filter_map(|e| normalize_extension(&e))
            .collect();
        let paths = paths
            .into_iter()
            .map(|raw| {
                let expanded = expand_env(raw.trim());
                let key = fold_path(&normalize_path(Path::new(&expanded), root));
                info!("Ignoring path: '{}'", key);
                key
            })
            .collect();
        Self { dirs, exts, paths }
    }
}

fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().to_lowercase();
    match ext.as_str() {
        "" | "." => None,
        e if e.starts_with('.') => Some(ext),
        _ => Some(format!(".{ext}")),
    }
}

/// Pure decision function over an [`IgnoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    ignore: IgnoreConfig,
}

impl PathFilter {
    pub fn new(ignore: IgnoreConfig) -> Self {
        Self { ignore }
    }

    pub fn ignore(&self) -> &IgnoreConfig {
        &self.ignore
    }

    /// Decides the fate of `path`, which must already be absolute and clean
    /// (as produced by walking a normalized root).
    pub fn decide(&self, path: &Path, is_dir: bool) -> Decision {
        if !self.ignore.paths.is_empty() && self.ignore.paths.contains(&fold_path(path)) {
            debug!("Ignored by path: '{}'", path.display());
            return if is_dir {
                Decision::SkipSubtree
            } else {
                Decision::SkipEntry
            };
        }

        if is_dir {
            let ignored = path
                .file_name()
                .map(|name| self.ignore.dirs.contains(name.to_string_lossy().as_ref()))
                .unwrap_or(false);
            return if ignored {
                Decision::SkipSubtree
            } else {
                Decision::Descend
            };
        }

        match extension_of(path) {
            Some(ext) if self.ignore.exts.contains(&ext) => Decision::SkipEntry,
            _ => Decision::Descend,
        }
    }
}

/// Lowercase text from the last `.` of the file name, dot included. Unlike
/// [`Path::extension`], a dotfile such as `.DS_Store` yields `.ds_store`.
fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    let dot = name.rfind('.')?;
    Some(name[dot..].to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(dirs: &[&str], exts: &[&str], paths: &[&str], root: &Path) -> PathFilter {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        PathFilter::new(IgnoreConfig::from_raw(
            owned(dirs),
            owned(exts),
            owned(paths),
            root,
        ))
    }

    #[test]
    fn test_normalize_collapses_dots() {
        let base = Path::new("/srv/data");
        assert_eq!(
            normalize_path(Path::new("a/./b/../c//d"), base),
            PathBuf::from("/srv/data/a/c/d")
        );
        assert_eq!(
            normalize_path(Path::new("/../x"), base),
            PathBuf::from("/x")
        );
        assert_eq!(
            normalize_path(Path::new("../../.."), base),
            PathBuf::from("/")
        );
    }

    #[test]
    fn test_expand_env_all_syntaxes() {
        // SAFETY: the variable name is unique to this test
        unsafe { env::set_var("FFD_TEST_HOME", "/home/tester") };
        assert_eq!(expand_env("$FFD_TEST_HOME/a"), "/home/tester/a");
        assert_eq!(expand_env("${FFD_TEST_HOME}/b"), "/home/tester/b");
        assert_eq!(expand_env("%FFD_TEST_HOME%/c"), "/home/tester/c");
        assert_eq!(expand_env("$FFD_TEST_UNSET_VAR/d"), "/d");
        assert_eq!(expand_env("plain/path"), "plain/path");
    }

    #[test]
    fn test_extensions_are_normalized() {
        let f = filter(&[], &["TMP", ".Log", "", "."], &[], Path::new("/"));
        let mut exts: Vec<_> = f.ignore().exts.iter().cloned().collect();
        exts.sort();
        assert_eq!(exts, vec![".log".to_string(), ".tmp".to_string()]);
    }

    #[test]
    fn test_ignored_directory_prunes_subtree() {
        let f = filter(&["node_modules"], &[], &[], Path::new("/"));
        assert_eq!(
            f.decide(Path::new("/proj/node_modules"), true),
            Decision::SkipSubtree
        );
        assert_eq!(f.decide(Path::new("/proj/src"), true), Decision::Descend);
        // a file that happens to share the name is not a directory
        assert_eq!(
            f.decide(Path::new("/proj/node_modules"), false),
            Decision::Descend
        );
    }

    #[test]
    fn test_ignored_extension_is_case_insensitive() {
        let f = filter(&[], &[".tmp"], &[], Path::new("/"));
        assert_eq!(f.decide(Path::new("/a/x.TMP"), false), Decision::SkipEntry);
        assert_eq!(f.decide(Path::new("/a/x.tmp"), false), Decision::SkipEntry);
        assert_eq!(f.decide(Path::new("/a/x.txt"), false), Decision::Descend);
        assert_eq!(f.decide(Path::new("/a/tmp"), false), Decision::Descend);
    }

    #[test]
    fn test_dotfile_name_counts_as_extension() {
        let f = filter(&[], &[".ds_store", "gitignore"], &[], Path::new("/"));
        assert_eq!(f.decide(Path::new("/a/.DS_Store"), false), Decision::SkipEntry);
        assert_eq!(f.decide(Path::new("/a/.gitignore"), false), Decision::SkipEntry);
        assert_eq!(f.decide(Path::new("/a/x.tar.GITIGNORE"), false), Decision::SkipEntry);
        assert_eq!(f.decide(Path::new("/a/.bashrc"), false), Decision::Descend);
    }

    #[test]
    fn test_ignored_path_relative_to_root() {
        let f = filter(&[], &[], &["Cache", "./docs/../Notes.txt"], Path::new("/data"));
        assert_eq!(f.decide(Path::new("/data/cache"), true), Decision::SkipSubtree);
        assert_eq!(f.decide(Path::new("/data/CACHE"), true), Decision::SkipSubtree);
        assert_eq!(f.decide(Path::new("/data/notes.txt"), false), Decision::SkipEntry);
        assert_eq!(f.decide(Path::new("/data/other.txt"), false), Decision::Descend);
    }
}
