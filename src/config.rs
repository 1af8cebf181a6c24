use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{DedupeError, Result};
use crate::filter::{IgnoreConfig, expand_env, normalize_path};

/// Configuration as written by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    #[serde(default)]
    pub root_directory: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories_to_ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_to_ignore: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths_to_ignore: Vec<String>,
}

impl RawConfig {
    /// Reads a config file. A missing file yields the default configuration;
    /// any other failure is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config file at '{}', using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(DedupeError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let parsed: std::result::Result<Self, String> = if is_toml {
            toml::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        };
        let raw = parsed.map_err(|e| DedupeError::Config(format!("{}: {e}", path.display())))?;
        info!("Loaded config from '{}'", path.display());
        Ok(raw)
    }

    /// Command-line values win over the file: `--root` replaces the root and
    /// the ignore flags extend the file's lists.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(root) = &cli.root {
            self.root_directory = root.to_string_lossy().into_owned();
        }
        self.directories_to_ignore.extend(cli.ignore_dirs.iter().cloned());
        self.extensions_to_ignore.extend(cli.ignore_exts.iter().cloned());
        self.paths_to_ignore.extend(cli.ignore_paths.iter().cloned());
    }
}

/// Validated configuration consumed by the scan.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute, lexically clean directory.
    pub root: PathBuf,
    pub ignore: IgnoreConfig,
}

impl Config {
    /// Validates `raw`, resolving a relative or empty root against `cwd`.
    pub fn from_raw(raw: RawConfig, cwd: &Path) -> Result<Self> {
        let root = expand_env(raw.root_directory.trim());
        let root = if root.is_empty() {
            cwd.to_path_buf()
        } else {
            normalize_path(Path::new(&root), cwd)
        };

        if !root.exists() {
            return Err(DedupeError::Config(format!(
                "root directory does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(DedupeError::Config(format!(
                "root is not a directory: {}",
                root.display()
            )));
        }

        let ignore = IgnoreConfig::from_raw(
            raw.directories_to_ignore,
            raw.extensions_to_ignore,
            raw.paths_to_ignore,
            &root,
        );
        Ok(Self { root, ignore })
    }

    /// Config file plus command-line overrides, resolved against the
    /// current directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut raw = RawConfig::load(&cli.config)?;
        raw.merge_cli(cli);
        let cwd = std::env::current_dir()
            .map_err(|e| DedupeError::Config(format!("cannot read current directory: {e}")))?;
        Self::from_raw(raw, &cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::fold_path;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let raw = RawConfig::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(raw, RawConfig::default());
    }

    #[test]
    fn test_json_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "rootDirectory": "/data",
                "directoriesToIgnore": ["node_modules"],
                "extensionsToIgnore": [".tmp"],
                "pathsToIgnore": ["cache"]
            }"#,
        )
        .unwrap();

        let raw = RawConfig::load(&path).unwrap();
        assert_eq!(raw.root_directory, "/data");
        assert_eq!(raw.directories_to_ignore, vec!["node_modules"]);
        assert_eq!(raw.extensions_to_ignore, vec![".tmp"]);
        assert_eq!(raw.paths_to_ignore, vec!["cache"]);
    }

    #[test]
    fn test_toml_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "rootDirectory = \"/data\"\nextensionsToIgnore = [\"bak\"]\n").unwrap();

        let raw = RawConfig::load(&path).unwrap();
        assert_eq!(raw.root_directory, "/data");
        assert_eq!(raw.extensions_to_ignore, vec!["bak"]);
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = RawConfig::load(&path).unwrap_err();
        assert!(matches!(err, DedupeError::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cli_overrides_and_extends() {
        let mut raw = RawConfig {
            root_directory: "/from/file".into(),
            directories_to_ignore: vec![".git".into()],
            ..RawConfig::default()
        };
        let cli = Cli::try_parse_from([
            "find-file-dups",
            "--root",
            "/from/cli",
            "--ignore-dir",
            "target",
        ])
        .unwrap();

        raw.merge_cli(&cli);
        assert_eq!(raw.root_directory, "/from/cli");
        assert_eq!(raw.directories_to_ignore, vec![".git", "target"]);
    }

    #[test]
    fn test_relative_root_resolved_against_cwd() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("photos")).unwrap();

        let raw = RawConfig {
            root_directory: "./photos/../photos".into(),
            paths_to_ignore: vec!["Thumbs".into()],
            ..RawConfig::default()
        };
        let config = Config::from_raw(raw, dir.path()).unwrap();
        assert_eq!(config.root, dir.path().join("photos"));
        assert!(
            config
                .ignore
                .paths
                .contains(&fold_path(&dir.path().join("photos/thumbs")))
        );
    }

    #[test]
    fn test_empty_root_is_cwd() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_raw(RawConfig::default(), dir.path()).unwrap();
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();

        for root in [dir.path().join("missing"), file] {
            let raw = RawConfig {
                root_directory: root.to_string_lossy().into_owned(),
                ..RawConfig::default()
            };
            assert!(matches!(
                Config::from_raw(raw, dir.path()),
                Err(DedupeError::Config(_))
            ));
        }
    }
}
